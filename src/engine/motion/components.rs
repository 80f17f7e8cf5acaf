// ECS components read and written by the motion system.

use std::collections::HashMap;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::Vec2;

use crate::engine::terrain::{NetworkId, SectorId};

use super::pathfinding::PathfinderResultContext;
use super::roadmap::MotionRoadmap;
use super::spanning::SpanningField;

/// World-space placement of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Vec2,
    /// Unit facing direction; zero until the agent first moves.
    pub look_at: Vec2,
}

/// Authored statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseStatistics {
    pub radius: f32,
    /// World units per second.
    pub speed: f32,
}

impl Default for BaseStatistics {
    fn default() -> Self {
        Self { radius: 5.0, speed: 40.0 }
    }
}

/// Statistics in effect for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComputedStatistics {
    pub radius: f32,
    pub speed: f32,
}

/// Where on the navmesh an agent is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Localization {
    pub network: NetworkId,
    /// Node index in that network.
    pub node: usize,
    pub sector: SectorId,
    /// Triangle index in the node's island.
    pub triangle: usize,
    /// Position in the sector's local frame.
    pub local_position: Vec2,
}

/// Per-tick steering contributions. Directional terms are already scaled
/// by their weights except `seek`, which stays a vector of length <= 1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForceAccumulators {
    pub seek: Vec2,
    pub spanning: Vec2,
    pub alignment: Vec2,
    pub separation: Vec2,
    pub cohesion: Vec2,
    pub aggregate: Vec2,
    pub aggregate_weight: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SteeringState {
    /// World-space goal of an agent moving on its own.
    pub destination: Option<Vec2>,
    pub roadmap: Option<MotionRoadmap>,
    /// Index of the roadmap action being walked.
    pub roadmap_progress: usize,
    /// Terrain snapshot at which the last path search failed; no retry
    /// until the snapshot moves on.
    pub last_failed_pathfinding_snapshot: Option<u64>,
    pub is_destination_reached: bool,
    pub current: ForceAccumulators,
    pub last_update: ForceAccumulators,
}

#[derive(Component, Debug, Clone, Default)]
pub struct MotionComponent {
    pub pose: Pose,
    pub base_statistics: BaseStatistics,
    pub computed_statistics: ComputedStatistics,
    pub localization: Option<Localization>,
    pub steering: SteeringState,
}

impl MotionComponent {
    pub fn new(position: Vec2, radius: f32, speed: f32) -> Self {
        Self {
            pose: Pose { position, look_at: Vec2::ZERO },
            base_statistics: BaseStatistics { radius, speed },
            ..Default::default()
        }
    }

    pub fn with_destination(mut self, destination: Vec2) -> Self {
        self.steering.destination = Some(destination);
        self
    }

    /// Points the agent at a new goal, discarding its current path.
    pub fn set_destination(&mut self, destination: Option<Vec2>) {
        self.steering.destination = destination;
        self.steering.roadmap = None;
        self.steering.roadmap_progress = 0;
        self.steering.last_failed_pathfinding_snapshot = None;
        self.steering.is_destination_reached = false;
    }
}

/// Marks an agent as steered by its swarm instead of its own roadmap.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwarmMembership {
    pub swarm: Entity,
}

/// Path search results a swarm keeps per agent radius.
#[derive(Debug, Clone)]
pub struct SwarmPathCache {
    pub context: Arc<PathfinderResultContext>,
    pub spanning: Option<Arc<SpanningField>>,
}

#[derive(Component, Debug, Clone, Default)]
pub struct Swarm {
    pub destination: Option<Vec2>,
    pub ticks_since_destination: u32,
    /// Keyed by the bit pattern of the computed radius.
    pub pathing: HashMap<u32, SwarmPathCache>,
}

impl Swarm {
    pub fn new(destination: Vec2) -> Self {
        Self { destination: Some(destination), ..Default::default() }
    }

    pub fn set_destination(&mut self, destination: Option<Vec2>) {
        self.destination = destination;
        self.ticks_since_destination = 0;
        self.pathing.clear();
    }
}
