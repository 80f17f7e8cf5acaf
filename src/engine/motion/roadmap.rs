// Discrete roadmaps and straight-line walking along them.
//
// A roadmap is a list of walk actions, each a straight segment inside one
// overlay node. Consecutive actions in different nodes meet at a crossover
// point, the same world point expressed in each node's frame.

use glam::Vec2;

use crate::engine::terrain::{NetworkId, TerrainOverlayNetwork};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoadmapAction {
    Walk { node: usize, source: Vec2, destination: Vec2 },
}

impl RoadmapAction {
    pub fn node(&self) -> usize {
        match *self {
            RoadmapAction::Walk { node, .. } => node,
        }
    }

    pub fn destination(&self) -> Vec2 {
        match *self {
            RoadmapAction::Walk { destination, .. } => destination,
        }
    }

    pub fn length(&self) -> f32 {
        match *self {
            RoadmapAction::Walk { source, destination, .. } => source.distance(destination),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionRoadmap {
    pub network: NetworkId,
    pub actions: Vec<RoadmapAction>,
}

impl MotionRoadmap {
    pub fn total_length(&self) -> f32 {
        self.actions.iter().map(|a| a.length()).sum()
    }

    /// Where to head next from inside `node`: the end of the first action
    /// that still lies in that node at or after `progress`.
    pub fn next_target(&self, progress: usize, node: usize) -> Option<Vec2> {
        self.actions
            .iter()
            .skip(progress)
            .find(|a| a.node() == node)
            .map(|a| a.destination())
    }
}

/// Result of walking part of a roadmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadmapStep {
    pub node: usize,
    pub local_position: Vec2,
    pub progress: usize,
    pub finished: bool,
}

/// Moves up to `budget` along the roadmap from `local_position` in `node`,
/// switching nodes at action boundaries.
pub fn walk_roadmap(
    roadmap: &MotionRoadmap,
    mut progress: usize,
    mut node: usize,
    mut local_position: Vec2,
    mut budget: f32,
) -> RoadmapStep {
    while let Some(action) = roadmap.actions.get(progress) {
        let RoadmapAction::Walk { node: action_node, source, destination } = *action;
        if action_node != node {
            node = action_node;
            local_position = source;
        }
        let to_go = local_position.distance(destination);
        if to_go > budget {
            local_position += (destination - local_position) / to_go * budget;
            return RoadmapStep { node, local_position, progress, finished: false };
        }
        budget -= to_go;
        local_position = destination;
        progress += 1;
    }
    RoadmapStep { node, local_position, progress, finished: true }
}

/// World position of a roadmap step.
pub fn step_world_position(network: &TerrainOverlayNetwork, step: &RoadmapStep) -> Vec2 {
    network.node(step.node).local_to_world.transform_point2(step.local_position)
}
