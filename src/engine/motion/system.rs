// MotionSystem: the per-tick driver.
//
// Tick pipeline, in order:
//   1. stat snapshot, roll force accumulators
//   2. localize every agent (hole recovery for off-mesh agents)
//   3. bucket swarmers by (swarm, radius) and share one path search each
//   4. seek toward the next waypoint
//   5. spanning-field correction, ramped in after a destination change
//   6. pairwise separation / cohesion / alignment
//   7. aggregate into one force per agent
//   8. repath agents walking their own roadmap
//   9. integrate: roadmap walking or continuous triangulation walking
//
// All agents are localized before any of them moves, and agents are always
// processed in entity order so a tick is reproducible.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::{debug, info, trace, warn};

use crate::engine::config::{MotionConfig, NumericMode};
use crate::engine::terrain::{NetworkId, SectorId, TerrainOverlayNetwork, TerrainService};

use super::components::{
    BaseStatistics, ComputedStatistics, ForceAccumulators, Localization, MotionComponent, Swarm, SwarmMembership,
    SwarmPathCache,
};
use super::flocking::{compute_pair_forces, FlockAgent, FlockingLuts};
use super::pathfinding::PathfinderResultContext;
use super::roadmap::{step_world_position, walk_roadmap, MotionRoadmap};
use super::spanning::{combine_seek, spanning_ramp, SpanningField};
use super::walker::{push_toward_centroid, TriangulationWalker, WalkResult};

/// Tolerance for point-in-triangle during localization.
const LOCATE_TOLERANCE: f32 = 1e-3;
/// Waypoints closer than this count as reached when picking a seek target.
const WAYPOINT_REACHED: f32 = 0.5;
/// Sector hand-offs allowed within one integration step.
const MAX_SECTOR_TRANSFERS: usize = 4;
const FIXED_POINT_SCALE: f32 = 65536.0;

/// Diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionStats {
    pub ticks: u64,
    pub integration_calls: u64,
    /// Force magnitude average used to damp swarm steps; zero until the
    /// first window completes.
    pub average_force_magnitude: f32,
}

/// Scratch copy of one agent for the duration of a tick.
#[derive(Debug, Clone)]
struct Agent {
    entity: Entity,
    swarm: Option<Entity>,
    swarm_destination: Option<Vec2>,
    radius: f32,
    speed: f32,
    position: Vec2,
    look_at: Vec2,
    localization: Option<Localization>,
    last_direction: Vec2,
    /// Current roadmap action of an agent walking its own route: network,
    /// node and local target.
    roadmap_target: Option<(NetworkId, usize, Vec2)>,
    forces: ForceAccumulators,
}

impl Agent {
    fn radius_key(&self) -> u32 {
        self.radius.to_bits()
    }
}

pub struct MotionSystem {
    config: MotionConfig,
    luts: FlockingLuts,
    stats: MotionStats,
    window_sum: f64,
    window_count: u32,
}

impl MotionSystem {
    pub fn new(config: MotionConfig) -> Self {
        let luts = FlockingLuts::new(config.lut_resolution, config.separation_weight, config.cohesion_weight);
        Self { config, luts, stats: MotionStats::default(), window_sum: 0.0, window_count: 0 }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn stats(&self) -> MotionStats {
        self.stats
    }

    /// Runs one tick over every entity with a `MotionComponent`. Needs a
    /// `TerrainService` resource; without one the tick is skipped.
    pub fn execute(&mut self, world: &mut World) {
        if !world.contains_resource::<TerrainService>() {
            warn!("motion tick skipped: no TerrainService resource");
            return;
        }
        world.resource_scope(|world, mut terrain: Mut<TerrainService>| self.tick(world, &mut terrain));
    }

    /// Relocalizes agents in `sector` after a hole was punched into it,
    /// snapping the ones now inside the hole to the nearest land. Returns
    /// how many agents were moved. Always runs against freshly punched land,
    /// never a preview.
    pub fn handle_hole_added(&mut self, world: &mut World, sector: SectorId) -> usize {
        if !world.contains_resource::<TerrainService>() {
            return 0;
        }
        let buffer = self.config.edge_buffer_radius;
        let allow_preview = self.config.allow_preview_views;
        world.resource_scope(|world, mut terrain: Mut<TerrainService>| {
            terrain.set_allow_preview_views(false);
            let mut entities: Vec<Entity> =
                world.query_filtered::<Entity, With<MotionComponent>>().iter(world).collect();
            entities.sort();

            let mut fixed = 0;
            for entity in entities {
                let Some(mut motion) = world.get_mut::<MotionComponent>(entity) else { continue };
                if motion.localization.is_some_and(|l| l.sector != sector) {
                    continue;
                }
                let radius = compute_statistics(&motion.base_statistics).radius;
                let network = terrain.compile_terrain_overlay_network(radius);
                let position = motion.pose.position;
                if let Some(loc) = localize(&network, position, None) {
                    motion.localization = Some(loc);
                    continue;
                }
                match fix_entity_in_hole(&network, position, buffer) {
                    Some((loc, snapped)) => {
                        info!(
                            "entity {:?} displaced by new hole: {:?} -> {:?}",
                            entity, position, snapped
                        );
                        motion.pose.position = snapped;
                        motion.localization = Some(loc);
                        fixed += 1;
                    }
                    None => motion.localization = None,
                }
            }
            terrain.set_allow_preview_views(allow_preview);
            fixed
        })
    }

    fn tick(&mut self, world: &mut World, terrain: &mut TerrainService) {
        terrain.set_allow_preview_views(self.config.allow_preview_views);

        let mut agents = snapshot_agents(world);
        let mut networks: BTreeMap<u32, Arc<TerrainOverlayNetwork>> = BTreeMap::new();
        for agent in &agents {
            networks
                .entry(agent.radius_key())
                .or_insert_with(|| terrain.compile_terrain_overlay_network(agent.radius));
        }

        self.localize_agents(&networks, &mut agents);
        self.swarm_seek(world, &networks, &mut agents);
        self.aggregate_forces(&networks, &mut agents);
        self.repath(world, terrain.snapshot_version(), &networks, &agents);
        self.integrate(world, &networks, &mut agents);
        write_back(world, &agents);

        if self.config.allow_preview_views {
            let evaluated = terrain.evaluate_pending_views();
            if evaluated > 0 {
                debug!("evaluated {evaluated} pending geometry views");
            }
        }
        self.stats.ticks += 1;
        trace!("motion tick {} done, {} agents", self.stats.ticks, agents.len());
    }

    // ========================================================================
    // LOCALIZATION
    // ========================================================================

    fn localize_agents(&self, networks: &BTreeMap<u32, Arc<TerrainOverlayNetwork>>, agents: &mut [Agent]) {
        for agent in agents.iter_mut() {
            let Some(network) = networks.get(&agent.radius_key()) else { continue };
            if let Some(loc) = localize(network, agent.position, agent.localization.as_ref()) {
                agent.localization = Some(loc);
                continue;
            }
            match fix_entity_in_hole(network, agent.position, self.config.edge_buffer_radius) {
                Some((loc, snapped)) => {
                    info!("entity {:?} was off the mesh at {:?}, snapped to {:?}", agent.entity, agent.position, snapped);
                    agent.position = snapped;
                    agent.localization = Some(loc);
                }
                None => {
                    debug!("entity {:?}: no land at radius {}", agent.entity, agent.radius);
                    agent.localization = None;
                }
            }
        }
    }

    // ========================================================================
    // SWARM PATHING
    // ========================================================================

    fn swarm_seek(
        &self,
        world: &mut World,
        networks: &BTreeMap<u32, Arc<TerrainOverlayNetwork>>,
        agents: &mut [Agent],
    ) {
        let mut buckets: BTreeMap<(Entity, u32), Vec<usize>> = BTreeMap::new();
        for (i, agent) in agents.iter().enumerate() {
            if let (Some(swarm), Some(_)) = (agent.swarm, agent.localization) {
                buckets.entry((swarm, agent.radius_key())).or_default().push(i);
            }
        }

        let mut seen = BTreeSet::new();
        for ((swarm_entity, radius_key), members) in buckets {
            let Some(network) = networks.get(&radius_key) else { continue };
            let Some(mut swarm) = world.get_mut::<Swarm>(swarm_entity) else { continue };
            seen.insert(swarm_entity);
            let Some(destination) = swarm.destination else { continue };
            let Some((destination_node, destination_local)) = locate_destination(network, destination, self.config.edge_buffer_radius) else {
                debug!("swarm {:?}: destination {:?} has no land at radius {}", swarm_entity, destination, network.radius());
                continue;
            };

            let cached = swarm
                .pathing
                .get(&radius_key)
                .filter(|c| c.context.matches(network.id(), destination_node, destination_local))
                .cloned();
            let cache = match cached {
                Some(cache) => cache,
                None => {
                    let context = Arc::new(PathfinderResultContext::compute(network, destination_node, destination_local));
                    let spanning = network
                        .node(destination_node)
                        .island()
                        .and_then(|island| SpanningField::compute(network.id(), destination_node, island, destination_local))
                        .map(Arc::new);
                    debug!(
                        "swarm {:?}: new path search toward node {} on network {:?}",
                        swarm_entity,
                        destination_node,
                        network.id()
                    );
                    let cache = SwarmPathCache { context, spanning };
                    swarm.pathing.insert(radius_key, cache.clone());
                    cache
                }
            };
            let ramp = spanning_ramp(swarm.ticks_since_destination, self.config.spanning_ramp_cap);

            // Members in the same triangle share one route from its centroid.
            let mut routes: HashMap<(usize, usize), Option<MotionRoadmap>> = HashMap::new();
            for i in members {
                let Some(loc) = agents[i].localization else { continue };
                let node = network.node(loc.node);
                let route = routes.entry((loc.node, loc.triangle)).or_insert_with(|| {
                    let centroid = node.island()?.triangles.get(loc.triangle)?.centroid;
                    cache.context.try_find_path(network, loc.node, centroid)
                });
                let path_seek = route
                    .as_ref()
                    .and_then(|r| next_waypoint_world(network, r, agents[i].position))
                    .map(|target| (target - agents[i].position).normalize_or_zero())
                    .unwrap_or(Vec2::ZERO);

                let spanning = match (&cache.spanning, node.island()) {
                    (Some(field), Some(island)) if field.matches(network.id(), loc.node, destination_local) => {
                        let local = field.direction(island, loc.triangle, loc.local_position);
                        node.local_to_world.transform_vector2(local).normalize_or_zero()
                    }
                    _ => Vec2::ZERO,
                };

                let forces = &mut agents[i].forces;
                forces.seek = combine_seek(path_seek, spanning, ramp);
                forces.spanning = spanning * ramp;
                agents[i].swarm_destination = Some(destination);
            }
        }

        for swarm_entity in seen {
            if let Some(mut swarm) = world.get_mut::<Swarm>(swarm_entity) {
                swarm.ticks_since_destination = swarm.ticks_since_destination.saturating_add(1);
            }
        }
    }

    // ========================================================================
    // FORCES
    // ========================================================================

    fn aggregate_forces(&self, networks: &BTreeMap<u32, Arc<TerrainOverlayNetwork>>, agents: &mut [Agent]) {
        let flock: Vec<FlockAgent> = agents
            .iter()
            .map(|a| FlockAgent { position: a.position, radius: a.radius, swarm: a.swarm, last_direction: a.last_direction })
            .collect();
        let pairs = compute_pair_forces(&flock, &self.luts, self.config.attraction_multiple);

        for (agent, pair) in agents.iter_mut().zip(pairs) {
            let network = networks.get(&agent.radius_key());
            if agent.swarm.is_none() {
                agent.forces.seek = roadmap_seek(network.map(|n| &**n), agent);
            }

            let forces = &mut agent.forces;
            forces.separation = pair.separation;
            forces.cohesion = pair.cohesion;
            forces.alignment = pair.alignment.normalize_or_zero() * self.config.alignment_weight;

            let mut total = pair.separation + pair.cohesion;
            let mut weight = pair.separation_weight + pair.cohesion_weight;
            if forces.seek != Vec2::ZERO {
                total += forces.seek * self.config.seek_weight;
                weight += self.config.seek_weight;
            }
            if forces.alignment != Vec2::ZERO {
                total += forces.alignment;
                weight += self.config.alignment_weight;
            }
            forces.aggregate = total;
            forces.aggregate_weight = weight;
            if self.config.numeric_mode == NumericMode::Fixed {
                forces.aggregate = quantize(forces.aggregate);
            }
        }
    }

    // ========================================================================
    // REPATH
    // ========================================================================

    fn repath(
        &self,
        world: &mut World,
        snapshot: u64,
        networks: &BTreeMap<u32, Arc<TerrainOverlayNetwork>>,
        agents: &[Agent],
    ) {
        let mut contexts: HashMap<(NetworkId, u32, u32), Option<Arc<PathfinderResultContext>>> = HashMap::new();
        for agent in agents.iter().filter(|a| a.swarm.is_none()) {
            let (Some(loc), Some(network)) = (agent.localization, networks.get(&agent.radius_key())) else { continue };
            let Some(mut motion) = world.get_mut::<MotionComponent>(agent.entity) else { continue };
            let steering = &mut motion.steering;
            let Some(destination) = steering.destination else { continue };
            if steering.is_destination_reached
                || steering.roadmap.as_ref().is_some_and(|r| r.network == network.id())
                || steering.last_failed_pathfinding_snapshot == Some(snapshot)
            {
                continue;
            }

            let buffer = self.config.edge_buffer_radius;
            let context = contexts
                .entry((network.id(), destination.x.to_bits(), destination.y.to_bits()))
                .or_insert_with(|| {
                    let (node, local) = locate_destination(network, destination, buffer)?;
                    Some(Arc::new(PathfinderResultContext::compute(network, node, local)))
                })
                .clone();

            match context.and_then(|c| c.try_find_path(network, loc.node, loc.local_position)) {
                Some(roadmap) => {
                    debug!(
                        "entity {:?}: path of {} actions ({:.1} units) to {:?}",
                        agent.entity,
                        roadmap.actions.len(),
                        roadmap.total_length(),
                        destination
                    );
                    steering.roadmap = Some(roadmap);
                    steering.roadmap_progress = 0;
                    steering.last_failed_pathfinding_snapshot = None;
                }
                None => {
                    warn!(
                        "entity {:?}: no path to {:?} at radius {}, retrying after terrain changes",
                        agent.entity, destination, agent.radius
                    );
                    steering.roadmap = None;
                    steering.last_failed_pathfinding_snapshot = Some(snapshot);
                }
            }
        }
    }

    // ========================================================================
    // INTEGRATION
    // ========================================================================

    fn integrate(&mut self, world: &mut World, networks: &BTreeMap<u32, Arc<TerrainOverlayNetwork>>, agents: &mut [Agent]) {
        let dt = self.config.tick_seconds;
        for agent in agents.iter_mut() {
            let Some(network) = networks.get(&agent.radius_key()) else { continue };
            let before = agent.position;
            let walked_roadmap = self.integrate_roadmap(world, network, agent);
            if !walked_roadmap {
                self.integrate_continuous(network, agent);
            }

            if self.config.numeric_mode == NumericMode::Fixed {
                if let Some(loc) = agent.localization.as_mut() {
                    loc.local_position = quantize(loc.local_position);
                    agent.position = network.node(loc.node).local_to_world.transform_point2(loc.local_position);
                }
            }
            let moved = agent.position - before;
            if moved != Vec2::ZERO {
                agent.look_at = moved.normalize_or_zero();
            }

            if let Some(destination) = agent.swarm_destination {
                if agent.position.distance(destination) <= agent.speed * dt {
                    if let Some(mut motion) = world.get_mut::<MotionComponent>(agent.entity) {
                        motion.steering.is_destination_reached = true;
                    }
                }
            }
        }
    }

    /// Walks the agent's own roadmap. False when it has none to walk.
    fn integrate_roadmap(&mut self, world: &mut World, network: &TerrainOverlayNetwork, agent: &mut Agent) -> bool {
        if agent.swarm.is_some() {
            return false;
        }
        let Some(mut motion) = world.get_mut::<MotionComponent>(agent.entity) else { return false };
        let steering = &mut motion.steering;
        let Some(destination) = steering.destination else { return false };
        if steering.is_destination_reached {
            return false;
        }

        let budget = agent.speed * self.config.tick_seconds;
        if agent.position.distance(destination) <= budget && agent.localization.is_some() {
            let route_done = steering.roadmap.as_ref().is_none_or(|r| steering.roadmap_progress >= r.actions.len());
            if route_done {
                steering.is_destination_reached = true;
                steering.roadmap = None;
                return true;
            }
        }

        let Some(roadmap) = steering.roadmap.as_ref().filter(|r| r.network == network.id()) else { return false };
        let Some(action) = roadmap.actions.get(steering.roadmap_progress) else { return false };

        // Express the agent in the frame of the node the current action is in.
        let node = action.node();
        let local = network.node(node).world_to_local.transform_point2(agent.position);
        let step = walk_roadmap(roadmap, steering.roadmap_progress, node, local, budget);
        steering.roadmap_progress = step.progress;

        let n = network.node(step.node);
        agent.position = step_world_position(network, &step);
        let hint = agent.localization.filter(|l| l.node == step.node).map(|l| l.triangle);
        let triangle = n.island().and_then(|island| {
            island
                .find_containing_triangle(step.local_position, LOCATE_TOLERANCE, hint)
                .or_else(|| island.nearest_triangle(step.local_position).map(|(t, _)| t))
        });
        if let Some(triangle) = triangle {
            agent.localization = Some(Localization {
                network: network.id(),
                node: step.node,
                sector: n.sector,
                triangle,
                local_position: step.local_position,
            });
        }

        if step.finished {
            steering.roadmap = None;
            steering.is_destination_reached = true;
            let miss = agent.position.distance(destination);
            if miss > budget {
                debug!("entity {:?}: route ended {:.2} units short of {:?}", agent.entity, miss, destination);
            } else {
                debug!("entity {:?}: reached {:?}", agent.entity, destination);
            }
        }
        true
    }

    /// Moves the agent along its aggregate force through the triangulation,
    /// handing it over to neighbouring sectors at crossover seams.
    fn integrate_continuous(&mut self, network: &TerrainOverlayNetwork, agent: &mut Agent) {
        let force = agent.forces.aggregate;
        let magnitude = force.length();
        if !(magnitude > 0.0) || !magnitude.is_finite() {
            return;
        }
        let Some(mut loc) = agent.localization else { return };

        let factor = self.damping_factor(magnitude);
        let mut remaining = agent.speed * self.config.tick_seconds * factor;
        let direction = force / magnitude;

        for _ in 0..MAX_SECTOR_TRANSFERS {
            let from = loc.node;
            let node = network.node(from);
            let Some(island) = node.island() else { break };
            let local_direction = node.world_to_local.transform_vector2(direction);
            let walker = TriangulationWalker::new(island, self.config.edge_buffer_radius);
            let outcome = walker.walk(loc.triangle, loc.local_position, local_direction, remaining, &mut |p: Vec2| {
                network.find_crossover_transfer(from, p).is_some()
            });
            loc.triangle = outcome.triangle;
            loc.local_position = outcome.position;

            match outcome.result {
                WalkResult::Completion | WalkResult::Blocked => break,
                WalkResult::Failed => {
                    debug!("entity {:?}: walk failed in triangle {}, keeping best position", agent.entity, loc.triangle);
                    break;
                }
                WalkResult::Crossover => {
                    let Some((next, local)) = network.find_crossover_transfer(from, outcome.position) else { break };
                    let next_node = network.node(next);
                    let Some(triangle) = next_node
                        .island()
                        .and_then(|island| island.find_containing_triangle(local, LOCATE_TOLERANCE, None))
                    else {
                        break;
                    };
                    trace!("entity {:?}: crossed from node {} to node {}", agent.entity, from, next);
                    loc = Localization { network: network.id(), node: next, sector: next_node.sector, triangle, local_position: local };
                    remaining = outcome.remaining;
                }
            }
        }

        agent.position = network.node(loc.node).local_to_world.transform_point2(loc.local_position);
        agent.localization = Some(loc);
    }

    /// Step-length multiplier: the force magnitude relative to the running
    /// average, capped at 1.
    fn damping_factor(&mut self, magnitude: f32) -> f32 {
        self.stats.integration_calls += 1;
        self.window_sum += magnitude as f64;
        self.window_count += 1;
        if self.window_count >= self.config.force_average_window.max(1) {
            self.stats.average_force_magnitude = (self.window_sum / self.window_count as f64) as f32;
            trace!("force magnitude average now {}", self.stats.average_force_magnitude);
            self.window_sum = 0.0;
            self.window_count = 0;
        }
        let average = self.stats.average_force_magnitude;
        if average > 0.0 { (magnitude / average).min(1.0) } else { 1.0 }
    }
}

impl Default for MotionSystem {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn compute_statistics(base: &BaseStatistics) -> ComputedStatistics {
    ComputedStatistics { radius: base.radius, speed: base.speed }
}

/// Step 1: refresh computed statistics, roll accumulators, copy out.
fn snapshot_agents(world: &mut World) -> Vec<Agent> {
    let mut query = world.query::<(Entity, &mut MotionComponent, Option<&SwarmMembership>)>();
    let mut agents: Vec<Agent> = query
        .iter_mut(world)
        .map(|(entity, mut motion, membership)| {
            let motion = &mut *motion;
            motion.computed_statistics = compute_statistics(&motion.base_statistics);
            motion.steering.last_update = motion.steering.current;
            motion.steering.current = ForceAccumulators::default();
            Agent {
                entity,
                swarm: membership.map(|m| m.swarm),
                swarm_destination: None,
                radius: motion.computed_statistics.radius,
                speed: motion.computed_statistics.speed,
                position: motion.pose.position,
                look_at: motion.pose.look_at,
                localization: motion.localization,
                last_direction: motion.steering.last_update.aggregate.normalize_or_zero(),
                roadmap_target: current_roadmap_target(motion),
                forces: ForceAccumulators::default(),
            }
        })
        .collect();
    agents.sort_by_key(|a| a.entity);
    agents
}

fn write_back(world: &mut World, agents: &[Agent]) {
    for agent in agents {
        let Some(mut motion) = world.get_mut::<MotionComponent>(agent.entity) else { continue };
        motion.pose.position = agent.position;
        motion.pose.look_at = agent.look_at;
        motion.localization = agent.localization;
        motion.steering.current = agent.forces;
    }
}

/// Node and triangle under `world`, trying the previous localization first.
pub fn localize(network: &TerrainOverlayNetwork, world: Vec2, previous: Option<&Localization>) -> Option<Localization> {
    let hint = previous.filter(|l| l.network == network.id());
    let (node, local) = network.find_node_containing_world_point(world, hint.map(|l| l.node))?;
    let island = network.node(node).island()?;
    let triangle_hint = hint.filter(|l| l.node == node).map(|l| l.triangle);
    let triangle = island.find_containing_triangle(local, LOCATE_TOLERANCE, triangle_hint)?;
    Some(Localization { network: network.id(), node, sector: network.node(node).sector, triangle, local_position: local })
}

/// Nearest on-mesh spot for a point that is off the mesh: the closest land
/// boundary point, nudged into its triangle. Returns the localization and
/// the new world position.
pub fn fix_entity_in_hole(network: &TerrainOverlayNetwork, world: Vec2, edge_buffer: f32) -> Option<(Localization, Vec2)> {
    let (node, boundary, _) = network.find_nearest_land_point(world)?;
    let n = network.node(node);
    let island = n.island()?;
    let (triangle, _) = island.nearest_triangle(boundary)?;
    let local = push_toward_centroid(&island.triangles[triangle], boundary, edge_buffer.max(LOCATE_TOLERANCE));
    let loc = Localization { network: network.id(), node, sector: n.sector, triangle, local_position: local };
    Some((loc, n.local_to_world.transform_point2(local)))
}

/// Node and local point to path toward for a world destination, moved onto
/// land when it is not on it.
fn locate_destination(network: &TerrainOverlayNetwork, destination: Vec2, edge_buffer: f32) -> Option<(usize, Vec2)> {
    localize(network, destination, None)
        .or_else(|| fix_entity_in_hole(network, destination, edge_buffer).map(|(loc, _)| loc))
        .map(|loc| (loc.node, loc.local_position))
}

/// First roadmap waypoint, in world space, not already under the agent.
fn next_waypoint_world(network: &TerrainOverlayNetwork, roadmap: &MotionRoadmap, from: Vec2) -> Option<Vec2> {
    roadmap
        .actions
        .iter()
        .map(|a| network.node(a.node()).local_to_world.transform_point2(a.destination()))
        .find(|p| p.distance(from) > WAYPOINT_REACHED)
}

fn current_roadmap_target(motion: &MotionComponent) -> Option<(NetworkId, usize, Vec2)> {
    let steering = &motion.steering;
    let roadmap = steering.roadmap.as_ref()?;
    let node = roadmap.actions.get(steering.roadmap_progress)?.node();
    let target = roadmap.next_target(steering.roadmap_progress, node)?;
    Some((roadmap.network, node, target))
}

/// Unit direction toward the current roadmap target, when the route was
/// planned on this network.
fn roadmap_seek(network: Option<&TerrainOverlayNetwork>, agent: &Agent) -> Vec2 {
    match (network, agent.roadmap_target) {
        (Some(network), Some((id, node, target))) if id == network.id() => {
            let world = network.node(node).local_to_world.transform_point2(target);
            (world - agent.position).normalize_or_zero()
        }
        _ => Vec2::ZERO,
    }
}

fn quantize(v: Vec2) -> Vec2 {
    (v * FIXED_POINT_SCALE).round() / FIXED_POINT_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::terrain::{DynamicHole, Sector};
    use glam::IVec2;

    fn sector_with_hole() -> Arc<TerrainOverlayNetwork> {
        let mut terrain = TerrainService::default();
        let sector = terrain.add_sector(Sector::rectangle(Vec2::new(100.0, 0.0), IVec2::new(200, 100)));
        terrain
            .add_dynamic_hole(sector, DynamicHole::rectangle(Vec2::new(100.0, 50.0), Vec2::splat(10.0)))
            .unwrap();
        terrain.compile_terrain_overlay_network(5.0)
    }

    #[test]
    fn localize_finds_a_containing_triangle_in_local_space() {
        let network = sector_with_hole();
        let loc = localize(&network, Vec2::new(130.0, 20.0), None).unwrap();
        assert_eq!(loc.network, network.id());
        assert!((loc.local_position - Vec2::new(30.0, 20.0)).length() < 1e-4);
        let island = network.node(loc.node).island().unwrap();
        assert!(island.triangles[loc.triangle].contains(loc.local_position, LOCATE_TOLERANCE));

        // Off the mesh: inside the dilated hole and outside the sector.
        assert!(localize(&network, Vec2::new(200.0, 50.0), None).is_none());
        assert!(localize(&network, Vec2::new(50.0, 50.0), None).is_none());
    }

    #[test]
    fn point_in_a_hole_is_moved_to_the_nearest_land() {
        let network = sector_with_hole();
        // Hole plus agent radius spans local 85..115; (108, 50) is nearest the right side.
        let (loc, world) = fix_entity_in_hole(&network, Vec2::new(208.0, 50.0), 0.05).unwrap();
        assert!(world.x >= 214.9 && world.x < 216.0, "{world:?}");
        assert!((world.y - 50.0).abs() < 1.0);
        let island = network.node(loc.node).island().unwrap();
        assert!(island.triangles[loc.triangle].contains(loc.local_position, LOCATE_TOLERANCE));
        assert!(localize(&network, world, Some(&loc)).is_some());
    }

    #[test]
    fn damping_is_neutral_until_the_first_window_completes() {
        let config = MotionConfig { force_average_window: 4, ..MotionConfig::default() };
        let mut system = MotionSystem::new(config);
        for _ in 0..3 {
            assert_eq!(system.damping_factor(10.0), 1.0);
        }
        // Window [10, 10, 10, 30] averages 15.
        assert_eq!(system.damping_factor(30.0), 1.0);
        assert_eq!(system.stats().average_force_magnitude, 15.0);
        assert_eq!(system.damping_factor(7.5), 0.5);
        assert_eq!(system.damping_factor(60.0), 1.0);
        assert_eq!(system.stats().integration_calls, 6);
    }

    #[test]
    fn quantize_snaps_to_the_fixed_grid() {
        let q = quantize(Vec2::new(1.0 / 3.0, -2.7));
        assert_eq!((q.x * FIXED_POINT_SCALE).fract(), 0.0);
        assert_eq!((q.y * FIXED_POINT_SCALE).fract(), 0.0);
        assert!((q - Vec2::new(1.0 / 3.0, -2.7)).length() < 1.0 / FIXED_POINT_SCALE);
    }
}
