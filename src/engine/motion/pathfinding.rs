// Destination-anchored uniform-cost search over the overlay network.
//
// The search runs once per (network, destination) from the destination
// outward over every node's waypoint roadmap and the crossover edges
// between nodes. Any number of agents can then read a path out of the same
// result: pick the cheapest waypoint visible from the agent and follow the
// `next` links back to the destination.
//
// Uniform cost instead of the BFS flowfield: roadmap edges have real
// lengths, so the frontier is a binary heap keyed by distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec2;
use log::trace;

use crate::engine::terrain::{NetworkId, TerrainOverlayNetwork};

use super::roadmap::{MotionRoadmap, RoadmapAction};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Next {
    Unreached,
    /// The destination is in sight.
    Destination,
    State(usize),
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f32,
    state: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // Reversed so the max-heap pops the cheapest state; ties by state index
    // keep the expansion order deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost).then_with(|| other.state.cmp(&self.state))
    }
}

#[derive(Debug, Clone)]
pub struct PathfinderResultContext {
    network: NetworkId,
    destination_node: usize,
    destination: Vec2,
    /// First global state index of each node's waypoints (plus a final total).
    bases: Vec<usize>,
    distances: Vec<f32>,
    next: Vec<Next>,
}

impl PathfinderResultContext {
    pub fn compute(network: &TerrainOverlayNetwork, destination_node: usize, destination: Vec2) -> Self {
        let mut bases = Vec::with_capacity(network.nodes().len() + 1);
        let mut total = 0;
        for node in network.nodes() {
            bases.push(total);
            total += node.roadmap().len();
        }
        bases.push(total);

        let mut distances = vec![f32::INFINITY; total];
        let mut next = vec![Next::Unreached; total];
        let mut heap = BinaryHeap::new();

        let dest = network.node(destination_node);
        if let Some(region) = dest.region() {
            for (w, d) in dest.roadmap().visible_from(&region.region_bvh, destination) {
                let s = bases[destination_node] + w;
                if d < distances[s] {
                    distances[s] = d;
                    next[s] = Next::Destination;
                    heap.push(Frontier { cost: d, state: s });
                }
            }
        }

        let mut expanded = 0usize;
        while let Some(Frontier { cost, state }) = heap.pop() {
            if cost > distances[state] {
                continue;
            }
            expanded += 1;
            let node = node_of(&bases, state);
            let w = state - bases[node];
            let roadmap = network.node(node).roadmap();

            let mut relax = |target: usize, step: f32| {
                let c = cost + step;
                if c < distances[target] {
                    distances[target] = c;
                    next[target] = Next::State(state);
                    heap.push(Frontier { cost: c, state: target });
                }
            };

            for &(other, d) in &roadmap.adjacency[w] {
                relax(bases[node] + other, d);
            }
            if w < roadmap.crossover_count {
                // Agents reach this crossover point from the far side of any
                // seam that lands here.
                for group in network.inbound_groups(node) {
                    for edge in group.edges.iter().filter(|e| e.destination_point_index == w) {
                        relax(bases[group.source] + edge.source_point_index, edge.cost);
                    }
                }
            }
        }
        trace!(
            "pathfinder: {} of {} waypoint states expanded toward node {}",
            expanded,
            total,
            destination_node
        );

        Self { network: network.id(), destination_node, destination, bases, distances, next }
    }

    /// True if this result answers queries for that destination on that network.
    pub fn matches(&self, network: NetworkId, destination_node: usize, destination: Vec2) -> bool {
        self.network == network && self.destination_node == destination_node && self.destination == destination
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn destination_node(&self) -> usize {
        self.destination_node
    }

    pub fn destination(&self) -> Vec2 {
        self.destination
    }

    /// Shortest roadmap distance from a local point of `node` to the
    /// destination.
    pub fn distance_from(&self, network: &TerrainOverlayNetwork, node: usize, point: Vec2) -> Option<f32> {
        if network.id() != self.network {
            return None;
        }
        if node == self.destination_node && network.node(node).is_visible(point, self.destination) {
            return Some(point.distance(self.destination));
        }
        self.best_entry(network, node, point).map(|(_, cost)| cost)
    }

    pub fn try_find_path(&self, network: &TerrainOverlayNetwork, node: usize, point: Vec2) -> Option<MotionRoadmap> {
        if network.id() != self.network || node >= network.nodes().len() {
            return None;
        }
        if node == self.destination_node && network.node(node).is_visible(point, self.destination) {
            return Some(MotionRoadmap {
                network: self.network,
                actions: vec![RoadmapAction::Walk { node, source: point, destination: self.destination }],
            });
        }

        let (mut state, _) = self.best_entry(network, node, point)?;
        let mut actions = Vec::new();
        let (mut cur_node, mut cur_pos) = (node, point);
        for _ in 0..=self.distances.len() {
            let n = node_of(&self.bases, state);
            let waypoint = network.node(n).roadmap().waypoints[state - self.bases[n]];
            // A node change is a seam crossing: same world point, no walk.
            if n == cur_node && cur_pos != waypoint {
                actions.push(RoadmapAction::Walk { node: n, source: cur_pos, destination: waypoint });
            }
            cur_node = n;
            cur_pos = waypoint;
            match self.next[state] {
                Next::Destination => {
                    if cur_pos != self.destination {
                        actions.push(RoadmapAction::Walk {
                            node: cur_node,
                            source: cur_pos,
                            destination: self.destination,
                        });
                    }
                    return Some(MotionRoadmap { network: self.network, actions });
                }
                Next::State(s) => state = s,
                Next::Unreached => return None,
            }
        }
        None
    }

    /// Cheapest reached waypoint visible from `point`, with the total cost.
    fn best_entry(&self, network: &TerrainOverlayNetwork, node: usize, point: Vec2) -> Option<(usize, f32)> {
        let n = network.node(node);
        let region = n.region()?;
        n.roadmap()
            .visible_from(&region.region_bvh, point)
            .into_iter()
            .map(|(w, d)| (self.bases[node] + w, d))
            .filter(|&(s, _)| self.distances[s].is_finite())
            .map(|(s, d)| (s, d + self.distances[s]))
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
    }
}

fn node_of(bases: &[usize], state: usize) -> usize {
    bases.partition_point(|&b| b <= state) - 1
}
