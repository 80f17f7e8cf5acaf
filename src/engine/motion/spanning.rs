// Discrete spanning field over triangle centroids.
//
// A Dijkstra from the destination triangle through the island's neighbour
// links. Each triangle remembers which neighbour is one step closer, which
// gives agents already in the destination's node a cheap secondary seek
// direction that follows the mesh rather than the waypoint roadmap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec2;

use crate::engine::geometry::{TriangulationIsland, NO_NEIGHBOR_INDEX};
use crate::engine::terrain::NetworkId;

#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f32,
    triangle: usize,
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
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost).then_with(|| other.triangle.cmp(&self.triangle))
    }
}

#[derive(Debug, Clone)]
pub struct SpanningField {
    pub network: NetworkId,
    pub node: usize,
    pub destination_triangle: usize,
    pub destination: Vec2,
    /// Next triangle toward the destination, `NO_NEIGHBOR_INDEX` when
    /// unreachable or already there.
    next: Vec<i32>,
}

impl SpanningField {
    pub fn compute(network: NetworkId, node: usize, island: &TriangulationIsland, destination: Vec2) -> Option<Self> {
        let destination_triangle = island
            .find_containing_triangle(destination, 1e-3, None)
            .or_else(|| island.nearest_triangle(destination).map(|(t, _)| t))?;

        let n = island.triangles.len();
        let mut cost = vec![f32::INFINITY; n];
        let mut next = vec![NO_NEIGHBOR_INDEX; n];
        let mut heap = BinaryHeap::new();
        cost[destination_triangle] = 0.0;
        heap.push(Frontier { cost: 0.0, triangle: destination_triangle });

        while let Some(Frontier { cost: c, triangle }) = heap.pop() {
            if c > cost[triangle] {
                continue;
            }
            let t = &island.triangles[triangle];
            for i in 0..3 {
                let Some(nb) = t.neighbor(i) else { continue };
                let step = c + t.centroid.distance(island.triangles[nb].centroid);
                if step < cost[nb] {
                    cost[nb] = step;
                    next[nb] = triangle as i32;
                    heap.push(Frontier { cost: step, triangle: nb });
                }
            }
        }

        Some(Self { network, node, destination_triangle, destination, next })
    }

    pub fn matches(&self, network: NetworkId, node: usize, destination: Vec2) -> bool {
        self.network == network && self.node == node && self.destination == destination
    }

    /// Unit direction from `position` (inside `triangle`) toward the next
    /// centroid on the way to the destination.
    pub fn direction(&self, island: &TriangulationIsland, triangle: usize, position: Vec2) -> Vec2 {
        if triangle == self.destination_triangle {
            return (self.destination - position).normalize_or_zero();
        }
        match self.next.get(triangle) {
            Some(&t) if t != NO_NEIGHBOR_INDEX => (island.triangles[t as usize].centroid - position).normalize_or_zero(),
            _ => Vec2::ZERO,
        }
    }
}

/// Weight of the spanning force `ticks` after the destination was set:
/// linear from 0 up to 1 at `cap`.
pub fn spanning_ramp(ticks: u32, cap: u32) -> f32 {
    if cap == 0 {
        return 1.0;
    }
    ticks.min(cap) as f32 / cap as f32
}

/// Scales `v` down to unit length if it is longer; shorter vectors pass
/// through.
pub fn normalize_or_less(v: Vec2) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq > 1.0 && len_sq.is_finite() { v / len_sq.sqrt() } else if len_sq.is_finite() { v } else { Vec2::ZERO }
}

/// Blends the roadmap seek with the ramped spanning direction.
pub fn combine_seek(path_seek: Vec2, spanning: Vec2, ramp: f32) -> Vec2 {
    normalize_or_less(path_seek + spanning * ramp)
}
