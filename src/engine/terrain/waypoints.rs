// Visibility roadmap inside one land region.
//
// Waypoints are the region's crossover points followed by its reflex
// corners, each pulled slightly into the land. Two points see each other
// when the segment between them crosses no region edge and its midpoint is
// on land.

use glam::Vec2;

use crate::engine::geometry::polygon::{cross_i64, Path};
use crate::engine::geometry::EdgeBvh;

/// Distance a reflex-corner waypoint is moved off the contour.
const CORNER_INSET: f32 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct NodeRoadmap {
    /// Crossover points first (same indices as the node's crossover set),
    /// then corner waypoints.
    pub waypoints: Vec<Vec2>,
    pub crossover_count: usize,
    /// Visible neighbours per waypoint with their distances.
    pub adjacency: Vec<Vec<(usize, f32)>>,
}

impl NodeRoadmap {
    pub fn build(contours: &[&Path], region: &EdgeBvh, crossover_points: &[Vec2]) -> Self {
        let mut waypoints: Vec<Vec2> = crossover_points.to_vec();
        waypoints.extend(
            contours
                .iter()
                .flat_map(|c| reflex_corners(c))
                .filter(|&p| region.contains_point(p)),
        );

        let n = waypoints.len();
        let mut adjacency = vec![Vec::new(); n];
        for i in 0..n {
            for j in i + 1..n {
                if is_visible(region, waypoints[i], waypoints[j]) {
                    let d = waypoints[i].distance(waypoints[j]);
                    adjacency[i].push((j, d));
                    adjacency[j].push((i, d));
                }
            }
        }

        Self { waypoints, crossover_count: crossover_points.len(), adjacency }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Waypoints visible from an arbitrary point of the region.
    pub fn visible_from(&self, region: &EdgeBvh, p: Vec2) -> Vec<(usize, f32)> {
        self.waypoints
            .iter()
            .enumerate()
            .filter(|(_, w)| is_visible(region, p, **w))
            .map(|(i, w)| (i, p.distance(*w)))
            .collect()
    }
}

pub fn is_visible(region: &EdgeBvh, a: Vec2, b: Vec2) -> bool {
    if a == b {
        return true;
    }
    !region.intersects_segment(a, b) && region.contains_point((a + b) * 0.5)
}

/// Corners where the land side turns away (right turn, since land lies left
/// of every region contour), inset along the bisector of the edge normals.
fn reflex_corners(contour: &Path) -> Vec<Vec2> {
    let n = contour.len();
    let mut out = Vec::new();
    if n < 3 {
        return out;
    }
    for i in 0..n {
        let prev = contour[(i + n - 1) % n];
        let cur = contour[i];
        let next = contour[(i + 1) % n];
        if cross_i64(prev, cur, next) >= 0 {
            continue;
        }
        let n1 = (cur - prev).as_vec2().normalize_or_zero().perp();
        let n2 = (next - cur).as_vec2().normalize_or_zero().perp();
        let bisector = (n1 + n2).normalize_or_zero();
        out.push(cur.as_vec2() + bisector * CORNER_INSET);
    }
    out
}
