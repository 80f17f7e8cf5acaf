// Triangulation islands: connected triangle meshes with per-edge neighbours.
//
// Neighbour `i` of a triangle is the triangle across the edge opposite vertex
// `i`, i.e. the edge (points[i+1], points[i+2]). Boundary edges carry
// `NO_NEIGHBOR_INDEX`.

use std::collections::HashMap;

use glam::{IVec2, Vec2};

use super::bvh::Aabb;

pub const NO_NEIGHBOR_INDEX: i32 = -1;

#[derive(Debug, Clone)]
pub struct Triangle {
    pub points: [Vec2; 3],
    pub neighbors: [i32; 3],
    pub centroid: Vec2,
    pub bounds: Aabb,
}

impl Triangle {
    pub fn new(points: [Vec2; 3]) -> Self {
        let bounds = Aabb {
            min: points[0].min(points[1]).min(points[2]),
            max: points[0].max(points[1]).max(points[2]),
        };
        Self {
            points,
            neighbors: [NO_NEIGHBOR_INDEX; 3],
            centroid: (points[0] + points[1] + points[2]) / 3.0,
            bounds,
        }
    }

    /// Endpoints of the edge opposite vertex `i`.
    #[inline]
    pub fn edge(&self, i: usize) -> (Vec2, Vec2) {
        (self.points[(i + 1) % 3], self.points[(i + 2) % 3])
    }

    pub fn neighbor(&self, i: usize) -> Option<usize> {
        let n = self.neighbors[i];
        (n != NO_NEIGHBOR_INDEX).then_some(n as usize)
    }

    /// Barycentric weights of `p` (one per vertex).
    pub fn barycentric(&self, p: Vec2) -> [f32; 3] {
        let [a, b, c] = self.points;
        let denom = (b - a).perp_dot(c - a);
        if denom.abs() <= f32::EPSILON {
            return [f32::NAN; 3];
        }
        let wb = (p - a).perp_dot(c - a) / denom;
        let wc = (b - a).perp_dot(p - a) / denom;
        [1.0 - wb - wc, wb, wc]
    }

    pub fn contains(&self, p: Vec2, tolerance: f32) -> bool {
        if !self.bounds.contains(p, tolerance) {
            return false;
        }
        // Signed distance to every edge line, positive inside.
        (0..3).all(|i| {
            let (a, b) = self.edge(i);
            let len = (b - a).length();
            len > 0.0 && (b - a).perp_dot(p - a) / len >= -tolerance
        })
    }

    /// Closest point of the (closed) triangle to `p`.
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        if self.contains(p, 0.0) {
            return p;
        }
        (0..3)
            .map(|i| {
                let (a, b) = self.edge(i);
                super::polygon::closest_point_on_segment(a, b, p)
            })
            .min_by(|x, y| x.distance_squared(p).total_cmp(&y.distance_squared(p)))
            .unwrap_or(self.centroid)
    }
}

#[derive(Debug, Clone)]
pub struct TriangulationIsland {
    pub triangles: Vec<Triangle>,
    pub bounds: Aabb,
    /// Tree node of the punched land this island covers.
    pub land_node: usize,
}

impl TriangulationIsland {
    /// Builds an island from positively wound integer triangles, matching
    /// neighbours by shared edge endpoints.
    pub fn from_triangles(land_node: usize, raw: &[[IVec2; 3]]) -> Self {
        let mut triangles: Vec<Triangle> = raw
            .iter()
            .map(|t| Triangle::new([t[0].as_vec2(), t[1].as_vec2(), t[2].as_vec2()]))
            .collect();

        let mut edge_map: HashMap<((i32, i32), (i32, i32)), Vec<(usize, usize)>> = HashMap::new();
        for (ti, t) in raw.iter().enumerate() {
            for i in 0..3 {
                let key = edge_key(t[(i + 1) % 3], t[(i + 2) % 3]);
                edge_map.entry(key).or_default().push((ti, i));
            }
        }
        for adjacent in edge_map.values() {
            // Three or more triangles on one edge only happens on degenerate
            // input; leave those edges as boundary.
            if let [(t0, e0), (t1, e1)] = adjacent[..] {
                triangles[t0].neighbors[e0] = t1 as i32;
                triangles[t1].neighbors[e1] = t0 as i32;
            }
        }

        let bounds = triangles.iter().fold(Aabb::EMPTY, |acc, t| acc.union(t.bounds));
        Self { triangles, bounds, land_node }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Index of a triangle containing `p` (within `tolerance`), preferring
    /// `hint` when it qualifies. Walks across neighbours from the hint (or
    /// the first triangle) and only scans the whole island when the walk
    /// runs into a boundary.
    pub fn find_containing_triangle(&self, p: Vec2, tolerance: f32, hint: Option<usize>) -> Option<usize> {
        if !self.bounds.contains(p, tolerance) {
            return None;
        }
        let start = hint.filter(|&h| h < self.triangles.len()).unwrap_or(0);
        if self.triangles.get(start)?.contains(p, tolerance) {
            return Some(start);
        }
        if let Some(found) = self.walk_towards(start, p) {
            return Some(found);
        }
        self.triangles.iter().position(|t| t.contains(p, 0.0)).or_else(|| {
            if tolerance > 0.0 {
                self.triangles.iter().position(|t| t.contains(p, tolerance))
            } else {
                None
            }
        })
    }

    /// Steps through the edge `p` lies furthest outside of until a triangle
    /// contains it. `None` on reaching a boundary edge or after visiting as
    /// many triangles as the island has.
    fn walk_towards(&self, start: usize, p: Vec2) -> Option<usize> {
        let mut current = start;
        for _ in 0..self.triangles.len() {
            let tri = &self.triangles[current];
            let (edge, outside) = (0..3)
                .map(|i| {
                    let (a, b) = tri.edge(i);
                    (i, (b - a).perp_dot(p - a) / (b - a).length().max(f32::EPSILON))
                })
                .min_by(|x, y| x.1.total_cmp(&y.1))?;
            if outside >= 0.0 {
                return Some(current);
            }
            current = tri.neighbor(edge)?;
        }
        None
    }

    /// Triangle whose closed area is nearest to `p`, with that distance.
    pub fn nearest_triangle(&self, p: Vec2) -> Option<(usize, f32)> {
        self.triangles
            .iter()
            .enumerate()
            .map(|(i, t)| (i, t.closest_point(p).distance(p)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Canonical key for an undirected edge: always (min, max).
fn edge_key(a: IVec2, b: IVec2) -> ((i32, i32), (i32, i32)) {
    let (a, b) = ((a.x, a.y), (b.x, b.y));
    if a <= b { (a, b) } else { (b, a) }
}

/// All islands of one punched land tree.
#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    pub islands: Vec<TriangulationIsland>,
}

/// Plain triangle data for a debug renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugTriangle {
    pub island: usize,
    pub points: [Vec2; 3],
}

impl Triangulation {
    pub fn island_for_land_node(&self, land_node: usize) -> Option<&TriangulationIsland> {
        self.islands.iter().find(|island| island.land_node == land_node)
    }

    pub fn triangle_count(&self) -> usize {
        self.islands.iter().map(|i| i.triangles.len()).sum()
    }

    pub fn debug_triangles(&self) -> Vec<DebugTriangle> {
        self.islands
            .iter()
            .enumerate()
            .flat_map(|(island, isl)| isl.triangles.iter().map(move |t| DebugTriangle { island, points: t.points }))
            .collect()
    }
}
