// Geometry kernel boundary.
//
// Local geometry views only talk to polygons through this trait, so a
// different clipper/triangulator can be swapped in without touching the view
// or network code. `DefaultKernel` runs booleans and offsets through clipper2
// and triangulates with earcutr.

use clipper2::{difference, union, EndType, FillRule, JoinType, Paths};
use glam::{IVec2, Vec2};

use super::polygon::{clean_path, cross_i64, signed_area, Path};
use super::polytree::PolyTree;
use super::triangulation::{Triangulation, TriangulationIsland};

/// Miter limit for offsets. Right-angle corners stay square.
const MITER_LIMIT: f64 = 2.0;

pub trait GeometryKernel: Send + Sync {
    /// Grows (`delta > 0`) or shrinks (`delta < 0`) the positive-fill union
    /// of `paths` by `|delta|`.
    fn offset(&self, paths: &[Path], delta: f32) -> Vec<Path>;

    /// Union under the positive fill rule.
    fn union(&self, paths: &[Path]) -> Vec<Path>;

    /// `land ∖ holes` nested into a contour tree.
    fn punch(&self, land: &[Path], holes: &[Path]) -> PolyTree;

    /// One island per land node of `tree`.
    fn triangulate(&self, tree: &PolyTree) -> Triangulation;

    /// Shrinks a segment by `radius` at both ends; `None` once nothing is left.
    fn erode_segment(&self, a: Vec2, b: Vec2, radius: f32) -> Option<(Vec2, Vec2)>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKernel;

// ============================================================================
// CLIPPER2 CONVERSION
// ============================================================================

fn to_clipper(paths: &[Path]) -> Paths {
    let coords: Vec<Vec<(f64, f64)>> = paths
        .iter()
        .filter(|p| p.len() >= 3)
        .map(|p| p.iter().map(|v| (v.x as f64, v.y as f64)).collect())
        .collect();
    coords.into()
}

/// Rounds clipper output back onto the integer grid, dropping rings that
/// collapse in the process.
fn from_clipper(paths: Paths) -> Vec<Path> {
    let output: Vec<Vec<(f64, f64)>> = paths.into();
    output
        .into_iter()
        .filter_map(|ring| {
            let rounded: Path = ring
                .iter()
                .map(|&(x, y)| IVec2::new(x.round() as i32, y.round() as i32))
                .collect();
            let cleaned = clean_path(&rounded);
            (cleaned.len() >= 3 && signed_area(&cleaned) != 0.0).then_some(cleaned)
        })
        .collect()
}

fn clipper_union(paths: &[Path]) -> Paths {
    let subject = to_clipper(paths);
    let clip: Paths = Vec::<Vec<(f64, f64)>>::new().into();
    match union(subject, clip, FillRule::Positive) {
        Ok(result) => result,
        Err(err) => {
            log::warn!("clipper union failed: {err:?}");
            Vec::<Vec<(f64, f64)>>::new().into()
        }
    }
}

// ============================================================================
// TRIANGULATION
// ============================================================================

/// Ear-clips one outer ring with its holes into positively wound integer
/// triangles. Degenerate triangles are dropped.
pub fn triangulate_polygon(outer: &[IVec2], holes: &[&Path]) -> Vec<[IVec2; 3]> {
    let mut points: Vec<IVec2> = outer.to_vec();
    let mut hole_starts = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_starts.push(points.len());
        points.extend_from_slice(hole);
    }
    let coords: Vec<f64> = points.iter().flat_map(|p| [p.x as f64, p.y as f64]).collect();

    let indices = match earcutr::earcut(&coords, &hole_starts, 2) {
        Ok(indices) => indices,
        Err(err) => {
            log::warn!("earcut failed on a {}-vertex contour: {err:?}", points.len());
            return Vec::new();
        }
    };

    indices
        .chunks_exact(3)
        .filter_map(|tri| {
            let (a, b, c) = (points[tri[0]], points[tri[1]], points[tri[2]]);
            match cross_i64(a, b, c).signum() {
                1 => Some([a, b, c]),
                -1 => Some([a, c, b]),
                _ => None,
            }
        })
        .collect()
}

impl GeometryKernel for DefaultKernel {
    fn offset(&self, paths: &[Path], delta: f32) -> Vec<Path> {
        let merged = clipper_union(paths);
        if delta == 0.0 {
            return from_clipper(merged);
        }
        from_clipper(merged.inflate(delta as f64, JoinType::Miter, EndType::Polygon, MITER_LIMIT))
    }

    fn union(&self, paths: &[Path]) -> Vec<Path> {
        from_clipper(clipper_union(paths))
    }

    fn punch(&self, land: &[Path], holes: &[Path]) -> PolyTree {
        let rings = match difference(to_clipper(land), to_clipper(holes), FillRule::Positive) {
            Ok(result) => from_clipper(result),
            Err(err) => {
                log::warn!("clipper difference failed: {err:?}");
                Vec::new()
            }
        };
        PolyTree::from_rings(rings)
    }

    fn triangulate(&self, tree: &PolyTree) -> Triangulation {
        let islands = tree
            .land_nodes()
            .into_iter()
            .map(|land| {
                let node = tree.node(land);
                let holes: Vec<&Path> = node.children.iter().map(|&c| &tree.node(c).contour).collect();
                let raw = triangulate_polygon(&node.contour, &holes);
                TriangulationIsland::from_triangles(land, &raw)
            })
            .collect();
        Triangulation { islands }
    }

    fn erode_segment(&self, a: Vec2, b: Vec2, radius: f32) -> Option<(Vec2, Vec2)> {
        let length = a.distance(b);
        if length - 2.0 * radius <= 0.0 {
            return None;
        }
        let dir = (b - a) / length;
        Some((a + dir * radius, b - dir * radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::geometry::polygon::{oriented, rectangle};

    #[test]
    fn erode_segment_fails_when_too_short() {
        let k = DefaultKernel;
        assert!(k.erode_segment(Vec2::ZERO, Vec2::new(10.0, 0.0), 5.0).is_none());
        let (a, b) = k.erode_segment(Vec2::ZERO, Vec2::new(10.0, 0.0), 2.0).unwrap();
        assert_eq!(a, Vec2::new(2.0, 0.0));
        assert_eq!(b, Vec2::new(8.0, 0.0));
    }

    #[test]
    fn over_eroded_land_vanishes() {
        let k = DefaultKernel;
        let land = vec![rectangle(IVec2::ZERO, IVec2::splat(10))];
        assert!(k.offset(&land, -6.0).is_empty());
    }

    #[test]
    fn erosion_moves_every_side_inward() {
        let k = DefaultKernel;
        let land = vec![rectangle(IVec2::ZERO, IVec2::splat(100))];
        let eroded = k.offset(&land, -10.0);
        assert_eq!(eroded.len(), 1);
        assert_eq!(signed_area(&eroded[0]), 80.0 * 80.0);
    }

    #[test]
    fn overlapping_dilations_merge() {
        let k = DefaultKernel;
        let holes = vec![
            rectangle(IVec2::new(0, 0), IVec2::new(10, 10)),
            rectangle(IVec2::new(14, 0), IVec2::new(24, 10)),
        ];
        let merged = k.offset(&holes, 3.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(signed_area(&merged[0]), 30.0 * 16.0);
    }

    #[test]
    fn punch_leaves_a_negative_hole_ring() {
        let k = DefaultKernel;
        let land = vec![rectangle(IVec2::ZERO, IVec2::splat(100))];
        let hole = vec![rectangle(IVec2::splat(40), IVec2::splat(60))];
        let tree = k.punch(&land, &hole);
        let lands = tree.land_nodes();
        assert_eq!(lands.len(), 1);
        let node = tree.node(lands[0]);
        assert_eq!(signed_area(&node.contour), 100.0 * 100.0);
        assert_eq!(node.children.len(), 1);
        assert_eq!(signed_area(&tree.node(node.children[0]).contour), -400.0);
    }

    #[test]
    fn triangulated_hole_keeps_the_land_area() {
        let outer = rectangle(IVec2::ZERO, IVec2::splat(100));
        let hole = oriented(&rectangle(IVec2::splat(40), IVec2::splat(60)), false);
        let tris = triangulate_polygon(&outer, &[&hole]);
        assert!(tris.iter().all(|t| cross_i64(t[0], t[1], t[2]) > 0));
        let area: i64 = tris.iter().map(|t| cross_i64(t[0], t[1], t[2])).sum();
        assert_eq!(area, 2 * (100 * 100 - 20 * 20));
    }

    #[test]
    fn triangulate_makes_one_island_per_land_node() {
        let k = DefaultKernel;
        let land = vec![
            rectangle(IVec2::new(0, 0), IVec2::new(10, 10)),
            rectangle(IVec2::new(20, 0), IVec2::new(30, 10)),
        ];
        let tree = k.punch(&land, &[]);
        let tri = k.triangulate(&tree);
        assert_eq!(tri.islands.len(), 2);
        assert_eq!(tri.triangle_count(), 4);
    }
}
