// Triangulation walker: moves a point across a triangulation island along
// a fixed direction, one triangle at a time.
//
// Each step finds the edge the ray leaves the current triangle through.
// Interior edges are crossed with a small overshoot so the point never sits
// exactly on a shared edge. Boundary edges either hand the point to a
// neighbouring sector (crossover) or turn the rest of the motion into a
// slide along the wall. When floating point error leaves the point just
// outside its triangle, it is pushed back toward the centroid once and the
// step is retried.

use glam::Vec2;
use log::{debug, warn};

use crate::engine::geometry::{Triangle, TriangulationIsland};

const MAX_WALK_STEPS: usize = 1000;
/// How far outside an exit edge a point may start and still count as on it.
const EXIT_TOLERANCE: f32 = 1e-4;
/// Below this the remaining direction is considered perpendicular to a wall.
const MIN_SLIDE_PROJECTION: f32 = 1e-4;

/// Terminal state of a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkResult {
    /// The whole distance was travelled.
    Completion,
    /// Stopped against the mesh boundary with distance left.
    Blocked,
    /// Reached a boundary point accepted by the crossover predicate.
    Crossover,
    /// Could not make progress; the position is the best one found.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkOutcome {
    pub triangle: usize,
    pub position: Vec2,
    /// Distance not travelled.
    pub remaining: f32,
    pub result: WalkResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WalkFlags {
    can_push_inward: bool,
    can_edge_follow: bool,
}

pub struct TriangulationWalker<'a> {
    island: &'a TriangulationIsland,
    edge_buffer: f32,
}

impl<'a> TriangulationWalker<'a> {
    pub fn new(island: &'a TriangulationIsland, edge_buffer: f32) -> Self {
        Self { island, edge_buffer: edge_buffer.max(0.0) }
    }

    /// Walks `distance` along `direction` from `position` in `triangle`.
    /// `crossover` is asked about every boundary point the walk reaches.
    pub fn walk(
        &self,
        triangle: usize,
        position: Vec2,
        direction: Vec2,
        distance: f32,
        crossover: &mut dyn FnMut(Vec2) -> bool,
    ) -> WalkOutcome {
        let flags = WalkFlags { can_push_inward: true, can_edge_follow: true };
        self.walk_with(triangle, position, direction, distance, flags, crossover)
    }

    fn walk_with(
        &self,
        mut triangle: usize,
        mut position: Vec2,
        direction: Vec2,
        mut remaining: f32,
        flags: WalkFlags,
        crossover: &mut dyn FnMut(Vec2) -> bool,
    ) -> WalkOutcome {
        let direction = direction.normalize_or_zero();
        if !(remaining > 0.0) || direction == Vec2::ZERO || triangle >= self.island.triangles.len() {
            return WalkOutcome { triangle, position, remaining: remaining.max(0.0), result: WalkResult::Completion };
        }

        let mut can_push_inward = flags.can_push_inward;
        for _ in 0..MAX_WALK_STEPS {
            let tri = &self.island.triangles[triangle];

            let Some((edge, t)) = exit_edge(tri, position, direction) else {
                if !can_push_inward {
                    debug!("walker: no exit from triangle {triangle} at {position:?}, giving up");
                    return WalkOutcome { triangle, position, remaining, result: WalkResult::Failed };
                }
                position = push_toward_centroid(tri, position, self.edge_buffer);
                can_push_inward = false;
                continue;
            };

            if t >= remaining {
                position += direction * remaining;
                return WalkOutcome { triangle, position, remaining: 0.0, result: WalkResult::Completion };
            }

            let exit = position + direction * t;
            remaining -= t;

            if let Some(next) = tri.neighbor(edge) {
                let overshoot = self.edge_buffer.min(remaining);
                position = exit + direction * overshoot;
                remaining -= overshoot;
                triangle = next;
                can_push_inward = flags.can_push_inward;
                if remaining <= 0.0 {
                    return WalkOutcome { triangle, position, remaining: 0.0, result: WalkResult::Completion };
                }
                continue;
            }

            if crossover(exit) {
                return WalkOutcome { triangle, position: exit, remaining, result: WalkResult::Crossover };
            }

            let settled = push_toward_centroid(tri, exit, self.edge_buffer);
            if !flags.can_edge_follow {
                // Sliding into a second wall, e.g. a corner.
                return WalkOutcome { triangle, position: settled, remaining, result: WalkResult::Blocked };
            }

            let (a, b) = tri.edge(edge);
            let along = (b - a).normalize_or_zero();
            let projection = direction.dot(along);
            if projection.abs() < MIN_SLIDE_PROJECTION {
                return WalkOutcome { triangle, position: settled, remaining, result: WalkResult::Blocked };
            }
            let nested = WalkFlags { can_push_inward: false, can_edge_follow: false };
            return self.walk_with(
                triangle,
                settled,
                along * projection.signum(),
                remaining * projection.abs(),
                nested,
                crossover,
            );
        }

        warn!("walker: exceeded {MAX_WALK_STEPS} steps from triangle {triangle}, stopping at {position:?}");
        WalkOutcome { triangle, position, remaining, result: WalkResult::Failed }
    }
}

/// Edge the ray `p + d t` leaves `tri` through, with its parameter. `None`
/// when `p` is clearly outside the triangle on the exit side.
fn exit_edge(tri: &Triangle, p: Vec2, d: Vec2) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for i in 0..3 {
        let (a, b) = tri.edge(i);
        let e = b - a;
        let denom = e.perp_dot(d);
        if denom >= 0.0 {
            continue;
        }
        let t = -e.perp_dot(p - a) / denom;
        if best.is_none_or(|(_, bt)| t < bt) {
            best = Some((i, t));
        }
    }
    let (edge, t) = best?;
    (t >= -EXIT_TOLERANCE).then_some((edge, t.max(0.0)))
}

/// Clamps `p` onto the triangle and nudges it toward the centroid.
pub(crate) fn push_toward_centroid(tri: &Triangle, p: Vec2, buffer: f32) -> Vec2 {
    let q = tri.closest_point(p);
    let to_centroid = tri.centroid - q;
    let len = to_centroid.length();
    if len <= buffer { tri.centroid } else { q + to_centroid / len * buffer }
}
