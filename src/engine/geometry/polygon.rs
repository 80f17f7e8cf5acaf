// Integer polygon primitives for the geometry kernel.
//
// A `Path` is a closed ring of integer points; the last point connects back to
// the first. Land rings have positive signed area (clockwise on a y-down
// screen), hole rings negative. Orientation tests run on i64 so rounding never
// flips which side of an edge a vertex is on.

use glam::{DVec2, IVec2, Vec2};

pub type Path = Vec<IVec2>;

// ============================================================================
// EXACT PREDICATES
// ============================================================================

/// Twice the signed area of triangle (o, a, b). Positive when b is left of o→a.
#[inline]
pub fn cross_i64(o: IVec2, a: IVec2, b: IVec2) -> i64 {
    (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
}

// ============================================================================
// RING PROPERTIES
// ============================================================================

/// Shoelace signed area.
pub fn signed_area(path: &[IVec2]) -> f64 {
    let n = path.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice: i64 = 0;
    for i in 0..n {
        let a = path[i];
        let b = path[(i + 1) % n];
        twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    twice as f64 * 0.5
}

/// Returns the ring wound with the requested sign of area.
pub fn oriented(path: &[IVec2], positive: bool) -> Path {
    let mut out = path.to_vec();
    if (signed_area(&out) > 0.0) != positive {
        out.reverse();
    }
    out
}

/// Drops repeated points and exactly-collinear vertices (including spikes).
pub fn clean_path(path: &[IVec2]) -> Path {
    let mut pts: Vec<IVec2> = Vec::with_capacity(path.len());
    for &p in path {
        if pts.last() != Some(&p) {
            pts.push(p);
        }
    }
    while pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }

    // Repeat until stable; removing one vertex can make its neighbour collinear.
    let mut changed = true;
    while changed && pts.len() >= 3 {
        changed = false;
        let n = pts.len();
        let mut keep = Vec::with_capacity(n);
        for i in 0..n {
            let prev = pts[(i + n - 1) % n];
            let cur = pts[i];
            let next = pts[(i + 1) % n];
            if cross_i64(prev, cur, next) == 0 || prev == next {
                changed = true;
                continue;
            }
            keep.push(cur);
        }
        if changed {
            pts = keep;
            // Dedupe again, dropping a vertex can bring two equal points together.
            pts.dedup();
            while pts.len() > 1 && pts.first() == pts.last() {
                pts.pop();
            }
        }
    }
    if pts.len() < 3 {
        pts.clear();
    }
    pts
}

/// Axis-aligned rectangle ring with positive area.
pub fn rectangle(min: IVec2, max: IVec2) -> Path {
    vec![
        IVec2::new(min.x, min.y),
        IVec2::new(max.x, min.y),
        IVec2::new(max.x, max.y),
        IVec2::new(min.x, max.y),
    ]
}

/// Converts float points into a ring by rounding to the nearest integer.
pub fn path_from_points(points: &[Vec2]) -> Path {
    points
        .iter()
        .map(|p| IVec2::new(p.x.round() as i32, p.y.round() as i32))
        .collect()
}

// ============================================================================
// POINT QUERIES
// ============================================================================

/// Winding number of `path` around `p` (half-open crossing rule).
pub fn winding_number(path: &[IVec2], p: DVec2) -> i32 {
    let n = path.len();
    let mut wn = 0;
    for i in 0..n {
        let a = path[i].as_dvec2();
        let b = path[(i + 1) % n].as_dvec2();
        wn += segment_winding(a, b, p);
    }
    wn
}

/// Contribution of directed segment a→b to the winding number around `p`.
#[inline]
pub fn segment_winding(a: DVec2, b: DVec2, p: DVec2) -> i32 {
    let is_left = (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);
    if a.y <= p.y {
        if b.y > p.y && is_left > 0.0 {
            return 1;
        }
    } else if b.y <= p.y && is_left < 0.0 {
        return -1;
    }
    0
}

/// Even-odd containment of a float point in a single ring.
pub fn contains_point(path: &[IVec2], p: Vec2) -> bool {
    winding_number(path, p.as_dvec2()) != 0
}

pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}
