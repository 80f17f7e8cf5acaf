// Bounding-volume hierarchy over contour edges.
//
// Built once per land region when a view punches its land, then used for
// point containment, line-of-sight and nearest-boundary queries.

use glam::{DVec2, IVec2, Vec2};

const LEAF_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec2::splat(f32::INFINITY),
        max: Vec2::splat(f32::NEG_INFINITY),
    };

    pub fn from_segment(a: Vec2, b: Vec2) -> Self {
        Self { min: a.min(b), max: a.max(b) }
    }

    pub fn union(self, other: Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    pub fn contains(&self, p: Vec2, tolerance: f32) -> bool {
        p.x >= self.min.x - tolerance
            && p.x <= self.max.x + tolerance
            && p.y >= self.min.y - tolerance
            && p.y <= self.max.y + tolerance
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && other.min.x <= self.max.x && self.min.y <= other.max.y && other.min.y <= self.max.y
    }

    /// Squared distance from `p` to the box (0 inside).
    pub fn distance_squared(&self, p: Vec2) -> f32 {
        let d = (self.min - p).max(p - self.max).max(Vec2::ZERO);
        d.length_squared()
    }
}

#[derive(Debug, Clone)]
enum BvhNode {
    Leaf { bounds: Aabb, start: usize, count: usize },
    Inner { bounds: Aabb, left: usize, right: usize },
}

impl BvhNode {
    fn bounds(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { bounds, .. } | BvhNode::Inner { bounds, .. } => bounds,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeBvh {
    segments: Vec<(Vec2, Vec2)>,
    nodes: Vec<BvhNode>,
}

impl EdgeBvh {
    /// Builds over every edge of every (closed) contour.
    pub fn from_contours<'a>(contours: impl IntoIterator<Item = &'a Vec<IVec2>>) -> Self {
        let mut segments = Vec::new();
        for contour in contours {
            let n = contour.len();
            for i in 0..n {
                let a = contour[i].as_vec2();
                let b = contour[(i + 1) % n].as_vec2();
                if a != b {
                    segments.push((a, b));
                }
            }
        }
        Self::from_segments(segments)
    }

    pub fn from_segments(mut segments: Vec<(Vec2, Vec2)>) -> Self {
        let mut nodes = Vec::new();
        if !segments.is_empty() {
            let len = segments.len();
            build(&mut segments, 0, len, &mut nodes);
        }
        Self { segments, nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[(Vec2, Vec2)] {
        &self.segments
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map(|n| *n.bounds()).unwrap_or(Aabb::EMPTY)
    }

    /// Crossing-parity containment: true inside an odd number of contours,
    /// which for a land region (outer ring + hole rings) means on land.
    pub fn contains_point(&self, p: Vec2) -> bool {
        if self.nodes.is_empty() || !self.bounds().contains(p, 0.0) {
            return false;
        }
        let pd = p.as_dvec2();
        let mut inside = false;
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            let bounds = self.nodes[i].bounds();
            if p.y < bounds.min.y || p.y > bounds.max.y || p.x > bounds.max.x {
                continue;
            }
            match self.nodes[i] {
                BvhNode::Leaf { start, count, .. } => {
                    for &(a, b) in &self.segments[start..start + count] {
                        let (a, b) = (a.as_dvec2(), b.as_dvec2());
                        if (a.y > pd.y) != (b.y > pd.y) {
                            let x = a.x + (pd.y - a.y) * (b.x - a.x) / (b.y - a.y);
                            if pd.x < x {
                                inside = !inside;
                            }
                        }
                    }
                }
                BvhNode::Inner { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        inside
    }

    /// True if the segment a–b properly crosses any edge (shared endpoints
    /// and grazing contacts do not count).
    pub fn intersects_segment(&self, a: Vec2, b: Vec2) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let query = Aabb::from_segment(a, b);
        let (qa, qb) = (a.as_dvec2(), b.as_dvec2());
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if !self.nodes[i].bounds().overlaps(&query) {
                continue;
            }
            match self.nodes[i] {
                BvhNode::Leaf { start, count, .. } => {
                    for &(c, d) in &self.segments[start..start + count] {
                        if crosses(qa, qb, c.as_dvec2(), d.as_dvec2()) {
                            return true;
                        }
                    }
                }
                BvhNode::Inner { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        false
    }

    /// Closest point on any edge to `p`, with its distance and segment index.
    pub fn nearest_point(&self, p: Vec2) -> Option<(Vec2, f32, usize)> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<(Vec2, f32, usize)> = None;
        let mut best_sq = f32::INFINITY;
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if self.nodes[i].bounds().distance_squared(p) > best_sq {
                continue;
            }
            match self.nodes[i] {
                BvhNode::Leaf { start, count, .. } => {
                    for (k, &(a, b)) in self.segments[start..start + count].iter().enumerate() {
                        let q = super::polygon::closest_point_on_segment(a, b, p);
                        let d_sq = q.distance_squared(p);
                        if d_sq < best_sq {
                            best_sq = d_sq;
                            best = Some((q, d_sq.sqrt(), start + k));
                        }
                    }
                }
                BvhNode::Inner { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        best
    }
}

/// Strict crossing test: the interiors intersect at one point.
fn crosses(a: DVec2, b: DVec2, c: DVec2, d: DVec2) -> bool {
    const EPS: f64 = 1e-9;
    let d1 = (b - a).perp_dot(c - a);
    let d2 = (b - a).perp_dot(d - a);
    let d3 = (d - c).perp_dot(a - c);
    let d4 = (d - c).perp_dot(b - c);
    ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS)) && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
}

fn build(segments: &mut [(Vec2, Vec2)], start: usize, end: usize, nodes: &mut Vec<BvhNode>) -> usize {
    let bounds = segments[start..end]
        .iter()
        .fold(Aabb::EMPTY, |acc, &(a, b)| acc.union(Aabb::from_segment(a, b)));
    let index = nodes.len();
    if end - start <= LEAF_SIZE {
        nodes.push(BvhNode::Leaf { bounds, start, count: end - start });
        return index;
    }

    // Median split along the longer axis of the box.
    let extent = bounds.max - bounds.min;
    let axis_x = extent.x >= extent.y;
    segments[start..end].sort_by(|s, t| {
        let cs = (s.0 + s.1) * 0.5;
        let ct = (t.0 + t.1) * 0.5;
        if axis_x { cs.x.total_cmp(&ct.x) } else { cs.y.total_cmp(&ct.y) }
    });
    let mid = start + (end - start) / 2;

    nodes.push(BvhNode::Leaf { bounds, start, count: 0 });
    let left = build(segments, start, mid, nodes);
    let right = build(segments, mid, end, nodes);
    nodes[index] = BvhNode::Inner { bounds, left, right };
    index
}
