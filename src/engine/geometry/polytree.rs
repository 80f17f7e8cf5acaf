// Hierarchical contour tree (land → hole → land ...) stored as an arena.
//
// Node identity is the arena index. Anything that needs to hang metadata off a
// node (owning view, BVH, triangulation island) keeps a side table indexed by
// that id instead of writing into the tree.

use glam::{DVec2, IVec2};

use super::polygon::{signed_area, winding_number, Path};

/// Distance of a ring's interior sample from its longest edge.
const INTERIOR_SAMPLE_OFFSET: f64 = 1e-2;

#[derive(Debug, Clone)]
pub struct PolyNode {
    pub contour: Path,
    pub is_hole: bool,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub area: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PolyTree {
    nodes: Vec<PolyNode>,
    roots: Vec<usize>,
}

impl PolyTree {
    /// Nests rings that never cross (clipper output) by containment.
    /// Positive rings become land, negative rings holes.
    pub fn from_rings(rings: Vec<Path>) -> Self {
        let areas: Vec<f64> = rings.iter().map(|r| signed_area(r)).collect();
        let samples: Vec<DVec2> = rings
            .iter()
            .zip(&areas)
            .map(|(r, &a)| interior_sample(r, a > 0.0))
            .collect();

        let mut parents = vec![None; rings.len()];
        for i in 0..rings.len() {
            let mut best: Option<usize> = None;
            for j in 0..rings.len() {
                if i == j || areas[j].abs() <= areas[i].abs() {
                    continue;
                }
                if winding_number(&rings[j], samples[i]) == 0 {
                    continue;
                }
                if best.map_or(true, |b| areas[j].abs() < areas[b].abs()) {
                    best = Some(j);
                }
            }
            parents[i] = best;
        }

        let mut nodes: Vec<PolyNode> = rings
            .into_iter()
            .zip(areas)
            .zip(parents.iter())
            .map(|((contour, area), parent)| PolyNode {
                contour,
                is_hole: area < 0.0,
                parent: *parent,
                children: Vec::new(),
                area,
            })
            .collect();

        let mut roots = Vec::new();
        for i in 0..nodes.len() {
            match parents[i] {
                Some(p) => nodes[p].children.push(i),
                None => roots.push(i),
            }
        }

        let mut tree = Self { nodes, roots };
        // A hole with nothing around it is noise from degenerate input.
        let stray: Vec<usize> = tree.roots.iter().copied().filter(|&r| tree.nodes[r].is_hole).collect();
        if !stray.is_empty() {
            tree = tree.filtered(|node, _| !(node.is_hole && node.parent.is_none()));
        }
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node(&self, index: usize) -> &PolyNode {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[PolyNode] {
        &self.nodes
    }

    /// Land nodes at any depth (islands inside holes included), depth-first.
    pub fn land_nodes(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            if !self.nodes[i].is_hole {
                out.push(i);
            }
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        out
    }

    /// Contours bounding a land node's region: its own ring, then its holes.
    pub fn region_contours(&self, land: usize) -> Vec<&Path> {
        let node = &self.nodes[land];
        std::iter::once(&node.contour)
            .chain(node.children.iter().map(|&c| &self.nodes[c].contour))
            .collect()
    }

    /// Removes every node whose absolute area is below `threshold`, along with
    /// its subtree.
    pub fn prune_by_area(&self, threshold: f64) -> PolyTree {
        self.filtered(|node, _| node.area.abs() >= threshold)
    }

    /// Rebuilds the tree keeping only nodes that pass `keep` and whose
    /// ancestors all passed.
    fn filtered(&self, keep: impl Fn(&PolyNode, usize) -> bool) -> PolyTree {
        let mut out = PolyTree::default();
        let mut stack: Vec<(usize, Option<usize>)> = self.roots.iter().rev().map(|&r| (r, None)).collect();
        while let Some((old, new_parent)) = stack.pop() {
            let node = &self.nodes[old];
            if !keep(node, old) {
                continue;
            }
            let new_index = out.nodes.len();
            out.nodes.push(PolyNode {
                contour: node.contour.clone(),
                is_hole: node.is_hole,
                parent: new_parent,
                children: Vec::new(),
                area: node.area,
            });
            match new_parent {
                Some(p) => out.nodes[p].children.push(new_index),
                None => out.roots.push(new_index),
            }
            for &child in node.children.iter().rev() {
                stack.push((child, Some(new_index)));
            }
        }
        out
    }
}

/// A point just inside `ring`, next to the midpoint of its longest edge.
fn interior_sample(ring: &[IVec2], positive: bool) -> DVec2 {
    let n = ring.len();
    let mut best = (0usize, -1i64);
    for i in 0..n {
        let d = ring[(i + 1) % n] - ring[i];
        let len_sq = d.x as i64 * d.x as i64 + d.y as i64 * d.y as i64;
        if len_sq > best.1 {
            best = (i, len_sq);
        }
    }
    let a = ring[best.0].as_dvec2();
    let b = ring[(best.0 + 1) % n].as_dvec2();
    let dir = (b - a).normalize_or_zero();
    let left = DVec2::new(-dir.y, dir.x);
    let inward = if positive { left } else { -left };
    (a + b) * 0.5 + inward * INTERIOR_SAMPLE_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::geometry::polygon::{oriented, rectangle};

    fn land_with_lake_and_island() -> PolyTree {
        let land = rectangle(IVec2::new(0, 0), IVec2::new(100, 100));
        let lake = oriented(&rectangle(IVec2::new(20, 20), IVec2::new(80, 80)), false);
        let island = rectangle(IVec2::new(40, 40), IVec2::new(60, 60));
        PolyTree::from_rings(vec![island, lake, land])
    }

    #[test]
    fn nesting_alternates_land_and_holes() {
        let tree = land_with_lake_and_island();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.roots().len(), 1);
        let root = tree.node(tree.roots()[0]);
        assert!(!root.is_hole);
        assert_eq!(root.children.len(), 1);
        let lake = tree.node(root.children[0]);
        assert!(lake.is_hole);
        assert_eq!(lake.children.len(), 1);
        assert!(!tree.node(lake.children[0]).is_hole);
        assert_eq!(tree.land_nodes().len(), 2);
    }

    #[test]
    fn prune_drops_small_nodes_with_subtree() {
        let tree = land_with_lake_and_island();
        let pruned = tree.prune_by_area(500.0);
        // The 400-unit island goes, the lake and outer land stay.
        assert_eq!(pruned.len(), 2);
        let pruned = tree.prune_by_area(20_000.0);
        assert!(pruned.is_empty());
    }

    #[test]
    fn region_contours_list_holes_after_outer() {
        let tree = land_with_lake_and_island();
        let root = tree.roots()[0];
        let contours = tree.region_contours(root);
        assert_eq!(contours.len(), 2);
        assert!(signed_area(contours[0]) > 0.0);
        assert!(signed_area(contours[1]) < 0.0);
    }
}
