// Per-(sector, agent radius) navigable geometry.
//
// A view freezes the sector's inputs when it is created and computes every
// stage lazily, exactly once:
//   dilated holes ─┐
//   eroded land ───┼─> punched land (pruned contour tree + BVHs) ─> triangulation
//   crossover quads┘
// Invalidation never touches an existing view; the manager drops it and the
// next request builds a fresh one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{DVec2, Vec2};
use log::debug;
use once_cell::sync::OnceCell;

use crate::engine::geometry::polygon::{oriented, path_from_points, winding_number, Path};
use crate::engine::geometry::{EdgeBvh, GeometryKernel, PolyTree, Triangulation};

use super::sector::SectorGeometry;

/// How far crossover quads reach past the seam, out of the sector.
pub const CROSSOVER_OVERHANG: f32 = 2.0;

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// Components smaller than this are erosion/dilation noise.
pub fn prune_threshold(radius: f32) -> f64 {
    let side = 2.0 * radius as f64 + 2.0;
    side * side
}

/// Side-table entry for one land node of the punched tree.
#[derive(Debug)]
pub struct LandNodeData {
    /// Arena index in `PunchedLand::tree`.
    pub poly_node: usize,
    /// View that produced this node.
    pub view: ViewId,
    /// Edges of the node's ring and its direct hole rings.
    pub region_bvh: EdgeBvh,
    pub area: f64,
}

#[derive(Debug)]
pub struct PunchedLand {
    pub tree: PolyTree,
    pub land_nodes: Vec<LandNodeData>,
}

impl PunchedLand {
    pub fn is_empty(&self) -> bool {
        self.land_nodes.is_empty()
    }

    pub fn land_node(&self, poly_node: usize) -> Option<&LandNodeData> {
        self.land_nodes.iter().find(|n| n.poly_node == poly_node)
    }

    pub fn land_node_containing(&self, local: Vec2) -> Option<&LandNodeData> {
        self.land_nodes.iter().find(|n| n.region_bvh.contains_point(local))
    }
}

pub struct LocalGeometryView {
    id: ViewId,
    radius: f32,
    kernel: Arc<dyn GeometryKernel>,
    geometry: Arc<SectorGeometry>,
    dilated_holes_union: OnceCell<Vec<Path>>,
    eroded_outer_contour: OnceCell<Vec<Path>>,
    crossover_land_polys: OnceCell<Vec<Path>>,
    punched_land: OnceCell<PunchedLand>,
    triangulation: OnceCell<Triangulation>,
}

impl std::fmt::Debug for LocalGeometryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGeometryView")
            .field("id", &self.id)
            .field("radius", &self.radius)
            .field("punched", &self.is_punched_land_evaluated())
            .finish()
    }
}

impl LocalGeometryView {
    pub fn new(kernel: Arc<dyn GeometryKernel>, geometry: Arc<SectorGeometry>, radius: f32) -> Self {
        Self {
            id: ViewId(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed)),
            radius,
            kernel,
            geometry,
            dilated_holes_union: OnceCell::new(),
            eroded_outer_contour: OnceCell::new(),
            crossover_land_polys: OnceCell::new(),
            punched_land: OnceCell::new(),
            triangulation: OnceCell::new(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn geometry(&self) -> &SectorGeometry {
        &self.geometry
    }

    pub fn is_punched_land_evaluated(&self) -> bool {
        self.punched_land.get().is_some()
    }

    /// Every hole grown by the radius, merged.
    pub fn dilated_holes_union(&self) -> &[Path] {
        self.dilated_holes_union
            .get_or_init(|| self.kernel.offset(&self.geometry.excluded, self.radius))
    }

    /// Land shrunk by the radius.
    pub fn eroded_outer_contour(&self) -> &[Path] {
        self.eroded_outer_contour
            .get_or_init(|| self.kernel.offset(&self.geometry.included, -self.radius))
    }

    /// One quad per seam that survives erosion: the eroded seam extruded
    /// `radius + 1` into the land (overlapping the eroded contour) and
    /// `CROSSOVER_OVERHANG` out of the sector.
    pub fn crossover_land_polys(&self) -> &[Path] {
        self.crossover_land_polys.get_or_init(|| {
            self.geometry
                .crossover_segments
                .iter()
                .filter_map(|&(a, b)| {
                    let (ea, eb) = self.kernel.erode_segment(a, b, self.radius)?;
                    let inward = self.inward_normal(a, b);
                    let deep = inward * (self.radius + 1.0);
                    let out = inward * -CROSSOVER_OVERHANG;
                    let quad = path_from_points(&[ea + deep, eb + deep, eb + out, ea + out]);
                    Some(oriented(&quad, true))
                })
                .collect()
        })
    }

    pub fn punched_land(&self) -> &PunchedLand {
        self.punched_land.get_or_init(|| {
            let mut land: Vec<Path> = self.eroded_outer_contour().to_vec();
            land.extend_from_slice(self.crossover_land_polys());
            let tree = self
                .kernel
                .punch(&land, self.dilated_holes_union())
                .prune_by_area(prune_threshold(self.radius));

            let land_nodes: Vec<LandNodeData> = tree
                .land_nodes()
                .into_iter()
                .map(|poly_node| LandNodeData {
                    poly_node,
                    view: self.id,
                    region_bvh: EdgeBvh::from_contours(tree.region_contours(poly_node)),
                    area: tree.node(poly_node).area,
                })
                .collect();
            debug!(
                "view {:?}: punched land at radius {} -> {} nodes, {} land regions",
                self.id,
                self.radius,
                tree.len(),
                land_nodes.len()
            );
            PunchedLand { tree, land_nodes }
        })
    }

    pub fn triangulation(&self) -> &Triangulation {
        self.triangulation
            .get_or_init(|| self.kernel.triangulate(&self.punched_land().tree))
    }

    /// Unit normal of the seam pointing into the sector's land.
    fn inward_normal(&self, a: Vec2, b: Vec2) -> Vec2 {
        let dir = (b - a).normalize_or_zero();
        let left = dir.perp();
        let sample = ((a + b) * 0.5 + left * 0.5).as_dvec2();
        if self.land_winding(sample) > 0 { left } else { -left }
    }

    fn land_winding(&self, p: DVec2) -> i32 {
        self.geometry.included.iter().map(|c| winding_number(c, p)).sum()
    }
}

// ============================================================================
// VIEW MANAGER
// ============================================================================

/// Owns one sector's views, keyed by the exact bit pattern of the radius.
#[derive(Default)]
pub struct LocalGeometryViewManager {
    geometry: Arc<SectorGeometry>,
    views: HashMap<u32, Arc<LocalGeometryView>>,
    /// Views from before the last invalidation, kept as stand-ins until the
    /// replacement has been evaluated.
    preview_views: HashMap<u32, Arc<LocalGeometryView>>,
}

impl LocalGeometryViewManager {
    pub fn geometry(&self) -> &Arc<SectorGeometry> {
        &self.geometry
    }

    pub fn get_eroded_view(&mut self, kernel: &Arc<dyn GeometryKernel>, radius: f32) -> Arc<LocalGeometryView> {
        let geometry = &self.geometry;
        self.views
            .entry(radius.to_bits())
            .or_insert_with(|| Arc::new(LocalGeometryView::new(kernel.clone(), geometry.clone(), radius)))
            .clone()
    }

    /// The current view, or the pre-invalidation one when `allow_preview` is
    /// set and the current view has not punched its land yet. The flag in
    /// the result is true when the preview was returned.
    pub fn get_view_or_preview(
        &mut self,
        kernel: &Arc<dyn GeometryKernel>,
        radius: f32,
        allow_preview: bool,
    ) -> (Arc<LocalGeometryView>, bool) {
        let view = self.get_eroded_view(kernel, radius);
        if allow_preview && !view.is_punched_land_evaluated() {
            if let Some(preview) = self.preview_views.get(&radius.to_bits()) {
                return (preview.clone(), true);
            }
        }
        (view, false)
    }

    /// True once the current view for `radius` exists and has punched its
    /// land.
    pub fn has_evaluated_view(&self, radius: f32) -> bool {
        self.views
            .get(&radius.to_bits())
            .is_some_and(|v| v.is_punched_land_evaluated())
    }

    /// Evaluates the punched land of every current view.
    pub fn evaluate_pending(&self) -> usize {
        let pending: Vec<&Arc<LocalGeometryView>> =
            self.views.values().filter(|v| !v.is_punched_land_evaluated()).collect();
        for view in &pending {
            view.punched_land();
        }
        pending.len()
    }

    /// Installs new inputs and drops every current view.
    pub fn invalidate(&mut self, geometry: SectorGeometry) {
        self.geometry = Arc::new(geometry);
        let evaluated: Vec<(u32, Arc<LocalGeometryView>)> = self
            .views
            .drain()
            .filter(|(_, v)| v.is_punched_land_evaluated())
            .collect();
        if !evaluated.is_empty() {
            self.preview_views = evaluated.into_iter().collect();
        }
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }
}
