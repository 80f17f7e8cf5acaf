// Sectors: locally-framed terrain tiles with static land/hole contours,
// dynamic holes, and the crossover seams that join neighbouring sectors.

use glam::{Affine2, Vec2};

use crate::engine::geometry::polygon::{oriented, path_from_points, Path};
use crate::engine::geometry::GeometryKernel;

use super::local_geometry::{LocalGeometryView, LocalGeometryViewManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HoleId(pub u32);

/// Authored terrain of one sector, in sector-local coordinates.
#[derive(Debug, Clone, Default)]
pub struct TerrainStaticMetadata {
    /// Walkable land outlines.
    pub included_contours: Vec<Path>,
    /// Static obstacles cut out of the land.
    pub excluded_contours: Vec<Path>,
}

/// A hole placed at runtime (building, crater, ...). The contour is in the
/// hole's own frame; `transform` places it in the sector.
#[derive(Debug, Clone)]
pub struct DynamicHole {
    pub contour: Vec<Vec2>,
    pub transform: Affine2,
}

impl DynamicHole {
    pub fn new(contour: Vec<Vec2>, transform: Affine2) -> Self {
        Self { contour, transform }
    }

    /// Axis-aligned box centred on `center` (sector-local).
    pub fn rectangle(center: Vec2, half_extents: Vec2) -> Self {
        let h = half_extents;
        Self::new(
            vec![Vec2::new(-h.x, -h.y), Vec2::new(h.x, -h.y), Vec2::new(h.x, h.y), Vec2::new(-h.x, h.y)],
            Affine2::from_translation(center),
        )
    }

    /// The hole outline in sector-local integer coordinates, positively wound.
    pub fn local_contour(&self) -> Path {
        let placed: Vec<Vec2> = self.contour.iter().map(|&p| self.transform.transform_point2(p)).collect();
        oriented(&path_from_points(&placed), true)
    }

    /// True if the sector-local point lies inside the placed hole.
    pub fn contains_point(&self, local: Vec2) -> bool {
        let p = self.transform.inverse().transform_point2(local);
        let n = self.contour.len();
        let mut inside = false;
        for i in 0..n {
            let a = self.contour[i];
            let b = self.contour[(i + 1) % n];
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// Everything a `LocalGeometryView` reads, frozen at the time the sector
/// last changed.
#[derive(Debug, Clone, Default)]
pub struct SectorGeometry {
    /// Land rings, positively wound.
    pub included: Vec<Path>,
    /// Static and dynamic hole rings, positively wound.
    pub excluded: Vec<Path>,
    /// Crossover seams touching this sector, sector-local.
    pub crossover_segments: Vec<(Vec2, Vec2)>,
}

pub struct Sector {
    world_transform: Affine2,
    world_to_local: Affine2,
    pub static_terrain: TerrainStaticMetadata,
    dynamic_holes: Vec<(HoleId, DynamicHole)>,
    next_hole_id: u32,
    pub(crate) views: LocalGeometryViewManager,
}

impl Sector {
    pub fn new(world_transform: Affine2, static_terrain: TerrainStaticMetadata) -> Self {
        Self {
            world_transform,
            world_to_local: world_transform.inverse(),
            static_terrain,
            dynamic_holes: Vec::new(),
            next_hole_id: 0,
            views: LocalGeometryViewManager::default(),
        }
    }

    /// Sector whose land is one rectangle, placed at `origin` in the world.
    pub fn rectangle(origin: Vec2, size: glam::IVec2) -> Self {
        let land = crate::engine::geometry::polygon::rectangle(glam::IVec2::ZERO, size);
        Self::new(
            Affine2::from_translation(origin),
            TerrainStaticMetadata { included_contours: vec![land], excluded_contours: Vec::new() },
        )
    }

    pub fn world_transform(&self) -> Affine2 {
        self.world_transform
    }

    pub fn world_to_local_transform(&self) -> Affine2 {
        self.world_to_local
    }

    #[inline]
    pub fn local_to_world(&self, local: Vec2) -> Vec2 {
        self.world_transform.transform_point2(local)
    }

    #[inline]
    pub fn world_to_local(&self, world: Vec2) -> Vec2 {
        self.world_to_local.transform_point2(world)
    }

    pub fn dynamic_holes(&self) -> impl Iterator<Item = (HoleId, &DynamicHole)> {
        self.dynamic_holes.iter().map(|(id, h)| (*id, h))
    }

    pub fn dynamic_hole(&self, id: HoleId) -> Option<&DynamicHole> {
        self.dynamic_holes.iter().find(|(h, _)| *h == id).map(|(_, h)| h)
    }

    pub(crate) fn push_dynamic_hole(&mut self, hole: DynamicHole) -> HoleId {
        let id = HoleId(self.next_hole_id);
        self.next_hole_id += 1;
        self.dynamic_holes.push((id, hole));
        id
    }

    pub(crate) fn take_dynamic_hole(&mut self, id: HoleId) -> Option<DynamicHole> {
        let index = self.dynamic_holes.iter().position(|(h, _)| *h == id)?;
        Some(self.dynamic_holes.remove(index).1)
    }

    pub(crate) fn dynamic_hole_mut(&mut self, id: HoleId) -> Option<&mut DynamicHole> {
        self.dynamic_holes.iter_mut().find(|(h, _)| *h == id).map(|(_, h)| h)
    }

    /// Snapshot of the inputs for view construction.
    pub(crate) fn geometry(&self, crossover_segments: Vec<(Vec2, Vec2)>) -> SectorGeometry {
        SectorGeometry {
            included: self.static_terrain.included_contours.iter().map(|c| oriented(c, true)).collect(),
            excluded: self
                .static_terrain
                .excluded_contours
                .iter()
                .map(|c| oriented(c, true))
                .chain(self.dynamic_holes.iter().map(|(_, h)| h.local_contour()))
                .filter(|c| c.len() >= 3)
                .collect(),
            crossover_segments,
        }
    }

    pub fn views(&self) -> &LocalGeometryViewManager {
        &self.views
    }
}

// ============================================================================
// CROSSOVER EDGES
// ============================================================================

/// Spacing of the containment samples used to split a seam into jobs.
const JOB_SAMPLE_SPACING: f32 = 1.0;

/// A seam between two sectors. Both segments describe the same world-space
/// segment: `source_segment.0` and `destination_segment.0` coincide, as do
/// the `.1` ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeDescription {
    pub source: SectorId,
    pub destination: SectorId,
    pub source_segment: (Vec2, Vec2),
    pub destination_segment: (Vec2, Vec2),
}

/// A stretch of a seam along which one source land node meets one
/// destination land node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossoverJob {
    pub source_land_node: usize,
    pub destination_land_node: usize,
    pub source_segment: (Vec2, Vec2),
    pub destination_segment: (Vec2, Vec2),
}

impl EdgeDescription {
    /// Splits the radius-eroded seam into runs that stay within a single
    /// (source node, destination node) pair. Empty when the seam is too short
    /// for the radius or either side is not land.
    pub fn emit_crossover_jobs(
        &self,
        kernel: &dyn GeometryKernel,
        radius: f32,
        source_view: &LocalGeometryView,
        destination_view: &LocalGeometryView,
    ) -> Vec<CrossoverJob> {
        let (s0, s1) = self.source_segment;
        let (d0, d1) = self.destination_segment;
        let (Some((sa, sb)), Some((da, db))) =
            (kernel.erode_segment(s0, s1, radius), kernel.erode_segment(d0, d1, radius))
        else {
            return Vec::new();
        };

        let source_land = source_view.punched_land();
        let destination_land = destination_view.punched_land();
        let samples = ((sa.distance(sb) / JOB_SAMPLE_SPACING).ceil() as usize).max(1) + 1;

        let mut jobs: Vec<CrossoverJob> = Vec::new();
        let mut open: Option<CrossoverJob> = None;
        for k in 0..samples {
            let t = k as f32 / (samples - 1) as f32;
            let ps = sa.lerp(sb, t);
            let pd = da.lerp(db, t);
            let pair = source_land
                .land_node_containing(ps)
                .zip(destination_land.land_node_containing(pd))
                .map(|(s, d)| (s.poly_node, d.poly_node));

            let extends = matches!(
                (&open, pair),
                (Some(job), Some((s, d))) if job.source_land_node == s && job.destination_land_node == d
            );
            if extends {
                if let Some(job) = open.as_mut() {
                    job.source_segment.1 = ps;
                    job.destination_segment.1 = pd;
                }
            } else {
                jobs.extend(open.take());
                open = pair.map(|(s, d)| CrossoverJob {
                    source_land_node: s,
                    destination_land_node: d,
                    source_segment: (ps, ps),
                    destination_segment: (pd, pd),
                });
            }
        }
        jobs.extend(open);
        jobs
    }
}
