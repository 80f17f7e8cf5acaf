// TerrainService: the sector provider resource.
//
// Owns sectors, seams and the overlay network cache. Every geometry edit
// refreshes the touched sectors' view managers, drops all compiled networks
// and bumps the snapshot version so failed path requests get retried.

use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::{Affine2, Vec2};
use log::{debug, info};

use crate::engine::error::{NavError, NavResult};
use crate::engine::geometry::{DefaultKernel, GeometryKernel};

use super::overlay::{TerrainOverlayNetwork, TerrainOverlayNetworkManager};
use super::sector::{DynamicHole, EdgeDescription, HoleId, Sector, SectorId};

#[derive(Resource)]
pub struct TerrainService {
    kernel: Arc<dyn GeometryKernel>,
    sectors: Vec<Sector>,
    edges: Vec<EdgeDescription>,
    overlay: TerrainOverlayNetworkManager,
    snapshot_version: u64,
    allow_preview_views: bool,
}

impl Default for TerrainService {
    fn default() -> Self {
        Self::new(Arc::new(DefaultKernel))
    }
}

impl TerrainService {
    pub fn new(kernel: Arc<dyn GeometryKernel>) -> Self {
        Self {
            kernel,
            sectors: Vec::new(),
            edges: Vec::new(),
            overlay: TerrainOverlayNetworkManager::default(),
            snapshot_version: 0,
            allow_preview_views: false,
        }
    }

    pub fn kernel(&self) -> &Arc<dyn GeometryKernel> {
        &self.kernel
    }

    pub fn snapshot_version(&self) -> u64 {
        self.snapshot_version
    }

    pub fn set_allow_preview_views(&mut self, allow: bool) {
        self.allow_preview_views = allow;
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn sector(&self, id: SectorId) -> NavResult<&Sector> {
        self.sectors.get(id.0).ok_or(NavError::UnknownSector(id))
    }

    pub fn edges(&self) -> &[EdgeDescription] {
        &self.edges
    }

    pub fn overlay(&self) -> &TerrainOverlayNetworkManager {
        &self.overlay
    }

    pub fn add_sector(&mut self, sector: Sector) -> SectorId {
        let id = SectorId(self.sectors.len());
        self.sectors.push(sector);
        debug!("added sector {:?}", id);
        self.sector_changed(id);
        id
    }

    pub fn add_edge(&mut self, edge: EdgeDescription) -> NavResult<()> {
        self.sector(edge.source)?;
        self.sector(edge.destination)?;
        self.edges.push(edge);
        self.sector_changed(edge.source);
        self.sector_changed(edge.destination);
        Ok(())
    }

    /// Joins two sectors along a world-space segment; each sector's local
    /// segment is derived from its transform.
    pub fn connect_sectors(&mut self, source: SectorId, destination: SectorId, world: (Vec2, Vec2)) -> NavResult<()> {
        let (src, dst) = (self.sector(source)?, self.sector(destination)?);
        let edge = EdgeDescription {
            source,
            destination,
            source_segment: (src.world_to_local(world.0), src.world_to_local(world.1)),
            destination_segment: (dst.world_to_local(world.0), dst.world_to_local(world.1)),
        };
        self.add_edge(edge)
    }

    pub fn add_dynamic_hole(&mut self, sector: SectorId, hole: DynamicHole) -> NavResult<HoleId> {
        if hole.contour.len() < 3 {
            return Err(NavError::DegenerateHole(hole.contour.len()));
        }
        let id = self.sector_mut(sector)?.push_dynamic_hole(hole);
        info!("dynamic hole {:?} added to sector {:?}", id, sector);
        self.sector_changed(sector);
        Ok(id)
    }

    pub fn remove_dynamic_hole(&mut self, sector: SectorId, hole: HoleId) -> NavResult<DynamicHole> {
        let removed = self
            .sector_mut(sector)?
            .take_dynamic_hole(hole)
            .ok_or(NavError::UnknownHole { sector, hole })?;
        info!("dynamic hole {:?} removed from sector {:?}", hole, sector);
        self.sector_changed(sector);
        Ok(removed)
    }

    pub fn update_dynamic_hole_transform(&mut self, sector: SectorId, hole: HoleId, transform: Affine2) -> NavResult<()> {
        self.sector_mut(sector)?
            .dynamic_hole_mut(hole)
            .ok_or(NavError::UnknownHole { sector, hole })?
            .transform = transform;
        self.sector_changed(sector);
        Ok(())
    }

    /// Rebuilds every sector's inputs and drops all cached views and
    /// networks.
    pub fn invalidate_caches(&mut self) {
        for index in 0..self.sectors.len() {
            self.refresh_sector(SectorId(index));
        }
        self.overlay.invalidate_caches();
        self.snapshot_version += 1;
    }

    pub fn compile_terrain_overlay_network(&mut self, radius: f32) -> Arc<TerrainOverlayNetwork> {
        self.overlay.compile_terrain_overlay_network(
            &self.kernel,
            &mut self.sectors,
            &self.edges,
            radius,
            self.allow_preview_views,
        )
    }

    /// Punches land for every view created since the last invalidation.
    pub fn evaluate_pending_views(&self) -> usize {
        self.sectors.iter().map(|s| s.views.evaluate_pending()).sum()
    }

    fn sector_mut(&mut self, id: SectorId) -> NavResult<&mut Sector> {
        self.sectors.get_mut(id.0).ok_or(NavError::UnknownSector(id))
    }

    fn sector_changed(&mut self, id: SectorId) {
        self.refresh_sector(id);
        self.overlay.invalidate_caches();
        self.snapshot_version += 1;
    }

    fn refresh_sector(&mut self, id: SectorId) {
        let segments: Vec<(Vec2, Vec2)> = self
            .edges
            .iter()
            .flat_map(|e| {
                let mut own = Vec::with_capacity(2);
                if e.source == id {
                    own.push(e.source_segment);
                }
                if e.destination == id {
                    own.push(e.destination_segment);
                }
                own
            })
            .collect();
        if let Some(sector) = self.sectors.get_mut(id.0) {
            let geometry = sector.geometry(segments);
            sector.views.invalidate(geometry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;

    fn two_sectors() -> (TerrainService, SectorId, SectorId) {
        let mut terrain = TerrainService::default();
        let a = terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(200, 100)));
        let b = terrain.add_sector(Sector::rectangle(Vec2::new(200.0, 0.0), IVec2::new(200, 100)));
        terrain
            .connect_sectors(a, b, (Vec2::new(200.0, 0.0), Vec2::new(200.0, 100.0)))
            .unwrap();
        (terrain, a, b)
    }

    #[test]
    fn compile_is_cached_until_invalidated() {
        let (mut terrain, _, _) = two_sectors();
        let first = terrain.compile_terrain_overlay_network(5.0);
        let again = terrain.compile_terrain_overlay_network(5.0);
        assert!(Arc::ptr_eq(&first, &again));

        terrain.invalidate_caches();
        let fresh = terrain.compile_terrain_overlay_network(5.0);
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_ne!(first.id(), fresh.id());
    }

    #[test]
    fn seam_connects_both_sectors_symmetrically() {
        let (mut terrain, a, b) = two_sectors();
        let network = terrain.compile_terrain_overlay_network(5.0);
        assert_eq!(network.nodes().len(), 2);
        assert_eq!(network.edge_groups().len(), 2);

        let na = network.nodes_in_sector(a).next().unwrap();
        let nb = network.nodes_in_sector(b).next().unwrap();
        let forward = network.outbound_groups(na).next().unwrap();
        assert_eq!(forward.destination, nb);
        let backward = network.outbound_groups(nb).next().unwrap();
        assert_eq!(backward.destination, na);
        assert_eq!(forward.edges.len(), backward.edges.len());

        // Every sample is the same world point on both sides.
        for edge in &forward.edges {
            let wa = network.node(na).local_to_world.transform_point2(edge.source_point);
            let wb = network.node(nb).local_to_world.transform_point2(edge.destination_point);
            assert!(wa.distance(wb) < 1e-3);
            assert!((wa.x - 200.0).abs() < 1e-3);
        }
        // About 90 units of eroded seam sampled every 5 units.
        assert!(forward.edges.len() >= 17 && forward.edges.len() <= 19);
        assert_eq!(network.node(na).crossover_point_count(), forward.edges.len());
        assert_eq!(network.groups_touching(na).count(), 2);
        assert_eq!(network.inbound_groups(na).next().map(|g| g.source), Some(nb));
    }

    #[test]
    fn moving_a_hole_moves_the_gap() {
        let (mut terrain, a, _) = two_sectors();
        let hole = terrain
            .add_dynamic_hole(a, DynamicHole::rectangle(Vec2::new(60.0, 50.0), Vec2::splat(10.0)))
            .unwrap();
        let network = terrain.compile_terrain_overlay_network(5.0);
        assert!(network.find_node_containing_world_point(Vec2::new(60.0, 50.0), None).is_none());

        let version = terrain.snapshot_version();
        terrain
            .update_dynamic_hole_transform(a, hole, Affine2::from_translation(Vec2::new(140.0, 50.0)))
            .unwrap();
        assert!(terrain.snapshot_version() > version);
        let moved = terrain.compile_terrain_overlay_network(5.0);
        assert!(moved.find_node_containing_world_point(Vec2::new(60.0, 50.0), None).is_some());
        assert!(moved.find_node_containing_world_point(Vec2::new(140.0, 50.0), None).is_none());
        assert!(matches!(
            terrain.update_dynamic_hole_transform(a, HoleId(99), Affine2::IDENTITY),
            Err(NavError::UnknownHole { .. })
        ));
    }

    #[test]
    fn seam_point_transfers_into_the_neighbour() {
        let (mut terrain, a, b) = two_sectors();
        let network = terrain.compile_terrain_overlay_network(5.0);
        let na = network.nodes_in_sector(a).next().unwrap();
        let nb = network.nodes_in_sector(b).next().unwrap();

        // Sector A's land reaches past the seam by the overhang.
        assert!(network.node(na).contains_local(Vec2::new(201.0, 50.0)));
        let (node, local) = network.find_crossover_transfer(na, Vec2::new(201.5, 50.0)).unwrap();
        assert_eq!(node, nb);
        assert!((local - Vec2::new(1.5, 50.0)).length() < 1e-4);
    }

    #[test]
    fn hole_edits_bump_snapshot_and_drop_networks() {
        let (mut terrain, a, _) = two_sectors();
        let before = terrain.snapshot_version();
        let network = terrain.compile_terrain_overlay_network(5.0);
        assert_eq!(terrain.overlay().cached_network_count(), 1);

        let hole = terrain
            .add_dynamic_hole(a, DynamicHole::rectangle(Vec2::new(100.0, 50.0), Vec2::splat(10.0)))
            .unwrap();
        assert!(terrain.snapshot_version() > before);
        assert_eq!(terrain.overlay().cached_network_count(), 0);

        let with_hole = terrain.compile_terrain_overlay_network(5.0);
        assert!(!Arc::ptr_eq(&network, &with_hole));
        assert!(with_hole.find_node_containing_world_point(Vec2::new(100.0, 50.0), None).is_none());

        terrain.remove_dynamic_hole(a, hole).unwrap();
        assert!(matches!(
            terrain.remove_dynamic_hole(a, hole),
            Err(NavError::UnknownHole { .. })
        ));
        assert!(matches!(
            terrain.add_dynamic_hole(SectorId(9), DynamicHole::rectangle(Vec2::ZERO, Vec2::ONE)),
            Err(NavError::UnknownSector(_))
        ));
    }

    #[test]
    fn unchanged_seam_jobs_survive_unrelated_edits() {
        let mut terrain = TerrainService::default();
        let a = terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(100, 100)));
        let b = terrain.add_sector(Sector::rectangle(Vec2::new(100.0, 0.0), IVec2::new(100, 100)));
        let c = terrain.add_sector(Sector::rectangle(Vec2::new(0.0, 100.0), IVec2::new(100, 100)));
        terrain.connect_sectors(a, b, (Vec2::new(100.0, 0.0), Vec2::new(100.0, 100.0))).unwrap();
        terrain.connect_sectors(a, c, (Vec2::new(0.0, 100.0), Vec2::new(100.0, 100.0))).unwrap();
        terrain.compile_terrain_overlay_network(5.0);
        assert_eq!(terrain.overlay().cached_job_count(), 2);

        // Editing C leaves the A-B seam's views (and its cached jobs) alone.
        terrain
            .add_dynamic_hole(c, DynamicHole::rectangle(Vec2::new(50.0, 50.0), Vec2::splat(5.0)))
            .unwrap();
        let network = terrain.compile_terrain_overlay_network(5.0);
        assert_eq!(terrain.overlay().cached_job_count(), 2);
        assert_eq!(network.edge_groups().len(), 4);
    }
}
