// Terrain overlay network: one graph per agent radius whose nodes are land
// regions of every sector and whose edges are sampled crossover points on
// the seams between sectors.
//
// Networks are cached by exact radius and dropped wholesale on any terrain
// change. Crossover jobs are cached separately, keyed by the seam and the
// two views they were computed from, so seams between untouched sectors
// are not resampled after an unrelated change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Affine2, Vec2};
use indexmap::IndexSet;
use log::{debug, info};
use once_cell::sync::OnceCell;

use crate::engine::geometry::{GeometryKernel, TriangulationIsland};

use super::local_geometry::{LandNodeData, LocalGeometryView, ViewId};
use super::sector::{CrossoverJob, EdgeDescription, Sector, SectorId};
use super::waypoints::NodeRoadmap;

static NEXT_NETWORK_ID: AtomicU64 = AtomicU64::new(1);

/// Minimum spacing of crossover samples along a seam.
const MIN_CROSSOVER_SPACING: f32 = 5.0;
/// Sample spacing grows with the agent radius.
const CROSSOVER_SPACING_PER_RADIUS: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NetworkId(pub u64);

/// Exact-bits key for deduplicating crossover points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointKey(u32, u32);

impl PointKey {
    pub fn new(p: Vec2) -> Self {
        Self(p.x.to_bits(), p.y.to_bits())
    }

    pub fn point(self) -> Vec2 {
        Vec2::new(f32::from_bits(self.0), f32::from_bits(self.1))
    }
}

pub struct TerrainOverlayNetworkNode {
    pub sector: SectorId,
    pub view: Arc<LocalGeometryView>,
    /// Arena index of the land node in the view's punched tree.
    pub land_node: usize,
    pub local_to_world: Affine2,
    pub world_to_local: Affine2,
    crossover_points: IndexSet<PointKey>,
    roadmap: OnceCell<NodeRoadmap>,
}

impl std::fmt::Debug for TerrainOverlayNetworkNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerrainOverlayNetworkNode")
            .field("sector", &self.sector)
            .field("view", &self.view.id())
            .field("land_node", &self.land_node)
            .field("crossover_points", &self.crossover_points.len())
            .finish()
    }
}

impl TerrainOverlayNetworkNode {
    pub fn region(&self) -> Option<&LandNodeData> {
        self.view.punched_land().land_node(self.land_node)
    }

    pub fn island(&self) -> Option<&TriangulationIsland> {
        self.view.triangulation().island_for_land_node(self.land_node)
    }

    pub fn contains_local(&self, local: Vec2) -> bool {
        self.region().is_some_and(|r| r.region_bvh.contains_point(local))
    }

    pub fn crossover_point_count(&self) -> usize {
        self.crossover_points.len()
    }

    pub fn crossover_point(&self, index: usize) -> Option<Vec2> {
        self.crossover_points.get_index(index).map(|k| k.point())
    }

    pub fn roadmap(&self) -> &NodeRoadmap {
        self.roadmap.get_or_init(|| {
            let Some(region) = self.region() else {
                return NodeRoadmap::default();
            };
            let tree = &self.view.punched_land().tree;
            let contours = tree.region_contours(self.land_node);
            let points: Vec<Vec2> = self.crossover_points.iter().map(|k| k.point()).collect();
            NodeRoadmap::build(&contours, &region.region_bvh, &points)
        })
    }

    /// Line of sight between two local points of this node.
    pub fn is_visible(&self, a: Vec2, b: Vec2) -> bool {
        self.region().is_some_and(|r| super::waypoints::is_visible(&r.region_bvh, a, b))
    }

    fn add_crossover_point(&mut self, p: Vec2) -> usize {
        self.crossover_points.insert_full(PointKey::new(p)).0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainOverlayNetworkEdge {
    pub source_point_index: usize,
    pub destination_point_index: usize,
    pub source_point: Vec2,
    pub destination_point: Vec2,
    pub cost: f32,
}

/// All crossover edges from one node to another for one seam job.
#[derive(Debug, Clone)]
pub struct TerrainOverlayNetworkEdgeGroup {
    pub source: usize,
    pub destination: usize,
    pub source_segment: (Vec2, Vec2),
    pub destination_segment: (Vec2, Vec2),
    pub edges: Vec<TerrainOverlayNetworkEdge>,
}

/// Node boundary in world space, for debug drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugBoundary {
    pub node: usize,
    pub sector: SectorId,
    pub contours: Vec<Vec<Vec2>>,
}

#[derive(Debug)]
pub struct TerrainOverlayNetwork {
    id: NetworkId,
    radius: f32,
    nodes: Vec<TerrainOverlayNetworkNode>,
    edge_groups: Vec<TerrainOverlayNetworkEdgeGroup>,
    outbound: Vec<Vec<usize>>,
    inbound: Vec<Vec<usize>>,
    /// Sectors that contributed a pre-invalidation view instead of their
    /// current one.
    preview_sectors: Vec<SectorId>,
}

impl TerrainOverlayNetwork {
    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Built from at least one pre-invalidation view.
    pub fn is_preview(&self) -> bool {
        !self.preview_sectors.is_empty()
    }

    pub fn preview_sectors(&self) -> &[SectorId] {
        &self.preview_sectors
    }

    pub fn nodes(&self) -> &[TerrainOverlayNetworkNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &TerrainOverlayNetworkNode {
        &self.nodes[index]
    }

    pub fn edge_groups(&self) -> &[TerrainOverlayNetworkEdgeGroup] {
        &self.edge_groups
    }

    pub fn outbound_groups(&self, node: usize) -> impl Iterator<Item = &TerrainOverlayNetworkEdgeGroup> {
        self.outbound[node].iter().map(|&g| &self.edge_groups[g])
    }

    pub fn inbound_groups(&self, node: usize) -> impl Iterator<Item = &TerrainOverlayNetworkEdgeGroup> {
        self.inbound[node].iter().map(|&g| &self.edge_groups[g])
    }

    /// Groups touching `node` in either direction.
    pub fn groups_touching(&self, node: usize) -> impl Iterator<Item = &TerrainOverlayNetworkEdgeGroup> {
        self.outbound_groups(node).chain(self.inbound_groups(node))
    }

    pub fn nodes_in_sector(&self, sector: SectorId) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().enumerate().filter(move |(_, n)| n.sector == sector).map(|(i, _)| i)
    }

    /// Node whose land contains `world`, trying `hint` first. Returns the node
    /// index and the point in that node's local frame.
    pub fn find_node_containing_world_point(&self, world: Vec2, hint: Option<usize>) -> Option<(usize, Vec2)> {
        let test = |i: usize| {
            let node = &self.nodes[i];
            let local = node.world_to_local.transform_point2(world);
            node.contains_local(local).then_some((i, local))
        };
        if let Some(found) = hint.filter(|&h| h < self.nodes.len()).and_then(test) {
            return Some(found);
        }
        (0..self.nodes.len()).find_map(test)
    }

    /// Closest point on any node boundary to `world`: (node, local point,
    /// world distance).
    pub fn find_nearest_land_point(&self, world: Vec2) -> Option<(usize, Vec2, f32)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| {
                let region = node.region()?;
                let local = node.world_to_local.transform_point2(world);
                let (q, _, _) = region.region_bvh.nearest_point(local)?;
                let dist = node.local_to_world.transform_point2(q).distance(world);
                Some((i, q, dist))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
    }

    /// When a local point of `node` also lies on land of a node connected to
    /// it through a crossover edge group, returns that node and the point in
    /// its frame.
    pub fn find_crossover_transfer(&self, node: usize, local: Vec2) -> Option<(usize, Vec2)> {
        let source = &self.nodes[node];
        let world = source.local_to_world.transform_point2(local);
        self.outbound_groups(node).find_map(|group| {
            let destination = &self.nodes[group.destination];
            let dest_local = destination.world_to_local.transform_point2(world);
            let on_mesh = destination.contains_local(dest_local)
                && destination
                    .island()
                    .is_some_and(|island| island.find_containing_triangle(dest_local, 1e-3, None).is_some());
            on_mesh.then_some((group.destination, dest_local))
        })
    }

    pub fn debug_boundaries(&self) -> Vec<DebugBoundary> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let tree = &node.view.punched_land().tree;
                let contours = tree
                    .region_contours(node.land_node)
                    .into_iter()
                    .map(|c| c.iter().map(|p| node.local_to_world.transform_point2(p.as_vec2())).collect())
                    .collect();
                DebugBoundary { node: i, sector: node.sector, contours }
            })
            .collect()
    }
}

// ============================================================================
// NETWORK MANAGER
// ============================================================================

type JobKey = (usize, ViewId, ViewId);

#[derive(Default)]
pub struct TerrainOverlayNetworkManager {
    networks: HashMap<u32, Arc<TerrainOverlayNetwork>>,
    crossover_jobs: HashMap<JobKey, Arc<Vec<CrossoverJob>>>,
}

impl TerrainOverlayNetworkManager {
    pub fn invalidate_caches(&mut self) {
        if !self.networks.is_empty() {
            debug!("dropping {} cached overlay networks", self.networks.len());
        }
        self.networks.clear();
    }

    pub fn cached_network_count(&self) -> usize {
        self.networks.len()
    }

    pub fn cached_job_count(&self) -> usize {
        self.crossover_jobs.len()
    }

    pub fn compile_terrain_overlay_network(
        &mut self,
        kernel: &Arc<dyn GeometryKernel>,
        sectors: &mut [Sector],
        edges: &[EdgeDescription],
        radius: f32,
        allow_preview: bool,
    ) -> Arc<TerrainOverlayNetwork> {
        let key = radius.to_bits();
        if let Some(network) = self.networks.get(&key) {
            // A preview stays cached until one of the sectors it stood in for
            // has evaluated its replacement, or previews are turned off.
            let replaced = network
                .preview_sectors
                .iter()
                .any(|id| sectors.get(id.0).is_some_and(|s| s.views.has_evaluated_view(radius)));
            if !replaced && (allow_preview || !network.is_preview()) {
                return network.clone();
            }
        }

        let network = Arc::new(self.build(kernel, sectors, edges, radius, allow_preview));
        info!(
            "compiled overlay network {:?} for radius {}: {} nodes, {} edge groups{}",
            network.id,
            radius,
            network.nodes.len(),
            network.edge_groups.len(),
            if network.is_preview() { " (preview)" } else { "" }
        );
        self.networks.insert(key, network.clone());
        network
    }

    fn build(
        &mut self,
        kernel: &Arc<dyn GeometryKernel>,
        sectors: &mut [Sector],
        edges: &[EdgeDescription],
        radius: f32,
        allow_preview: bool,
    ) -> TerrainOverlayNetwork {
        let mut preview_sectors = Vec::new();
        let mut views: Vec<Arc<LocalGeometryView>> = Vec::with_capacity(sectors.len());
        for (s, sector) in sectors.iter_mut().enumerate() {
            let (view, preview) = sector.views.get_view_or_preview(kernel, radius, allow_preview);
            if preview {
                preview_sectors.push(SectorId(s));
            }
            views.push(view);
        }

        let mut nodes = Vec::new();
        let mut node_index: HashMap<(usize, usize), usize> = HashMap::new();
        for (s, (sector, view)) in sectors.iter().zip(&views).enumerate() {
            for land in &view.punched_land().land_nodes {
                node_index.insert((s, land.poly_node), nodes.len());
                nodes.push(TerrainOverlayNetworkNode {
                    sector: SectorId(s),
                    view: view.clone(),
                    land_node: land.poly_node,
                    local_to_world: sector.world_transform(),
                    world_to_local: sector.world_to_local_transform(),
                    crossover_points: IndexSet::new(),
                    roadmap: OnceCell::new(),
                });
            }
        }

        let spacing = MIN_CROSSOVER_SPACING.max(radius * CROSSOVER_SPACING_PER_RADIUS);
        let mut edge_groups = Vec::new();
        let mut live_jobs = Vec::new();
        for (edge_index, edge) in edges.iter().enumerate() {
            let (Some(src_view), Some(dst_view)) = (views.get(edge.source.0), views.get(edge.destination.0)) else {
                debug!("edge {edge_index} references a sector without a view, skipping");
                continue;
            };
            let key = (edge_index, src_view.id(), dst_view.id());
            live_jobs.push(key);
            let jobs = self
                .crossover_jobs
                .entry(key)
                .or_insert_with(|| Arc::new(edge.emit_crossover_jobs(kernel.as_ref(), radius, src_view, dst_view)))
                .clone();

            for job in jobs.iter() {
                let (Some(&src), Some(&dst)) = (
                    node_index.get(&(edge.source.0, job.source_land_node)),
                    node_index.get(&(edge.destination.0, job.destination_land_node)),
                ) else {
                    continue;
                };
                connect(&mut nodes, &mut edge_groups, src, dst, job, spacing);
            }
        }
        self.crossover_jobs.retain(|k, _| live_jobs.contains(k));

        let mut outbound = vec![Vec::new(); nodes.len()];
        let mut inbound = vec![Vec::new(); nodes.len()];
        for (g, group) in edge_groups.iter().enumerate() {
            outbound[group.source].push(g);
            inbound[group.destination].push(g);
        }

        TerrainOverlayNetwork {
            id: NetworkId(NEXT_NETWORK_ID.fetch_add(1, Ordering::Relaxed)),
            radius,
            nodes,
            edge_groups,
            outbound,
            inbound,
            preview_sectors,
        }
    }
}

/// Samples one job's seam and registers matching edge groups in both
/// directions.
fn connect(
    nodes: &mut [TerrainOverlayNetworkNode],
    groups: &mut Vec<TerrainOverlayNetworkEdgeGroup>,
    src: usize,
    dst: usize,
    job: &CrossoverJob,
    spacing: f32,
) {
    let (sa, sb) = job.source_segment;
    let (da, db) = job.destination_segment;
    let samples = (sa.distance(sb) / spacing).floor() as usize + 1;

    let mut forward = Vec::with_capacity(samples);
    let mut backward = Vec::with_capacity(samples);
    for k in 0..samples {
        let t = if samples == 1 { 0.5 } else { k as f32 / (samples - 1) as f32 };
        let ps = sa.lerp(sb, t);
        let pd = da.lerp(db, t);
        if !nodes[src].contains_local(ps) || !nodes[dst].contains_local(pd) {
            continue;
        }
        let si = nodes[src].add_crossover_point(ps);
        let di = nodes[dst].add_crossover_point(pd);
        let cost = nodes[src]
            .local_to_world
            .transform_point2(ps)
            .distance(nodes[dst].local_to_world.transform_point2(pd));
        forward.push(TerrainOverlayNetworkEdge {
            source_point_index: si,
            destination_point_index: di,
            source_point: ps,
            destination_point: pd,
            cost,
        });
        backward.push(TerrainOverlayNetworkEdge {
            source_point_index: di,
            destination_point_index: si,
            source_point: pd,
            destination_point: ps,
            cost,
        });
    }
    if forward.is_empty() {
        return;
    }
    groups.push(TerrainOverlayNetworkEdgeGroup {
        source: src,
        destination: dst,
        source_segment: job.source_segment,
        destination_segment: job.destination_segment,
        edges: forward,
    });
    groups.push(TerrainOverlayNetworkEdgeGroup {
        source: dst,
        destination: src,
        source_segment: job.destination_segment,
        destination_segment: job.source_segment,
        edges: backward,
    });
}
