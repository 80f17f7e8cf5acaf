// Terrain: sectors, per-radius navigable geometry and the cross-sector
// overlay network built on top of it.

pub mod local_geometry;
pub mod overlay;
pub mod sector;
pub mod service;
pub mod waypoints;

pub use local_geometry::{LandNodeData, LocalGeometryView, LocalGeometryViewManager, PunchedLand, ViewId, CROSSOVER_OVERHANG};
pub use overlay::{
    DebugBoundary, NetworkId, TerrainOverlayNetwork, TerrainOverlayNetworkEdge, TerrainOverlayNetworkEdgeGroup,
    TerrainOverlayNetworkManager, TerrainOverlayNetworkNode,
};
pub use sector::{CrossoverJob, DynamicHole, EdgeDescription, HoleId, Sector, SectorGeometry, SectorId, TerrainStaticMetadata};
pub use service::TerrainService;
pub use waypoints::NodeRoadmap;
