// overlay_nav: per-radius navigation meshes over multi-sector 2D terrain,
// the cross-sector overlay network, and the MotionSystem that moves agents
// across them.

pub mod engine;

pub use engine::config::{MotionConfig, NumericMode};
pub use engine::error::{NavError, NavResult};
pub use engine::motion::{MotionComponent, MotionSystem, Swarm, SwarmMembership};
pub use engine::terrain::{DynamicHole, Sector, SectorId, TerrainService, TerrainStaticMetadata};
