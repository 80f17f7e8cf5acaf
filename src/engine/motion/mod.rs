// Agent motion: ECS components, path search, steering forces, the
// triangulation walker and the per-tick MotionSystem.

pub mod components;
pub mod flocking;
pub mod pathfinding;
pub mod roadmap;
pub mod spanning;
pub mod system;
pub mod walker;

pub use components::{
    BaseStatistics, ComputedStatistics, ForceAccumulators, Localization, MotionComponent, Pose, SteeringState, Swarm,
    SwarmMembership, SwarmPathCache,
};
pub use flocking::{AgentBuckets, FlockingLuts};
pub use pathfinding::PathfinderResultContext;
pub use roadmap::{MotionRoadmap, RoadmapAction};
pub use spanning::SpanningField;
pub use system::{fix_entity_in_hole, localize, MotionStats, MotionSystem};
pub use walker::{TriangulationWalker, WalkOutcome, WalkResult};
