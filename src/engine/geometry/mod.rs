// Integer polygon geometry: contour trees, edge BVHs and triangulation
// islands over a clipper2/earcutr kernel. Everything above this module goes
// through `GeometryKernel`.

pub mod bvh;
pub mod kernel;
pub mod polygon;
pub mod polytree;
pub mod triangulation;

pub use bvh::{Aabb, EdgeBvh};
pub use kernel::{DefaultKernel, GeometryKernel};
pub use polygon::Path;
pub use polytree::{PolyNode, PolyTree};
pub use triangulation::{DebugTriangle, Triangle, Triangulation, TriangulationIsland, NO_NEIGHBOR_INDEX};
