// Engine module - navmesh compilation and agent motion
// Leaves first: geometry -> terrain -> motion. config and error are shared.

pub mod config;
pub mod error;
pub mod geometry;
pub mod motion;
pub mod terrain;

// Re-export commonly used items
pub use config::{MotionConfig, NumericMode};
pub use error::{NavError, NavResult};
