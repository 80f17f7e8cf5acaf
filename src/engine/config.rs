// Motion tunables.
//
// Defaults reproduce the stock behaviour; a JSON file may override any
// subset of fields (missing fields keep their default).

use std::path::Path;

use serde::Deserialize;

use super::error::{NavError, NavResult};

/// How positions and forces are rounded after each integration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericMode {
    #[default]
    Float,
    /// Snap to a 1/65536 grid so replays are bit-identical across platforms.
    Fixed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Seconds simulated per `MotionSystem::execute` call.
    pub tick_seconds: f32,
    pub seek_weight: f32,
    pub alignment_weight: f32,
    /// Peak separation weight at full overlap.
    pub separation_weight: f32,
    /// Peak cohesion weight.
    pub cohesion_weight: f32,
    /// Cohesion reaches out to `attraction_multiple * (r_a + r_b)`.
    pub attraction_multiple: f32,
    /// Ticks after a destination change before the spanning force reaches
    /// full strength.
    pub spanning_ramp_cap: u32,
    /// Offset used by the walker to step clear of a triangle edge.
    pub edge_buffer_radius: f32,
    /// Integration calls between recomputations of the force-magnitude
    /// average used to damp swarm step lengths.
    pub force_average_window: u32,
    /// Entries in each flocking weight lookup table.
    pub lut_resolution: usize,
    pub numeric_mode: NumericMode,
    /// Serve the stale view of a sector while its new view is unevaluated.
    pub allow_preview_views: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 0.125,
            seek_weight: 2000.0,
            alignment_weight: 1500.0,
            separation_weight: 10000.0,
            cohesion_weight: 300.0,
            attraction_multiple: 3.0,
            spanning_ramp_cap: 19,
            edge_buffer_radius: 0.05,
            force_average_window: 1000,
            lut_resolution: 256,
            numeric_mode: NumericMode::Float,
            allow_preview_views: false,
        }
    }
}

impl MotionConfig {
    pub fn from_json_str(json: &str) -> NavResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> NavResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| NavError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}
