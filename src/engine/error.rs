// Errors for setup-time operations (terrain editing, config loading).
// The per-tick motion pipeline never returns these; it logs and recovers.

use std::path::PathBuf;

use thiserror::Error;

use super::terrain::{HoleId, SectorId};

#[derive(Debug, Error)]
pub enum NavError {
    #[error("unknown sector {0:?}")]
    UnknownSector(SectorId),

    #[error("unknown dynamic hole {hole:?} in sector {sector:?}")]
    UnknownHole { sector: SectorId, hole: HoleId },

    #[error("dynamic hole contour needs at least 3 points, got {0}")]
    DegenerateHole(usize),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid motion config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type NavResult<T> = Result<T, NavError>;
