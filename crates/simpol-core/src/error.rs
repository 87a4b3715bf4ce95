//! Error types for configuration parsing and report output.

use thiserror::Error;

use crate::algebra::Stokes;

/// Result alias used throughout `simpol-core`.
pub type Result<T> = std::result::Result<T, SimpolError>;

/// Fatal errors. None of these are recoverable inside a run.
#[derive(Debug, Error)]
pub enum SimpolError {
    /// The population Stokes string is not four comma-separated numbers.
    #[error("Error parsing {0} as 4-vector")]
    StokesParse(String),

    /// The polarized intensity exceeds the total intensity.
    #[error("Invalid Stokes parameters (p>I) {}", crate::report::format_vector(.stokes))]
    Unrealizable { stokes: Stokes },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
