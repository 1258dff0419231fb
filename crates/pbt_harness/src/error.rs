//! Error types for the harness.

use std::path::PathBuf;

use pbt_core::error::EngineError;
use thiserror::Error;

/// Result type alias using [`HarnessError`].
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that stop the harness before or after a run.
///
/// A failing property is not an error here; it is reported through the
/// run outcome.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No fixture is registered under this name.
    #[error("Unknown fixture '{0}' (see `pbt_harness list`)")]
    UnknownFixture(String),

    /// The fixture keeps state in a record file and none was given.
    #[error("Fixture '{0}' needs --record <path>")]
    MissingRecordPath(String),

    /// The fixture keeps state between runs, so repeated runs cannot match.
    #[error("Fixture '{0}' keeps state between runs and cannot be verified")]
    NotVerifiable(String),

    /// A record file line is not an integer.
    #[error("Invalid record file {path}: line {line}: {content:?}")]
    InvalidRecord {
        /// Record file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Offending text.
        content: String,
    },

    /// Engine configuration problem.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
