//! Error types for the property-based test engine.

use thiserror::Error;

use crate::health::HealthCheck;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for everything a run can end with other than success.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A health check tripped before enough valid examples were found.
    #[error("FailedHealthCheck({check}): {message}")]
    FailedHealthCheck {
        /// Which check failed.
        check: HealthCheck,
        /// Human-readable diagnostic.
        message: String,
    },

    /// The test body failed on a generated example.
    #[error("Falsified: {message}")]
    Falsified {
        /// Failure message captured from the test body.
        message: String,
    },

    /// The failing example passed when replayed.
    #[error("Flaky: test failed once ({message}) but passed when the same example was replayed")]
    Flaky {
        /// Failure message from the original failing call.
        message: String,
    },

    /// Every generated example was rejected.
    #[error("Unsatisfiable: no valid examples after {calls} calls ({invalid} invalid, {overrun} overrun)")]
    Unsatisfiable {
        /// Number of test calls made.
        calls: u32,
        /// Examples rejected by assume/reject/filter.
        invalid: u32,
        /// Examples that ran out of choices.
        overrun: u32,
    },

    /// A strategy was built with arguments it cannot satisfy.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Settings file could not be parsed.
    #[error("Failed to parse settings: {0}")]
    Settings(#[from] ron::error::SpannedError),

    /// Settings file not found.
    #[error("Settings file not found: {0}")]
    SettingsNotFound(String),

    /// IO failure (settings read, report write).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether this error ends a run as a test failure, as opposed to a
    /// configuration or environment problem.
    #[must_use]
    pub const fn is_test_failure(&self) -> bool {
        matches!(
            self,
            Self::FailedHealthCheck { .. }
                | Self::Falsified { .. }
                | Self::Flaky { .. }
                | Self::Unsatisfiable { .. }
        )
    }

    /// Short name of the error kind, stable across releases.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FailedHealthCheck { .. } => "FailedHealthCheck",
            Self::Falsified { .. } => "Falsified",
            Self::Flaky { .. } => "Flaky",
            Self::Unsatisfiable { .. } => "Unsatisfiable",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Settings(_) | Self::SettingsNotFound(_) => "Settings",
            Self::Io(_) => "Io",
        }
    }
}
