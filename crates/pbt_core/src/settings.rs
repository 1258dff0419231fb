//! Run settings.
//!
//! Settings are plain data with serde support so they can be kept in RON
//! files next to the tests that use them:
//!
//! ```ron
//! (
//!     max_examples: 200,
//!     derandomize: false,
//!     seed: Some("nightly"),
//!     suppress_health_check: [TooSlow],
//! )
//! ```
//!
//! Missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::generator::DEFAULT_MAX_CHOICES;
use crate::health::HealthCheck;
use crate::seed::SeedArg;

/// Configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Valid examples to run before declaring success.
    pub max_examples: u32,
    /// Hard cap on test calls, valid or not.
    pub max_iterations: u32,
    /// Raw choices one example may consume before it overruns.
    pub max_choices: usize,
    /// Derive the seed from the test name instead of choosing one.
    pub derandomize: bool,
    /// Seed pinned to this test. Beats every other seed source.
    pub seed: Option<SeedArg>,
    /// Health checks to skip.
    pub suppress_health_check: Vec<HealthCheck>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_examples: 100,
            max_iterations: 1000,
            max_choices: DEFAULT_MAX_CHOICES,
            derandomize: false,
            seed: None,
            suppress_health_check: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EngineError::SettingsNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse settings from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let settings: Self = ron::from_str(ron)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that could never produce a run.
    pub fn validate(&self) -> Result<()> {
        if self.max_examples == 0 {
            return Err(EngineError::InvalidArgument(
                "max_examples must be at least 1".to_string(),
            ));
        }
        if self.max_iterations < self.max_examples {
            return Err(EngineError::InvalidArgument(format!(
                "max_iterations ({}) must be at least max_examples ({})",
                self.max_iterations, self.max_examples
            )));
        }
        if self.max_choices == 0 {
            return Err(EngineError::InvalidArgument(
                "max_choices must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the number of valid examples to run.
    #[must_use]
    pub fn with_max_examples(mut self, max_examples: u32) -> Self {
        self.max_examples = max_examples;
        self.max_iterations = self.max_iterations.max(max_examples);
        self
    }

    /// Set the per-example choice budget.
    #[must_use]
    pub const fn with_max_choices(mut self, max_choices: usize) -> Self {
        self.max_choices = max_choices;
        self
    }

    /// Pin a seed to the test.
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<SeedArg>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    /// Derive the seed from the test name.
    #[must_use]
    pub const fn with_derandomize(mut self, derandomize: bool) -> Self {
        self.derandomize = derandomize;
        self
    }

    /// Skip a health check.
    #[must_use]
    pub fn suppress(mut self, check: HealthCheck) -> Self {
        if !self.suppress_health_check.contains(&check) {
            self.suppress_health_check.push(check);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_examples, 100);
        assert_eq!(settings.max_iterations, 1000);
        assert!(!settings.derandomize);
        assert!(settings.seed.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_fills_defaults() {
        let settings = Settings::from_ron_str("(max_examples: 25)").unwrap();
        assert_eq!(settings.max_examples, 25);
        assert_eq!(settings.max_choices, DEFAULT_MAX_CHOICES);
    }

    #[test]
    fn test_ron_seed_and_suppression() {
        let settings = Settings::from_ron_str(
            r#"(seed: Some("nightly"), suppress_health_check: [TooSlow, FilterTooMuch])"#,
        )
        .unwrap();
        assert_eq!(settings.seed, Some(SeedArg::Text("nightly".to_string())));
        assert_eq!(
            settings.suppress_health_check,
            vec![HealthCheck::TooSlow, HealthCheck::FilterTooMuch]
        );

        let numeric = Settings::from_ron_str("(seed: Some(42))").unwrap();
        assert_eq!(numeric.seed, Some(SeedArg::Int(42)));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(Settings::from_ron_str("(max_examples: 0)").is_err());
        assert!(Settings::from_ron_str("(max_examples: 10, max_iterations: 5)").is_err());
        assert!(matches!(
            Settings::from_ron_str("(max_examples: ["),
            Err(EngineError::Settings(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(derandomize: true)").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert!(settings.derandomize);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Settings::load("/definitely/not/here.ron"),
            Err(EngineError::SettingsNotFound(_))
        ));
    }

    #[test]
    fn test_builders() {
        let settings = Settings::default()
            .with_max_examples(5000)
            .with_seed(7u64)
            .suppress(HealthCheck::TooSlow)
            .suppress(HealthCheck::TooSlow);
        assert_eq!(settings.max_iterations, 5000);
        assert_eq!(settings.seed, Some(SeedArg::Int(7)));
        assert_eq!(settings.suppress_health_check.len(), 1);
    }
}
