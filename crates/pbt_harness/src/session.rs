//! Running fixtures and rendering their results.
//!
//! Output goes to the given writer in a pytest-like shape: the reporter's
//! lines (falsifying example, re-run instruction) followed by one status
//! line, and optionally a JSON summary line.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

use pbt_core::engine::{RunOutcome, Runner};
use pbt_core::error::EngineError;
use pbt_core::reporter::Reporter;
use pbt_core::seed::SeedArg;
use pbt_core::settings::Settings;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::{HarnessError, Result};
use crate::fixtures::Fixture;

/// One fixture run, as requested on the command line.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Fixture to run.
    pub fixture: Fixture,
    /// Seed from `--hypothesis-seed`.
    pub seed: Option<SeedArg>,
    /// Record file for stateful fixtures.
    pub record: Option<PathBuf>,
    /// Run settings.
    pub settings: Settings,
    /// Append a JSON summary line.
    pub json: bool,
}

impl RunRequest {
    /// Run `fixture` with default settings and no seed.
    #[must_use]
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            seed: None,
            record: None,
            settings: Settings::default(),
            json: false,
        }
    }

    /// Force a seed.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<SeedArg>) -> Self {
        self.seed = seed;
        self
    }

    /// Use a record file.
    #[must_use]
    pub fn with_record(mut self, record: Option<PathBuf>) -> Self {
        self.record = record;
        self
    }

    /// Replace the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Toggle the JSON summary line.
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Run one fixture, writing its report to `out`.
///
/// A failing property is returned in the outcome, not as an error.
pub fn run_fixture<W: Write>(request: &RunRequest, out: &mut W) -> Result<RunOutcome> {
    let (body, record_writer) = request
        .fixture
        .property(request.record.as_deref())?
        .into_parts();
    let runner = Runner::new(request.settings.clone()).with_forced_seed(request.seed.clone());
    let test_name = request.fixture.test_name();

    let outcome = {
        let mut reporter = Reporter::new(&mut *out);
        runner.run(test_name, &mut reporter, body)
    };
    record_writer.finish()?;

    match &outcome.result {
        Ok(()) => writeln!(out, "{test_name} PASSED")?,
        Err(e) => writeln!(out, "FAILED {test_name} - {e}")?,
    }
    if request.json {
        writeln!(out, "{}", outcome.summary().to_json_line()?)?;
    }
    out.flush()?;
    Ok(outcome)
}

/// Result of running one fixture several times with one seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Runs performed.
    pub runs: usize,
    /// Number of distinct outputs seen.
    pub distinct_outputs: usize,
    /// Output of the first run.
    pub reference: String,
}

impl VerifyReport {
    /// Whether every run wrote the same output.
    #[must_use]
    pub const fn is_deterministic(&self) -> bool {
        self.distinct_outputs == 1
    }
}

/// Run `fixture` `runs` times in parallel with `seed` and compare outputs.
pub fn verify_fixture(
    fixture: Fixture,
    seed: &SeedArg,
    runs: usize,
    settings: &Settings,
) -> Result<VerifyReport> {
    if fixture.needs_record() {
        return Err(HarnessError::NotVerifiable(fixture.name().to_string()));
    }
    if runs == 0 {
        return Err(EngineError::InvalidArgument("runs must be at least 1".to_string()).into());
    }
    info!(fixture = %fixture, seed = %seed, runs, "verifying determinism");

    let request = RunRequest::new(fixture)
        .with_seed(Some(seed.clone()))
        .with_settings(settings.clone());

    let outputs: Vec<String> = (0..runs)
        .into_par_iter()
        .map(|_| {
            let mut buf = Vec::new();
            run_fixture(&request, &mut buf)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        })
        .collect::<Result<_>>()?;

    let distinct_outputs = outputs.iter().collect::<BTreeSet<_>>().len();
    if distinct_outputs > 1 {
        warn!(fixture = %fixture, distinct_outputs, "runs diverged");
    }
    Ok(VerifyReport {
        runs,
        distinct_outputs,
        reference: outputs.into_iter().next().unwrap_or_default(),
    })
}
