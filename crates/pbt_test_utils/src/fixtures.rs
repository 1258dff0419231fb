//! Test fixtures and helpers.
//!
//! Runners, captured output, and the canonical failing property used
//! across the seeding tests.

use pbt_core::data::{StopTest, TestCase};
use pbt_core::engine::{RunOutcome, Runner};
use pbt_core::reporter::{Reporter, SEED_FLAG};
use pbt_core::seed::SeedArg;
use pbt_core::strategy::integers;
use tracing::debug;

/// A finished run plus everything its reporter wrote.
#[derive(Debug)]
pub struct CapturedRun {
    /// The run outcome.
    pub outcome: RunOutcome,
    /// Reporter output.
    pub output: String,
}

impl CapturedRun {
    /// Output lines containing `needle`.
    #[must_use]
    pub fn lines_containing(&self, needle: &str) -> Vec<&str> {
        self.output.lines().filter(|l| l.contains(needle)).collect()
    }

    /// Number of re-run instructions in the output.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.output.matches(SEED_FLAG).count()
    }
}

/// Run `test` and capture what the reporter wrote.
///
/// # Panics
///
/// Panics if the reporter wrote invalid UTF-8.
pub fn capture_run<F>(runner: &Runner, test_name: &str, test: F) -> CapturedRun
where
    F: FnMut(&mut TestCase<'_>) -> Result<(), StopTest>,
{
    let mut reporter = Reporter::new(Vec::new());
    let outcome = runner.run(test_name, &mut reporter, test);
    let output = String::from_utf8(reporter.into_inner()).expect("reporter output is UTF-8");
    debug!(test = test_name, bytes = output.len(), "captured run");
    CapturedRun { outcome, output }
}

/// Default runner with `seed` forced, as if passed on the command line.
#[must_use]
pub fn seeded_runner(seed: impl Into<SeedArg>) -> Runner {
    Runner::default().with_forced_seed(Some(seed.into()))
}

/// Fails on the first accepted integer with magnitude above 10000.
///
/// Each call returns fresh state, so two runs never share a first value.
pub fn fails_once() -> impl FnMut(&mut TestCase<'_>) -> Result<(), StopTest> {
    let mut first: Option<i64> = None;
    move |tc| {
        let some_int = tc.draw_named("some_int", &integers())?;
        tc.assume(some_int.unsigned_abs() > 10_000)?;
        let first = *first.get_or_insert(some_int);
        if some_int == first {
            return Err(StopTest::fail(format!("drew {first} again")));
        }
        Ok(())
    }
}
