//! The run loop.
//!
//! [`Runner::run`] resolves a seed, generates examples until enough valid
//! ones have passed, watches the health checks, and on failure replays the
//! failing choice sequence once with reporting enabled. The outcome records
//! everything needed to tell whether the run is reproducible.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{Status, StopTest, TestCase};
use crate::error::{EngineError, Result};
use crate::generator::DeterministicRng;
use crate::health::{HealthCheckState, HealthMonitor};
use crate::reporter::Reporter;
use crate::seed::{Seed, SeedArg, SeedSource};
use crate::settings::Settings;

/// Example counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Test calls made, not counting the final replay.
    pub calls: u32,
    /// Examples that ran to completion.
    pub valid: u32,
    /// Examples discarded by assume/reject/filter.
    pub invalid: u32,
    /// Examples that ran out of choices.
    pub overrun: u32,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Name the test was run under.
    pub test_name: String,
    /// The resolved seed.
    pub seed: Seed,
    /// Example counters.
    pub stats: RunStats,
    /// Final health-check state.
    pub health: HealthCheckState,
    /// Rendered failing example, e.g. `test(x=3)`.
    pub failing_example: Option<String>,
    /// Whether the re-run instruction was written.
    pub instruction_emitted: bool,
    /// How the run ended.
    pub result: Result<()>,
}

impl RunOutcome {
    /// Whether the run failed in any way.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.result.is_err()
    }

    /// Machine-readable summary.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            test: self.test_name.clone(),
            status: match &self.result {
                Ok(()) => "passed".to_string(),
                Err(e) => e.kind().to_string(),
            },
            seed: self.seed.clone(),
            stats: self.stats,
            failing_example: self.failing_example.clone(),
            instruction_emitted: self.instruction_emitted,
        }
    }

    /// Drop the bookkeeping and keep the result.
    pub fn into_result(self) -> Result<()> {
        self.result
    }
}

/// Serializable view of a [`RunOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Test name.
    pub test: String,
    /// `passed` or the error kind.
    pub status: String,
    /// The resolved seed.
    pub seed: Seed,
    /// Example counters.
    pub stats: RunStats,
    /// Rendered failing example.
    pub failing_example: Option<String>,
    /// Whether the re-run instruction was written.
    pub instruction_emitted: bool,
}

impl RunSummary {
    /// Serialize as a single JSON line.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Runs property tests under one set of settings.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    settings: Settings,
    forced_seed: Option<SeedArg>,
}

impl Runner {
    /// Create a runner.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            forced_seed: None,
        }
    }

    /// Seed forced for every test this runner runs (the `--hypothesis-seed`
    /// flag). A seed pinned in the settings or derandomization still wins.
    #[must_use]
    pub fn with_forced_seed(mut self, seed: Option<SeedArg>) -> Self {
        self.forced_seed = seed;
        self
    }

    /// The settings in use.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run `test` until it fails, a health check fails, or enough valid
    /// examples have passed. Invalid settings end the run before the first
    /// call.
    pub fn run<F, W>(&self, test_name: &str, reporter: &mut Reporter<W>, mut test: F) -> RunOutcome
    where
        F: FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest>,
        W: Write,
    {
        let seed = SeedSource::new(test_name)
            .with_derandomize(self.settings.derandomize)
            .with_forced_seed(self.forced_seed.clone())
            .resolve(self.settings.seed.as_ref());
        info!(test = test_name, seed = %seed, "starting run");

        if let Err(e) = self.settings.validate() {
            warn!(test = test_name, error = %e, "invalid settings");
            return RunOutcome {
                test_name: test_name.to_string(),
                seed,
                stats: RunStats::default(),
                health: HealthCheckState::Pending,
                failing_example: None,
                instruction_emitted: false,
                result: Err(e),
            };
        }

        let mut rng = DeterministicRng::from_seed(&seed);
        let mut health = HealthMonitor::new(self.settings.suppress_health_check.clone());
        let mut stats = RunStats::default();
        let mut failure: Option<(Vec<u64>, String)> = None;

        while stats.valid < self.settings.max_examples
            && stats.calls < self.settings.max_iterations
        {
            let mut tc = TestCase::from_rng(&mut rng, self.settings.max_choices);
            let status = execute(&mut test, &mut tc);
            let draw_time = tc.draw_time();
            stats.calls += 1;
            debug!(test = test_name, call = stats.calls, ?status, "example finished");

            match &status {
                Status::Valid => stats.valid += 1,
                Status::Invalid => stats.invalid += 1,
                Status::Overrun => stats.overrun += 1,
                Status::Interesting(message) => {
                    failure = Some((tc.into_choices(), message.clone()));
                    break;
                }
            }
            if let HealthCheckState::Failed(_) = health.record(&status, draw_time) {
                break;
            }
        }

        let mut failing_example = None;
        let result = if let Some((choices, message)) = failure {
            let (result, rendered) =
                self.replay_failure(test_name, &mut test, &choices, message, reporter);
            failing_example = rendered;
            result
        } else if let HealthCheckState::Failed(failure) = health.state() {
            Err(EngineError::FailedHealthCheck {
                check: failure.check,
                message: failure.message.clone(),
            })
        } else if stats.valid == 0 {
            Err(EngineError::Unsatisfiable {
                calls: stats.calls,
                invalid: stats.invalid,
                overrun: stats.overrun,
            })
        } else {
            Ok(())
        };

        let instruction_emitted = match &result {
            Err(e) if e.is_test_failure() => reporter.on_failure(&seed).unwrap_or_else(|e| {
                warn!(error = %e, "failed to write re-run instruction");
                false
            }),
            _ => false,
        };

        match &result {
            Ok(()) => info!(test = test_name, valid = stats.valid, "run passed"),
            Err(e) => warn!(test = test_name, kind = e.kind(), "run failed"),
        }

        RunOutcome {
            test_name: test_name.to_string(),
            seed,
            stats,
            health: health.state().clone(),
            failing_example,
            instruction_emitted,
            result,
        }
    }

    /// Replay the failing choices once with reporting on. A failure that
    /// does not come back is flaky.
    fn replay_failure<F, W>(
        &self,
        test_name: &str,
        test: &mut F,
        choices: &[u64],
        message: String,
        reporter: &mut Reporter<W>,
    ) -> (Result<()>, Option<String>)
    where
        F: FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest>,
        W: Write,
    {
        let mut tc = TestCase::from_choices(choices, self.settings.max_choices).with_reporting();
        match execute(test, &mut tc) {
            Status::Interesting(replayed) => {
                let example = tc.example().cloned().unwrap_or_default();
                if let Err(e) = reporter.falsifying_example(test_name, &example) {
                    warn!(error = %e, "failed to write falsifying example");
                }
                let rendered = example.render_call(test_name);
                debug!(example = %rendered, "failure reproduced");
                (
                    Err(EngineError::Falsified { message: replayed }),
                    Some(rendered),
                )
            }
            other => {
                warn!(test = test_name, ?other, "failure did not reproduce on replay");
                (Err(EngineError::Flaky { message }), None)
            }
        }
    }
}

/// Call the test body once, turning panics into failures.
fn execute<F>(test: &mut F, tc: &mut TestCase<'_>) -> Status
where
    F: FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| test(tc)));
    if tc.has_overrun() {
        return Status::Overrun;
    }
    if tc.is_rejected() {
        return Status::Invalid;
    }
    match outcome {
        Ok(Ok(())) => Status::Valid,
        Ok(Err(StopTest::Rejected)) => Status::Invalid,
        Ok(Err(StopTest::Overrun)) => Status::Overrun,
        Ok(Err(StopTest::Failed(message))) => Status::Interesting(message),
        Err(payload) => Status::Interesting(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "test panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthCheck;
    use crate::reporter::{parse_rerun_instruction, SEED_FLAG};
    use crate::strategy::{integers, vecs};
    use std::collections::BTreeSet;

    fn run_capture<F>(runner: &Runner, name: &str, test: F) -> (RunOutcome, String)
    where
        F: FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest>,
    {
        let mut reporter = Reporter::new(Vec::new());
        let outcome = runner.run(name, &mut reporter, test);
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        (outcome, text)
    }

    /// Fails on the first accepted value with magnitude above 10000, and on
    /// any later call that sees that value again.
    fn fails_once() -> impl FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest> {
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

    fn filtered(
        seen: &BTreeSet<i64>,
    ) -> impl FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest> {
        let seen = seen.clone();
        move |tc| {
            let i = tc.draw(&integers())?;
            tc.assume(!seen.contains(&i))
        }
    }

    fn seeded(seed: impl Into<SeedArg>) -> Runner {
        Runner::default().with_forced_seed(Some(seed.into()))
    }

    #[test]
    fn test_passing_run_reports_nothing() {
        let (outcome, text) = run_capture(&Runner::default(), "test_passes", |tc| {
            tc.draw(&integers())?;
            Ok(())
        });
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.stats.valid, 100);
        assert_eq!(outcome.health, HealthCheckState::Passed);
        assert!(!outcome.instruction_emitted);
        assert!(text.is_empty());
    }

    #[test]
    fn test_seeded_runs_repeat_exactly() {
        for seed in [SeedArg::Int(0), SeedArg::Int(42), SeedArg::Text("foo".into())] {
            let (a, text_a) = run_capture(&seeded(seed.clone()), "test_fails_once", fails_once());
            let (b, text_b) = run_capture(&seeded(seed.clone()), "test_fails_once", fails_once());

            assert!(matches!(a.result, Err(EngineError::Falsified { .. })));
            assert_eq!(a.failing_example, b.failing_example);
            assert_eq!(text_a, text_b);
            assert!(!text_a.contains(SEED_FLAG));
            assert_eq!(text_a.lines().filter(|l| l.contains("some_int=")).count(), 1);
            assert!(!a.instruction_emitted);
        }
    }

    #[test]
    fn test_unseeded_failure_emits_one_instruction() {
        let (outcome, text) = run_capture(&Runner::default(), "test_fails_once", fails_once());
        assert!(outcome.failed());
        assert!(outcome.instruction_emitted);
        assert_eq!(text.matches(SEED_FLAG).count(), 1);
        assert_eq!(parse_rerun_instruction(&text), Some(outcome.seed.canonical()));
    }

    #[test]
    fn test_reported_seed_reproduces_failure() {
        let (first, text) = run_capture(&Runner::default(), "test_fails_once", fails_once());
        let seed = parse_rerun_instruction(&text).unwrap();
        let (replayed, replay_text) = run_capture(&seeded(seed), "test_fails_once", fails_once());
        assert_eq!(first.failing_example, replayed.failing_example);
        assert!(!replay_text.contains(SEED_FLAG));
    }

    #[test]
    fn test_health_check_replays_with_reported_seed() {
        let mut seen: BTreeSet<i64> = BTreeSet::new();
        let (initial, text) = run_capture(&Runner::default(), "test_failure", |tc| {
            let i = tc.draw(&integers())?;
            seen.insert(i);
            tc.reject()
        });
        assert!(matches!(
            initial.result,
            Err(EngineError::FailedHealthCheck {
                check: HealthCheck::FilterTooMuch,
                ..
            })
        ));
        let seed = parse_rerun_instruction(&text).expect("instruction emitted");

        let (rerun, rerun_text) = run_capture(&seeded(seed), "test_failure", filtered(&seen));
        assert!(matches!(rerun.result, Err(EngineError::FailedHealthCheck { .. })));
        assert!(!rerun_text.contains(SEED_FLAG));

        let (other, _) = run_capture(&seeded(10u64), "test_failure", filtered(&seen));
        assert!(other.result.is_ok(), "unexpected {:?}", other.result);
    }

    #[test]
    fn test_flaky_failure_is_detected() {
        let mut calls = 0;
        let (outcome, text) = run_capture(&seeded(1u64), "test_flaky", |tc| {
            tc.draw(&integers())?;
            calls += 1;
            if calls == 1 {
                return Err(StopTest::fail("only the first time"));
            }
            Ok(())
        });
        assert!(matches!(outcome.result, Err(EngineError::Flaky { .. })));
        assert!(outcome.failing_example.is_none());
        assert!(!text.contains("Falsifying example"));
    }

    #[test]
    fn test_panics_are_failures() {
        let (outcome, text) = run_capture(&seeded(3u64), "test_panics", |tc| {
            let n = tc.draw_named("n", &integers())?;
            assert!(n == i64::MIN, "boom");
            Ok(())
        });
        match outcome.result {
            Err(EngineError::Falsified { message }) => assert!(message.contains("boom")),
            other => panic!("expected falsified, got {other:?}"),
        }
        assert!(text.starts_with("Falsifying example: test_panics(n="));
    }

    #[test]
    fn test_unsatisfiable_when_health_check_suppressed() {
        let runner = Runner::new(
            Settings::default()
                .with_max_examples(10)
                .suppress(HealthCheck::FilterTooMuch),
        );
        let (outcome, _) = run_capture(&runner, "test_never", |tc| tc.reject());
        assert!(matches!(outcome.result, Err(EngineError::Unsatisfiable { .. })));
        assert_eq!(outcome.stats.calls, runner.settings().max_iterations);
    }

    #[test]
    fn test_data_too_large() {
        let runner = Runner::new(Settings::default().with_max_choices(16));
        let strategy = vecs(integers(), 100, 200).unwrap();
        let (outcome, _) = run_capture(&runner, "test_big", |tc| {
            tc.draw(&strategy)?;
            Ok(())
        });
        assert!(matches!(
            outcome.result,
            Err(EngineError::FailedHealthCheck {
                check: HealthCheck::DataTooLarge,
                ..
            })
        ));
        assert_eq!(outcome.stats.overrun, crate::health::MAX_OVERRUN_EXAMPLES);
    }

    #[test]
    fn test_unbounded_vec_length_is_not_a_test_failure() {
        let strategy = vecs(crate::strategy::booleans(), 0, usize::MAX).unwrap();
        let (outcome, _) = run_capture(&seeded(0u64), "test_unbounded", |tc| {
            tc.draw(&strategy)?;
            Ok(())
        });
        assert!(
            !matches!(outcome.result, Err(EngineError::Falsified { .. })),
            "unexpected {:?}",
            outcome.result
        );
    }

    #[test]
    fn test_derandomized_runs_are_silent_and_repeatable() {
        let runner = Runner::new(Settings::default().with_derandomize(true));
        let (a, text_a) = run_capture(&runner, "test_fails_once", fails_once());
        let (b, text_b) = run_capture(&runner, "test_fails_once", fails_once());
        assert!(matches!(a.seed, Seed::Derived(_)));
        assert_eq!(a.seed, b.seed);
        assert_eq!(text_a, text_b);
        assert!(!text_a.contains(SEED_FLAG));
    }

    #[test]
    fn test_invalid_settings_end_run_before_any_call() {
        for settings in [
            Settings::default().with_max_examples(0),
            Settings::default().with_max_choices(0),
        ] {
            let mut calls = 0;
            let (outcome, text) = run_capture(&Runner::new(settings), "test_passes", |_| {
                calls += 1;
                Ok(())
            });
            assert!(matches!(outcome.result, Err(EngineError::InvalidArgument(_))));
            assert_eq!(outcome.stats.calls, 0);
            assert!(!outcome.instruction_emitted);
            assert!(text.is_empty());
            assert_eq!(calls, 0);
        }
    }

    #[test]
    fn test_pinned_seed_beats_forced_seed() {
        let runner = Runner::new(Settings::default().with_seed(5u64))
            .with_forced_seed(Some(SeedArg::Int(6)));
        let (outcome, _) = run_capture(&runner, "test_passes", |_| Ok(()));
        assert_eq!(outcome.seed, Seed::Explicit(5));
    }

    #[test]
    fn test_summary_serializes() {
        let (outcome, _) = run_capture(&seeded(0u64), "test_fails_once", fails_once());
        let summary = outcome.summary();
        assert_eq!(summary.status, "Falsified");
        let json = summary.to_json_line().unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
        assert!(!json.contains(SEED_FLAG));
    }
}
