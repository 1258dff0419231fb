//! Health checks run during the first examples of a run.
//!
//! The monitor starts [`HealthCheckState::Pending`] and settles exactly once:
//! to `Passed` when enough valid examples have been seen, or to `Failed` when
//! a threshold is crossed first. Apart from [`HealthCheck::TooSlow`], every
//! check depends only on example statuses, so replaying a seed replays the
//! verdict.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::Status;

/// Valid examples needed before the checks stop.
pub const VALID_EXAMPLES_TARGET: u32 = 10;
/// Invalid examples tolerated before [`HealthCheck::FilterTooMuch`].
pub const MAX_INVALID_EXAMPLES: u32 = 50;
/// Overruns tolerated before [`HealthCheck::DataTooLarge`].
pub const MAX_OVERRUN_EXAMPLES: u32 = 20;
/// Cumulative draw time tolerated before [`HealthCheck::TooSlow`].
pub const MAX_DRAW_TIME: Duration = Duration::from_secs(1);

/// Individual health checks. Each may be suppressed in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthCheck {
    /// Too many examples were filtered out by assume/reject/filter.
    FilterTooMuch,
    /// Generating data took too long.
    TooSlow,
    /// Examples kept exceeding the choice budget.
    DataTooLarge,
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FilterTooMuch => "FilterTooMuch",
            Self::TooSlow => "TooSlow",
            Self::DataTooLarge => "DataTooLarge",
        };
        f.write_str(name)
    }
}

/// Why a health check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckFailure {
    /// The check that tripped.
    pub check: HealthCheck,
    /// Diagnostic for the user.
    pub message: String,
}

/// Monitor state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HealthCheckState {
    /// Still watching.
    #[default]
    Pending,
    /// Enough valid examples; no further checks.
    Passed,
    /// A check tripped.
    Failed(HealthCheckFailure),
}

/// Counts example statuses until the health checks settle.
#[derive(Debug, Clone, Default)]
pub struct HealthMonitor {
    state: HealthCheckState,
    suppressed: Vec<HealthCheck>,
    valid: u32,
    invalid: u32,
    overrun: u32,
    draw_time: Duration,
}

impl HealthMonitor {
    /// Create a monitor that ignores the `suppressed` checks.
    #[must_use]
    pub fn new(suppressed: Vec<HealthCheck>) -> Self {
        Self {
            suppressed,
            ..Default::default()
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &HealthCheckState {
        &self.state
    }

    /// Record one finished example. Once settled, further records are
    /// ignored.
    pub fn record(&mut self, status: &Status, draw_time: Duration) -> &HealthCheckState {
        if self.state != HealthCheckState::Pending {
            return &self.state;
        }

        self.draw_time += draw_time;
        match status {
            Status::Valid => self.valid += 1,
            Status::Invalid => self.invalid += 1,
            Status::Overrun => self.overrun += 1,
            Status::Interesting(_) => {}
        }

        if self.valid >= VALID_EXAMPLES_TARGET {
            debug!(valid = self.valid, invalid = self.invalid, "health checks passed");
            self.state = HealthCheckState::Passed;
        } else if let Some(failure) = self.tripped() {
            warn!(check = %failure.check, "health check failed");
            self.state = HealthCheckState::Failed(failure);
        }
        &self.state
    }

    /// First crossed threshold whose check is not suppressed.
    fn tripped(&self) -> Option<HealthCheckFailure> {
        [
            HealthCheck::FilterTooMuch,
            HealthCheck::DataTooLarge,
            HealthCheck::TooSlow,
        ]
        .into_iter()
        .filter(|check| !self.suppressed.contains(check))
        .find_map(|check| self.check(check))
    }

    fn check(&self, check: HealthCheck) -> Option<HealthCheckFailure> {
        let message = match check {
            HealthCheck::FilterTooMuch if self.invalid >= MAX_INVALID_EXAMPLES => format!(
                "only {} valid examples were found before {} were filtered out; \
                 the assumptions or filters reject almost everything the strategies produce",
                self.valid, self.invalid
            ),
            HealthCheck::DataTooLarge if self.overrun >= MAX_OVERRUN_EXAMPLES => format!(
                "{} examples exceeded the choice budget while only {} were valid; \
                 reduce the size of the generated data",
                self.overrun, self.valid
            ),
            HealthCheck::TooSlow if self.draw_time > MAX_DRAW_TIME => format!(
                "generating {} examples took {:.2?} of draw time",
                self.valid + self.invalid + self.overrun,
                self.draw_time
            ),
            _ => return None,
        };
        Some(HealthCheckFailure { check, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(monitor: &mut HealthMonitor, status: &Status, n: u32) {
        for _ in 0..n {
            monitor.record(status, Duration::ZERO);
        }
    }

    #[test]
    fn test_starts_pending() {
        assert_eq!(*HealthMonitor::default().state(), HealthCheckState::Pending);
    }

    #[test]
    fn test_passes_after_enough_valid_examples() {
        let mut monitor = HealthMonitor::default();
        feed(&mut monitor, &Status::Invalid, 40);
        feed(&mut monitor, &Status::Valid, VALID_EXAMPLES_TARGET);
        assert_eq!(*monitor.state(), HealthCheckState::Passed);

        // Settled: later rejections cannot fail it.
        feed(&mut monitor, &Status::Invalid, 100);
        assert_eq!(*monitor.state(), HealthCheckState::Passed);
    }

    #[test]
    fn test_filter_too_much() {
        let mut monitor = HealthMonitor::default();
        feed(&mut monitor, &Status::Invalid, MAX_INVALID_EXAMPLES - 1);
        assert_eq!(*monitor.state(), HealthCheckState::Pending);
        feed(&mut monitor, &Status::Invalid, 1);
        match monitor.state() {
            HealthCheckState::Failed(failure) => {
                assert_eq!(failure.check, HealthCheck::FilterTooMuch);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_data_too_large() {
        let mut monitor = HealthMonitor::default();
        feed(&mut monitor, &Status::Overrun, MAX_OVERRUN_EXAMPLES);
        assert!(matches!(
            monitor.state(),
            HealthCheckState::Failed(HealthCheckFailure {
                check: HealthCheck::DataTooLarge,
                ..
            })
        ));
    }

    #[test]
    fn test_too_slow() {
        let mut monitor = HealthMonitor::default();
        monitor.record(&Status::Valid, MAX_DRAW_TIME + Duration::from_millis(1));
        assert!(matches!(
            monitor.state(),
            HealthCheckState::Failed(HealthCheckFailure {
                check: HealthCheck::TooSlow,
                ..
            })
        ));
    }

    #[test]
    fn test_suppressed_check_does_not_fail() {
        let mut monitor = HealthMonitor::new(vec![HealthCheck::FilterTooMuch]);
        feed(&mut monitor, &Status::Invalid, MAX_INVALID_EXAMPLES * 2);
        assert_eq!(*monitor.state(), HealthCheckState::Pending);
    }

    #[test]
    fn test_suppressed_check_does_not_mask_others() {
        let mut monitor = HealthMonitor::new(vec![HealthCheck::FilterTooMuch]);
        feed(&mut monitor, &Status::Invalid, MAX_INVALID_EXAMPLES);
        feed(&mut monitor, &Status::Overrun, MAX_OVERRUN_EXAMPLES);
        assert!(matches!(
            monitor.state(),
            HealthCheckState::Failed(HealthCheckFailure {
                check: HealthCheck::DataTooLarge,
                ..
            })
        ));

        let mut monitor = HealthMonitor::new(vec![HealthCheck::FilterTooMuch]);
        feed(&mut monitor, &Status::Invalid, MAX_INVALID_EXAMPLES);
        monitor.record(&Status::Invalid, MAX_DRAW_TIME + Duration::from_millis(1));
        assert!(matches!(
            monitor.state(),
            HealthCheckState::Failed(HealthCheckFailure {
                check: HealthCheck::TooSlow,
                ..
            })
        ));
    }

    #[test]
    fn test_same_statuses_same_verdict() {
        let statuses = [Status::Invalid, Status::Valid, Status::Invalid, Status::Overrun];
        let run = || {
            let mut monitor = HealthMonitor::default();
            for status in statuses.iter().cycle().take(200) {
                monitor.record(status, Duration::ZERO);
            }
            monitor.state().clone()
        };
        assert_eq!(run(), run());
    }
}
