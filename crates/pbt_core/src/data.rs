//! Per-example draw context.
//!
//! A [`TestCase`] hands raw 64-bit choices to strategies and records every
//! one of them. Feeding the recorded choices back through
//! [`TestCase::from_choices`] reproduces the example exactly, which is how
//! failures are replayed for reporting.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generator::DeterministicRng;
use crate::strategy::Strategy;

/// Signals that end a single example early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StopTest {
    /// `assume` failed or `reject` was called: discard the example.
    #[error("example rejected")]
    Rejected,
    /// The example needed more choices than allowed.
    #[error("example ran out of choices")]
    Overrun,
    /// The test body failed.
    #[error("{0}")]
    Failed(String),
}

impl StopTest {
    /// Build a failure signal with a message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// How one call of the test body ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Ran to completion.
    Valid,
    /// Rejected by `assume`, `reject`, or a filter.
    Invalid,
    /// Exhausted its choice budget.
    Overrun,
    /// Failed, with the failure message.
    Interesting(String),
}

/// Rendered values drawn during a reported example.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Draws made through [`TestCase::draw_named`], in order.
    pub named: Vec<(String, String)>,
    /// Draws made through [`TestCase::draw`], in order.
    pub unnamed: Vec<String>,
}

impl Example {
    /// Render as a call expression, e.g. `test_fails_once(some_int=-20391)`.
    #[must_use]
    pub fn render_call(&self, test_name: &str) -> String {
        let args: Vec<String> = self
            .named
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        format!("{test_name}({})", args.join(", "))
    }
}

enum ChoiceSource<'a> {
    Random(&'a mut DeterministicRng),
    Replay(&'a [u64]),
}

/// Draw context passed to the test body for one example.
pub struct TestCase<'a> {
    source: ChoiceSource<'a>,
    choices: Vec<u64>,
    max_choices: usize,
    rejected: bool,
    overran: bool,
    draw_time: Duration,
    example: Option<Example>,
}

impl fmt::Debug for TestCase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("choices", &self.choices.len())
            .field("max_choices", &self.max_choices)
            .field("rejected", &self.rejected)
            .field("overran", &self.overran)
            .finish_non_exhaustive()
    }
}

impl<'a> TestCase<'a> {
    /// Draw fresh choices from the generator.
    pub fn from_rng(rng: &'a mut DeterministicRng, max_choices: usize) -> Self {
        Self::with_source(ChoiceSource::Random(rng), max_choices)
    }

    /// Replay a recorded choice sequence. Running past its end overruns.
    #[must_use]
    pub fn from_choices(choices: &'a [u64], max_choices: usize) -> Self {
        Self::with_source(ChoiceSource::Replay(choices), max_choices)
    }

    fn with_source(source: ChoiceSource<'a>, max_choices: usize) -> Self {
        Self {
            source,
            choices: Vec::new(),
            max_choices,
            rejected: false,
            overran: false,
            draw_time: Duration::ZERO,
            example: None,
        }
    }

    /// Capture rendered draws so the example can be reported.
    #[must_use]
    pub fn with_reporting(mut self) -> Self {
        self.example = Some(Example::default());
        self
    }

    /// Take the next raw choice, keeping only its low `bits` bits.
    pub fn draw_bits(&mut self, bits: u32) -> Result<u64, StopTest> {
        if self.overran || self.choices.len() >= self.max_choices {
            self.overran = true;
            return Err(StopTest::Overrun);
        }
        let index = self.choices.len();
        let raw = match &mut self.source {
            ChoiceSource::Random(rng) => rng.next_choice(),
            ChoiceSource::Replay(recorded) => match recorded.get(index) {
                Some(value) => *value,
                None => {
                    self.overran = true;
                    return Err(StopTest::Overrun);
                }
            },
        };
        self.choices.push(raw);
        Ok(if bits >= 64 {
            raw
        } else {
            raw & ((1u64 << bits) - 1)
        })
    }

    /// Draw a value from a strategy.
    pub fn draw<S: Strategy>(&mut self, strategy: &S) -> Result<S::Value, StopTest> {
        let value = self.timed_draw(strategy)?;
        if let Some(example) = &mut self.example {
            example.unnamed.push(format!("{value:?}"));
        }
        Ok(value)
    }

    /// Draw a value and report it under `name` if this example fails.
    pub fn draw_named<S: Strategy>(
        &mut self,
        name: &str,
        strategy: &S,
    ) -> Result<S::Value, StopTest> {
        let value = self.timed_draw(strategy)?;
        if let Some(example) = &mut self.example {
            example.named.push((name.to_string(), format!("{value:?}")));
        }
        Ok(value)
    }

    fn timed_draw<S: Strategy>(&mut self, strategy: &S) -> Result<S::Value, StopTest> {
        let start = Instant::now();
        let value = strategy.draw_value(self);
        self.draw_time += start.elapsed();
        value
    }

    /// Discard this example unless `condition` holds.
    pub fn assume(&mut self, condition: bool) -> Result<(), StopTest> {
        if condition {
            Ok(())
        } else {
            self.reject()
        }
    }

    /// Discard this example.
    pub fn reject<T>(&mut self) -> Result<T, StopTest> {
        self.rejected = true;
        Err(StopTest::Rejected)
    }

    /// Whether the example was discarded.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Whether the example ran out of choices.
    #[must_use]
    pub const fn has_overrun(&self) -> bool {
        self.overran
    }

    /// Wall-clock time spent inside strategies.
    #[must_use]
    pub const fn draw_time(&self) -> Duration {
        self.draw_time
    }

    /// Raw choices consumed so far.
    #[must_use]
    pub fn choices(&self) -> &[u64] {
        &self.choices
    }

    /// Consume the test case, keeping its choice sequence.
    #[must_use]
    pub fn into_choices(self) -> Vec<u64> {
        self.choices
    }

    /// Rendered draws, present only when reporting was enabled.
    #[must_use]
    pub const fn example(&self) -> Option<&Example> {
        self.example.as_ref()
    }
}
