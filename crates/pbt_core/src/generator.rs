//! Seed-keyed choice generator.
//!
//! All randomness in a run comes from one [`DeterministicRng`] built from the
//! run's canonical seed. Nothing else in the engine reads system entropy
//! except [`crate::seed::SeedSource`] when it has to pick a fresh seed.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::data::{StopTest, TestCase};
use crate::seed::Seed;
use crate::strategy::Strategy;

/// Default per-example choice budget used by [`generate`].
pub const DEFAULT_MAX_CHOICES: usize = 1024;

/// Deterministic choice stream keyed by a seed.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: StdRng,
}

impl DeterministicRng {
    /// Create from a canonical seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create from a resolved run seed.
    #[must_use]
    pub fn from_seed(seed: &Seed) -> Self {
        Self::new(seed.canonical())
    }

    /// Next raw choice.
    pub fn next_choice(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

/// Lazy, infinite sequence of candidates drawn from one strategy.
///
/// Each item is one example: `Ok` if it was accepted, `Err` if the strategy
/// rejected it (filtering) or overran.
#[derive(Debug)]
pub struct Candidates<'s, S> {
    rng: DeterministicRng,
    strategy: &'s S,
    max_choices: usize,
}

impl<'s, S: Strategy> Candidates<'s, S> {
    /// Per-example choice budget.
    #[must_use]
    pub fn with_max_choices(mut self, max_choices: usize) -> Self {
        self.max_choices = max_choices;
        self
    }

    /// Skip rejected candidates, yielding only accepted values.
    pub fn accepted(self) -> impl Iterator<Item = S::Value> + 's {
        self.filter_map(Result::ok)
    }
}

impl<S: Strategy> Iterator for Candidates<'_, S> {
    type Item = Result<S::Value, StopTest>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut tc = TestCase::from_rng(&mut self.rng, self.max_choices);
        let drawn = tc.draw(self.strategy);
        Some(match drawn {
            Ok(_) if tc.is_rejected() => Err(StopTest::Rejected),
            other => other,
        })
    }
}

/// Generate candidates for `strategy` keyed solely by `seed`.
///
/// The sequence is a pure function of the seed, the strategy, and the
/// engine version.
pub fn generate<'s, S: Strategy>(seed: &Seed, strategy: &'s S) -> Candidates<'s, S> {
    Candidates {
        rng: DeterministicRng::from_seed(seed),
        strategy,
        max_choices: DEFAULT_MAX_CHOICES,
    }
}
