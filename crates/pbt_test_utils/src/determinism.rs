//! Determinism testing utilities.
//!
//! Provides a harness for verifying that generation and whole runs produce
//! identical results given identical seeds.
//!
//! # Testing Strategy
//!
//! A failure is only reproducible if everything downstream of the seed is a
//! pure function of it. Sources of non-determinism include:
//!
//! - **System randomness**: only [`pbt_core::seed::SeedSource`] may read
//!   entropy, and only when no seed was supplied.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Test bodies that iterate hash maps while drawing will diverge.
//!
//! - **Wall-clock time**: the `TooSlow` health check is the one verdict that
//!   depends on timing and is excluded from replay guarantees.
//!
//! - **State leaking between runs**: test bodies must get fresh state per
//!   run; state captured across runs changes what a replay sees.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: a single strategy yields the same candidates per seed
//! 2. **Property tests**: arbitrary seeds still yield repeatable candidates
//! 3. **Run tests**: full runs produce byte-identical reports
//! 4. **Parallel tests**: generating on N threads at once all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use pbt_core::generator::generate;
use pbt_core::seed::Seed;
use pbt_core::strategy::Strategy;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of candidates compared per run.
    pub candidates: usize,
}

impl DeterminismResult {
    fn from_hashes(hashes: Vec<u64>, candidates: usize) -> Self {
        let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
        Self {
            is_deterministic,
            hashes,
            candidates,
        }
    }

    /// Get all unique hashes (should be 1 for deterministic generation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Generation is non-deterministic!\n\
                 Runs: {}\n\
                 Candidates: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.candidates,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Hash of the first `count` candidates (accepted or not) for `seed`.
pub fn candidate_hash<S>(seed: &Seed, strategy: &S, count: usize) -> u64
where
    S: Strategy,
    S::Value: Hash,
{
    let candidates: Vec<Option<S::Value>> = generate(seed, strategy)
        .take(count)
        .map(Result::ok)
        .collect();
    compute_hash(&candidates)
}

/// Generate from the same seed `runs` times and compare.
///
/// # Example
///
/// ```ignore
/// use pbt_core::prelude::*;
/// use pbt_test_utils::determinism::verify_generation_determinism;
///
/// let result = verify_generation_determinism(5, &Seed::Explicit(0), &integers(), 200);
/// result.assert_deterministic();
/// ```
pub fn verify_generation_determinism<S>(
    runs: usize,
    seed: &Seed,
    strategy: &S,
    count: usize,
) -> DeterminismResult
where
    S: Strategy,
    S::Value: Hash,
{
    let hashes = (0..runs)
        .map(|_| candidate_hash(seed, strategy, count))
        .collect();
    DeterminismResult::from_hashes(hashes, count)
}

/// Run a whole scenario `runs` times and compare its rendered output.
///
/// `run` must build all of its state afresh on every call.
pub fn verify_run_determinism<F>(runs: usize, run: F) -> DeterminismResult
where
    F: Fn() -> String,
{
    let hashes = (0..runs).map(|_| compute_hash(&run())).collect();
    DeterminismResult::from_hashes(hashes, 1)
}

/// Generate on `num_threads` threads at once and collect hashes.
///
/// Catches generators that share hidden state between instances.
pub fn run_parallel_generations_scoped<S>(
    seed: &Seed,
    strategy: &S,
    num_threads: usize,
    count: usize,
) -> DeterminismResult
where
    S: Strategy + Sync,
    S::Value: Hash,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_threads)
            .map(|_| s.spawn(|| candidate_hash(seed, strategy, count)))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });
    DeterminismResult::from_hashes(hashes, count)
}

/// Compare two generations candidate by candidate, finding the first
/// index where they differ.
///
/// # Returns
///
/// `None` if the first `count` candidates agree.
pub fn find_first_divergence<S>(a: &Seed, b: &Seed, strategy: &S, count: usize) -> Option<usize>
where
    S: Strategy,
    S::Value: PartialEq,
{
    generate(a, strategy)
        .zip(generate(b, strategy))
        .take(count)
        .position(|(x, y)| x != y)
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for seed testing.
pub mod strategies {
    use pbt_core::seed::SeedArg;
    use proptest::prelude::*;

    /// Integer seeds across the whole range.
    pub fn arb_int_seed() -> impl Strategy<Value = SeedArg> {
        any::<u64>().prop_map(SeedArg::Int)
    }

    /// Text seeds that do not parse as integers.
    pub fn arb_text_seed() -> impl Strategy<Value = SeedArg> {
        "[a-zA-Z_][a-zA-Z0-9_-]{0,15}".prop_map(SeedArg::Text)
    }

    /// Any seed a user could pass on the command line.
    pub fn arb_seed_arg() -> impl Strategy<Value = SeedArg> {
        prop_oneof![arb_int_seed(), arb_text_seed()]
    }
}
