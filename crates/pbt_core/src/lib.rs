//! # PBT Core
//!
//! Deterministic seeding core for a property-based test engine.
//!
//! Every run is keyed by one seed. Given the same seed and the same test
//! body, the engine generates the same examples in the same order in every
//! process, so any failure can be replayed from its seed alone:
//!
//! - explicit seeds (`--hypothesis-seed=<int|text>`) are used as-is or hashed
//! - unseeded runs pick a random seed and report it once on failure
//! - health checks are driven by example statuses, so they replay too
//!
//! ## Crate Structure
//!
//! - [`seed`] - Seed resolution and string-seed hashing
//! - [`generator`] - Seed-keyed choice stream and candidate sequences
//! - [`strategy`] - Value generators built on raw choices
//! - [`data`] - Per-example draw context with replayable choices
//! - [`health`] - Health-check monitor
//! - [`reporter`] - Falsifying-example and re-run instruction output
//! - [`settings`] - Run configuration (RON)
//! - [`engine`] - The run loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod data;
pub mod engine;
pub mod error;
pub mod generator;
pub mod health;
pub mod reporter;
pub mod seed;
pub mod settings;
pub mod strategy;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::data::{Example, Status, StopTest, TestCase};
    pub use crate::engine::{RunOutcome, RunStats, RunSummary, Runner};
    pub use crate::error::{EngineError, Result};
    pub use crate::generator::{generate, DeterministicRng};
    pub use crate::health::{HealthCheck, HealthCheckState};
    pub use crate::reporter::{parse_rerun_instruction, Reporter, SEED_FLAG};
    pub use crate::seed::{Seed, SeedArg, SeedSource};
    pub use crate::settings::Settings;
    pub use crate::strategy::{
        booleans, integers, integers_in, just, sampled_from, vecs, Strategy,
    };
}
