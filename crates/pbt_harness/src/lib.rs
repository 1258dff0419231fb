//! # PBT Harness
//!
//! Runs registered fixture properties from the command line so seeding
//! behavior can be checked end to end, across processes:
//!
//! - [`fixtures`] - The fixture registry
//! - [`session`] - Running fixtures, rendering results, verifying determinism
//!
//! # Example
//!
//! ```bash
//! # Same seed, same failing example, no re-run instruction
//! pbt_harness run --fixture fails_once --hypothesis-seed=0
//!
//! # Unseeded: prints one `--hypothesis-seed=<n>` instruction on failure
//! pbt_harness run --fixture fails_once
//!
//! # Check that four parallel runs agree
//! pbt_harness verify --fixture fails_once --hypothesis-seed=foo --runs 4
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod fixtures;
pub mod session;

pub use error::{HarnessError, Result};
pub use fixtures::Fixture;
pub use session::{run_fixture, verify_fixture, RunRequest, VerifyReport};
