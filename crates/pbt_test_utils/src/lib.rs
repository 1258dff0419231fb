//! # PBT Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Captured runs and the canonical failing property
//! - Property-based testing strategies for seeds

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
