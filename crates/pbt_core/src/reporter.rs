//! Failure reporting.
//!
//! The reporter writes the lines a user needs to reproduce a failure: the
//! falsifying example and, for runs whose seed was chosen at random, a single
//! re-run instruction containing `--hypothesis-seed=<digits>`. Runs with an
//! explicit or derandomized seed never get the instruction; the caller
//! already knows how to reproduce them.

use std::io::{self, Write};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::data::Example;
use crate::seed::Seed;

/// Command-line flag carrying a seed.
pub const SEED_FLAG: &str = "--hypothesis-seed";

/// Pattern every re-run instruction matches.
pub const RERUN_INSTRUCTION_PATTERN: &str = r"--hypothesis-seed=(\d+)";

fn instruction_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!("(?m){RERUN_INSTRUCTION_PATTERN}"))
            .unwrap_or_else(|e| unreachable!("instruction pattern is a valid regex: {e}"))
    })
}

/// The token that reproduces a run with `seed`.
#[must_use]
pub fn rerun_flag(seed: u64) -> String {
    format!("{SEED_FLAG}={seed}")
}

/// Full instruction line for `seed`.
#[must_use]
pub fn rerun_instruction(seed: u64) -> String {
    format!(
        "You can add `seed: Some({seed})` to this test's settings or run with {} to reproduce this failure.",
        rerun_flag(seed)
    )
}

/// Find the first re-run instruction in `text` and return its seed.
#[must_use]
pub fn parse_rerun_instruction(text: &str) -> Option<u64> {
    instruction_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Writes report lines to an output stream.
#[derive(Debug)]
pub struct Reporter<W: Write> {
    out: W,
    instructions_emitted: usize,
}

impl<W: Write> Reporter<W> {
    /// Report to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            instructions_emitted: 0,
        }
    }

    /// Write the falsifying example of a failed test.
    pub fn falsifying_example(&mut self, test_name: &str, example: &Example) -> io::Result<()> {
        writeln!(self.out, "Falsifying example: {}", example.render_call(test_name))?;
        for (i, value) in example.unnamed.iter().enumerate() {
            writeln!(self.out, "Draw {}: {value}", i + 1)?;
        }
        Ok(())
    }

    /// Called once per failed run. Writes the re-run instruction unless the
    /// seed was explicit. Returns whether the instruction was written.
    pub fn on_failure(&mut self, seed: &Seed) -> io::Result<bool> {
        if seed.is_explicit() {
            debug!("explicit seed; no re-run instruction");
            return Ok(false);
        }
        writeln!(self.out, "{}", rerun_instruction(seed.canonical()))?;
        self.instructions_emitted += 1;
        Ok(true)
    }

    /// Instructions written so far.
    #[must_use]
    pub const fn instructions_emitted(&self) -> usize {
        self.instructions_emitted
    }

    /// Recover the underlying stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}
