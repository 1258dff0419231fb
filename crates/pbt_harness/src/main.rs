//! Command-line runner for fixture properties.
//!
//! # Usage
//!
//! ```bash
//! # Run a fixture with a fixed seed
//! cargo run -p pbt_harness -- run --fixture fails_once --hypothesis-seed=0
//!
//! # Record-then-replay health-check scenario
//! cargo run -p pbt_harness -- run --fixture record_rejections --record seen.txt
//! cargo run -p pbt_harness -- run --fixture record_rejections --record seen.txt --hypothesis-seed=10
//!
//! # Verify determinism across parallel runs
//! cargo run -p pbt_harness -- verify --fixture fails_once --hypothesis-seed=42 --runs 8
//! ```
//!
//! # Output
//!
//! Report (stdout): falsifying example, re-run instruction, status line
//! Logs (stderr): tracing output, filtered by `RUST_LOG`

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pbt_core::seed::SeedArg;
use pbt_core::settings::Settings;
use pbt_harness::{run_fixture, verify_fixture, Fixture, HarnessError, RunRequest};

#[derive(Parser)]
#[command(name = "pbt_harness")]
#[command(about = "Run property-test fixtures with reproducible seeds")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one fixture and report the result
    Run {
        /// Fixture to run (see `list`)
        #[arg(short, long)]
        fixture: Fixture,

        /// Seed for the run: an integer, or any text to hash
        #[arg(long = "hypothesis-seed", value_name = "SEED", value_parser = parse_seed_arg)]
        hypothesis_seed: Option<SeedArg>,

        /// Record file for stateful fixtures
        #[arg(long)]
        record: Option<PathBuf>,

        /// Settings file (RON)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Append a JSON summary line
        #[arg(long)]
        json: bool,
    },

    /// Run one fixture several times with the same seed and compare output
    Verify {
        /// Fixture to verify
        #[arg(short, long)]
        fixture: Fixture,

        /// Seed for every run
        #[arg(long = "hypothesis-seed", value_name = "SEED", value_parser = parse_seed_arg)]
        hypothesis_seed: SeedArg,

        /// Number of runs
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Settings file (RON)
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// List registered fixtures
    List,
}

/// Integers stay integers so a reported seed replays the same stream.
fn parse_seed_arg(s: &str) -> Result<SeedArg, std::convert::Infallible> {
    s.parse()
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let result = match cli.command {
        Commands::Run {
            fixture,
            hypothesis_seed,
            record,
            settings,
            json,
        } => cmd_run(fixture, hypothesis_seed, record, settings, json),
        Commands::Verify {
            fixture,
            hypothesis_seed,
            runs,
            settings,
        } => cmd_verify(fixture, &hypothesis_seed, runs, settings),
        Commands::List => cmd_list(),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "harness error");
            eprintln!("FATAL: {e}");
            std::process::exit(2);
        }
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings, HarnessError> {
    match path {
        Some(path) => Ok(Settings::load(path)?),
        None => Ok(Settings::default()),
    }
}

/// Run a fixture. Returns whether it passed.
fn cmd_run(
    fixture: Fixture,
    seed: Option<SeedArg>,
    record: Option<PathBuf>,
    settings: Option<PathBuf>,
    json: bool,
) -> Result<bool, HarnessError> {
    let request = RunRequest::new(fixture)
        .with_seed(seed)
        .with_record(record)
        .with_settings(load_settings(settings)?)
        .with_json(json);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = run_fixture(&request, &mut out)?;
    Ok(!outcome.failed())
}

/// Verify a fixture. Returns whether all runs matched.
fn cmd_verify(
    fixture: Fixture,
    seed: &SeedArg,
    runs: usize,
    settings: Option<PathBuf>,
) -> Result<bool, HarnessError> {
    let report = verify_fixture(fixture, seed, runs, &load_settings(settings)?)?;
    if report.is_deterministic() {
        eprintln!("PASS: All {} runs produced identical output", report.runs);
    } else {
        eprintln!(
            "FAIL: {} distinct outputs across {} runs",
            report.distinct_outputs, report.runs
        );
    }
    Ok(report.is_deterministic())
}

/// Print the fixture registry.
fn cmd_list() -> Result<bool, HarnessError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for fixture in Fixture::ALL {
        let record = if fixture.needs_record() { " [--record]" } else { "" };
        writeln!(
            out,
            "{:<18} {:<20} {}{record}",
            fixture.name(),
            fixture.test_name(),
            fixture.description()
        )?;
    }
    Ok(true)
}
