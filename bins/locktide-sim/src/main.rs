//! Locktide scenario simulator.
//!
//! Replays a JSON scenario against an in-memory engine and token ledger,
//! printing each event, query result and failed step as one JSON line.

mod scenario;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use scenario::{Runner, Scenario};

#[derive(Parser, Debug)]
#[command(
    name = "locktide-sim",
    version,
    about = "Replay a lock and fee-streaming scenario and print its events"
)]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Abort on the first failing step instead of recording it
    #[arg(long)]
    strict: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    log_format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let text = fs::read_to_string(&args.scenario)
        .with_context(|| format!("Failed to read scenario: {}", args.scenario.display()))?;
    let scenario = Scenario::from_json(&text)?;
    info!(path = %args.scenario.display(), steps = scenario.steps.len(), "sim: scenario loaded");

    let lines = Runner::new(&scenario, args.strict).run(&scenario.steps)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in &lines {
        writeln!(out, "{line}").context("Failed to write output")?;
    }
    Ok(())
}

/// Initialize tracing on stderr with the given level and output format.
///
/// `RUST_LOG` takes precedence over `level_str` when set.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(io::stderr))
            .init();
    }
}
