//! MINHTON topology oracle CLI
//!
//! Validates one event store, or every store in a directory, and exits
//! non-zero if any of them fails.

use anyhow::Context;
use clap::Parser;
use minhton_oracle_orchestrator::{discover_stores, run_batch, OracleConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "minhton-oracle")]
#[command(about = "Check recorded MINHTON simulation runs against the topology invariants")]
#[command(version)]
struct Cli {
    /// Event store (.db) or directory of stores
    path: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed of the event sampling RNG
    #[arg(long)]
    seed: Option<u64>,

    /// Check every event, however large the log
    #[arg(long)]
    no_sampling: bool,

    /// Check events in parallel
    #[arg(long)]
    parallel: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => OracleConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => OracleConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    if cli.no_sampling {
        config = config.without_sampling();
    }
    if cli.parallel {
        config = config.with_parallel(true);
    }

    let stores = discover_stores(&cli.path)?;
    let results = run_batch(&stores, &config)?;

    let mut all_passed = true;
    for result in &results {
        match &result.outcome {
            Ok(report) => println!("{}", report),
            Err(err) => println!("FAILED {}: {}", result.path.display(), err),
        }
        all_passed &= result.passed();
    }
    println!(
        "{} of {} store(s) passed",
        results.iter().filter(|r| r.passed()).count(),
        results.len()
    );

    Ok(if all_passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
