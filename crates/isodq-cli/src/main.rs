//! # isodq CLI entry point
//!
//! Parses command-line arguments, installs logging, and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use isodq_cli::check::{run_check, CheckArgs};
use isodq_cli::rules::{run_rules, RulesArgs};
use isodq_cli::run::{run_batch, RunArgs};
use isodq_cli::EXIT_ERROR;

/// Tolerant structural data-quality checks for ISO 20022 messages.
///
/// Evaluates element-presence rules against messages that may be malformed,
/// truncated, or wrapped in an unexpected container, and writes one report
/// per message.
#[derive(Parser, Debug)]
#[command(name = "isodq", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate every message in a directory and write reports.
    Run(RunArgs),

    /// Evaluate a single message file and print its report.
    Check(CheckArgs),

    /// Show normalized rule sets and skipped rule records.
    Rules(RulesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    // Logs go to stderr; stdout carries reports and summaries.
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "isodq starting");

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run(args) => run_batch(&args, config),
        Commands::Check(args) => run_check(&args, config),
        Commands::Rules(args) => run_rules(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
