//! # Run Subcommand
//!
//! Full batch run: read every message under `--messages`, evaluate it against
//! its family's rule set from `--rules`, and write reports into `--out`.
//!
//! Ctrl-C cancels the run between messages; reports already produced are
//! still flushed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use isodq_batch::{BatchRunner, RunSummary};
use isodq_core::{BatchConfig, FamilyId};
use isodq_match::Evaluator;
use isodq_store::{FsMessageSource, FsReportSink, FsRuleSource, MessageSource, RuleSource};

use crate::{load_config, EXIT_INVALID, EXIT_VALID};

/// Arguments for `isodq run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory of message files, one subdirectory per family.
    #[arg(long, value_name = "DIR")]
    pub messages: PathBuf,

    /// Directory of `<family>.dq.json` rule files.
    #[arg(long, value_name = "DIR")]
    pub rules: PathBuf,

    /// Directory reports are written into.
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Family for message files outside a family directory.
    #[arg(long)]
    pub family: Option<String>,

    /// Mark misplaced required elements as missing.
    #[arg(long)]
    pub strict: bool,

    /// Maximum number of messages evaluated at once.
    #[arg(long, value_name = "N")]
    pub max_in_flight: Option<usize>,

    /// Flush reports after this many messages.
    #[arg(long, value_name = "N")]
    pub flush_every: Option<usize>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute `isodq run`.
pub fn run_batch(args: &RunArgs, config: Option<&std::path::Path>) -> Result<u8> {
    let config = load_config(config, args.strict)?;
    let batch = BatchConfig {
        max_in_flight: args.max_in_flight.unwrap_or(config.batch.max_in_flight),
        flush_every: args.flush_every.unwrap_or(config.batch.flush_every),
    };

    let rule_sets = FsRuleSource::new(&args.rules)
        .read_rule_sets()
        .context("failed to read rule sets")?;
    let messages = FsMessageSource::new(&args.messages, args.family.as_deref().map(FamilyId::from))
        .read_all_messages()
        .context("failed to read messages")?;
    let sink = FsReportSink::create(&args.out).context("failed to open report directory")?;

    let evaluator = Evaluator::new(config).context("invalid envelope configuration")?;
    let runner = BatchRunner::new(Arc::new(evaluator), rule_sets, Arc::new(sink))
        .with_batch_config(batch);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let summary = runtime.block_on(async {
        let cancel = runner.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing in-flight messages");
                cancel.cancel();
            }
        });
        runner.run(messages).await
    })?;

    print_summary(&summary, args.json)?;
    Ok(if summary.all_valid() {
        EXIT_VALID
    } else {
        EXIT_INVALID
    })
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    let c = &summary.counts;
    println!("Run {}", summary.run_id);
    println!(
        "  processed {}/{}: {} valid, {} invalid, {} errored",
        c.processed, summary.total, c.valid, c.invalid, c.errored
    );
    if c.skipped_rules > 0 {
        println!("  skipped rule records: {}", c.skipped_rules);
    }
    if summary.cancelled {
        println!("  cancelled before all messages were started");
    }
    Ok(())
}
