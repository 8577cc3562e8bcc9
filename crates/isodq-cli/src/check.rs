//! # Check Subcommand
//!
//! Evaluate one message file and print its report as pretty JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use isodq_core::{FamilyId, Message, MessageId, RuleSet};
use isodq_match::Evaluator;
use isodq_store::{message_id_from_stem, FsRuleSource, RuleSource};

use crate::{load_config, EXIT_INVALID, EXIT_VALID};

/// Arguments for `isodq check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory of `<family>.dq.json` rule files, or one rule file.
    #[arg(long, value_name = "PATH")]
    pub rules: PathBuf,

    /// Message family, e.g. `pacs.008`.
    #[arg(long)]
    pub family: String,

    /// Mark misplaced required elements as missing.
    #[arg(long)]
    pub strict: bool,

    /// The message file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Execute `isodq check`.
pub fn run_check(args: &CheckArgs, config: Option<&Path>) -> Result<u8> {
    let config = load_config(config, args.strict)?;
    let family = FamilyId::from(args.family.as_str());

    let rules = if args.rules.is_file() {
        RuleSet::load(family.clone(), &args.rules)
            .with_context(|| format!("failed to read {}", args.rules.display()))?
    } else {
        FsRuleSource::new(&args.rules)
            .read_rule_sets()
            .context("failed to read rule sets")?
            .remove(&family)
            .unwrap_or_else(|| RuleSet::empty(family.clone()))
    };

    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let stem = args
        .file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let message = Message {
        id: MessageId::new(message_id_from_stem(&stem)),
        raw_payload: String::from_utf8_lossy(&bytes).into_owned(),
        family,
    };

    let evaluator = Evaluator::new(config).context("invalid envelope configuration")?;
    let report = evaluator.evaluate(&message, &rules);
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.overall_valid {
        EXIT_VALID
    } else {
        EXIT_INVALID
    })
}
