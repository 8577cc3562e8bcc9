//! # isodq-cli: Command-Line Interface
//!
//! Provides the `isodq` binary.
//!
//! ## Subcommands
//!
//! - `isodq run` runs a whole message directory and writes one report per
//!   message.
//! - `isodq check` evaluates a single message file and prints its report.
//! - `isodq rules` prints the normalized rule sets and any skipped records.
//!
//! ## Exit Codes
//!
//! | Code | Meaning                                  |
//! |------|------------------------------------------|
//! | 0    | every evaluated message is valid         |
//! | 1    | at least one message is invalid          |
//! | 2    | operational error (unreadable input etc) |

pub mod check;
pub mod rules;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};

use isodq_core::{StructurePolicy, ValidatorConfig};

/// All messages valid.
pub const EXIT_VALID: u8 = 0;
/// At least one message invalid.
pub const EXIT_INVALID: u8 = 1;
/// The command could not complete.
pub const EXIT_ERROR: u8 = 2;

/// Load the configuration file, or the defaults when none is given, and
/// apply `--strict`.
pub fn load_config(path: Option<&Path>, strict: bool) -> Result<ValidatorConfig> {
    let mut config = match path {
        Some(path) => ValidatorConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => ValidatorConfig::default(),
    };
    if strict {
        config.structure_policy = StructurePolicy::Strict;
    }
    tracing::debug!(
        envelope = %config.envelope,
        policy = ?config.structure_policy,
        families = config.families.len(),
        "configuration loaded"
    );
    Ok(config)
}
