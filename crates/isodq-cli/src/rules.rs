//! # Rules Subcommand
//!
//! Print each family's normalized rules and the records that were skipped,
//! so rule generation problems show up before a run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use isodq_core::{FamilyId, RuleSet};
use isodq_store::{FsRuleSource, RuleSource};

use crate::{EXIT_INVALID, EXIT_VALID};

/// Arguments for `isodq rules`.
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Directory of `<family>.dq.json` rule files.
    #[arg(long, value_name = "DIR")]
    pub rules: PathBuf,

    /// Only show this family.
    #[arg(long)]
    pub family: Option<String>,

    /// Print the rule sets as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute `isodq rules`. Exits 1 when a requested family has no rule file.
pub fn run_rules(args: &RulesArgs) -> Result<u8> {
    let mut sets = FsRuleSource::new(&args.rules)
        .read_rule_sets()
        .context("failed to read rule sets")?;

    if let Some(family) = &args.family {
        let family = FamilyId::from(family.as_str());
        match sets.remove(&family) {
            Some(set) => sets = BTreeMap::from([(family, set)]),
            None => {
                println!("no rule file for family {family}");
                return Ok(EXIT_INVALID);
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sets)?);
    } else {
        for set in sets.values() {
            print!("{}", render(set));
        }
    }
    Ok(EXIT_VALID)
}

/// Human-readable listing of one rule set.
pub fn render(set: &RuleSet) -> String {
    let required = set.rules.iter().filter(|r| r.required).count();
    let mut out = format!(
        "{}: {} rules ({} required), {} skipped\n",
        set.family,
        set.rules.len(),
        required,
        set.skipped.len()
    );
    for rule in &set.rules {
        let flag = if rule.required { "required" } else { "optional" };
        out.push_str(&format!("  {flag:<8} {}\n", rule.source_path));
    }
    for skipped in &set.skipped {
        out.push_str(&format!("  SKIP #{}: {}\n", skipped.index, skipped.reason));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_rules_then_skipped_records() {
        let set = RuleSet::from_json(
            FamilyId::from("pacs.008"),
            r#"[{"path": "/Document/GrpHdr/MsgId", "required": true}, {"xpath": "/Document/GrpHdr/CreDtTm"}, 3]"#,
        );
        let text = render(&set);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "pacs.008: 2 rules (1 required), 1 skipped");
        assert_eq!(lines[1], "  required /Document/GrpHdr/MsgId");
        assert_eq!(lines[2], "  optional /Document/GrpHdr/CreDtTm");
        assert!(lines[3].starts_with("  SKIP #2: "));
    }
}
