//! # Per-Message Reports
//!
//! A [`Report`] collects one [`ReportEntry`] per rule of the message's
//! family plus the parser's [`RepairStatus`]. Reports are written to the
//! report store keyed by message id; a report is only written once fully
//! assembled.
//!
//! Reports contain no timestamps or run identifiers: evaluating the same
//! message twice with the same rule set yields byte-identical JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::finding::{flag, Finding};
use crate::identity::{FamilyId, MessageId};
use crate::ruleset::SkippedRule;

// ---------------------------------------------------------------------------
// RepairStatus
// ---------------------------------------------------------------------------

/// How much alteration was needed to make a payload parseable.
///
/// A `Repaired` tree may have lost or reordered content; findings derived
/// from it are lower-confidence than findings from an `Ok` tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RepairStatus {
    /// Strict parsing succeeded.
    Ok,
    /// Strict parsing failed; best-effort recovery produced a tree.
    Repaired,
    /// No tree could be produced.
    Unrecoverable {
        /// Why recovery failed.
        reason: String,
    },
}

impl RepairStatus {
    /// Construct an unrecoverable status.
    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        Self::Unrecoverable {
            reason: reason.into(),
        }
    }

    /// True for `Unrecoverable`.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Unrecoverable { .. })
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Repaired => write!(f, "REPAIRED"),
            Self::Unrecoverable { reason } => write!(f, "UNRECOVERABLE: {reason}"),
        }
    }
}

impl FromStr for RepairStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Self::Ok),
            "REPAIRED" => Ok(Self::Repaired),
            other => match other.strip_prefix("UNRECOVERABLE") {
                Some(rest) => Ok(Self::unrecoverable(
                    rest.trim_start_matches(':').trim(),
                )),
                None => Err(format!("unknown repair status '{other}'")),
            },
        }
    }
}

impl Serialize for RepairStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RepairStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Validity
// ---------------------------------------------------------------------------

/// Rule-level verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// The rule is satisfied under the active policy.
    Ok,
    /// The rule's element is missing (or misplaced under strict policy).
    Missing,
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One rule's finding together with its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// The rule's path as written in the rule record.
    pub path: String,
    /// Whether the rule was required.
    #[serde(with = "flag")]
    pub required: bool,
    /// Structural finding.
    #[serde(flatten)]
    pub finding: Finding,
    /// Verdict under the active policy.
    pub valid: Validity,
}

/// A report line: either a rule outcome or a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportEntry {
    /// Outcome of evaluating one rule.
    Rule(RuleOutcome),
    /// A condition that prevented rule evaluation.
    Diagnostic {
        /// Description of the condition.
        error: String,
    },
}

impl ReportEntry {
    /// The rule outcome, if this entry is one.
    pub fn as_rule(&self) -> Option<&RuleOutcome> {
        match self {
            Self::Rule(outcome) => Some(outcome),
            Self::Diagnostic { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Data-quality report for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// The message this report describes.
    pub message_id: MessageId,
    /// The message's family.
    pub family: FamilyId,
    /// Parser repair status.
    pub repair_status: RepairStatus,
    /// True when no rule is `missing` and at least one rule was evaluated.
    pub overall_valid: bool,
    /// Hex SHA-256 of the raw payload.
    pub payload_sha256: String,
    /// One entry per rule, in rule-set order, or a single diagnostic.
    pub findings: Vec<ReportEntry>,
    /// Rule records that were skipped during normalization.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_rules: Vec<SkippedRule>,
}

impl Report {
    /// Rule outcomes, skipping diagnostics.
    pub fn outcomes(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.findings.iter().filter_map(ReportEntry::as_rule)
    }

    /// Outcome for the rule whose source path is `path`.
    pub fn outcome(&self, path: &str) -> Option<&RuleOutcome> {
        self.outcomes().find(|o| o.path == path)
    }

    /// Number of `missing` outcomes.
    pub fn missing_count(&self) -> usize {
        self.outcomes()
            .filter(|o| o.valid == Validity::Missing)
            .count()
    }

    /// Report for a message whose evaluation failed unexpectedly.
    pub fn failed(
        message_id: MessageId,
        family: FamilyId,
        payload_sha256: String,
        error: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            family,
            repair_status: RepairStatus::unrecoverable("evaluation aborted"),
            overall_valid: false,
            payload_sha256,
            findings: vec![ReportEntry::Diagnostic {
                error: error.into(),
            }],
            skipped_rules: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RulePath;

    #[test]
    fn repair_status_round_trips_through_text() {
        for status in [
            RepairStatus::Ok,
            RepairStatus::Repaired,
            RepairStatus::unrecoverable("empty"),
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: RepairStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
        assert_eq!(
            RepairStatus::unrecoverable("empty").to_string(),
            "UNRECOVERABLE: empty"
        );
    }

    #[test]
    fn rule_outcome_flattens_finding_fields() {
        let outcome = RuleOutcome {
            path: "/Document/GrpHdr/MsgId".into(),
            required: true,
            finding: Finding::exact(RulePath::parse("/Document/GrpHdr/MsgId").unwrap(), "exact match"),
            valid: Validity::Ok,
        };
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["path"], "/Document/GrpHdr/MsgId");
        assert_eq!(v["required"], 1);
        assert_eq!(v["exists"], 1);
        assert_eq!(v["in_correct_location"], 1);
        assert_eq!(v["valid"], "ok");
    }

    #[test]
    fn entries_deserialize_to_the_right_variant() {
        let diag: ReportEntry =
            serde_json::from_str(r#"{"error": "No rules found for family pacs.008"}"#).unwrap();
        assert!(diag.as_rule().is_none());

        let outcome = RuleOutcome {
            path: "/A".into(),
            required: false,
            finding: Finding::not_found("absent"),
            valid: Validity::Ok,
        };
        let json = serde_json::to_string(&ReportEntry::Rule(outcome.clone())).unwrap();
        let back: ReportEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_rule(), Some(&outcome));
    }

    #[test]
    fn failed_report_is_invalid_with_one_diagnostic() {
        let r = Report::failed(
            MessageId::from("m1"),
            FamilyId::from("pacs.008"),
            String::new(),
            "worker panicked",
        );
        assert!(!r.overall_valid);
        assert_eq!(r.findings.len(), 1);
        assert_eq!(r.outcomes().count(), 0);
    }
}
