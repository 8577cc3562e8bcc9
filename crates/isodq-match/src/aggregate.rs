//! # Report Aggregator
//!
//! Turns per-rule findings into verdicts and a per-message [`Report`].
//!
//! | required | exists | in_correct_location | tolerant  | strict    |
//! |----------|--------|---------------------|-----------|-----------|
//! | 1        | 0      | any                 | `missing` | `missing` |
//! | 1        | 1      | 0                   | `ok`      | `missing` |
//! | other    |        |                     | `ok`      | `ok`      |
//!
//! A message is valid when it has at least one rule outcome and none is
//! `missing`.

use isodq_core::{
    Finding, Message, RepairStatus, Report, ReportEntry, Rule, RuleOutcome, SkippedRule,
    StructurePolicy, Validity,
};

/// Applies the structure policy to findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportAggregator {
    policy: StructurePolicy,
}

impl ReportAggregator {
    /// An aggregator for `policy`.
    pub fn new(policy: StructurePolicy) -> Self {
        Self { policy }
    }

    /// The active policy.
    pub fn policy(&self) -> StructurePolicy {
        self.policy
    }

    /// Rule-level verdict.
    pub fn verdict(&self, required: bool, finding: &Finding) -> Validity {
        if !required {
            return Validity::Ok;
        }
        if !finding.exists {
            return Validity::Missing;
        }
        if !finding.in_correct_location && self.policy == StructurePolicy::Strict {
            return Validity::Missing;
        }
        Validity::Ok
    }

    /// Attach the verdict to a rule's finding.
    pub fn outcome(&self, rule: &Rule, finding: Finding) -> RuleOutcome {
        RuleOutcome {
            path: rule.source_path.clone(),
            required: rule.required,
            valid: self.verdict(rule.required, &finding),
            finding,
        }
    }

    /// Assemble the report for `message`.
    pub fn aggregate(
        &self,
        message: &Message,
        repair_status: RepairStatus,
        outcomes: Vec<RuleOutcome>,
        skipped_rules: Vec<SkippedRule>,
    ) -> Report {
        if outcomes.is_empty() {
            return self.no_rules(message, repair_status, skipped_rules);
        }
        let overall_valid = outcomes.iter().all(|o| o.valid == Validity::Ok);
        Report {
            message_id: message.id.clone(),
            family: message.family.clone(),
            repair_status,
            overall_valid,
            payload_sha256: message.payload_sha256(),
            findings: outcomes.into_iter().map(ReportEntry::Rule).collect(),
            skipped_rules,
        }
    }

    /// Report for a family with no usable rules: one diagnostic, invalid.
    pub fn no_rules(
        &self,
        message: &Message,
        repair_status: RepairStatus,
        skipped_rules: Vec<SkippedRule>,
    ) -> Report {
        Report {
            message_id: message.id.clone(),
            family: message.family.clone(),
            repair_status,
            overall_valid: false,
            payload_sha256: message.payload_sha256(),
            findings: vec![ReportEntry::Diagnostic {
                error: format!("No rules found for family {}", message.family),
            }],
            skipped_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isodq_core::{MatchTier, RulePath};

    fn misplaced() -> Finding {
        Finding::misplaced(MatchTier::Relaxed, None, false, "found via relaxed search, wrong parent")
    }

    #[test]
    fn required_and_absent_is_missing_under_both_policies() {
        for policy in [StructurePolicy::Tolerant, StructurePolicy::Strict] {
            let agg = ReportAggregator::new(policy);
            assert_eq!(agg.verdict(true, &Finding::not_found("x")), Validity::Missing);
            assert_eq!(agg.verdict(false, &Finding::not_found("x")), Validity::Ok);
        }
    }

    #[test]
    fn misplacement_fails_only_under_strict() {
        assert_eq!(
            ReportAggregator::new(StructurePolicy::Tolerant).verdict(true, &misplaced()),
            Validity::Ok
        );
        assert_eq!(
            ReportAggregator::new(StructurePolicy::Strict).verdict(true, &misplaced()),
            Validity::Missing
        );
        assert_eq!(
            ReportAggregator::new(StructurePolicy::Strict).verdict(false, &misplaced()),
            Validity::Ok
        );
    }

    #[test]
    fn one_missing_rule_invalidates_the_message() {
        let agg = ReportAggregator::default();
        let message = Message::new("m1", "<Document/>", "pacs.008");
        let ok = agg.outcome(
            &Rule::new("/Document", true).unwrap(),
            Finding::exact(RulePath::parse("/Document").unwrap(), "exact match"),
        );
        let missing = agg.outcome(&Rule::new("/Document/GrpHdr", true).unwrap(), Finding::not_found("x"));
        let report = agg.aggregate(&message, RepairStatus::Ok, vec![ok.clone()], Vec::new());
        assert!(report.overall_valid);
        let report = agg.aggregate(&message, RepairStatus::Ok, vec![ok, missing], Vec::new());
        assert!(!report.overall_valid);
        assert_eq!(report.missing_count(), 1);
    }

    #[test]
    fn no_rules_yields_a_single_diagnostic() {
        let agg = ReportAggregator::default();
        let message = Message::new("m1", "<Document/>", "camt.053");
        let report = agg.aggregate(&message, RepairStatus::Ok, Vec::new(), Vec::new());
        assert!(!report.overall_valid);
        assert_eq!(
            report.findings,
            vec![ReportEntry::Diagnostic {
                error: "No rules found for family camt.053".into()
            }]
        );
    }
}
