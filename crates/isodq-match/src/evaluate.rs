//! # Single-Message Evaluation
//!
//! [`Evaluator`] holds everything that is loaded once per run (the envelope
//! sanitizer, the remapper, the matcher tiers, the policy) and evaluates one
//! message against one rule set:
//!
//! 1. Parse the payload once.
//! 2. For each rule, in order: remap, match, judge.
//! 3. Aggregate into a report.
//!
//! The parsed tree is shared immutably across that message's rules. An
//! `Evaluator` holds no mutable state, so one instance serves every worker.
//!
//! A panic while remapping or matching one rule is caught for that rule
//! alone: the rule gets a not-found finding naming the panic, and the
//! remaining rules are evaluated as usual.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use isodq_core::{Finding, Message, Report, RuleSet, ValidatorConfig};
use isodq_xml::{parse_message_with_depth, RawTextScan, Sanitizer};

use crate::aggregate::ReportAggregator;
use crate::error::MatchError;
use crate::matcher::{MessageView, TieredMatcher};
use crate::remap::{RootRemapper, Structure};

/// Run-scoped evaluator.
#[derive(Debug)]
pub struct Evaluator {
    config: ValidatorConfig,
    sanitizer: Sanitizer,
    remapper: RootRemapper,
    matcher: TieredMatcher,
    aggregator: ReportAggregator,
}

impl Evaluator {
    /// Build an evaluator with the default tier sequence.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Envelope`] if the configured envelope name
    /// cannot be turned into a tag matcher.
    pub fn new(config: ValidatorConfig) -> Result<Self, MatchError> {
        Self::with_matcher(config, TieredMatcher::default())
    }

    /// Build an evaluator with a custom tier sequence.
    ///
    /// # Errors
    ///
    /// As [`Evaluator::new`].
    pub fn with_matcher(config: ValidatorConfig, matcher: TieredMatcher) -> Result<Self, MatchError> {
        let sanitizer = Sanitizer::new(&config.envelope).map_err(|source| MatchError::Envelope {
            name: config.envelope.clone(),
            source,
        })?;
        Ok(Self {
            remapper: RootRemapper::new(&config),
            aggregator: ReportAggregator::new(config.structure_policy),
            sanitizer,
            matcher,
            config,
        })
    }

    /// The configuration this evaluator was built from.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Evaluate `message` against `rules`.
    pub fn evaluate(&self, message: &Message, rules: &RuleSet) -> Report {
        for skipped in &rules.skipped {
            tracing::debug!(
                message_id = %message.id,
                family = %rules.family,
                index = skipped.index,
                reason = %skipped.reason,
                "skipping rule record"
            );
        }

        let parsed =
            parse_message_with_depth(&message.raw_payload, &self.sanitizer, self.config.max_depth);
        if rules.is_empty() {
            tracing::debug!(message_id = %message.id, family = %message.family, "no rules for family");
            return self
                .aggregator
                .no_rules(message, parsed.repair_status, rules.skipped.clone());
        }

        let scan = RawTextScan::new(&parsed.sanitized);
        let view = MessageView {
            document: parsed.document.as_ref(),
            repair_status: &parsed.repair_status,
            raw: &scan,
        };
        let structure = match view.document {
            Some(doc) => Structure::Tree(doc),
            None => Structure::Raw(&scan),
        };
        let expected_root = self.config.expected_root(&message.family);
        let root_name = expected_root.unwrap_or(self.config.envelope.as_str());

        let outcomes = rules
            .rules
            .iter()
            .map(|rule| {
                let finding = catch_unwind(AssertUnwindSafe(|| {
                    let remap = self.remapper.remap(&rule.path, expected_root, structure);
                    self.matcher.evaluate(&rule.path, &remap, root_name, &view)
                }))
                .unwrap_or_else(|panic| {
                    let cause = panic_message(panic.as_ref());
                    tracing::error!(
                        message_id = %message.id,
                        path = %rule.source_path,
                        cause = %cause,
                        "rule evaluation failed"
                    );
                    Finding::not_found(format!("evaluation failed: {cause}"))
                });
                self.aggregator.outcome(rule, finding)
            })
            .collect();

        let report = self.aggregator.aggregate(
            message,
            parsed.repair_status.clone(),
            outcomes,
            rules.skipped.clone(),
        );
        tracing::debug!(
            message_id = %message.id,
            family = %message.family,
            repair_status = %report.repair_status,
            overall_valid = report.overall_valid,
            missing = report.missing_count(),
            "evaluated message"
        );
        report
    }
}

/// Text of a caught panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
