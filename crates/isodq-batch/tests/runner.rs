//! Integration test: batch runs over an in-memory store, covering flush
//! cadence, missing rule sets, per-rule failure isolation, and
//! cancellation.

use std::collections::BTreeMap;
use std::sync::Arc;

use isodq_batch::{BatchRunner, RunSummary};
use isodq_core::{
    BatchConfig, FamilyId, Finding, MatchTier, Message, MessageId, RuleSet, ValidatorConfig,
};
use isodq_match::{Evaluator, MatchContext, MatchError, MatchStrategy, TieredMatcher};
use isodq_store::{MemoryStore, RuleSource};

const RULES: &str = r#"[
    {"path": "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId", "required": true},
    {"path": "/Document/FIToFICstmrCdtTrf/GrpHdr/NbOfTxs", "required": false}
]"#;

fn message(id: &str, msg_id: Option<&str>) -> Message {
    let inner = msg_id
        .map(|m| format!("<MsgId>{m}</MsgId>"))
        .unwrap_or_default();
    Message::new(
        id,
        format!("<Document><FIToFICstmrCdtTrf><GrpHdr>{inner}</GrpHdr></FIToFICstmrCdtTrf></Document>"),
        "pacs.008",
    )
}

fn store_with_rules() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_rule_set(RuleSet::from_json(FamilyId::from("pacs.008"), RULES));
    store
}

fn runner(store: &MemoryStore, batch: BatchConfig) -> BatchRunner {
    let evaluator = Arc::new(Evaluator::new(ValidatorConfig::default()).unwrap());
    BatchRunner::new(evaluator, store.read_rule_sets().unwrap(), Arc::new(store.clone()))
        .with_batch_config(batch)
}

#[tokio::test]
async fn test_every_message_gets_a_report() {
    let store = store_with_rules();
    let messages: Vec<Message> = (0..10)
        .map(|i| message(&format!("M{i:02}"), (i % 2 == 0).then_some("ID")))
        .collect();

    let summary = runner(
        &store,
        BatchConfig {
            max_in_flight: 3,
            flush_every: 4,
        },
    )
    .run(messages)
    .await
    .unwrap();

    assert_eq!(summary.total, 10);
    assert_eq!(summary.counts.processed, 10);
    assert_eq!(summary.counts.valid, 5);
    assert_eq!(summary.counts.invalid, 5);
    assert_eq!(summary.counts.errored, 0);
    assert!(!summary.cancelled);
    assert!(!summary.all_valid());
    assert_eq!(store.reports().len(), 10);

    // Two periodic flushes (after 4 and 8 reports) plus the final one.
    assert_eq!(summary.counts.flushes, 3);
    assert_eq!(store.flush_count(), 3);

    let report = store.report(&MessageId::from("M00")).unwrap();
    assert!(report.overall_valid);
    assert_eq!(report.outcomes().count(), 2);
}

#[tokio::test]
async fn test_zero_batch_settings_are_raised_to_one() {
    let store = store_with_rules();
    let summary = runner(
        &store,
        BatchConfig {
            max_in_flight: 0,
            flush_every: 0,
        },
    )
    .run(vec![message("A", Some("x")), message("B", Some("y"))])
    .await
    .unwrap();
    assert_eq!(summary.counts.processed, 2);
    assert_eq!(summary.counts.flushes, 3);
}

#[tokio::test]
async fn test_family_without_rules_is_reported_invalid() {
    let store = store_with_rules();
    let other = Message::new("C1", "<Document><BkToCstmrStmt/></Document>", "camt.053");
    let summary = runner(&store, BatchConfig::default())
        .run(vec![other])
        .await
        .unwrap();

    assert_eq!(summary.counts.invalid, 1);
    let report = store.report(&MessageId::from("C1")).unwrap();
    assert!(!report.overall_valid);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(
        json["findings"][0]["error"],
        "No rules found for family camt.053"
    );
}

#[tokio::test]
async fn test_skipped_rule_records_are_counted() {
    let store = MemoryStore::new();
    store.add_rule_set(RuleSet::from_json(
        FamilyId::from("pacs.008"),
        r#"[{"path": "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId", "required": true}, {"required": true}, 7]"#,
    ));
    let summary = runner(&store, BatchConfig::default())
        .run(vec![message("A", Some("x"))])
        .await
        .unwrap();
    assert_eq!(summary.counts.skipped_rules, 2);
    assert_eq!(summary.counts.valid, 1);
}

/// A tier that always panics.
struct Exploding;

impl MatchStrategy for Exploding {
    fn tier(&self) -> MatchTier {
        MatchTier::Exact
    }

    fn try_match(&self, _ctx: &MatchContext<'_>) -> Result<Option<Finding>, MatchError> {
        panic!("tier exploded")
    }
}

#[tokio::test]
async fn test_panicking_tier_fails_rules_not_the_run() {
    let store = store_with_rules();
    let matcher = TieredMatcher::with_tiers(vec![Box::new(Exploding)]);
    let evaluator =
        Arc::new(Evaluator::with_matcher(ValidatorConfig::default(), matcher).unwrap());
    let runner = BatchRunner::new(evaluator, store.read_rule_sets().unwrap(), Arc::new(store.clone()));

    let summary = runner
        .run(vec![message("A", Some("x")), message("B", Some("y"))])
        .await
        .unwrap();

    assert_eq!(summary.counts.processed, 2);
    assert_eq!(summary.counts.errored, 0);
    assert_eq!(summary.counts.invalid, 2);
    let report = store.report(&MessageId::from("A")).unwrap();
    assert!(!report.overall_valid);
    assert!(!report.repair_status.is_unrecoverable());
    assert_eq!(report.outcomes().count(), 2);
    for outcome in report.outcomes() {
        assert!(!outcome.finding.exists);
        assert_eq!(outcome.finding.reason, "evaluation failed: tier exploded");
    }
}

#[tokio::test]
async fn test_cancelled_run_starts_nothing_and_still_flushes() {
    let store = store_with_rules();
    let runner = runner(&store, BatchConfig::default());
    runner.cancel_token().cancel();

    let summary = runner
        .run(vec![message("A", Some("x")), message("B", None)])
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.counts.processed, 0);
    assert_eq!(summary.counts.flushes, 1);
    assert!(store.reports().is_empty());
}

#[tokio::test]
async fn test_summary_serializes_flat_counts() {
    let store = store_with_rules();
    let summary: RunSummary = runner(&store, BatchConfig::default())
        .run(vec![message("A", Some("x"))])
        .await
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["processed"], 1);
    assert_eq!(json["valid"], 1);
    assert_eq!(json["cancelled"], false);
    assert!(json["run_id"].is_string());
    assert!(summary.finished_at >= summary.started_at);
}

#[test]
fn test_rule_sets_map_is_keyed_by_family() {
    let store = store_with_rules();
    let sets: BTreeMap<FamilyId, RuleSet> = store.read_rule_sets().unwrap();
    assert!(sets.contains_key(&FamilyId::from("pacs.008")));
}
