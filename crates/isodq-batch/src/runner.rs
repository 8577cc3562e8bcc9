//! # Batch Runner
//!
//! Message-parallel, rule-sequential evaluation of a whole run.
//!
//! ## Design
//!
//! - The evaluator and the rule sets are loaded once and shared read-only
//!   through `Arc`.
//! - Each message is evaluated on the blocking pool; a semaphore caps how
//!   many are in flight.
//! - Finished reports are upserted as they complete and the sink is flushed
//!   every `flush_every` reports and once at the end.
//! - A panic inside one rule is already contained by the evaluator. A panic
//!   anywhere else in one message's evaluation becomes an error report for
//!   that message; the run continues.
//! - Cancellation is checked before each message is started. Messages
//!   already in flight finish and are written.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use isodq_core::{BatchConfig, FamilyId, Message, Report, RuleSet};
use isodq_match::{panic_message, Evaluator};
use isodq_store::ReportSink;

use crate::error::BatchError;
use crate::metrics::{RunCounts, RunMetrics};

/// Cooperative stop signal, checked between messages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that no further messages be started.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What an operator sees at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last report was flushed.
    pub finished_at: DateTime<Utc>,
    /// Messages handed to the run.
    pub total: u64,
    /// True if the run stopped early.
    pub cancelled: bool,
    /// Final counter values.
    #[serde(flatten)]
    pub counts: RunCounts,
}

impl RunSummary {
    /// True when every processed message was valid and nothing errored.
    pub fn all_valid(&self) -> bool {
        self.counts.invalid == 0 && self.counts.errored == 0
    }
}

/// One message's outcome as returned by its worker.
struct Evaluated {
    report: Report,
    errored: bool,
}

/// Runs every message of a batch through one [`Evaluator`].
pub struct BatchRunner {
    evaluator: Arc<Evaluator>,
    rule_sets: Arc<BTreeMap<FamilyId, RuleSet>>,
    sink: Arc<dyn ReportSink>,
    batch: BatchConfig,
    cancel: CancelToken,
    metrics: RunMetrics,
}

impl BatchRunner {
    /// A runner using the evaluator's batch settings.
    pub fn new(
        evaluator: Arc<Evaluator>,
        rule_sets: BTreeMap<FamilyId, RuleSet>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        let batch = clamped(&evaluator.config().batch);
        Self {
            evaluator,
            rule_sets: Arc::new(rule_sets),
            sink,
            batch,
            cancel: CancelToken::new(),
            metrics: RunMetrics::new(),
        }
    }

    /// Override the batch settings. Zero values are raised to one.
    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = clamped(&batch);
        self
    }

    /// A handle that stops the run between messages.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Live counters.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Evaluate every message and write its report.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] only for operational failures: the report sink
    /// rejecting a write or flush, or a worker that could not be joined.
    pub async fn run(&self, messages: Vec<Message>) -> Result<RunSummary, BatchError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = messages.len() as u64;
        let skipped: usize = self.rule_sets.values().map(|s| s.skipped.len()).sum();
        self.metrics
            .skipped_rules
            .fetch_add(skipped as u64, Ordering::Relaxed);
        tracing::info!(
            run_id = %run_id,
            messages = total,
            families = self.rule_sets.len(),
            max_in_flight = self.batch.max_in_flight,
            "starting run"
        );

        let semaphore = Arc::new(Semaphore::new(self.batch.max_in_flight));
        let mut tasks: JoinSet<Evaluated> = JoinSet::new();
        let mut since_flush = 0usize;
        let mut cancelled = false;

        for message in messages {
            if self.cancel.is_cancelled() {
                cancelled = true;
                tracing::warn!(run_id = %run_id, "run cancelled; no further messages will be started");
                break;
            }
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| BatchError::Task(e.to_string()))?;
            let evaluator = Arc::clone(&self.evaluator);
            let rule_sets = Arc::clone(&self.rule_sets);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                evaluate_guarded(&evaluator, &rule_sets, message)
            });

            while let Some(joined) = tasks.try_join_next() {
                self.complete(joined, &mut since_flush).await?;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.complete(joined, &mut since_flush).await?;
        }
        self.flush().await?;

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total,
            cancelled,
            counts: self.metrics.snapshot(),
        };
        tracing::info!(
            run_id = %run_id,
            processed = summary.counts.processed,
            valid = summary.counts.valid,
            invalid = summary.counts.invalid,
            errored = summary.counts.errored,
            cancelled,
            "run finished"
        );
        Ok(summary)
    }

    async fn complete(
        &self,
        joined: Result<Evaluated, JoinError>,
        since_flush: &mut usize,
    ) -> Result<(), BatchError> {
        let evaluated = joined.map_err(|e| BatchError::Task(e.to_string()))?;
        self.metrics
            .record(evaluated.report.overall_valid, evaluated.errored);
        self.sink.upsert(evaluated.report)?;
        *since_flush += 1;
        if *since_flush >= self.batch.flush_every {
            *since_flush = 0;
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), BatchError> {
        let sink = Arc::clone(&self.sink);
        let written = tokio::task::spawn_blocking(move || sink.flush())
            .await
            .map_err(|e| BatchError::Task(e.to_string()))??;
        self.metrics.flushes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(written, processed = self.metrics.processed(), "flushed report sink");
        Ok(())
    }
}

fn clamped(batch: &BatchConfig) -> BatchConfig {
    BatchConfig {
        max_in_flight: batch.max_in_flight.max(1),
        flush_every: batch.flush_every.max(1),
    }
}

/// Evaluate one message, turning a panic into an error report.
fn evaluate_guarded(
    evaluator: &Evaluator,
    rule_sets: &BTreeMap<FamilyId, RuleSet>,
    message: Message,
) -> Evaluated {
    let outcome = catch_unwind(AssertUnwindSafe(|| match rule_sets.get(&message.family) {
        Some(rules) => evaluator.evaluate(&message, rules),
        None => evaluator.evaluate(&message, &RuleSet::empty(message.family.clone())),
    }));
    match outcome {
        Ok(report) => Evaluated {
            report,
            errored: false,
        },
        Err(panic) => {
            let cause = panic_message(panic.as_ref());
            tracing::error!(message_id = %message.id, family = %message.family, cause = %cause, "evaluation failed");
            Evaluated {
                report: Report::failed(
                    message.id.clone(),
                    message.family.clone(),
                    message.payload_sha256(),
                    format!("evaluation failed: {cause}"),
                ),
                errored: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn missing_family_gets_a_no_rules_report() {
        let evaluator = Evaluator::new(isodq_core::ValidatorConfig::default()).unwrap();
        let out = evaluate_guarded(
            &evaluator,
            &BTreeMap::new(),
            Message::new("m1", "<Document/>", "pain.002"),
        );
        assert!(!out.errored);
        assert!(!out.report.overall_valid);
        assert_eq!(out.report.outcomes().count(), 0);
    }
}
