//! # Run Metrics
//!
//! In-process atomic counters shared between the runner and its tasks.
//! A [`RunCounts`] snapshot is what the operator sees at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Shared run counters.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Messages whose report has been handed to the sink.
    pub processed: Arc<AtomicU64>,
    /// Processed messages with an overall valid report.
    pub valid: Arc<AtomicU64>,
    /// Processed messages with an invalid report, errored ones included.
    pub invalid: Arc<AtomicU64>,
    /// Messages whose evaluation panicked outside any single rule.
    pub errored: Arc<AtomicU64>,
    /// Rule records skipped while loading rule sets.
    pub skipped_rules: Arc<AtomicU64>,
    /// Completed sink flushes.
    pub flushes: Arc<AtomicU64>,
}

impl RunMetrics {
    /// Fresh counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished message.
    pub fn record(&self, overall_valid: bool, errored: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if errored {
            self.errored.fetch_add(1, Ordering::Relaxed);
        }
        if overall_valid {
            self.valid.fetch_add(1, Ordering::Relaxed);
        } else {
            self.invalid.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current processed count.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> RunCounts {
        RunCounts {
            processed: self.processed.load(Ordering::Relaxed),
            valid: self.valid.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            skipped_rules: self.skipped_rules.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Messages with a report upserted.
    pub processed: u64,
    /// Reports with `overall_valid = true`.
    pub valid: u64,
    /// Reports with `overall_valid = false`, error reports included.
    pub invalid: u64,
    /// Messages whose evaluation failed and got an error report.
    pub errored: u64,
    /// Rule records skipped across all loaded rule sets.
    pub skipped_rules: u64,
    /// Sink flushes performed.
    pub flushes: u64,
}
