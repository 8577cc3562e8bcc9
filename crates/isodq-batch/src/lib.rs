//! # isodq-batch: Batch Runner
//!
//! Drives a whole run: every message is evaluated against its family's rule
//! set and the report is upserted into a [`ReportSink`](isodq_store::ReportSink).
//!
//! ## Crate Policy
//!
//! - Messages run in parallel; the rules of one message run in order.
//! - One message failing never stops the run. Only sink and task failures
//!   surface as [`BatchError`].
//! - The in-flight bound and flush cadence come from
//!   [`BatchConfig`](isodq_core::BatchConfig).

pub mod error;
pub mod metrics;
pub mod runner;

pub use error::BatchError;
pub use metrics::{RunCounts, RunMetrics};
pub use runner::{BatchRunner, CancelToken, RunSummary};
