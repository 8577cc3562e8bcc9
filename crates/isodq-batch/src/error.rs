//! Batch runner errors.

use isodq_store::StoreError;
use thiserror::Error;

/// Operational failure that stops a run.
///
/// Per-message evaluation failures are not errors here; they become error
/// reports and the run continues.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Reading inputs or writing reports failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A background task could not be joined.
    #[error("task failed: {0}")]
    Task(String),
}
