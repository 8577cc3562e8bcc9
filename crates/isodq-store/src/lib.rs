//! # isodq-store: Input and Output Stores
//!
//! The matcher does not care where messages, rules, and reports live. This
//! crate defines the three collaborator contracts and two implementations:
//!
//! | Contract          | Operation                          | Memory          | Filesystem          |
//! |-------------------|------------------------------------|-----------------|---------------------|
//! | [`MessageSource`] | read every message up front        | [`MemoryStore`] | [`FsMessageSource`] |
//! | [`RuleSource`]    | read every family's rule set       | [`MemoryStore`] | [`FsRuleSource`]    |
//! | [`ReportSink`]    | upsert by message id, flush        | [`MemoryStore`] | [`FsReportSink`]    |
//!
//! ## Upsert Semantics
//!
//! A report is handed to the sink only once fully assembled, and a later
//! report for the same message id replaces the earlier one. A run stopped
//! between messages leaves every flushed report intact.

pub mod error;
pub mod fs;
pub mod memory;

use std::collections::BTreeMap;

use isodq_core::{FamilyId, Message, Report, RuleSet};

pub use error::StoreError;
pub use fs::{message_id_from_stem, FsMessageSource, FsReportSink, FsRuleSource};
pub use memory::{KeyedStore, MemoryStore};

/// Bulk read of source messages.
pub trait MessageSource {
    /// Every message in the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    fn read_all_messages(&self) -> Result<Vec<Message>, StoreError>;
}

/// Bulk read of normalized rule sets.
pub trait RuleSource {
    /// Rule sets keyed by family.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read. Individual
    /// malformed rule documents are not errors; they yield empty sets.
    fn read_rule_sets(&self) -> Result<BTreeMap<FamilyId, RuleSet>, StoreError>;
}

/// Keyed report output.
pub trait ReportSink: Send + Sync {
    /// Insert or replace the report for `report.message_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the report cannot be accepted.
    fn upsert(&self, report: Report) -> Result<(), StoreError>;

    /// Make every accepted report durable. Returns how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on the first report that cannot be written;
    /// reports written before it stay written.
    fn flush(&self) -> Result<usize, StoreError>;
}
