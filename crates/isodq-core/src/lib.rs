//! # isodq-core: Foundational Types for Message Data-Quality Checks
//!
//! This crate defines the vocabulary shared by every other `isodq-*` crate:
//! what a rule is, what a message is, what a finding and a report look like,
//! and how a run is configured. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `MessageId` and `FamilyId` are
//!    distinct types. A family id cannot be passed where a message id is
//!    expected.
//!
//! 2. **One canonicalization function for rule records.** Rule records arrive
//!    with several alias keys (`path`/`xpath`/`element`/`field`,
//!    `required`/`minOccurs`/`mandatory`). [`RuleRecord`] captures which alias
//!    was used as a sum type, and [`RuleRecord::normalize`] is the single place
//!    where the precedence between them is decided.
//!
//! 3. **Findings are data, not errors.** A misplaced or missing element is a
//!    first-class [`Finding`], never an `Err`.
//!
//! 4. **Reports always carry the repair status.** Downstream consumers weight
//!    findings from a `REPAIRED` document lower than from an `OK` one.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `isodq-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod error;
pub mod finding;
pub mod identity;
pub mod message;
pub mod report;
pub mod rule;
pub mod ruleset;

// Re-export primary types for ergonomic imports.
pub use config::{
    BatchConfig, FamilyConfig, StructurePolicy, ValidatorConfig, DEFAULT_MAX_DEPTH,
    MAX_DEPTH_CEILING,
};
pub use error::{ConfigError, IsodqError, RuleError};
pub use finding::{Finding, LocationStatus, MappingInfo, MatchTier, RemapStrategy};
pub use identity::{FamilyId, MessageId};
pub use message::Message;
pub use report::{RepairStatus, Report, ReportEntry, RuleOutcome, Validity};
pub use rule::{PathSource, RequirednessSource, Rule, RulePath, RuleRecord};
pub use ruleset::{RuleSet, RuleSetDocument, SkippedRule};
