//! # isodq-match: Tolerant Structural Matching
//!
//! Decides, for each rule of a message's family, whether the rule's element
//! exists, where it actually lives, and whether that location is correct.
//!
//! ## Pipeline
//!
//! ```text
//! payload ──parse──▶ tree? + repair status + raw tag scan
//!                          │
//!        rule path ──remap─┤  (substitute or drop a missing container)
//!                          ▼
//!              exact ▶ relaxed ▶ raw-text      (first hit wins)
//!                          │
//!                          ▼
//!              verdict per policy ──▶ Report
//! ```
//!
//! ## Crate Policy
//!
//! - Matching never returns an error to the caller. Malformed input degrades
//!   to the next tier or to `exists = 0`, and a panic inside one rule's
//!   evaluation becomes that rule's finding.
//! - No shared mutable state: an [`Evaluator`] can be shared by reference
//!   across threads.

pub mod aggregate;
pub mod error;
pub mod evaluate;
pub mod matcher;
pub mod remap;
pub mod strategy;

pub use aggregate::ReportAggregator;
pub use error::MatchError;
pub use evaluate::{panic_message, Evaluator};
pub use matcher::{MessageView, TieredMatcher};
pub use remap::{Remap, RootRemapper, Structure};
pub use strategy::{ExactTier, MatchContext, MatchStrategy, RawTextTier, RelaxedTier};
