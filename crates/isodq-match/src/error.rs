//! Errors raised inside the matcher.
//!
//! None of these reach the report: a tier that fails is skipped and the next
//! tier runs. Only [`MatchError::Envelope`] surfaces, at construction time.

use thiserror::Error;

/// Matcher error.
#[derive(Error, Debug)]
pub enum MatchError {
    /// A tree-based tier was asked to run without a parsed document.
    #[error("tier requires a parsed document")]
    NoDocument,

    /// A tier hit a condition it cannot evaluate.
    #[error("{tier} tier failed: {reason}")]
    Tier {
        /// Tier name.
        tier: String,
        /// What went wrong.
        reason: String,
    },

    /// The configured envelope name does not yield a usable tag matcher.
    #[error("invalid envelope name '{name}': {source}")]
    Envelope {
        /// Configured envelope name.
        name: String,
        /// Regex compilation error.
        #[source]
        source: regex::Error,
    },
}
