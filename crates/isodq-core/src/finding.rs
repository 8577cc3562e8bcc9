//! # Findings
//!
//! A [`Finding`] is the structured result of evaluating one rule against one
//! message. It is produced by the tiered matcher and never mutated
//! afterwards.
//!
//! ## Flags on the Wire
//!
//! The report table consumers expect `0`/`1` integers for the boolean
//! columns, so the flags serialize through [`flag`]. Deserialization accepts
//! either integers or JSON booleans.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rule::RulePath;

/// Where a located element sits relative to the rule's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    /// The exact path matched.
    Correct,
    /// The element exists, but not at the exact path.
    WrongLocation,
    /// The element was not located, so there is no location to judge.
    Unknown,
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correct => write!(f, "correct"),
            Self::WrongLocation => write!(f, "wrong_location"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The matcher tier that decided a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Exact structural path evaluation on the parsed tree.
    Exact,
    /// Name-only search anywhere in the parsed tree.
    Relaxed,
    /// Tag search in the raw payload text.
    RawText,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Relaxed => write!(f, "relaxed"),
            Self::RawText => write!(f, "raw_text"),
        }
    }
}

/// How the root remapper treated the rule's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemapStrategy {
    /// A substitute container produced an exact match; the path was rewritten.
    Substitute,
    /// No substitute matched; the envelope and container segments were dropped.
    Relaxed,
}

/// Which substitute root, if any, stood in for the family's expected container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingInfo {
    /// The container name configured for the message's family.
    pub expected_root: String,
    /// The container actually used, when a substitute matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_to: Option<String>,
    /// How the path was rewritten.
    pub strategy: RemapStrategy,
    /// The path that was handed to the matcher.
    pub effective_path: RulePath,
}

/// Result of evaluating one rule against one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// The element was located by some tier.
    #[serde(with = "flag")]
    pub exists: bool,
    /// An element named like the rule's parent segment exists somewhere.
    #[serde(with = "flag")]
    pub parent_exists: bool,
    /// The located element sits under the expected parent.
    #[serde(with = "flag")]
    pub in_correct_location: bool,
    /// The family's expected top-level container is absent.
    #[serde(with = "flag")]
    pub root_missing: bool,
    /// Structural verdict on the location.
    pub location_status: LocationStatus,
    /// Local names from the document root to the located element.
    #[serde(default)]
    pub found_path: Option<RulePath>,
    /// Present when the root remapper rewrote the path.
    #[serde(default)]
    pub mapping_info: Option<MappingInfo>,
    /// Tier that produced the result, if any tier located the element.
    #[serde(default)]
    pub tier: Option<MatchTier>,
    /// Human-readable cause.
    pub reason: String,
}

impl Finding {
    /// Exact structural match at `found_path`.
    pub fn exact(found_path: RulePath, reason: impl Into<String>) -> Self {
        Self {
            exists: true,
            parent_exists: true,
            in_correct_location: true,
            root_missing: false,
            location_status: LocationStatus::Correct,
            found_path: Some(found_path),
            mapping_info: None,
            tier: Some(MatchTier::Exact),
            reason: reason.into(),
        }
    }

    /// Element located by a relaxed tier, at an unverified location.
    pub fn misplaced(
        tier: MatchTier,
        found_path: Option<RulePath>,
        in_correct_location: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            exists: true,
            parent_exists: true,
            in_correct_location,
            root_missing: false,
            location_status: LocationStatus::WrongLocation,
            found_path,
            mapping_info: None,
            tier: Some(tier),
            reason: reason.into(),
        }
    }

    /// Element not located by any tier.
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self {
            exists: false,
            parent_exists: false,
            in_correct_location: false,
            root_missing: false,
            location_status: LocationStatus::Unknown,
            found_path: None,
            mapping_info: None,
            tier: None,
            reason: reason.into(),
        }
    }
}

/// Serialize `bool` as `0`/`1`; deserialize from an integer or a boolean.
pub mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as `0` or `1`.
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bool(bool),
        Int(i64),
    }

    /// Accept `true`/`false` or any integer (non-zero is true).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Bool(b) => b,
            Repr::Int(n) => n != 0,
        })
    }
}
