//! # Rule Records and the Rule Normalizer
//!
//! Rule records come out of schema-derived rule generation and are not
//! uniform: the element path may sit under `path`, `xpath`, `element`, or
//! `field`, and requiredness may be expressed as `required`, `minOccurs`, or
//! `mandatory`. [`RuleRecord`] records *which* alias carried each value as an
//! explicit sum type, and [`RuleRecord::normalize`] turns it into the
//! canonical [`Rule`].
//!
//! ## Resolution Order
//!
//! Path: `path`, then `xpath`, then `element`, then `field`. Empty strings and
//! nulls fall through to the next alias.
//!
//! Requiredness: an explicit `required` key wins (even when null, which reads
//! as false); otherwise `minOccurs > 0`; otherwise a truthy `mandatory`;
//! otherwise optional.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;

// ---------------------------------------------------------------------------
// RulePath
// ---------------------------------------------------------------------------

/// An element path: ordered, non-empty sequence of local element names.
///
/// Namespace prefixes and positional predicates are stripped on parse, so
/// `/ns:Document/ns:GrpHdr[1]/ns:MsgId` and `/Document/GrpHdr/MsgId` are the
/// same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RulePath {
    segments: Vec<String>,
}

impl RulePath {
    /// Parse a slash-separated path.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::EmptyPath`] if no element segment survives
    /// normalization.
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let segments: Vec<String> = text
            .split('/')
            .map(normalize_segment)
            .filter(|s| !s.is_empty() && s != ".")
            .collect();
        if segments.is_empty() {
            return Err(RuleError::EmptyPath(text.to_string()));
        }
        Ok(Self { segments })
    }

    /// Build a path from already-normalized segments.
    ///
    /// Returns `None` for an empty segment list.
    pub fn from_segments(segments: Vec<String>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// All segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (always at least one).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; a `RulePath` has at least one segment.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The final segment: the element the rule is about.
    pub fn leaf(&self) -> &str {
        // Non-empty by construction.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The second-to-last segment, if the path has one.
    pub fn parent(&self) -> Option<&str> {
        if self.segments.len() < 2 {
            return None;
        }
        self.segments.get(self.segments.len() - 2).map(String::as_str)
    }

    /// The first segment (the envelope for absolute message paths).
    pub fn head(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    /// Segment at `index`, if present.
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// A copy of this path with the segment at `index` replaced.
    ///
    /// Returns an unchanged copy when `index` is out of range.
    pub fn with_segment(&self, index: usize, name: &str) -> Self {
        let mut segments = self.segments.clone();
        if let Some(slot) = segments.get_mut(index) {
            *slot = name.to_string();
        }
        Self { segments }
    }

    /// A copy of this path without its first `count` segments.
    ///
    /// Returns `None` if nothing would remain.
    pub fn without_leading(&self, count: usize) -> Option<Self> {
        Self::from_segments(self.segments.iter().skip(count).cloned().collect())
    }

    /// Position of the first segment equal to `name`.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.segments.iter().position(|s| s == name)
    }
}

fn normalize_segment(raw: &str) -> String {
    let raw = raw.trim();
    let without_predicate = match raw.find('[') {
        Some(i) => &raw[..i],
        None => raw,
    };
    let local = match without_predicate.rfind(':') {
        Some(i) => &without_predicate[i + 1..],
        None => without_predicate,
    };
    local.to_string()
}

impl fmt::Display for RulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for RulePath {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RulePath> for String {
    fn from(path: RulePath) -> Self {
        path.to_string()
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// Canonical rule: a path and whether the element it names is required.
///
/// Immutable once normalized. One rule set per family is shared read-only
/// across every message of that family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Normalized element path.
    pub path: RulePath,
    /// The path text exactly as the rule record gave it; echoed in reports.
    pub source_path: String,
    /// Whether a missing element makes the message invalid.
    pub required: bool,
}

impl Rule {
    /// Build a rule from a path string.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::EmptyPath`] for a path without element segments.
    pub fn new(path: &str, required: bool) -> Result<Self, RuleError> {
        Ok(Self {
            path: RulePath::parse(path)?,
            source_path: path.to_string(),
            required,
        })
    }
}

// ---------------------------------------------------------------------------
// RuleRecord
// ---------------------------------------------------------------------------

/// Which alias key supplied the rule's path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSource {
    /// `path` key.
    Path(String),
    /// `xpath` key.
    XPath(String),
    /// `element` key.
    Element(String),
    /// `field` key.
    Field(String),
}

impl PathSource {
    /// The path text regardless of alias.
    pub fn text(&self) -> &str {
        match self {
            Self::Path(s) | Self::XPath(s) | Self::Element(s) | Self::Field(s) => s,
        }
    }
}

/// Which alias key (if any) supplied the rule's requiredness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirednessSource {
    /// Explicit `required` flag, already reduced to a boolean.
    Required(bool),
    /// `minOccurs`; `None` when the value was not an integer.
    MinOccurs(Option<i64>),
    /// `mandatory` flag, already reduced to a boolean.
    Mandatory(bool),
    /// No requiredness key present.
    Unspecified,
}

impl RequirednessSource {
    /// Resolve to a boolean. Unparseable `minOccurs` reads as optional.
    pub fn is_required(&self) -> bool {
        match self {
            Self::Required(b) | Self::Mandatory(b) => *b,
            Self::MinOccurs(n) => n.is_some_and(|n| n > 0),
            Self::Unspecified => false,
        }
    }
}

/// A raw rule record with its alias choices made explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    /// Path alias and value, if any path-like key carried a usable value.
    pub path: Option<PathSource>,
    /// Requiredness alias and value.
    pub requiredness: RequirednessSource,
}

const PATH_KEYS: [&str; 4] = ["path", "xpath", "element", "field"];

impl RuleRecord {
    /// Classify a JSON rule record.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::NotAnObject`] if `value` is not a JSON object.
    pub fn from_value(value: &Value) -> Result<Self, RuleError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RuleError::NotAnObject(json_kind(value).to_string()))?;

        let path = PATH_KEYS.iter().find_map(|key| {
            let text = obj.get(*key).and_then(path_text)?;
            Some(match *key {
                "path" => PathSource::Path(text),
                "xpath" => PathSource::XPath(text),
                "element" => PathSource::Element(text),
                _ => PathSource::Field(text),
            })
        });

        let requiredness = if let Some(v) = obj.get("required") {
            RequirednessSource::Required(truthy(v))
        } else if let Some(v) = obj.get("minOccurs") {
            RequirednessSource::MinOccurs(as_integer(v))
        } else if let Some(v) = obj.get("mandatory") {
            RequirednessSource::Mandatory(truthy(v))
        } else {
            RequirednessSource::Unspecified
        };

        Ok(Self { path, requiredness })
    }

    /// Canonicalize into a [`Rule`].
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MissingPath`] when no path-like key was present,
    /// or [`RuleError::EmptyPath`] when the path has no segments.
    pub fn normalize(&self) -> Result<Rule, RuleError> {
        let source = self.path.as_ref().ok_or(RuleError::MissingPath)?;
        Rule::new(source.text(), self.requiredness.is_required())
    }
}

fn path_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Loose truthiness for flags produced by heterogeneous generators.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "false" | "0" | "no" | "n" | "off"
        ),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn record_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9/:_ ]{0,20}".prop_map(Value::String),
        ];
        prop::collection::btree_map(
            prop_oneof![
                Just("path".to_string()),
                Just("xpath".to_string()),
                Just("element".to_string()),
                Just("field".to_string()),
                Just("required".to_string()),
                Just("minOccurs".to_string()),
                Just("mandatory".to_string()),
                "[a-z]{1,6}",
            ],
            leaf,
            0..6,
        )
        .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    proptest! {
        /// Normalization is total: every object yields a rule or a RuleError.
        #[test]
        fn normalize_never_panics(value in record_value()) {
            let record = RuleRecord::from_value(&value).unwrap();
            let _ = record.normalize();
        }

        /// A normalized rule always has a non-empty path.
        #[test]
        fn normalized_paths_are_non_empty(value in record_value()) {
            if let Ok(rule) = RuleRecord::from_value(&value).unwrap().normalize() {
                prop_assert!(rule.path.len() >= 1);
                prop_assert!(!rule.path.leaf().is_empty());
            }
        }
    }
}
