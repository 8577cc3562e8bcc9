//! # Rule-Set Documents
//!
//! The rule store holds one document per family. Three shapes occur in
//! practice and all are accepted:
//!
//! ```text
//! {"rules": [ {...}, {...} ]}                    wrapped list (stored form)
//! [ {...}, {...} ]                               bare list
//! {"/Document/GrpHdr/MsgId": {"minOccurs": 1}}   schema-derived metadata map
//! ```
//!
//! Each record goes through [`RuleRecord::normalize`]. Records that fail are
//! kept as [`SkippedRule`] entries so the caller can log them; they never
//! abort the rest of the set.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IsodqError;
use crate::identity::FamilyId;
use crate::rule::{Rule, RuleRecord};

/// A parsed rule-set document before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSetDocument {
    /// `{"rules": [...]}`.
    Wrapped(Vec<Value>),
    /// A bare JSON array of records.
    List(Vec<Value>),
    /// Path-keyed metadata map; each value is the record minus its path.
    Metadata(Map<String, Value>),
}

impl RuleSetDocument {
    /// Classify a JSON value.
    ///
    /// An object whose `rules` key is present but not an array is treated as
    /// an empty wrapped list. Scalars are an empty list.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items),
            Value::Object(mut obj) => match obj.remove("rules") {
                Some(Value::Array(items)) => Self::Wrapped(items),
                Some(_) => Self::Wrapped(Vec::new()),
                None => Self::Metadata(obj),
            },
            _ => Self::List(Vec::new()),
        }
    }

    /// Parse JSON text.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for text that is not JSON.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Value>(text).map(Self::from_value)
    }

    /// Flatten into rule records in document order.
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::Wrapped(items) | Self::List(items) => items,
            Self::Metadata(map) => map
                .into_iter()
                .map(|(path, info)| {
                    let mut record = match info {
                        Value::Object(obj) => obj,
                        _ => Map::new(),
                    };
                    record.insert("path".to_string(), Value::String(path));
                    Value::Object(record)
                })
                .collect(),
        }
    }
}

/// A rule record that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRule {
    /// Zero-based position of the record in the document.
    pub index: usize,
    /// Why the record was skipped.
    pub reason: String,
}

/// The normalized rules of one family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Family these rules apply to.
    pub family: FamilyId,
    /// Normalized rules, in document order.
    pub rules: Vec<Rule>,
    /// Records that were skipped during normalization.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRule>,
}

impl RuleSet {
    /// Normalize every record of `document`.
    pub fn from_document(family: FamilyId, document: RuleSetDocument) -> Self {
        let mut rules = Vec::new();
        let mut skipped = Vec::new();
        for (index, value) in document.into_records().iter().enumerate() {
            match RuleRecord::from_value(value).and_then(|r| r.normalize()) {
                Ok(rule) => rules.push(rule),
                Err(e) => skipped.push(SkippedRule {
                    index,
                    reason: e.to_string(),
                }),
            }
        }
        Self {
            family,
            rules,
            skipped,
        }
    }

    /// Read and normalize a single rule-set file.
    ///
    /// # Errors
    ///
    /// Returns [`IsodqError::Io`] if the file cannot be read. Content that is
    /// not JSON is not an error, as with [`RuleSet::from_json`].
    pub fn load(family: FamilyId, path: &Path) -> Result<Self, IsodqError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json(family, &text))
    }

    /// Parse and normalize JSON text. Text that is not JSON yields an empty
    /// set with a single skipped entry describing the parse error.
    pub fn from_json(family: FamilyId, text: &str) -> Self {
        match RuleSetDocument::parse(text) {
            Ok(doc) => Self::from_document(family, doc),
            Err(e) => Self {
                family,
                rules: Vec::new(),
                skipped: vec![SkippedRule {
                    index: 0,
                    reason: format!("rule-set document is not valid JSON: {e}"),
                }],
            },
        }
    }

    /// An empty rule set.
    pub fn empty(family: FamilyId) -> Self {
        Self {
            family,
            rules: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// True if there are no usable rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrapped_list_is_normalized_in_order() {
        let set = RuleSet::from_json(
            FamilyId::from("pacs.008"),
            r#"{"rules": [
                {"path": "/Document/GrpHdr/MsgId", "required": true},
                {"xpath": "/Document/GrpHdr/CreDtTm", "minOccurs": 0}
            ]}"#,
        );
        assert_eq!(set.rules.len(), 2);
        assert!(set.rules[0].required);
        assert!(!set.rules[1].required);
        assert!(set.skipped.is_empty());
    }

    #[test]
    fn metadata_map_keys_become_paths() {
        let doc = RuleSetDocument::from_value(json!({
            "/Document/GrpHdr/MsgId": {"required": true, "type": "Max35Text", "maxOccurs": "1"},
            "/Document/GrpHdr/NbOfTxs": {"minOccurs": 1}
        }));
        let set = RuleSet::from_document(FamilyId::from("pacs.008"), doc);
        assert_eq!(set.rules.len(), 2);
        assert!(set.rules.iter().all(|r| r.required));
    }

    #[test]
    fn bad_records_are_skipped_not_fatal() {
        let set = RuleSet::from_json(
            FamilyId::from("pacs.008"),
            r#"[{"required": true}, "oops", {"path": "/A/B"}]"#,
        );
        assert_eq!(set.rules.len(), 1);
        assert_eq!(set.skipped.len(), 2);
        assert_eq!(set.skipped[0].index, 0);
        assert_eq!(set.skipped[1].index, 1);
    }

    #[test]
    fn non_json_document_yields_empty_set() {
        let set = RuleSet::from_json(FamilyId::from("pacs.008"), "{not json");
        assert!(set.is_empty());
        assert_eq!(set.skipped.len(), 1);
    }

    #[test]
    fn non_array_rules_key_is_empty() {
        let set = RuleSet::from_json(FamilyId::from("x"), r#"{"rules": null}"#);
        assert!(set.is_empty());
        assert!(set.skipped.is_empty());
    }
}
