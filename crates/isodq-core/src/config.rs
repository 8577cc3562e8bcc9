//! # Run Configuration
//!
//! Loaded once per run from YAML and shared read-only by every worker.
//! Every field has a default, so an absent configuration file still yields
//! a usable [`ValidatorConfig`].
//!
//! ```yaml
//! envelope: Document
//! max_depth: 256                  # deeper payloads fall back to raw text
//! structure_policy: tolerant      # or: strict
//! root_synonyms: [group, body]
//! families:
//!   pacs.008:
//!     expected_root: FIToFICstmrCdtTrf
//! batch:
//!   max_in_flight: 64
//!   flush_every: 100
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::FamilyId;

/// Whether a misplaced required element fails its rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructurePolicy {
    /// Misplacement is reported but the rule stays `ok`.
    #[default]
    Tolerant,
    /// A required element outside its expected parent is `missing`.
    Strict,
}

/// Per-family settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FamilyConfig {
    /// Name of the top-level container expected directly under the envelope.
    /// Families without one skip root remapping.
    pub expected_root: Option<String>,
}

/// Batch-runner tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Maximum number of messages evaluated concurrently.
    pub max_in_flight: usize,
    /// Flush the report sink after this many reports.
    pub flush_every: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            flush_every: 100,
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Local name of the primary envelope element.
    pub envelope: String,
    /// Deepest element nesting the parser builds a tree for.
    pub max_depth: usize,
    /// Rule-level policy for misplaced required elements.
    pub structure_policy: StructurePolicy,
    /// Container names tried as substitutes after the envelope's own children.
    pub root_synonyms: Vec<String>,
    /// Family-specific settings, keyed by family id or family-id prefix.
    pub families: BTreeMap<FamilyId, FamilyConfig>,
    /// Batch-runner tuning.
    pub batch: BatchConfig,
}

/// Nesting limit used when the configuration does not set one.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Largest nesting limit a configuration may ask for.
pub const MAX_DEPTH_CEILING: usize = 4096;

const DEFAULT_ROOTS: [(&str, &str); 8] = [
    ("pacs.002", "FIToFIPmtStsRpt"),
    ("pacs.004", "PmtRtr"),
    ("pacs.008", "FIToFICstmrCdtTrf"),
    ("pacs.009", "FICdtTrf"),
    ("pain.001", "CstmrCdtTrfInitn"),
    ("pain.002", "CstmrPmtStsRpt"),
    ("camt.053", "BkToCstmrStmt"),
    ("camt.054", "BkToCstmrDbtCdtNtfctn"),
];

impl Default for ValidatorConfig {
    fn default() -> Self {
        let families = DEFAULT_ROOTS
            .iter()
            .map(|(family, root)| {
                (
                    FamilyId::from(*family),
                    FamilyConfig {
                        expected_root: Some((*root).to_string()),
                    },
                )
            })
            .collect();
        Self {
            envelope: "Document".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            structure_policy: StructurePolicy::Tolerant,
            root_synonyms: ["group", "Group", "body", "Body", "payload", "Payload"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            families,
            batch: BatchConfig::default(),
        }
    }
}

impl ValidatorConfig {
    /// Parse YAML text and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or unknown keys and
    /// [`ConfigError::InvalidValue`] for unusable values.
    pub fn from_yaml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
                path: origin.to_string(),
                reason: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`ValidatorConfig::from_yaml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text, &path.display().to_string())
    }

    /// Check semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.envelope.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "envelope".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH_CEILING {
            return Err(ConfigError::InvalidValue {
                key: "max_depth".into(),
                reason: format!("must be between 1 and {MAX_DEPTH_CEILING}"),
            });
        }
        if self.batch.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batch.max_in_flight".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.batch.flush_every == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batch.flush_every".into(),
                reason: "must be at least 1".into(),
            });
        }
        for (family, cfg) in &self.families {
            if cfg.expected_root.as_deref().is_some_and(|r| r.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("families.{family}.expected_root"),
                    reason: "must not be empty".into(),
                });
            }
        }
        Ok(())
    }

    /// Expected top-level container for `family`.
    ///
    /// An exact key wins; otherwise the longest configured key that prefixes
    /// the family id at a `.` boundary (`pacs.008` covers `pacs.008.001.08`).
    pub fn expected_root(&self, family: &FamilyId) -> Option<&str> {
        if let Some(cfg) = self.families.get(family) {
            return cfg.expected_root.as_deref();
        }
        let id = family.as_str();
        self.families
            .iter()
            .filter(|(key, _)| {
                id.strip_prefix(key.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
            })
            .max_by_key(|(key, _)| key.as_str().len())
            .and_then(|(_, cfg)| cfg.expected_root.as_deref())
    }

    /// True when the strict structure policy is active.
    pub fn is_strict(&self) -> bool {
        self.structure_policy == StructurePolicy::Strict
    }
}
