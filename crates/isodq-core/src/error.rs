//! # Error Types: Structured Error Hierarchy
//!
//! Defines the error types used throughout the workspace. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Rule defects are reported per record and never abort a rule set.
//! - Configuration errors name the file and the offending key.
//! - Malformed message payloads are not errors at all: the parser reports a
//!   repair status and the matcher degrades to raw-text search.

use thiserror::Error;

/// Top-level error type for the workspace.
#[derive(Error, Debug)]
pub enum IsodqError {
    /// A rule record could not be normalized.
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// The run configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error while normalizing a single rule record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// None of the path-like keys (`path`, `xpath`, `element`, `field`)
    /// carried a usable value.
    #[error("invalid rule: no path-like key (path/xpath/element/field) present")]
    MissingPath,

    /// A path key was present but contained no element segments.
    #[error("invalid rule: path '{0}' has no element segments")]
    EmptyPath(String),

    /// The record is not a JSON object.
    #[error("invalid rule: expected an object, found {0}")]
    NotAnObject(String),
}

/// Error loading or validating the run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration '{path}': {source}")]
    Read {
        /// Path of the configuration file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for `ValidatorConfig`.
    #[error("invalid configuration '{path}': {reason}")]
    Parse {
        /// Path of the configuration file.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// A value is syntactically valid but semantically unusable.
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue {
        /// Dotted key of the offending value.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}
