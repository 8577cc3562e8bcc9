//! Store errors.

use std::path::PathBuf;

use thiserror::Error;

/// Error reading inputs or writing reports.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("io error on '{}': {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A report could not be encoded or decoded.
    #[error("json error on '{}': {source}", path.display())]
    Json {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A configured location is not a directory.
    #[error("not a directory: '{}'", .0.display())]
    NotADirectory(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
