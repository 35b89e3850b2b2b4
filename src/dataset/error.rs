//! Error types for dataset parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Whole-file parse failures. Malformed individual records are not errors;
/// they are counted in [`SkipCounts`](super::SkipCounts).
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The document cannot be used at all.
    #[error("unusable dataset: {reason}")]
    Fatal {
        /// What is wrong with the document.
        reason: String,
    },

    /// The data file could not be read.
    #[error("failed to read dataset {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DatasetError {
    /// Creates a fatal error.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }
}
