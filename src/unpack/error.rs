//! Error types for archive unpacking.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while unpacking one fetched archive.
#[derive(Debug, Error)]
pub enum UnpackError {
    /// The archive is recognizably a ZIP but cannot be read.
    #[error("corrupt archive {archive}: {reason}")]
    Corrupt {
        /// Archive that failed.
        archive: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Neither a ZIP nor a bare JSON document.
    #[error("unsupported archive format: {archive}")]
    UnsupportedFormat {
        /// Archive that failed.
        archive: PathBuf,
    },

    /// File system error.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The archive holds no extractable file.
    #[error("archive {archive} contains no files")]
    EmptyArchive {
        /// Archive that failed.
        archive: PathBuf,
    },

    /// The blocking extraction task panicked.
    #[error("unpack task for {archive} panicked: {message}")]
    TaskPanicked {
        /// Archive being unpacked.
        archive: PathBuf,
        /// Join error text.
        message: String,
    },
}

impl UnpackError {
    /// Creates a corrupt archive error.
    pub fn corrupt(archive: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            archive: archive.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
