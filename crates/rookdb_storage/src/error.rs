//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Opening a data source failed because its on-disk state is damaged.
    #[error("datafiles corrupted for '{name}': {detail}")]
    Corrupted {
        /// Name of the affected data source.
        name: String,
        /// Description of the damage.
        detail: String,
    },

    /// Persisting metadata for a data source failed.
    #[error("failed to persist '{name}': {detail}")]
    PersistFailed {
        /// Name of the affected data source.
        name: String,
        /// Description of the failure.
        detail: String,
    },

    /// Renaming a data source failed.
    #[error("failed to rename '{old_name}': {detail}")]
    RenameFailed {
        /// Name the data source had before the rename.
        old_name: String,
        /// Description of the failure.
        detail: String,
    },

    /// The engine has already been shut down.
    #[error("storage engine is shut down")]
    ShutDown,
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Corrupted {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Creates a persist failure.
    pub fn persist_failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::PersistFailed {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Creates a rename failure.
    pub fn rename_failed(old_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::RenameFailed {
            old_name: old_name.into(),
            detail: detail.into(),
        }
    }
}
