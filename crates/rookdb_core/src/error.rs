//! Error types for catalog operations.

use crate::types::DataSourceId;
use thiserror::Error;
use uuid::Uuid;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur in catalog operations.
///
/// "Not found" on lookup paths is reported as `Option::None`, not as an
/// error, so idempotent drop paths stay simple; [`CatalogError::NotFound`]
/// is reserved for operations that were asked to act on a specific object.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A data source with the same name already exists.
    #[error("duplicate name '{name}'")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// A data source with the same identifier already exists.
    #[error("duplicate identifier {id} for name '{name}'")]
    DuplicateIdentifier {
        /// The conflicting identifier.
        id: DataSourceId,
        /// Name of the data source being registered.
        name: String,
    },

    /// A collection with the same globally-unique id already exists.
    #[error("duplicate uuid '{uuid}' for name '{name}'")]
    DuplicateUuid {
        /// The conflicting uuid.
        uuid: Uuid,
        /// Name of the collection being registered.
        name: String,
    },

    /// The requested name violates the naming rules.
    #[error("illegal data source name '{name}'")]
    IllegalName {
        /// The offending name.
        name: String,
    },

    /// The data source does not exist (or was concurrently dropped).
    #[error("data source '{name}' not found")]
    NotFound {
        /// Name or key that failed to resolve.
        name: String,
    },

    /// The operation is not permitted on this data source.
    #[error("operation forbidden on '{name}'")]
    Forbidden {
        /// Name of the protected data source.
        name: String,
    },

    /// The collection is still loading and the server is configured to
    /// surface this instead of blocking.
    #[error("collection '{name}' not loaded")]
    NotLoaded {
        /// Name of the loading collection.
        name: String,
    },

    /// The collection's physical state failed to open; terminal.
    #[error("collection '{name}' is corrupted")]
    Corrupted {
        /// Name of the corrupted collection.
        name: String,
    },

    /// Both required locks could not be acquired within the timeout.
    /// No state has been mutated; the operation is safe to retry.
    #[error("lock timeout while dropping '{name}'")]
    LockTimeout {
        /// Name of the contended data source.
        name: String,
    },

    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] rookdb_storage::StorageError),

    /// Defensive catch-all for bookkeeping violations; should be unreachable.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violation.
        message: String,
    },
}

impl CatalogError {
    /// Creates a duplicate-name error.
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Creates a duplicate-identifier error.
    pub fn duplicate_identifier(id: DataSourceId, name: impl Into<String>) -> Self {
        Self::DuplicateIdentifier {
            id,
            name: name.into(),
        }
    }

    /// Creates a duplicate-uuid error.
    pub fn duplicate_uuid(uuid: Uuid, name: impl Into<String>) -> Self {
        Self::DuplicateUuid {
            uuid,
            name: name.into(),
        }
    }

    /// Creates an illegal-name error.
    pub fn illegal_name(name: impl Into<String>) -> Self {
        Self::IllegalName { name: name.into() }
    }

    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a forbidden error.
    pub fn forbidden(name: impl Into<String>) -> Self {
        Self::Forbidden { name: name.into() }
    }

    /// Creates a not-loaded error.
    pub fn not_loaded(name: impl Into<String>) -> Self {
        Self::NotLoaded { name: name.into() }
    }

    /// Creates a corrupted-collection error.
    pub fn corrupted(name: impl Into<String>) -> Self {
        Self::Corrupted { name: name.into() }
    }

    /// Creates a lock-timeout error.
    pub fn lock_timeout(name: impl Into<String>) -> Self {
        Self::LockTimeout { name: name.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
