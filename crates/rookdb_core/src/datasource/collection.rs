//! Collections and their load-state machine.

use crate::types::DataSourceId;
use parking_lot::lock_api::ArcRwLockReadGuard;
use parking_lot::{RawRwLock, RwLock};
use rookdb_storage::SourceDescriptor;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Load state of a collection.
///
/// `Deleted` and `Corrupted` are terminal. All transitions happen under the
/// collection's status lock; the physical open runs with the lock released
/// while the status reads `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// Physical state not opened; the initial state.
    Unloaded,
    /// A thread is opening the physical state.
    Loading,
    /// Ready for use.
    Loaded,
    /// A thread is closing the physical state.
    Unloading,
    /// Dropped; terminal.
    Deleted,
    /// The physical open failed; terminal.
    Corrupted,
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Unloading => "unloading",
            Self::Deleted => "deleted",
            Self::Corrupted => "corrupted",
        };
        f.write_str(name)
    }
}

/// Status word guarded by the per-collection status lock.
#[derive(Debug)]
pub(crate) struct StatusInner {
    /// Current load state.
    pub(crate) status: CollectionStatus,
    /// Set exactly once when a drop begins; reversible only until the
    /// deleted marker has been persisted.
    pub(crate) deleted: bool,
}

/// Parameters for creating a collection.
#[derive(Debug, Clone)]
pub struct CollectionParameters {
    /// Name of the new collection.
    pub name: String,
    /// Explicit identifier; assigned from the tick counter when `None`.
    /// Supplying one supports importing dumps from other servers.
    pub id: Option<DataSourceId>,
    /// Explicit globally-unique id; generated when `None`.
    pub uuid: Option<Uuid>,
    /// Whether a system name (leading underscore) is permitted.
    pub is_system: bool,
}

impl CollectionParameters {
    /// Creates parameters for a non-system collection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            uuid: None,
            is_system: false,
        }
    }

    /// Marks the collection as a system collection.
    #[must_use]
    pub const fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    /// Sets an explicit identifier.
    #[must_use]
    pub const fn with_id(mut self, id: DataSourceId) -> Self {
        self.id = Some(id);
        self
    }
}

/// A document collection.
///
/// The name is mutable (rename); the status and the deleted flag live under
/// the status lock. Shared between the registry indices, active list, and
/// any number of users holding [`CollectionGuard`]s.
pub struct Collection {
    id: DataSourceId,
    uuid: Uuid,
    database: String,
    name: RwLock<String>,
    is_system: bool,
    status: Arc<RwLock<StatusInner>>,
}

impl Collection {
    /// Allocates a new collection in the `Unloaded` state.
    pub(crate) fn new(
        database: String,
        id: DataSourceId,
        uuid: Uuid,
        name: String,
        is_system: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            uuid,
            database,
            name: RwLock::new(name),
            is_system,
            status: Arc::new(RwLock::new(StatusInner {
                status: CollectionStatus::Unloaded,
                deleted: false,
            })),
        })
    }

    /// Identifier of the collection.
    #[must_use]
    pub fn id(&self) -> DataSourceId {
        self.id
    }

    /// Globally-unique id of the collection.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Current name of the collection.
    #[must_use]
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Whether this is a system collection.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Current load state.
    #[must_use]
    pub fn status(&self) -> CollectionStatus {
        self.status.read().status
    }

    /// Whether a drop has begun for this collection.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.status.read().deleted
    }

    /// Descriptor for crossing the storage boundary, carrying the current
    /// name.
    #[must_use]
    pub fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            database: self.database.clone(),
            id: self.id.as_u64(),
            name: self.name(),
            uuid: Some(self.uuid),
            is_system: self.is_system,
        }
    }

    /// The status lock; lifecycle code takes read/write guards on it.
    pub(crate) fn status_cell(&self) -> &Arc<RwLock<StatusInner>> {
        &self.status
    }

    /// Replaces the name. Caller must hold the registry write lock and have
    /// already moved the index entries.
    pub(crate) fn set_name(&self, name: String) {
        *self.name.write() = name;
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// A collection held for usage.
///
/// Holds the collection's status read lock, pinning the status at `Loaded`;
/// dropping the guard releases the collection.
pub struct CollectionGuard {
    collection: Arc<Collection>,
    _status: ArcRwLockReadGuard<RawRwLock, StatusInner>,
}

impl CollectionGuard {
    pub(crate) fn new(
        collection: Arc<Collection>,
        status: ArcRwLockReadGuard<RawRwLock, StatusInner>,
    ) -> Self {
        Self {
            collection,
            _status: status,
        }
    }

    /// The underlying collection handle.
    #[must_use]
    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }
}

impl Deref for CollectionGuard {
    type Target = Collection;

    fn deref(&self) -> &Self::Target {
        &self.collection
    }
}

impl fmt::Debug for CollectionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionGuard")
            .field("name", &self.collection.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_collection_is_unloaded() {
        let collection = Collection::new(
            "db".to_owned(),
            DataSourceId::new(1),
            Uuid::new_v4(),
            "users".to_owned(),
            false,
        );
        assert_eq!(collection.status(), CollectionStatus::Unloaded);
        assert!(!collection.is_deleted());
    }

    #[test]
    fn descriptor_sees_renames() {
        let collection = Collection::new(
            "db".to_owned(),
            DataSourceId::new(1),
            Uuid::new_v4(),
            "users".to_owned(),
            false,
        );
        collection.set_name("people".to_owned());
        assert_eq!(collection.descriptor().name, "people");
    }
}
