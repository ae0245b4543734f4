//! Storage engine trait definition.

use crate::error::StorageResult;
use uuid::Uuid;

/// Identity of a data source as seen by a storage engine.
///
/// The catalog core builds a descriptor from its in-memory object every time
/// it crosses the storage boundary, so engines always see the current name
/// even when a concurrent rename is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Database the data source belongs to.
    pub database: String,
    /// Identifier, unique within the database.
    pub id: u64,
    /// Current name.
    pub name: String,
    /// Globally unique id. `None` for views.
    pub uuid: Option<Uuid>,
    /// Whether this is a system data source.
    pub is_system: bool,
}

/// The physical persistence collaborator of the catalog core.
///
/// Engines are **opaque to the core**: the core does not know how data is
/// laid out on disk, only that these calls either succeed or fail. Every call
/// may block on I/O, so the core only issues them while holding fine-grained
/// per-object locks, never a registry-wide one.
///
/// # Invariants
///
/// - `open_collection` either makes the collection usable or fails; a failed
///   open leaves no half-open state behind
/// - `change_collection` persists the current metadata (including the
///   deleted marker) atomically
/// - `rename_collection`/`rename_view` receive the descriptor with the *new*
///   name plus the old name separately
///
/// # Implementors
///
/// - [`super::MemoryEngine`] - For testing
pub trait StorageEngine: Send + Sync {
    /// Merges engine-specific defaults into creation parameters.
    ///
    /// Called before a collection object is allocated. Engines may assign
    /// ids, paths, or format options here. The default does nothing.
    fn augment_collection_parameters(&self, _desc: &mut SourceDescriptor) {}

    /// Opens the physical state of a collection.
    ///
    /// This call may be slow (disk activity, index builds). With
    /// `ignore_errors` set, recoverable datafile damage is skipped instead
    /// of reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the datafiles cannot be opened; the core then
    /// marks the collection corrupted.
    fn open_collection(&self, desc: &SourceDescriptor, ignore_errors: bool) -> StorageResult<()>;

    /// Closes the physical state of a collection, releasing its resources.
    fn close_collection(&self, desc: &SourceDescriptor);

    /// Persists a freshly created collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be written.
    fn persist_collection(&self, desc: &SourceDescriptor) -> StorageResult<()>;

    /// Persists a freshly created view.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be written.
    fn persist_view(&self, desc: &SourceDescriptor) -> StorageResult<()>;

    /// Persists changed collection metadata, including the deleted marker.
    ///
    /// With `sync` set the change is flushed to durable storage before the
    /// call returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be written; the core rolls
    /// back the in-memory change.
    fn change_collection(&self, desc: &SourceDescriptor, sync: bool) -> StorageResult<()>;

    /// Physically drops a collection. Infallible by contract; engines retry
    /// or defer internally.
    fn drop_collection(&self, desc: &SourceDescriptor);

    /// Physically drops a view.
    fn drop_view(&self, desc: &SourceDescriptor);

    /// Persists a collection rename. `desc` carries the new name.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename cannot be persisted; the core restores
    /// the old registry entry.
    fn rename_collection(&self, desc: &SourceDescriptor, old_name: &str) -> StorageResult<()>;

    /// Persists a view rename. `desc` carries the new name.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename cannot be persisted.
    fn rename_view(&self, desc: &SourceDescriptor, old_name: &str) -> StorageResult<()>;

    /// Shuts down all storage state for a database.
    fn shutdown_database(&self, database: &str);

    /// Wakes the engine's cleanup activity for a database so deferred
    /// physical drops get processed.
    fn signal_cleanup(&self, database: &str);

    /// Whether the engine is replaying its recovery log.
    ///
    /// During recovery the core performs deferred cleanup synchronously and
    /// skips durability syncs.
    fn in_recovery(&self) -> bool;
}
