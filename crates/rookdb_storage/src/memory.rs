//! In-memory storage engine for testing.

use crate::engine::{SourceDescriptor, StorageEngine};
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// An in-memory storage engine.
///
/// This engine keeps no real data; it records which data sources have been
/// persisted and counts the calls the catalog core makes. It is suitable
/// for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Failure Injection
///
/// Tests can make the next call of a given kind fail
/// (`fail_next_open`, `fail_next_persist`, `fail_next_change`,
/// `fail_next_rename`) and slow down `open_collection` with `set_open_delay`
/// to widen race windows.
///
/// # Thread Safety
///
/// The engine is thread-safe and can be shared across threads.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    persisted: Mutex<HashSet<(String, u64)>>,
    open_calls: AtomicU64,
    drop_calls: AtomicU64,
    cleanup_signals: AtomicU64,
    open_delay_micros: AtomicU64,
    fail_open: AtomicBool,
    fail_persist: AtomicBool,
    fail_change: AtomicBool,
    fail_rename: AtomicBool,
    recovery: AtomicBool,
}

impl MemoryEngine {
    /// Creates a new empty in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `open_collection` calls issued so far.
    #[must_use]
    pub fn open_calls(&self) -> u64 {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Number of physical drop calls issued so far.
    #[must_use]
    pub fn drop_calls(&self) -> u64 {
        self.drop_calls.load(Ordering::SeqCst)
    }

    /// Number of cleanup signals received so far.
    #[must_use]
    pub fn cleanup_signals(&self) -> u64 {
        self.cleanup_signals.load(Ordering::SeqCst)
    }

    /// Whether the given data source is currently persisted.
    #[must_use]
    pub fn is_persisted(&self, database: &str, id: u64) -> bool {
        self.persisted.lock().contains(&(database.to_owned(), id))
    }

    /// Makes the next `open_collection` call fail.
    pub fn fail_next_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    /// Makes the next `persist_collection`/`persist_view` call fail.
    pub fn fail_next_persist(&self) {
        self.fail_persist.store(true, Ordering::SeqCst);
    }

    /// Makes the next `change_collection` call fail.
    pub fn fail_next_change(&self) {
        self.fail_change.store(true, Ordering::SeqCst);
    }

    /// Makes the next rename call fail.
    pub fn fail_next_rename(&self) {
        self.fail_rename.store(true, Ordering::SeqCst);
    }

    /// Delays every `open_collection` call by `delay`.
    pub fn set_open_delay(&self, delay: Duration) {
        self.open_delay_micros
            .store(delay.as_micros() as u64, Ordering::SeqCst);
    }

    /// Switches recovery mode on or off.
    pub fn set_recovery(&self, value: bool) {
        self.recovery.store(value, Ordering::SeqCst);
    }

    fn take(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }
}

impl StorageEngine for MemoryEngine {
    fn open_collection(&self, desc: &SourceDescriptor, _ignore_errors: bool) -> StorageResult<()> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.open_delay_micros.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }

        if Self::take(&self.fail_open) {
            return Err(StorageError::corrupted(&desc.name, "injected open failure"));
        }

        debug!(name = %desc.name, id = desc.id, "opened collection");
        Ok(())
    }

    fn close_collection(&self, desc: &SourceDescriptor) {
        debug!(name = %desc.name, id = desc.id, "closed collection");
    }

    fn persist_collection(&self, desc: &SourceDescriptor) -> StorageResult<()> {
        if Self::take(&self.fail_persist) {
            return Err(StorageError::persist_failed(
                &desc.name,
                "injected persist failure",
            ));
        }
        self.persisted
            .lock()
            .insert((desc.database.clone(), desc.id));
        Ok(())
    }

    fn persist_view(&self, desc: &SourceDescriptor) -> StorageResult<()> {
        if Self::take(&self.fail_persist) {
            return Err(StorageError::persist_failed(
                &desc.name,
                "injected persist failure",
            ));
        }
        self.persisted
            .lock()
            .insert((desc.database.clone(), desc.id));
        Ok(())
    }

    fn change_collection(&self, desc: &SourceDescriptor, _sync: bool) -> StorageResult<()> {
        if Self::take(&self.fail_change) {
            return Err(StorageError::persist_failed(
                &desc.name,
                "injected change failure",
            ));
        }
        Ok(())
    }

    fn drop_collection(&self, desc: &SourceDescriptor) {
        self.drop_calls.fetch_add(1, Ordering::SeqCst);
        self.persisted
            .lock()
            .remove(&(desc.database.clone(), desc.id));
    }

    fn drop_view(&self, desc: &SourceDescriptor) {
        self.drop_calls.fetch_add(1, Ordering::SeqCst);
        self.persisted
            .lock()
            .remove(&(desc.database.clone(), desc.id));
    }

    fn rename_collection(&self, desc: &SourceDescriptor, old_name: &str) -> StorageResult<()> {
        if Self::take(&self.fail_rename) {
            return Err(StorageError::rename_failed(
                old_name,
                "injected rename failure",
            ));
        }
        debug!(old = %old_name, new = %desc.name, "renamed collection");
        Ok(())
    }

    fn rename_view(&self, desc: &SourceDescriptor, old_name: &str) -> StorageResult<()> {
        if Self::take(&self.fail_rename) {
            return Err(StorageError::rename_failed(
                old_name,
                "injected rename failure",
            ));
        }
        debug!(old = %old_name, new = %desc.name, "renamed view");
        Ok(())
    }

    fn shutdown_database(&self, database: &str) {
        let mut persisted = self.persisted.lock();
        persisted.retain(|(db, _)| db != database);
    }

    fn signal_cleanup(&self, _database: &str) {
        self.cleanup_signals.fetch_add(1, Ordering::SeqCst);
    }

    fn in_recovery(&self) -> bool {
        self.recovery.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(name: &str, id: u64) -> SourceDescriptor {
        SourceDescriptor {
            database: "test".to_owned(),
            id,
            name: name.to_owned(),
            uuid: None,
            is_system: false,
        }
    }

    #[test]
    fn persist_and_drop_round_trip() {
        let engine = MemoryEngine::new();
        let d = desc("users", 1);

        engine.persist_collection(&d).unwrap();
        assert!(engine.is_persisted("test", 1));

        engine.drop_collection(&d);
        assert!(!engine.is_persisted("test", 1));
    }

    #[test]
    fn injected_open_failure_is_one_shot() {
        let engine = MemoryEngine::new();
        let d = desc("users", 1);

        engine.fail_next_open();
        assert!(engine.open_collection(&d, false).is_err());
        assert!(engine.open_collection(&d, false).is_ok());
        assert_eq!(engine.open_calls(), 2);
    }

    #[test]
    fn shutdown_clears_only_one_database() {
        let engine = MemoryEngine::new();
        engine.persist_collection(&desc("a", 1)).unwrap();

        let mut other = desc("b", 2);
        other.database = "other".to_owned();
        engine.persist_collection(&other).unwrap();

        engine.shutdown_database("test");
        assert!(!engine.is_persisted("test", 1));
        assert!(engine.is_persisted("other", 2));
    }
}
