//! The database instance: registry plus lifecycle control.
//!
//! One [`Database`] owns the data sources of a single database and
//! coordinates every structural operation on them: create, load, use,
//! rename, unload, drop, inventory, and shutdown. The locking discipline
//! is fixed:
//!
//! 1. inventory lock (owner-tracked, reentrant)
//! 2. registry lock (plain reader-writer; the write guard is the
//!    capability to mutate the indices)
//! 3. per-collection status lock
//!
//! Locks are only ever taken in that order. Paths that need the registry
//! lock *and* a status lock acquire both with non-blocking attempts in a
//! backoff loop, so a reader holding a collection can never deadlock a
//! concurrent drop.

use crate::cache::{NoopQueryCache, QueryCache};
use crate::cluster::ClusterCoordinator;
use crate::config::{DatabaseConfig, DatabaseKind, ServerRole};
use crate::datasource::{
    is_allowed_name, is_system_name, Collection, CollectionGuard, CollectionParameters,
    CollectionStatus, DataSource, DataSourceKind, View, ViewParameters,
};
use crate::error::{CatalogError, CatalogResult};
use crate::lock::{OwnedRwLock, RecursiveReadLocker, RecursiveWriteLocker};
use crate::refcount::UsageCount;
use crate::registry::DataSourceRegistry;
use crate::types::{DataSourceId, DatabaseId, DatabaseState, ServerId};
use parking_lot::RwLock;
use rookdb_storage::{SourceDescriptor, StorageEngine};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Outcome of one pass of the drop workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropState {
    /// Nothing (more) to do; the collection was already dropped.
    Exit,
    /// The collection is loading; retry after a pause.
    Again,
    /// The drop was performed; deferred cleanup must be triggered.
    Perform,
}

/// Outcome of one pass of the load workflow.
enum LoadOutcome {
    /// Loaded, status pinned by the guard.
    Ready(CollectionGuard),
    /// State changed under us; re-run immediately.
    Retry,
    /// Another thread is loading or unloading; pause, then re-run.
    Poll,
}

/// One row of a database inventory snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryEntry {
    /// Identifier of the collection.
    pub id: DataSourceId,
    /// Globally-unique id of the collection.
    pub uuid: Uuid,
    /// Name at snapshot time.
    pub name: String,
    /// Whether this is a system collection.
    pub is_system: bool,
    /// Load state at snapshot time.
    pub status: String,
}

/// Bookkeeping for one replication client (peer server) tailing this
/// database's operation log.
#[derive(Debug, Clone)]
pub struct ReplicationClient {
    /// Identifier of the peer.
    pub server: ServerId,
    /// When the peer last reported progress.
    pub last_seen: Instant,
    /// When the entry expires unless refreshed.
    pub expires: Instant,
    /// Highest log tick the peer has fetched.
    pub last_fetched_tick: u64,
}

/// A database instance: the registry of its data sources and the
/// controller for their lifecycles.
///
/// Thread-safe; intended to be shared behind an [`Arc`]. Physical
/// persistence goes through the wired-in [`StorageEngine`], plan
/// invalidation through the [`QueryCache`], and (on coordinators) view
/// management through the [`ClusterCoordinator`].
pub struct Database {
    id: DatabaseId,
    name: String,
    config: DatabaseConfig,
    state: RwLock<DatabaseState>,
    usage: UsageCount,
    inventory_lock: OwnedRwLock,
    registry: RwLock<DataSourceRegistry>,
    next_tick: AtomicU64,
    replication_clients: RwLock<HashMap<ServerId, ReplicationClient>>,
    engine: Arc<dyn StorageEngine>,
    query_cache: Arc<dyn QueryCache>,
    coordinator: Option<Arc<dyn ClusterCoordinator>>,
}

impl Database {
    /// Creates a database instance with no data sources.
    pub fn new(
        id: DatabaseId,
        name: impl Into<String>,
        config: DatabaseConfig,
        engine: Arc<dyn StorageEngine>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            config,
            state: RwLock::new(DatabaseState::Normal),
            usage: UsageCount::new(),
            inventory_lock: OwnedRwLock::new(),
            registry: RwLock::new(DataSourceRegistry::new()),
            next_tick: AtomicU64::new(0),
            replication_clients: RwLock::new(HashMap::new()),
            engine,
            query_cache: Arc::new(NoopQueryCache),
            coordinator: None,
        }
    }

    /// Wires in a query plan cache.
    #[must_use]
    pub fn with_query_cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
        self.query_cache = cache;
        self
    }

    /// Wires in the cluster plane; required when the role is
    /// [`ServerRole::Coordinator`].
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<dyn ClusterCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Identifier of this database.
    #[must_use]
    pub fn id(&self) -> DatabaseId {
        self.id
    }

    /// Name of this database.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the system database.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.config.kind == DatabaseKind::System
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DatabaseState {
        *self.state.read()
    }

    /// Allocates the next tick. Ticks are strictly increasing and double as
    /// data source identifiers, so "id ≤ tick" bounds inventory snapshots.
    pub fn new_tick(&self) -> u64 {
        self.next_tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently allocated tick.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.next_tick.load(Ordering::Relaxed)
    }

    // ---- usage counting -------------------------------------------------

    /// Registers a user of this database; fails once it is marked dropped.
    /// Pair with [`release`](Database::release).
    pub fn try_use(&self) -> bool {
        self.usage.try_use()
    }

    /// Registers a user regardless of the dropped mark; for internal
    /// activities that wind the database down.
    pub fn force_use(&self) {
        self.usage.force_use();
    }

    /// Releases one user.
    pub fn release(&self) {
        self.usage.release();
    }

    /// Marks this database as dropped; returns whether this call won.
    pub fn mark_dropped(&self) -> bool {
        self.usage.mark_dropped()
    }

    /// Whether this database has been marked dropped.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.usage.is_dropped()
    }

    /// Whether this database is marked dropped with no remaining users and
    /// may be physically destroyed. The system database never dangles.
    #[must_use]
    pub fn is_dangling(&self) -> bool {
        if self.is_system() {
            return false;
        }
        self.usage.is_dangling()
    }

    // ---- create ---------------------------------------------------------

    /// Creates a collection, registers it, and persists it.
    ///
    /// The collection is registered and immediately `Loaded`. When the
    /// engine fails to persist it the failure is logged and the handle is
    /// still returned; the collection exists in memory and the engine will
    /// retry persistence on its own schedule.
    ///
    /// # Errors
    ///
    /// [`CatalogError::IllegalName`] or one of the duplicate errors from
    /// registration.
    pub fn create_collection(
        &self,
        parameters: CollectionParameters,
    ) -> CatalogResult<Arc<Collection>> {
        if !is_allowed_name(parameters.is_system, &parameters.name) {
            return Err(CatalogError::illegal_name(parameters.name));
        }

        // let the engine fill in its defaults (it may assign the id)
        let mut desc = SourceDescriptor {
            database: self.name.clone(),
            id: parameters.id.map_or(0, DataSourceId::as_u64),
            name: parameters.name.clone(),
            uuid: parameters.uuid,
            is_system: is_system_name(&parameters.name),
        };
        self.engine.augment_collection_parameters(&mut desc);

        let id = if desc.id == 0 {
            DataSourceId::new(self.new_tick())
        } else {
            // keep the tick allocator ahead of externally supplied ids
            self.next_tick.fetch_max(desc.id, Ordering::Relaxed);
            DataSourceId::new(desc.id)
        };
        let uuid = desc.uuid.unwrap_or_else(Uuid::new_v4);

        let collection = Collection::new(
            self.name.clone(),
            id,
            uuid,
            parameters.name,
            desc.is_system,
        );

        {
            let _inventory = RecursiveReadLocker::new(&self.inventory_lock);
            let mut registry = self.registry.write();
            registry.register_collection(Arc::clone(&collection))?;
            collection.status_cell().write().status = CollectionStatus::Loaded;
        }

        self.query_cache.invalidate(&self.name);

        if let Err(err) = self.engine.persist_collection(&collection.descriptor()) {
            error!(
                database = %self.name,
                collection = %collection.name(),
                %err,
                "failed to persist new collection"
            );
        }

        debug!(database = %self.name, collection = %collection.name(), %id, "created collection");
        Ok(collection)
    }

    /// Creates a view. On a coordinator this is delegated to the cluster
    /// plane; locally the view is registered and persisted, and the
    /// registration is rolled back if persistence fails.
    ///
    /// # Errors
    ///
    /// [`CatalogError::IllegalName`], a duplicate error from registration,
    /// or the engine's persistence failure.
    pub fn create_view(&self, parameters: ViewParameters) -> CatalogResult<Arc<View>> {
        if self.config.role == ServerRole::Coordinator {
            if let Some(coordinator) = &self.coordinator {
                return coordinator.create_view(&self.name, &parameters);
            }
        }

        if !is_allowed_name(parameters.is_system, &parameters.name) {
            return Err(CatalogError::illegal_name(parameters.name));
        }

        let id = match parameters.id {
            Some(id) => {
                self.next_tick.fetch_max(id.as_u64(), Ordering::Relaxed);
                id
            }
            None => DataSourceId::new(self.new_tick()),
        };
        let view = View::new(
            self.name.clone(),
            id,
            parameters.name,
            parameters.is_system,
        );

        {
            let _inventory = RecursiveReadLocker::new(&self.inventory_lock);
            self.registry.write().register_view(Arc::clone(&view))?;

            if let Err(err) = self.engine.persist_view(&view.descriptor()) {
                self.registry.write().unregister_view(view.id());
                return Err(err.into());
            }
        }

        self.query_cache.invalidate(&self.name);

        debug!(database = %self.name, view = %view.name(), %id, "created view");
        Ok(view)
    }

    // ---- lookup ---------------------------------------------------------

    /// Looks up a collection by name.
    #[must_use]
    pub fn lookup_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.registry
            .read()
            .lookup_by_name(name)
            .and_then(|ds| ds.as_collection().cloned())
    }

    /// Looks up a collection by identifier.
    #[must_use]
    pub fn lookup_collection_by_id(&self, id: DataSourceId) -> Option<Arc<Collection>> {
        self.registry
            .read()
            .lookup_by_id(id)
            .and_then(|ds| ds.as_collection().cloned())
    }

    /// Looks up a collection by globally-unique id.
    #[must_use]
    pub fn lookup_collection_by_uuid(&self, uuid: Uuid) -> Option<Arc<Collection>> {
        self.registry
            .read()
            .lookup_by_uuid(uuid)
            .and_then(|ds| ds.as_collection().cloned())
    }

    /// Looks up a view by name; delegated to the cluster plane on a
    /// coordinator.
    #[must_use]
    pub fn lookup_view(&self, name: &str) -> Option<Arc<View>> {
        if self.config.role == ServerRole::Coordinator {
            if let Some(coordinator) = &self.coordinator {
                return coordinator.lookup_view(&self.name, name);
            }
        }
        self.registry
            .read()
            .lookup_by_name(name)
            .and_then(|ds| ds.as_view().cloned())
    }

    /// Resolves a data source by a caller-supplied key: a stringified
    /// identifier, a uuid, or a name.
    #[must_use]
    pub fn lookup_data_source(&self, key: &str) -> Option<DataSource> {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            let id = key.parse().map(DataSourceId::new).ok()?;
            return self.registry.read().lookup_by_id(id);
        }
        let registry = self.registry.read();
        if let Some(found) = registry.lookup_by_name(key) {
            return Some(found);
        }
        let uuid = Uuid::parse_str(key).ok()?;
        registry.lookup_by_uuid(uuid)
    }

    /// Snapshots the collection handles.
    #[must_use]
    pub fn collections(&self, include_deleted: bool) -> Vec<Arc<Collection>> {
        self.registry.read().collections(include_deleted)
    }

    /// Snapshots the view handles.
    #[must_use]
    pub fn views(&self) -> Vec<Arc<View>> {
        self.registry.read().views()
    }

    /// Names of all collections.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.registry.read().collection_names()
    }

    // ---- use / load -----------------------------------------------------

    /// Resolves a collection by name and pins it loaded.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`], [`CatalogError::Corrupted`], or
    /// [`CatalogError::NotLoaded`] when the instance is configured not to
    /// wait for concurrent loads.
    pub fn use_collection(&self, name: &str) -> CatalogResult<CollectionGuard> {
        let collection = self
            .lookup_collection(name)
            .ok_or_else(|| CatalogError::not_found(name))?;
        self.load_collection(&collection)
    }

    /// Resolves a collection by identifier and pins it loaded.
    ///
    /// # Errors
    ///
    /// Same as [`use_collection`](Database::use_collection).
    pub fn use_collection_by_id(&self, id: DataSourceId) -> CatalogResult<CollectionGuard> {
        let collection = self
            .lookup_collection_by_id(id)
            .ok_or_else(|| CatalogError::not_found(id.to_string()))?;
        self.load_collection(&collection)
    }

    /// Resolves a collection by globally-unique id and pins it loaded.
    ///
    /// # Errors
    ///
    /// Same as [`use_collection`](Database::use_collection).
    pub fn use_collection_by_uuid(&self, uuid: Uuid) -> CatalogResult<CollectionGuard> {
        let collection = self
            .lookup_collection_by_uuid(uuid)
            .ok_or_else(|| CatalogError::not_found(uuid.to_string()))?;
        self.load_collection(&collection)
    }

    /// Drives the load-state machine until the collection is pinned loaded
    /// or a terminal state is hit.
    fn load_collection(&self, collection: &Arc<Collection>) -> CatalogResult<CollectionGuard> {
        loop {
            match self.load_collection_step(collection)? {
                LoadOutcome::Ready(guard) => return Ok(guard),
                LoadOutcome::Retry => {}
                LoadOutcome::Poll => {
                    if self.config.throw_collection_not_loaded {
                        return Err(CatalogError::not_loaded(collection.name()));
                    }
                    std::thread::sleep(self.config.status_poll_interval);
                }
            }
        }
    }

    /// One pass over the status: returns a pinned guard, an instruction to
    /// retry, or an instruction to pause first.
    fn load_collection_step(&self, collection: &Arc<Collection>) -> CatalogResult<LoadOutcome> {
        let status = collection.status_cell().read_arc();
        match status.status {
            CollectionStatus::Loaded => Ok(LoadOutcome::Ready(CollectionGuard::new(
                Arc::clone(collection),
                status,
            ))),
            CollectionStatus::Deleted => Err(CatalogError::not_found(collection.name())),
            CollectionStatus::Corrupted => Err(CatalogError::corrupted(collection.name())),
            CollectionStatus::Loading => {
                drop(status);
                Ok(LoadOutcome::Poll)
            }
            CollectionStatus::Unloading => {
                drop(status);
                self.cancel_unload(collection)
            }
            CollectionStatus::Unloaded => {
                drop(status);
                self.start_load(collection)
            }
        }
    }

    /// Takes over an `Unloaded` collection and opens its physical state.
    ///
    /// The status reads `Loading` while the (possibly slow) open runs with
    /// the lock released; concurrent users poll, concurrent drops get
    /// `DropState::Again`.
    fn start_load(&self, collection: &Arc<Collection>) -> CatalogResult<LoadOutcome> {
        {
            let mut status = collection.status_cell().write_arc();
            if status.status != CollectionStatus::Unloaded {
                // someone else advanced the state while we upgraded
                return Ok(LoadOutcome::Retry);
            }
            if status.deleted {
                status.status = CollectionStatus::Deleted;
                return Err(CatalogError::not_found(collection.name()));
            }
            status.status = CollectionStatus::Loading;
        }

        let opened = self
            .engine
            .open_collection(&collection.descriptor(), self.config.ignore_datafile_errors);

        let mut status = collection.status_cell().write_arc();
        match opened {
            Ok(()) => {
                if status.deleted {
                    // a drop began while we were opening
                    status.status = CollectionStatus::Deleted;
                    return Err(CatalogError::not_found(collection.name()));
                }
                status.status = CollectionStatus::Loaded;
                Ok(LoadOutcome::Retry)
            }
            Err(err) => {
                error!(
                    database = %self.name,
                    collection = %collection.name(),
                    %err,
                    "failed to open collection"
                );
                status.status = CollectionStatus::Corrupted;
                Err(CatalogError::corrupted(collection.name()))
            }
        }
    }

    /// Cancels a pending unload that has not closed the physical state yet
    /// by flipping the status back to `Loaded`.
    ///
    /// The unloader commits to closing only while holding the status write
    /// lock, so observing `Unloading` under that lock means nothing has
    /// been closed. A deleted collection is not resurrected.
    fn cancel_unload(&self, collection: &Arc<Collection>) -> CatalogResult<LoadOutcome> {
        let mut status = collection.status_cell().write_arc();
        if status.status == CollectionStatus::Unloading && !status.deleted {
            status.status = CollectionStatus::Loaded;
            return Ok(LoadOutcome::Retry);
        }
        drop(status);
        Ok(LoadOutcome::Poll)
    }

    // ---- unload ---------------------------------------------------------

    /// Unloads a collection, releasing its physical resources.
    ///
    /// Blocks until every pinning guard is released. Unloading an already
    /// unloaded collection is a no-op, and a load racing with the unload
    /// cancels it before anything is closed.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] if the collection was dropped,
    /// [`CatalogError::Corrupted`] if it is corrupted.
    pub fn unload_collection(&self, collection: &Arc<Collection>) -> CatalogResult<()> {
        loop {
            let mut status = collection.status_cell().write_arc();
            match status.status {
                CollectionStatus::Unloaded | CollectionStatus::Unloading => return Ok(()),
                CollectionStatus::Deleted => {
                    return Err(CatalogError::not_found(collection.name()))
                }
                CollectionStatus::Corrupted => {
                    return Err(CatalogError::corrupted(collection.name()))
                }
                CollectionStatus::Loading => {
                    drop(status);
                    std::thread::sleep(self.config.status_poll_interval);
                }
                CollectionStatus::Loaded => {
                    status.status = CollectionStatus::Unloading;
                    drop(status);

                    // a racing loader may cancel the unload before we
                    // commit to closing; a drop may advance to Deleted
                    let mut status = collection.status_cell().write_arc();
                    if status.status == CollectionStatus::Unloading {
                        self.engine.close_collection(&collection.descriptor());
                        status.status = CollectionStatus::Unloaded;
                        debug!(database = %self.name, collection = %collection.name(), "unloaded collection");
                    }
                    return Ok(());
                }
            }
        }
    }

    // ---- drop -----------------------------------------------------------

    /// Drops a collection.
    ///
    /// `timeout` bounds how long the workflow waits for the registry and
    /// status locks; `None` waits forever. On timeout nothing has been
    /// mutated and the call is safe to retry. Dropping a collection that
    /// was concurrently dropped is a success.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Forbidden`] for a system collection without
    /// `allow_system` (outside recovery), [`CatalogError::LockTimeout`]
    /// past the deadline, [`CatalogError::Internal`] for a corrupted
    /// collection, or the engine's failure to persist the deleted marker.
    pub fn drop_collection(
        &self,
        collection: &Arc<Collection>,
        allow_system: bool,
        timeout: Option<Duration>,
    ) -> CatalogResult<()> {
        if collection.is_system() && !allow_system && !self.engine.in_recovery() {
            return Err(CatalogError::forbidden(collection.name()));
        }

        let deadline = timeout.map(|t| Instant::now() + t);

        let state = loop {
            let state = {
                // serialize against inventory snapshots; reentrant so a
                // caller holding the inventory lock can still drop
                let _inventory = RecursiveReadLocker::new(&self.inventory_lock);
                self.drop_collection_worker(collection, deadline)?
            };
            match state {
                DropState::Again => std::thread::sleep(self.config.status_poll_interval),
                _ => break state,
            }
        };

        if state == DropState::Perform {
            if self.engine.in_recovery() {
                // no cleanup activity is running yet; reap synchronously
                self.cleanup();
            } else {
                self.engine.signal_cleanup(&self.name);
            }
        }
        Ok(())
    }

    /// One attempt at dropping: acquires the registry and status locks
    /// without blocking, backing off until the deadline.
    fn drop_collection_worker(
        &self,
        collection: &Arc<Collection>,
        deadline: Option<Instant>,
    ) -> CatalogResult<DropState> {
        let (mut registry, mut status) = loop {
            if let Some(registry) = self.registry.try_write() {
                if let Some(status) = collection.status_cell().try_write_arc() {
                    break (registry, status);
                }
                drop(registry);
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(CatalogError::lock_timeout(collection.name()));
                }
            }
            std::thread::yield_now();
            std::thread::sleep(self.config.status_poll_interval);
        };

        match status.status {
            CollectionStatus::Deleted => {
                // concurrently dropped; make sure the indices agree
                registry.unregister_collection(collection.id());
                Ok(DropState::Exit)
            }
            CollectionStatus::Loading => Ok(DropState::Again),
            CollectionStatus::Corrupted => Err(CatalogError::internal(format!(
                "refusing to drop corrupted collection '{}'",
                collection.name()
            ))),
            CollectionStatus::Unloaded
            | CollectionStatus::Loaded
            | CollectionStatus::Unloading => {
                let was_unloaded = status.status == CollectionStatus::Unloaded;
                let was_deleted = status.deleted;
                status.deleted = true;

                if !self.engine.in_recovery() {
                    let sync = self.config.force_sync_properties;
                    if let Err(err) = self
                        .engine
                        .change_collection(&collection.descriptor(), sync)
                    {
                        status.deleted = was_deleted;
                        return Err(err.into());
                    }
                }

                status.status = CollectionStatus::Deleted;
                registry.unregister_collection(collection.id());
                registry.retire_collection(collection);

                drop(status);
                drop(registry);

                self.query_cache.invalidate(&self.name);
                self.engine.drop_collection(&collection.descriptor());

                info!(database = %self.name, collection = %collection.name(), "dropped collection");

                if was_unloaded {
                    // nothing is physically open; reap here instead of
                    // waking the cleanup activity
                    self.cleanup();
                    return Ok(DropState::Exit);
                }
                Ok(DropState::Perform)
            }
        }
    }

    /// Drops a view; delegated to the cluster plane on a coordinator.
    ///
    /// # Errors
    ///
    /// Propagates the cluster plane's failure; local drops cannot fail.
    pub fn drop_view(&self, view: &Arc<View>) -> CatalogResult<()> {
        if self.config.role == ServerRole::Coordinator {
            if let Some(coordinator) = &self.coordinator {
                return coordinator.drop_view(&self.name, view.id());
            }
        }

        {
            let _inventory = RecursiveReadLocker::new(&self.inventory_lock);
            let (mut registry, _view_lock) = loop {
                if let Some(registry) = self.registry.try_write() {
                    if let Some(view_lock) = view.lock_cell().try_write_arc() {
                        break (registry, view_lock);
                    }
                    drop(registry);
                }
                std::thread::yield_now();
                std::thread::sleep(self.config.status_poll_interval);
            };
            registry.unregister_view(view.id());
        }

        self.query_cache.invalidate(&self.name);
        self.engine.drop_view(&view.descriptor());

        info!(database = %self.name, view = %view.name(), "dropped view");
        Ok(())
    }

    // ---- rename ---------------------------------------------------------

    /// Renames a collection.
    ///
    /// The new name is inserted first and the old mapping is kept until the
    /// engine has persisted the rename, so a failure leaves the old name
    /// fully intact.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Forbidden`] for system collections,
    /// [`CatalogError::IllegalName`], [`CatalogError::DuplicateName`],
    /// [`CatalogError::NotFound`] if concurrently dropped, or the engine's
    /// persistence failure.
    pub fn rename_collection(
        &self,
        collection: &Arc<Collection>,
        new_name: &str,
    ) -> CatalogResult<()> {
        if collection.is_system() {
            return Err(CatalogError::forbidden(collection.name()));
        }

        let old_name = collection.name();
        if old_name == new_name {
            return Ok(());
        }
        if !is_allowed_name(false, new_name) {
            return Err(CatalogError::illegal_name(new_name));
        }

        let _inventory = RecursiveReadLocker::new(&self.inventory_lock);
        let (mut registry, status) = loop {
            if let Some(registry) = self.registry.try_write() {
                if let Some(status) = collection.status_cell().try_write_arc() {
                    break (registry, status);
                }
                drop(registry);
            }
            std::thread::yield_now();
            std::thread::sleep(self.config.status_poll_interval);
        };

        if status.deleted || status.status == CollectionStatus::Deleted {
            return Err(CatalogError::not_found(old_name));
        }

        registry.begin_rename(&old_name, new_name, DataSourceKind::Collection)?;

        let mut desc = collection.descriptor();
        desc.name = new_name.to_owned();
        match self.engine.rename_collection(&desc, &old_name) {
            Ok(()) => {
                collection.set_name(new_name.to_owned());
                registry.commit_rename(&old_name);
            }
            Err(err) => {
                registry.abort_rename(new_name);
                return Err(err.into());
            }
        }

        drop(status);
        drop(registry);

        self.query_cache
            .invalidate_names(&self.name, &[&old_name, new_name]);

        debug!(database = %self.name, old = %old_name, new = %new_name, "renamed collection");
        Ok(())
    }

    /// Renames a view; same rollback discipline as
    /// [`rename_collection`](Database::rename_collection).
    ///
    /// # Errors
    ///
    /// [`CatalogError::Forbidden`] for system views,
    /// [`CatalogError::IllegalName`], [`CatalogError::DuplicateName`], or
    /// the engine's persistence failure.
    pub fn rename_view(&self, view: &Arc<View>, new_name: &str) -> CatalogResult<()> {
        if view.is_system() {
            return Err(CatalogError::forbidden(view.name()));
        }

        let old_name = view.name();
        if old_name == new_name {
            return Ok(());
        }
        if !is_allowed_name(false, new_name) {
            return Err(CatalogError::illegal_name(new_name));
        }

        {
            let _inventory = RecursiveReadLocker::new(&self.inventory_lock);
            let mut registry = self.registry.write();
            registry.begin_rename(&old_name, new_name, DataSourceKind::View)?;

            let mut desc = view.descriptor();
            desc.name = new_name.to_owned();
            match self.engine.rename_view(&desc, &old_name) {
                Ok(()) => {
                    view.set_name(new_name.to_owned());
                    registry.commit_rename(&old_name);
                }
                Err(err) => {
                    registry.abort_rename(new_name);
                    return Err(err.into());
                }
            }
        }

        self.query_cache
            .invalidate_names(&self.name, &[&old_name, new_name]);

        debug!(database = %self.name, old = %old_name, new = %new_name, "renamed view");
        Ok(())
    }

    // ---- inventory ------------------------------------------------------

    /// A consistent snapshot of all live collections with an id at or below
    /// `max_tick`, filtered by `filter` and sorted by name.
    ///
    /// Holds the inventory lock exclusively so no create or drop
    /// interleaves with the snapshot.
    pub fn inventory<F>(&self, max_tick: u64, filter: F) -> Vec<InventoryEntry>
    where
        F: Fn(&Collection) -> bool,
    {
        let _locker = RecursiveWriteLocker::acquired(&self.inventory_lock);

        let collections = self.registry.read().collections(false);
        let mut entries = Vec::with_capacity(collections.len());
        for collection in collections {
            let status = collection.status();
            if status == CollectionStatus::Deleted || status == CollectionStatus::Corrupted {
                continue;
            }
            if collection.id().as_u64() > max_tick {
                // created after the snapshot horizon
                continue;
            }
            if !filter(&collection) {
                continue;
            }
            entries.push(InventoryEntry {
                id: collection.id(),
                uuid: collection.uuid(),
                name: collection.name(),
                is_system: collection.is_system(),
                status: status.to_string(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    // ---- replication clients --------------------------------------------

    /// Records progress of a replication client, extending its lease by
    /// `ttl`.
    pub fn update_replication_client(&self, server: ServerId, last_fetched_tick: u64, ttl: Duration) {
        let now = Instant::now();
        let mut clients = self.replication_clients.write();
        let entry = clients.entry(server).or_insert_with(|| ReplicationClient {
            server,
            last_seen: now,
            expires: now + ttl,
            last_fetched_tick,
        });
        entry.last_seen = now;
        entry.expires = now + ttl;
        if last_fetched_tick > entry.last_fetched_tick {
            entry.last_fetched_tick = last_fetched_tick;
        }
        debug!(database = %self.name, %server, last_fetched_tick, "updated replication client");
    }

    /// Snapshot of the replication client table.
    #[must_use]
    pub fn replication_clients(&self) -> Vec<ReplicationClient> {
        self.replication_clients.read().values().cloned().collect()
    }

    /// Removes replication clients whose lease has expired; returns how
    /// many were removed.
    pub fn garbage_collect_replication_clients(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.replication_clients.write();
        let before = clients.len();
        clients.retain(|_, client| client.expires > now);
        let removed = before - clients.len();
        if removed > 0 {
            debug!(database = %self.name, removed, "expired replication clients");
        }
        removed
    }

    // ---- cleanup and shutdown -------------------------------------------

    /// Releases the physical state of every collection on the dead list.
    ///
    /// Called by the engine's cleanup activity (or synchronously during
    /// recovery) after a drop signaled it.
    pub fn cleanup(&self) {
        let dead = self.registry.write().drain_dead();
        for collection in dead {
            debug!(database = %self.name, collection = %collection.name(), "releasing dead collection");
            self.engine.close_collection(&collection.descriptor());
        }
    }

    /// Shuts the database down.
    ///
    /// Replication state is dropped first, every collection is unloaded,
    /// then the engine winds down its per-database activities between the
    /// two shutdown states, and finally the registry is cleared.
    pub fn shutdown(&self) {
        self.replication_clients.write().clear();

        let collections = self.registry.read().collections(false);
        for collection in &collections {
            // deleted or corrupted collections cannot be unloaded; fine
            let _ = self.unload_collection(collection);
        }

        *self.state.write() = DatabaseState::ShutdownCompactor;
        self.engine.shutdown_database(&self.name);
        *self.state.write() = DatabaseState::ShutdownCleanup;

        self.cleanup();
        self.registry.write().clear_indices();

        info!(database = %self.name, "database shut down");
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
