//! Integration tests for the catalog's concurrency behavior: load
//! coordination, drop timeouts, rollback on engine failures, and the
//! collaborator seams.

use rookdb_core::cache::RecordingQueryCache;
use rookdb_core::cluster::ClusterCoordinator;
use rookdb_core::{
    CatalogError, CatalogResult, CollectionParameters, CollectionStatus, Database, DatabaseConfig,
    DatabaseId, DataSourceId, ServerRole, View, ViewParameters,
};
use rookdb_storage::MemoryEngine;
use std::sync::Arc;
use std::time::Duration;

fn database_with(engine: Arc<MemoryEngine>, config: DatabaseConfig) -> Database {
    Database::new(
        DatabaseId::new(1),
        "test",
        config.status_poll_interval(Duration::from_millis(1)),
        engine,
    )
}

fn database(engine: Arc<MemoryEngine>) -> Database {
    database_with(engine, DatabaseConfig::default())
}

#[test]
fn concurrent_use_opens_once() {
    let engine = Arc::new(MemoryEngine::new());
    let db = Arc::new(database(Arc::clone(&engine)));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.unload_collection(&users).unwrap();
    engine.set_open_delay(Duration::from_millis(30));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = Arc::clone(&db);
        handles.push(std::thread::spawn(move || {
            let guard = db.use_collection("users").unwrap();
            assert_eq!(guard.status(), CollectionStatus::Loaded);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // one loader did the physical open; everyone else polled
    assert_eq!(engine.open_calls(), 1);
}

#[test]
fn held_guard_times_out_drop_then_retry_succeeds() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();

    let guard = db.use_collection("users").unwrap();
    let err = db
        .drop_collection(&users, false, Some(Duration::ZERO))
        .unwrap_err();
    assert!(matches!(err, CatalogError::LockTimeout { .. }));

    // the timed-out drop mutated nothing
    assert!(db.lookup_collection("users").is_some());
    assert!(!users.is_deleted());

    drop(guard);
    db.drop_collection(&users, false, Some(Duration::from_secs(5)))
        .unwrap();
    assert!(db.lookup_collection("users").is_none());
    assert_eq!(users.status(), CollectionStatus::Deleted);
    assert_eq!(engine.drop_calls(), 1);
}

#[test]
fn unbounded_drop_waits_for_guard_release() {
    let engine = Arc::new(MemoryEngine::new());
    let db = Arc::new(database(engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();

    let holder = {
        let db = Arc::clone(&db);
        std::thread::spawn(move || {
            let guard = db.use_collection("users").unwrap();
            std::thread::sleep(Duration::from_millis(50));
            drop(guard);
        })
    };

    std::thread::sleep(Duration::from_millis(10));
    db.drop_collection(&users, false, None).unwrap();
    holder.join().unwrap();

    assert!(db.lookup_collection("users").is_none());
}

#[test]
fn corrupted_open_is_terminal() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.unload_collection(&users).unwrap();

    engine.fail_next_open();
    assert!(matches!(
        db.use_collection("users"),
        Err(CatalogError::Corrupted { .. })
    ));
    assert_eq!(users.status(), CollectionStatus::Corrupted);

    // no further open attempts once corrupted
    assert!(matches!(
        db.use_collection("users"),
        Err(CatalogError::Corrupted { .. })
    ));
    assert_eq!(engine.open_calls(), 1);
}

#[test]
fn corrupted_collection_refuses_drop() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.unload_collection(&users).unwrap();
    engine.fail_next_open();
    assert!(db.use_collection("users").is_err());
    assert_eq!(users.status(), CollectionStatus::Corrupted);

    let err = db.drop_collection(&users, false, None).unwrap_err();
    assert!(matches!(err, CatalogError::Internal { .. }));

    // nothing was mutated by the refused drop
    assert!(db.lookup_collection("users").is_some());
    assert_eq!(engine.drop_calls(), 0);
}

#[test]
fn dropping_unloaded_collection_reaps_synchronously() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.unload_collection(&users).unwrap();

    db.drop_collection(&users, false, None).unwrap();

    // nothing was open, so the cleanup activity is never woken
    assert_eq!(engine.cleanup_signals(), 0);
    assert!(db.collections(true).is_empty());
    assert!(db.lookup_collection("users").is_none());
    assert_eq!(engine.drop_calls(), 1);
}

#[test]
fn loading_surfaces_not_loaded_when_configured() {
    let engine = Arc::new(MemoryEngine::new());
    let db = Arc::new(database_with(
        Arc::clone(&engine),
        DatabaseConfig::default().throw_collection_not_loaded(true),
    ));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.unload_collection(&users).unwrap();
    engine.set_open_delay(Duration::from_millis(100));

    let loader = {
        let db = Arc::clone(&db);
        std::thread::spawn(move || {
            db.use_collection("users").unwrap();
        })
    };

    // wait until the loader has claimed the collection
    while users.status() != CollectionStatus::Loading {
        std::thread::yield_now();
    }

    assert!(matches!(
        db.use_collection("users"),
        Err(CatalogError::NotLoaded { .. })
    ));
    loader.join().unwrap();
}

#[test]
fn failed_delete_marker_rolls_back_drop() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();

    engine.fail_next_change();
    let err = db.drop_collection(&users, false, None).unwrap_err();
    assert!(matches!(err, CatalogError::Storage(_)));

    // still fully registered and usable
    assert!(!users.is_deleted());
    assert!(db.lookup_collection("users").is_some());
    db.use_collection("users").unwrap();

    db.drop_collection(&users, false, None).unwrap();
    assert!(db.lookup_collection("users").is_none());
}

#[test]
fn drop_signals_cleanup_and_reaper_drains() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.drop_collection(&users, false, None).unwrap();

    assert_eq!(engine.cleanup_signals(), 1);
    assert_eq!(db.collections(true).len(), 1);
    assert!(db.collections(false).is_empty());

    db.cleanup();
    assert!(db.collections(true).is_empty());
}

#[test]
fn drop_during_recovery_reaps_synchronously() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    engine.set_recovery(true);

    db.drop_collection(&users, false, None).unwrap();
    assert_eq!(engine.cleanup_signals(), 0);
    assert!(db.collections(true).is_empty());
}

#[test]
fn rename_failure_restores_old_name() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();

    engine.fail_next_rename();
    assert!(db.rename_collection(&users, "people").is_err());

    assert_eq!(users.name(), "users");
    assert!(db.lookup_collection("users").is_some());
    assert!(db.lookup_collection("people").is_none());

    db.rename_collection(&users, "people").unwrap();
    assert_eq!(users.name(), "people");
}

#[test]
fn view_persist_failure_rolls_back_registration() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    engine.fail_next_persist();
    assert!(db.create_view(ViewParameters::new("by_age")).is_err());
    assert!(db.lookup_view("by_age").is_none());

    // the name is free again
    db.create_view(ViewParameters::new("by_age")).unwrap();
}

#[test]
fn structural_changes_invalidate_query_plans() {
    let cache = Arc::new(RecordingQueryCache::new());
    let db = Database::new(
        DatabaseId::new(1),
        "test",
        DatabaseConfig::default().status_poll_interval(Duration::from_millis(1)),
        Arc::new(MemoryEngine::new()),
    )
    .with_query_cache(cache.clone());

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.rename_collection(&users, "people").unwrap();
    db.drop_collection(&users, false, None).unwrap();

    let events = cache.events();
    assert_eq!(events.len(), 3);
    assert!(events[1].contains("users") && events[1].contains("people"));
}

#[test]
fn concurrent_creates_all_register() {
    let db = Arc::new(database(Arc::new(MemoryEngine::new())));

    let mut handles = Vec::new();
    for t in 0..4 {
        let db = Arc::clone(&db);
        handles.push(std::thread::spawn(move || {
            for i in 0..25 {
                db.create_collection(CollectionParameters::new(format!("c{t}-{i}")))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.collection_names().len(), 100);
    assert_eq!(db.inventory(u64::MAX, |_| true).len(), 100);
}

#[test]
fn inventory_skips_dropped_collections() {
    let db = database(Arc::new(MemoryEngine::new()));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.create_collection(CollectionParameters::new("orders"))
        .unwrap();
    db.drop_collection(&users, false, None).unwrap();

    let entries = db.inventory(u64::MAX, |_| true);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "orders");
}

#[test]
fn inventory_serializes() {
    let db = database(Arc::new(MemoryEngine::new()));
    db.create_collection(CollectionParameters::new("users"))
        .unwrap();

    let entries = db.inventory(u64::MAX, |_| true);
    let json = serde_json::to_value(&entries).unwrap();
    assert_eq!(json[0]["name"], "users");
    assert_eq!(json[0]["status"], "loaded");
}

#[derive(Default)]
struct RecordingCoordinator {
    calls: parking_lot::Mutex<Vec<String>>,
}

impl ClusterCoordinator for RecordingCoordinator {
    fn create_view(
        &self,
        database: &str,
        parameters: &ViewParameters,
    ) -> CatalogResult<Arc<View>> {
        self.calls
            .lock()
            .push(format!("create {database}/{}", parameters.name));
        Err(CatalogError::internal("no cluster in tests"))
    }

    fn drop_view(&self, database: &str, id: DataSourceId) -> CatalogResult<()> {
        self.calls.lock().push(format!("drop {database}/{id}"));
        Ok(())
    }

    fn lookup_view(&self, database: &str, name: &str) -> Option<Arc<View>> {
        self.calls.lock().push(format!("lookup {database}/{name}"));
        None
    }
}

#[test]
fn coordinator_role_delegates_view_operations() {
    let coordinator = Arc::new(RecordingCoordinator::default());
    let db = Database::new(
        DatabaseId::new(1),
        "test",
        DatabaseConfig::default().role(ServerRole::Coordinator),
        Arc::new(MemoryEngine::new()),
    )
    .with_coordinator(coordinator.clone());

    assert!(db.create_view(ViewParameters::new("by_age")).is_err());
    assert!(db.lookup_view("by_age").is_none());

    let calls = coordinator.calls.lock().clone();
    assert_eq!(calls, ["create test/by_age", "lookup test/by_age"]);
}

#[test]
fn shutdown_unloads_and_clears() {
    let engine = Arc::new(MemoryEngine::new());
    let db = database(Arc::clone(&engine));

    let users = db
        .create_collection(CollectionParameters::new("users"))
        .unwrap();
    db.create_view(ViewParameters::new("by_age")).unwrap();
    db.update_replication_client(
        rookdb_core::ServerId::new(7),
        10,
        Duration::from_secs(3600),
    );

    db.shutdown();

    assert_eq!(users.status(), CollectionStatus::Unloaded);
    assert!(db.lookup_collection("users").is_none());
    assert!(db.lookup_view("by_age").is_none());
    assert!(db.replication_clients().is_empty());
    assert!(!engine.is_persisted("test", users.id().as_u64()));
}
