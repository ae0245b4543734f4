//! # RookDB Core
//!
//! Per-database registry and lifecycle core for RookDB.
//!
//! This crate tracks every collection and view ("data source") belonging to
//! one database instance and provides the concurrency discipline that lets
//! many threads create, load, use, rename, unload, and drop these objects
//! safely:
//! - A three-index registry (by name, by id, by uuid) with transactional
//!   insert and rollback
//! - A per-collection load-state machine with polling/retry semantics
//! - An owner-tracked reentrant lock pair for the inventory lock
//! - A parity-encoded atomic usage counter governing database teardown
//!
//! Physical persistence is delegated to a [`rookdb_storage::StorageEngine`];
//! query-plan invalidation to a [`cache::QueryCache`]; cluster-coordinated
//! view management to a [`cluster::ClusterCoordinator`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod cluster;
mod config;
pub mod datasource;
mod database;
mod error;
mod lock;
mod refcount;
mod registry;
mod types;

pub use config::{DatabaseConfig, DatabaseKind, ServerRole};
pub use database::{Database, InventoryEntry, ReplicationClient};
pub use datasource::{
    Collection, CollectionGuard, CollectionParameters, CollectionStatus, DataSource,
    DataSourceKind, View, ViewParameters,
};
pub use error::{CatalogError, CatalogResult};
pub use lock::{OwnedRwLock, RecursiveReadLocker, RecursiveWriteLocker};
pub use refcount::UsageCount;
pub use registry::DataSourceRegistry;
pub use types::{DataSourceId, DatabaseId, DatabaseState, ServerId};
