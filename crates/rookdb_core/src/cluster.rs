//! Coordinator delegation for view operations.
//!
//! On a coordinator, views are cluster-wide objects: creating, dropping,
//! and resolving them goes through the cluster plane instead of the local
//! registry. The catalog stays agnostic of the transport; a deployment
//! wires in an implementation of this trait when the server role is
//! `Coordinator`.

use crate::datasource::{View, ViewParameters};
use crate::error::CatalogResult;
use crate::types::DataSourceId;
use std::sync::Arc;

/// Cluster-side view catalog.
pub trait ClusterCoordinator: Send + Sync {
    /// Creates a view cluster-wide and returns the agreed-upon handle.
    ///
    /// # Errors
    ///
    /// Propagates the cluster plane's failure as a catalog error.
    fn create_view(&self, database: &str, parameters: &ViewParameters)
        -> CatalogResult<Arc<View>>;

    /// Drops a view cluster-wide.
    ///
    /// # Errors
    ///
    /// Propagates the cluster plane's failure as a catalog error.
    fn drop_view(&self, database: &str, id: DataSourceId) -> CatalogResult<()>;

    /// Resolves a view by name in the cluster plan.
    fn lookup_view(&self, database: &str, name: &str) -> Option<Arc<View>>;
}
