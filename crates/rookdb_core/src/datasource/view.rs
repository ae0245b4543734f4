//! Views.

use crate::types::DataSourceId;
use parking_lot::RwLock;
use rookdb_storage::SourceDescriptor;
use std::fmt;
use std::sync::Arc;

/// Parameters for creating a view.
#[derive(Debug, Clone)]
pub struct ViewParameters {
    /// Name of the new view.
    pub name: String,
    /// Explicit identifier; assigned from the tick counter when `None`.
    pub id: Option<DataSourceId>,
    /// Whether a system name (leading underscore) is permitted.
    pub is_system: bool,
}

impl ViewParameters {
    /// Creates parameters for a non-system view.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            is_system: false,
        }
    }

    /// Sets an explicit identifier.
    #[must_use]
    pub const fn with_id(mut self, id: DataSourceId) -> Self {
        self.id = Some(id);
        self
    }
}

/// A view: a data source without load/unload states.
///
/// The lock serializes structural operations on the view against any party
/// that pins it; the drop workflow takes it exclusively.
pub struct View {
    id: DataSourceId,
    database: String,
    name: RwLock<String>,
    is_system: bool,
    lock: Arc<RwLock<()>>,
}

impl View {
    /// Allocates a new view.
    pub(crate) fn new(
        database: String,
        id: DataSourceId,
        name: String,
        is_system: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            database,
            name: RwLock::new(name),
            is_system,
            lock: Arc::new(RwLock::new(())),
        })
    }

    /// Identifier of the view.
    #[must_use]
    pub fn id(&self) -> DataSourceId {
        self.id
    }

    /// Current name of the view.
    #[must_use]
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Whether this is a system view.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Descriptor for crossing the storage boundary.
    #[must_use]
    pub fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            database: self.database.clone(),
            id: self.id.as_u64(),
            name: self.name(),
            uuid: None,
            is_system: self.is_system,
        }
    }

    /// The view's structural lock.
    pub(crate) fn lock_cell(&self) -> &Arc<RwLock<()>> {
        &self.lock
    }

    /// Replaces the name. Caller must hold the registry write lock.
    pub(crate) fn set_name(&self, name: String) {
        *self.name.write() = name;
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_has_no_uuid() {
        let view = View::new("db".to_owned(), DataSourceId::new(9), "v".to_owned(), false);
        let desc = view.descriptor();
        assert_eq!(desc.id, 9);
        assert!(desc.uuid.is_none());
    }
}
