//! Three-index data source registry.

use crate::datasource::{Collection, DataSource, DataSourceKind, View};
use crate::error::{CatalogError, CatalogResult};
use crate::types::DataSourceId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// The per-database mapping from data sources to their shared handles.
///
/// Three associative indices (by name, by id, by uuid) hold clones of the
/// same [`DataSource`] values, plus the active collection list and the
/// "dead" list of collections awaiting physical cleanup.
///
/// The registry itself is not synchronized: it lives inside the database's
/// registry lock, and mutating methods take `&mut self`, so holding the
/// write guard is the capability to call them.
///
/// # Invariants
///
/// After every mutation: `len(by_name) == len(by_id)` and
/// `len(by_uuid) <= len(by_id)` (views never register a uuid entry).
/// A rename in flight (between [`begin_rename`] and [`commit_rename`] /
/// [`abort_rename`]) temporarily double-counts the name index; both calls
/// happen under one write guard, so no reader observes it.
///
/// [`begin_rename`]: DataSourceRegistry::begin_rename
/// [`commit_rename`]: DataSourceRegistry::commit_rename
/// [`abort_rename`]: DataSourceRegistry::abort_rename
#[derive(Debug, Default)]
pub struct DataSourceRegistry {
    by_name: HashMap<String, DataSource>,
    by_id: HashMap<DataSourceId, DataSource>,
    by_uuid: HashMap<Uuid, DataSource>,
    collections: Vec<Arc<Collection>>,
    dead_collections: Vec<Arc<Collection>>,
}

impl DataSourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_invariants(&self) {
        debug_assert_eq!(self.by_name.len(), self.by_id.len());
        debug_assert!(self.by_uuid.len() <= self.by_id.len());
    }

    /// Looks up a data source by name.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<DataSource> {
        self.by_name.get(name).cloned()
    }

    /// Looks up a data source by identifier.
    #[must_use]
    pub fn lookup_by_id(&self, id: DataSourceId) -> Option<DataSource> {
        self.by_id.get(&id).cloned()
    }

    /// Looks up a data source by globally-unique id.
    #[must_use]
    pub fn lookup_by_uuid(&self, uuid: Uuid) -> Option<DataSource> {
        self.by_uuid.get(&uuid).cloned()
    }

    /// Registers a collection in all three indices and the active list.
    ///
    /// All-or-nothing: if any index insert hits a duplicate, earlier inserts
    /// are rolled back before the error is returned, leaving no partial
    /// entry behind.
    ///
    /// # Errors
    ///
    /// [`CatalogError::DuplicateName`], [`CatalogError::DuplicateIdentifier`],
    /// or [`CatalogError::DuplicateUuid`].
    pub fn register_collection(&mut self, collection: Arc<Collection>) -> CatalogResult<()> {
        let name = collection.name();
        let id = collection.id();
        let uuid = collection.uuid();

        self.check_invariants();

        let entry = DataSource::Collection(Arc::clone(&collection));

        if let Some(existing) = self.by_name.get(&name) {
            error!(
                name = %name,
                id = %id,
                existing_id = %existing.id(),
                "duplicate entry for collection name"
            );
            return Err(CatalogError::duplicate_name(name));
        }
        self.by_name.insert(name.clone(), entry.clone());

        if self.by_id.contains_key(&id) {
            self.by_name.remove(&name);
            error!(name = %name, id = %id, "duplicate collection identifier");
            return Err(CatalogError::duplicate_identifier(id, name));
        }
        self.by_id.insert(id, entry.clone());

        if self.by_uuid.contains_key(&uuid) {
            self.by_name.remove(&name);
            self.by_id.remove(&id);
            error!(name = %name, %uuid, "duplicate entry for collection uuid");
            return Err(CatalogError::duplicate_uuid(uuid, name));
        }
        self.by_uuid.insert(uuid, entry);

        self.collections.push(collection);

        self.check_invariants();
        Ok(())
    }

    /// Registers a view in the name and id indices.
    ///
    /// Same all-or-nothing guarantee as [`register_collection`].
    ///
    /// # Errors
    ///
    /// [`CatalogError::DuplicateName`] or
    /// [`CatalogError::DuplicateIdentifier`].
    ///
    /// [`register_collection`]: DataSourceRegistry::register_collection
    pub fn register_view(&mut self, view: Arc<View>) -> CatalogResult<()> {
        let name = view.name();
        let id = view.id();

        self.check_invariants();

        let entry = DataSource::View(view);

        if let Some(existing) = self.by_name.get(&name) {
            error!(
                name = %name,
                id = %id,
                existing_id = %existing.id(),
                "duplicate entry for view name"
            );
            return Err(CatalogError::duplicate_name(name));
        }
        self.by_name.insert(name.clone(), entry.clone());

        if self.by_id.contains_key(&id) {
            self.by_name.remove(&name);
            error!(name = %name, id = %id, "duplicate view identifier");
            return Err(CatalogError::duplicate_identifier(id, name));
        }
        self.by_id.insert(id, entry);

        self.check_invariants();
        Ok(())
    }

    /// Removes a collection from all three indices.
    ///
    /// An absent id or a view under that id is a no-op success: drop is
    /// idempotent with respect to "already gone". Erasure is keyed off the
    /// object actually found, not the caller's possibly-stale name, because
    /// a concurrent rename may have changed the name key.
    pub fn unregister_collection(&mut self, id: DataSourceId) -> bool {
        self.check_invariants();

        let found = match self.by_id.get(&id) {
            Some(ds) if ds.kind() == DataSourceKind::Collection => ds.clone(),
            _ => return true, // no such collection
        };

        self.by_id.remove(&id);
        self.by_name.remove(&found.name());
        if let Some(uuid) = found.uuid() {
            self.by_uuid.remove(&uuid);
        }

        self.check_invariants();
        true
    }

    /// Removes a view from the indices; same idempotence as
    /// [`unregister_collection`].
    ///
    /// [`unregister_collection`]: DataSourceRegistry::unregister_collection
    pub fn unregister_view(&mut self, id: DataSourceId) -> bool {
        self.check_invariants();

        let found = match self.by_id.get(&id) {
            Some(ds) if ds.kind() == DataSourceKind::View => ds.clone(),
            _ => return true, // no such view
        };

        self.by_id.remove(&id);
        self.by_name.remove(&found.name());

        self.check_invariants();
        true
    }

    /// Starts a rename: checks for conflicts and inserts the new name key.
    ///
    /// The old key stays in place until [`commit_rename`]; on persistence
    /// failure the caller rolls back with [`abort_rename`].
    ///
    /// # Errors
    ///
    /// [`CatalogError::DuplicateName`] if `new_name` maps to a different
    /// object; [`CatalogError::NotFound`] if `old_name` is absent or is not
    /// of the expected kind.
    ///
    /// [`commit_rename`]: DataSourceRegistry::commit_rename
    /// [`abort_rename`]: DataSourceRegistry::abort_rename
    pub fn begin_rename(
        &mut self,
        old_name: &str,
        new_name: &str,
        kind: DataSourceKind,
    ) -> CatalogResult<DataSource> {
        if self.by_name.contains_key(new_name) {
            return Err(CatalogError::duplicate_name(new_name));
        }

        let found = match self.by_name.get(old_name) {
            Some(ds) if ds.kind() == kind => ds.clone(),
            _ => return Err(CatalogError::not_found(old_name)),
        };

        self.by_name.insert(new_name.to_owned(), found.clone());
        Ok(found)
    }

    /// Completes a rename by removing the old name key.
    pub fn commit_rename(&mut self, old_name: &str) {
        self.by_name.remove(old_name);
        self.check_invariants();
    }

    /// Rolls a rename back by removing the new name key; the old key is
    /// left intact.
    pub fn abort_rename(&mut self, new_name: &str) {
        self.by_name.remove(new_name);
        self.check_invariants();
    }

    /// Moves a collection from the active list to the dead list.
    ///
    /// Called at the moment the collection's status becomes `Deleted`,
    /// under the registry write lock; the physical release happens later
    /// when the dead list is drained.
    pub fn retire_collection(&mut self, collection: &Arc<Collection>) {
        if let Some(position) = self
            .collections
            .iter()
            .position(|c| Arc::ptr_eq(c, collection))
        {
            let dead = self.collections.remove(position);
            self.dead_collections.push(dead);
        }
    }

    /// Takes every dead collection, handing them to the reaper.
    pub fn drain_dead(&mut self) -> Vec<Arc<Collection>> {
        std::mem::take(&mut self.dead_collections)
    }

    /// Snapshots the collection handles.
    ///
    /// With `include_deleted`, retired collections awaiting cleanup are
    /// included; the cleanup activity needs them.
    #[must_use]
    pub fn collections(&self, include_deleted: bool) -> Vec<Arc<Collection>> {
        let mut result: Vec<_> = self.collections.to_vec();
        if include_deleted {
            result.extend(self.dead_collections.iter().cloned());
        }
        result
    }

    /// Snapshots the registered view handles.
    #[must_use]
    pub fn views(&self) -> Vec<Arc<View>> {
        self.by_id
            .values()
            .filter_map(|ds| ds.as_view().cloned())
            .collect()
    }

    /// Names of all registered collections.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.by_name
            .iter()
            .filter(|(_, ds)| ds.kind() == DataSourceKind::Collection)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Clears all three indices; used at shutdown.
    pub fn clear_indices(&mut self) {
        self.check_invariants();
        self.by_name.clear();
        self.by_id.clear();
        self.by_uuid.clear();
        self.check_invariants();
    }

    /// Number of entries in the name index.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.by_name.len()
    }

    /// Number of entries in the id index.
    #[must_use]
    pub fn id_count(&self) -> usize {
        self.by_id.len()
    }

    /// Number of entries in the uuid index.
    #[must_use]
    pub fn uuid_count(&self) -> usize {
        self.by_uuid.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collection(name: &str, id: u64) -> Arc<Collection> {
        Collection::new(
            "db".to_owned(),
            DataSourceId::new(id),
            Uuid::new_v4(),
            name.to_owned(),
            false,
        )
    }

    fn view(name: &str, id: u64) -> Arc<View> {
        View::new("db".to_owned(), DataSourceId::new(id), name.to_owned(), false)
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = DataSourceRegistry::new();
        let users = collection("users", 1);
        registry.register_collection(Arc::clone(&users)).unwrap();

        assert!(registry.lookup_by_name("users").is_some());
        assert!(registry.lookup_by_id(DataSourceId::new(1)).is_some());
        assert!(registry.lookup_by_uuid(users.uuid()).is_some());
        assert_eq!(registry.name_count(), registry.id_count());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = DataSourceRegistry::new();
        registry.register_collection(collection("users", 1)).unwrap();

        let err = registry
            .register_collection(collection("users", 2))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName { .. }));
        assert_eq!(registry.id_count(), 1);
    }

    #[test]
    fn duplicate_id_rolls_back_name_entry() {
        let mut registry = DataSourceRegistry::new();
        registry.register_collection(collection("users", 1)).unwrap();

        let err = registry
            .register_collection(collection("orders", 1))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateIdentifier { .. }));

        // no partial entry may survive
        assert!(registry.lookup_by_name("orders").is_none());
        assert_eq!(registry.name_count(), registry.id_count());
    }

    #[test]
    fn duplicate_uuid_rolls_back_name_and_id() {
        let mut registry = DataSourceRegistry::new();
        let first = collection("users", 1);
        let uuid = first.uuid();
        registry.register_collection(first).unwrap();

        let twin = Collection::new(
            "db".to_owned(),
            DataSourceId::new(2),
            uuid,
            "orders".to_owned(),
            false,
        );
        let err = registry.register_collection(twin).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateUuid { .. }));
        assert!(registry.lookup_by_name("orders").is_none());
        assert!(registry.lookup_by_id(DataSourceId::new(2)).is_none());
        assert_eq!(registry.uuid_count(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut registry = DataSourceRegistry::new();
        let users = collection("users", 1);
        registry.register_collection(Arc::clone(&users)).unwrap();

        assert!(registry.unregister_collection(users.id()));
        assert!(registry.lookup_by_name("users").is_none());

        // already gone: still a success, no mutation
        assert!(registry.unregister_collection(users.id()));
        assert_eq!(registry.name_count(), 0);
    }

    #[test]
    fn unregister_respects_kind() {
        let mut registry = DataSourceRegistry::new();
        registry.register_view(view("v", 1)).unwrap();

        // a view under that id: collection unregister is a no-op success
        assert!(registry.unregister_collection(DataSourceId::new(1)));
        assert!(registry.lookup_by_name("v").is_some());
    }

    #[test]
    fn unregister_after_rename_uses_current_name() {
        let mut registry = DataSourceRegistry::new();
        let users = collection("users", 1);
        registry.register_collection(Arc::clone(&users)).unwrap();

        registry
            .begin_rename("users", "people", DataSourceKind::Collection)
            .unwrap();
        registry.commit_rename("users");
        users.set_name("people".to_owned());

        assert!(registry.unregister_collection(users.id()));
        assert!(registry.lookup_by_name("people").is_none());
        assert_eq!(registry.name_count(), 0);
    }

    #[test]
    fn rename_conflict_leaves_both_mappings() {
        let mut registry = DataSourceRegistry::new();
        registry.register_collection(collection("users", 1)).unwrap();
        registry.register_collection(collection("orders", 2)).unwrap();

        let err = registry
            .begin_rename("users", "orders", DataSourceKind::Collection)
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName { .. }));
        assert_eq!(
            registry.lookup_by_name("users").unwrap().id(),
            DataSourceId::new(1)
        );
        assert_eq!(
            registry.lookup_by_name("orders").unwrap().id(),
            DataSourceId::new(2)
        );
    }

    #[test]
    fn rename_abort_restores_old_state() {
        let mut registry = DataSourceRegistry::new();
        registry.register_collection(collection("users", 1)).unwrap();

        registry
            .begin_rename("users", "people", DataSourceKind::Collection)
            .unwrap();
        registry.abort_rename("people");

        assert!(registry.lookup_by_name("users").is_some());
        assert!(registry.lookup_by_name("people").is_none());
        assert_eq!(registry.name_count(), registry.id_count());
    }

    #[test]
    fn retire_moves_to_dead_list() {
        let mut registry = DataSourceRegistry::new();
        let users = collection("users", 1);
        registry.register_collection(Arc::clone(&users)).unwrap();

        registry.retire_collection(&users);
        assert!(registry.collections(false).is_empty());
        assert_eq!(registry.collections(true).len(), 1);

        let dead = registry.drain_dead();
        assert_eq!(dead.len(), 1);
        assert!(registry.collections(true).is_empty());
    }

    proptest! {
        /// The index invariant holds after any sequence of registrations
        /// and unregistrations.
        #[test]
        fn indices_stay_aligned(ops in prop::collection::vec((0u8..3, 0u64..8), 1..64)) {
            let mut registry = DataSourceRegistry::new();
            for (op, id) in ops {
                match op {
                    0 => {
                        let _ = registry.register_collection(
                            collection(&format!("c{id}"), id),
                        );
                    }
                    1 => {
                        let _ = registry.register_view(
                            view(&format!("v{id}"), 100 + id),
                        );
                    }
                    _ => {
                        registry.unregister_collection(DataSourceId::new(id));
                        registry.unregister_view(DataSourceId::new(100 + id));
                    }
                }
                prop_assert_eq!(registry.name_count(), registry.id_count());
                prop_assert!(registry.uuid_count() <= registry.id_count());
            }
        }
    }
}
