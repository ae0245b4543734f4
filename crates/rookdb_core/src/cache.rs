//! Query plan cache invalidation hooks.
//!
//! Structural changes to a database's data sources invalidate cached query
//! plans. The catalog does not own a plan cache; it calls out through this
//! trait at the points where the set of data sources, or their names,
//! change.

use parking_lot::Mutex;

/// Receiver for cache invalidation events.
pub trait QueryCache: Send + Sync {
    /// Every cached plan for `database` is stale.
    fn invalidate(&self, database: &str);

    /// Plans referring to any of `names` in `database` are stale. Rename
    /// passes both the old and the new name.
    fn invalidate_names(&self, database: &str, names: &[&str]);
}

/// A cache that caches nothing; the default wiring.
#[derive(Debug, Default)]
pub struct NoopQueryCache;

impl QueryCache for NoopQueryCache {
    fn invalidate(&self, _database: &str) {}

    fn invalidate_names(&self, _database: &str, _names: &[&str]) {}
}

/// Records invalidation events; for tests.
#[derive(Debug, Default)]
pub struct RecordingQueryCache {
    events: Mutex<Vec<String>>,
}

impl RecordingQueryCache {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The events recorded so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl QueryCache for RecordingQueryCache {
    fn invalidate(&self, database: &str) {
        self.events.lock().push(format!("invalidate {database}"));
    }

    fn invalidate_names(&self, database: &str, names: &[&str]) {
        self.events
            .lock()
            .push(format!("invalidate {database} [{}]", names.join(", ")));
    }
}
