//! Database configuration.

use std::time::Duration;

/// Kind of a database instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// A regular user database.
    Normal,
    /// The system database. Never dangles and its system collections are
    /// protected from dropping.
    System,
}

/// Role of the server process this database lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    /// A single server or shard server; data sources are managed locally.
    Single,
    /// A cluster coordinator; view management is delegated to the
    /// distributed metadata store.
    Coordinator,
}

/// Configuration for a database instance.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Kind of the database.
    pub kind: DatabaseKind,

    /// Role of the owning server process.
    pub role: ServerRole,

    /// Sleep between polls while a collection is in the `Loading` state.
    pub status_poll_interval: Duration,

    /// Surface `NotLoaded` to callers instead of polling through `Loading`.
    pub throw_collection_not_loaded: bool,

    /// Flush metadata changes to durable storage synchronously.
    pub force_sync_properties: bool,

    /// Skip recoverable datafile damage when opening collections.
    pub ignore_datafile_errors: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseKind::Normal,
            role: ServerRole::Single,
            status_poll_interval: Duration::from_millis(10),
            throw_collection_not_loaded: false,
            force_sync_properties: true,
            ignore_datafile_errors: false,
        }
    }
}

impl DatabaseConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database kind.
    #[must_use]
    pub const fn kind(mut self, value: DatabaseKind) -> Self {
        self.kind = value;
        self
    }

    /// Sets the server role.
    #[must_use]
    pub const fn role(mut self, value: ServerRole) -> Self {
        self.role = value;
        self
    }

    /// Sets the status poll interval.
    #[must_use]
    pub const fn status_poll_interval(mut self, value: Duration) -> Self {
        self.status_poll_interval = value;
        self
    }

    /// Sets whether to surface `NotLoaded` instead of polling.
    #[must_use]
    pub const fn throw_collection_not_loaded(mut self, value: bool) -> Self {
        self.throw_collection_not_loaded = value;
        self
    }

    /// Sets whether metadata changes are flushed synchronously.
    #[must_use]
    pub const fn force_sync_properties(mut self, value: bool) -> Self {
        self.force_sync_properties = value;
        self
    }

    /// Sets whether recoverable datafile damage is ignored on open.
    #[must_use]
    pub const fn ignore_datafile_errors(mut self, value: bool) -> Self {
        self.ignore_datafile_errors = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.kind, DatabaseKind::Normal);
        assert_eq!(config.role, ServerRole::Single);
        assert!(!config.throw_collection_not_loaded);
        assert!(config.force_sync_properties);
    }

    #[test]
    fn builder_pattern() {
        let config = DatabaseConfig::new()
            .kind(DatabaseKind::System)
            .role(ServerRole::Coordinator)
            .status_poll_interval(Duration::from_millis(1));

        assert_eq!(config.kind, DatabaseKind::System);
        assert_eq!(config.role, ServerRole::Coordinator);
        assert_eq!(config.status_poll_interval, Duration::from_millis(1));
    }
}
