//! Core type definitions for the catalog.

use serde::Serialize;
use std::fmt;

/// Unique identifier for a data source within one database.
///
/// Ids are allocated from the database's tick counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DataSourceId(pub u64);

impl DataSourceId {
    /// Creates a new data source ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ds:{}", self.0)
    }
}

/// Unique identifier for a database instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseId(pub u64);

impl DatabaseId {
    /// Creates a new database ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db:{}", self.0)
    }
}

/// Identifier of a replication client (peer server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerId(pub u64);

impl ServerId {
    /// Creates a new server ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server:{}", self.0)
    }
}

/// Lifecycle state of a database instance.
///
/// The shutdown states signal the engine's compactor and cleanup activities
/// to run one last iteration each before the database is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    /// Regular operation.
    Normal,
    /// Shutdown in progress, compaction winding down.
    ShutdownCompactor,
    /// Shutdown in progress, cleanup winding down.
    ShutdownCleanup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_id_ordering() {
        let a = DataSourceId::new(1);
        let b = DataSourceId::new(2);
        assert!(a < b);
    }

    #[test]
    fn data_source_id_display() {
        let id = DataSourceId::new(42);
        assert_eq!(format!("{id}"), "ds:42");
    }

    #[test]
    fn database_id_display() {
        let id = DatabaseId::new(7);
        assert_eq!(format!("{id}"), "db:7");
    }
}
