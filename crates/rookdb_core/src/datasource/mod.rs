//! Data source model.
//!
//! A data source is the common abstraction over collections and views
//! inside one database. Collections carry a load-state machine and a
//! globally-unique id; views are created, renamed, and dropped only.

mod collection;
mod view;

pub use collection::{
    Collection, CollectionGuard, CollectionParameters, CollectionStatus,
};
pub use view::{View, ViewParameters};

use crate::types::DataSourceId;
use std::sync::Arc;
use uuid::Uuid;

/// Maximum length of a data source name, in bytes.
pub const MAX_NAME_LENGTH: usize = 64;

/// Category of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    /// A document collection with a load-state machine.
    Collection,
    /// A view without load/unload states.
    View,
}

/// A registered data source: a collection or a view.
///
/// Cloning is cheap; both variants wrap shared handles. The registry's three
/// indices all hold clones of the same value.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A document collection.
    Collection(Arc<Collection>),
    /// A view.
    View(Arc<View>),
}

impl DataSource {
    /// Identifier of the data source.
    #[must_use]
    pub fn id(&self) -> DataSourceId {
        match self {
            Self::Collection(c) => c.id(),
            Self::View(v) => v.id(),
        }
    }

    /// Current name of the data source.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Collection(c) => c.name(),
            Self::View(v) => v.name(),
        }
    }

    /// Globally-unique id. `None` for views.
    #[must_use]
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Self::Collection(c) => Some(c.uuid()),
            Self::View(_) => None,
        }
    }

    /// Category of the data source.
    #[must_use]
    pub fn kind(&self) -> DataSourceKind {
        match self {
            Self::Collection(_) => DataSourceKind::Collection,
            Self::View(_) => DataSourceKind::View,
        }
    }

    /// Whether this is a system data source.
    #[must_use]
    pub fn is_system(&self) -> bool {
        match self {
            Self::Collection(c) => c.is_system(),
            Self::View(v) => v.is_system(),
        }
    }

    /// The collection handle, if this is a collection.
    #[must_use]
    pub fn as_collection(&self) -> Option<&Arc<Collection>> {
        match self {
            Self::Collection(c) => Some(c),
            Self::View(_) => None,
        }
    }

    /// The view handle, if this is a view.
    #[must_use]
    pub fn as_view(&self) -> Option<&Arc<View>> {
        match self {
            Self::View(v) => Some(v),
            Self::Collection(_) => None,
        }
    }
}

/// Whether `name` denotes a system data source.
#[must_use]
pub fn is_system_name(name: &str) -> bool {
    name.starts_with('_')
}

/// Checks a data source name against the naming rules.
///
/// Names start with a letter (or an underscore when `allow_system` is set),
/// continue with letters, digits, `_`, or `-`, and are at most
/// [`MAX_NAME_LENGTH`] bytes long.
#[must_use]
pub fn is_allowed_name(allow_system: bool, name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return false;
    }

    for (index, byte) in name.bytes().enumerate() {
        let ok = if index == 0 {
            byte.is_ascii_alphabetic() || (allow_system && byte == b'_')
        } else {
            byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
        };
        if !ok {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_allowed() {
        assert!(is_allowed_name(false, "products"));
        assert!(is_allowed_name(false, "Orders-2024"));
        assert!(is_allowed_name(false, "a"));
    }

    #[test]
    fn system_prefix_needs_permission() {
        assert!(!is_allowed_name(false, "_users"));
        assert!(is_allowed_name(true, "_users"));
    }

    #[test]
    fn rejects_bad_names() {
        assert!(!is_allowed_name(false, ""));
        assert!(!is_allowed_name(false, "1abc"));
        assert!(!is_allowed_name(false, "with space"));
        assert!(!is_allowed_name(false, "emoji🦀"));
        assert!(!is_allowed_name(false, &"x".repeat(MAX_NAME_LENGTH + 1)));
    }

    #[test]
    fn system_name_detection() {
        assert!(is_system_name("_graphs"));
        assert!(!is_system_name("graphs"));
        assert!(!is_system_name(""));
    }
}
