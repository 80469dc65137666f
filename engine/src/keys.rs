//! Key schema for the flat key-value namespace.
//!
//! Every key the engine writes lives under a single namespace:
//!
//! - data:       `<namespace>::<store>::Data::<id>`
//! - collection: `<namespace>::<store>::Collection`
//!
//! The layout is shared with data persisted by earlier clients, so it must
//! not change.

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "@AmplifyDatastore";

const SEPARATOR: &str = "::";
const COLLECTION: &str = "Collection";
const DATA: &str = "Data";

/// Builds and recognizes keys for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    namespace: String,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeySchema {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key holding the serialized record.
    pub fn data_key(&self, store: &str, id: &str) -> String {
        format!(
            "{}{SEPARATOR}{store}{SEPARATOR}{DATA}{SEPARATOR}{id}",
            self.namespace
        )
    }

    /// Key holding the store's Collection index.
    pub fn collection_key(&self, store: &str) -> String {
        format!("{}{SEPARATOR}{store}{SEPARATOR}{COLLECTION}", self.namespace)
    }

    /// Prefix shared by all of a store's data keys.
    pub fn data_prefix(&self, store: &str) -> String {
        format!("{}{SEPARATOR}{store}{SEPARATOR}{DATA}", self.namespace)
    }

    /// Whether `key` is a data key of `store`.
    ///
    /// Requires the separator after the prefix so a store named `Post`
    /// never claims keys of a store named `Post::Data...`.
    pub fn is_data_key(&self, store: &str, key: &str) -> bool {
        key.strip_prefix(&self.data_prefix(store))
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }

    /// Whether `key` belongs to this namespace at all.
    pub fn owns(&self, key: &str) -> bool {
        key.starts_with(&self.namespace)
    }
}
