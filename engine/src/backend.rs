//! Key-value backend contract and an in-memory implementation.
//!
//! The persistent store only needs a flat string-to-string map with a few
//! bulk primitives. Anything that can provide them (SQLite, a platform
//! key-value API, an in-memory map) can back the engine.

use crate::error::{Error, KeyError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

/// Flat key-value storage.
///
/// `get_all_keys` must enumerate keys in a stable natural order; the store's
/// paginated scans rely on it.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read one value. Missing keys yield `None`.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    /// Read several values, in request order.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>>;

    /// Write several values atomically.
    ///
    /// On failure nothing is written and [`Error::BatchWrite`] lists every
    /// rejected key.
    async fn multi_set(&self, pairs: Vec<(String, String)>) -> Result<()>;

    /// Remove one key. Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> Result<()>;

    async fn multi_remove(&self, keys: &[String]) -> Result<()>;

    async fn get_all_keys(&self) -> Result<Vec<String>>;
}

/// In-memory backend ordered by key.
///
/// Writes to keys registered with [`MemoryBackend::reject_writes_to`] fail,
/// which lets callers exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
    rejected: RwLock<HashSet<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future write to `key` fail.
    pub async fn reject_writes_to(&self, key: impl Into<String>) {
        self.rejected.write().await.insert(key.into());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn rejection(key: &str) -> KeyError {
        KeyError::new(key, "write rejected")
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        if self.rejected.read().await.contains(key) {
            return Err(Error::Backend(Self::rejection(key).to_string()));
        }
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .map(|key| (key.clone(), entries.get(key).cloned()))
            .collect())
    }

    async fn multi_set(&self, pairs: Vec<(String, String)>) -> Result<()> {
        let rejected = self.rejected.read().await;
        let errors: Vec<KeyError> = pairs
            .iter()
            .filter(|(key, _)| rejected.contains(key))
            .map(|(key, _)| Self::rejection(key))
            .collect();
        if !errors.is_empty() {
            return Err(Error::BatchWrite(errors));
        }

        let mut entries = self.entries.write().await;
        entries.extend(pairs);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
