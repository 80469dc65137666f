//! PersistentStore - records and per-store Collection indexes on top of a
//! flat key-value backend.
//!
//! Each store keeps two kinds of keys (see [`crate::keys`]):
//!
//! - one data key per record, holding the serialized record
//! - one Collection key, holding a JSON array of the store's data keys in
//!   the order they were first saved
//!
//! `save` and `delete` update the Collection index with a read-modify-write.
//! The backend has no compare-and-swap, so the read and the write are
//! serialized per store with an in-process lock. Two processes sharing one
//! backend can still lose index updates; callers must keep at most one
//! writer per store across processes.

use crate::{
    backend::KvBackend,
    error::Result,
    keys::KeySchema,
    query::{Pagination, QueryOne},
    Record,
};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Changes made by [`PersistentStore::reindex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexRepair {
    /// Data keys that were missing from the index
    pub appended: usize,
    /// Index entries without a data entry
    pub pruned: usize,
}

impl IndexRepair {
    pub fn is_noop(&self) -> bool {
        self.appended == 0 && self.pruned == 0
    }
}

/// Record storage keyed by `(store, id)`.
pub struct PersistentStore<B> {
    backend: B,
    keys: KeySchema,
    index_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<B: KvBackend> PersistentStore<B> {
    /// Create a store using the default namespace.
    pub fn new(backend: B) -> Self {
        Self::with_keys(backend, KeySchema::default())
    }

    pub fn with_keys(backend: B, keys: KeySchema) -> Self {
        Self {
            backend,
            keys,
            index_locks: DashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn keys(&self) -> &KeySchema {
        &self.keys
    }

    /// Write `item` and make sure its key is in the Collection index.
    ///
    /// Saving an id that already exists replaces the record and leaves the
    /// index position unchanged.
    pub async fn save(&self, store_name: &str, item: &Record) -> Result<()> {
        let item_key = self.keys.data_key(store_name, &item.id);
        self.backend
            .set_item(&item_key, serde_json::to_string(item)?)
            .await?;

        let _guard = self.lock_index(store_name).await;
        let mut collection = self.read_collection(store_name).await?;
        if !collection.contains(&item_key) {
            collection.push(item_key);
            self.write_collection(store_name, &collection).await?;
        }

        tracing::debug!(store = %store_name, id = %item.id, "Saved record");
        Ok(())
    }

    /// Write all `items` in one atomic multi-key write.
    ///
    /// The Collection index is not touched: batch-written records are
    /// visible to `get` and `get_all` but not to `get_one` until
    /// [`PersistentStore::reindex`] runs.
    pub async fn batch_save(&self, store_name: &str, items: &[Record]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let pairs = items
            .iter()
            .map(|item| {
                let key = self.keys.data_key(store_name, &item.id);
                serde_json::to_string(item).map(|value| (key, value))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.backend.multi_set(pairs).await?;

        tracing::debug!(store = %store_name, count = items.len(), "Batch saved records");
        Ok(())
    }

    /// Get a record by ID.
    pub async fn get(&self, id: &str, store_name: &str) -> Result<Option<Record>> {
        let item_key = self.keys.data_key(store_name, id);
        self.read_record(&item_key).await
    }

    /// Get the first or last record in Collection index order.
    pub async fn get_one(&self, which: QueryOne, store_name: &str) -> Result<Option<Record>> {
        let collection = self.read_collection(store_name).await?;
        let item_key = match which {
            QueryOne::First => collection.first(),
            QueryOne::Last => collection.last(),
        };

        let Some(item_key) = item_key else {
            return Ok(None);
        };

        let record = self.read_record(item_key).await?;
        if record.is_none() {
            tracing::warn!(
                store = %store_name,
                key = %item_key,
                "Collection index entry has no data"
            );
        }
        Ok(record)
    }

    /// Get a page of the store's records in key order.
    ///
    /// This scans every key in the backend, so the order is the backend's
    /// key order, not save order.
    pub async fn get_all(
        &self,
        store_name: &str,
        pagination: Option<Pagination>,
    ) -> Result<Vec<Record>> {
        let pagination = pagination.unwrap_or_default();
        let matching = self
            .store_data_keys(store_name)
            .await?
            .into_iter()
            .skip(pagination.start());
        let selected: Vec<String> = match pagination.end() {
            Some(_) => matching.take(pagination.limit).collect(),
            None => matching.collect(),
        };

        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(selected.len());
        for (key, value) in self.backend.multi_get(&selected).await? {
            // Removed between the scan and the read.
            let Some(value) = value else {
                tracing::debug!(store = %store_name, key = %key, "Key vanished during scan");
                continue;
            };
            // A stored `null` is not a record.
            if let Some(record) = serde_json::from_str::<Option<Record>>(&value)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Remove a record and its Collection index entry.
    ///
    /// Deleting a missing id is a no-op.
    pub async fn delete(&self, id: &str, store_name: &str) -> Result<()> {
        let item_key = self.keys.data_key(store_name, id);

        {
            let _guard = self.lock_index(store_name).await;
            let mut collection = self.read_collection(store_name).await?;
            if let Some(pos) = collection.iter().position(|key| *key == item_key) {
                collection.remove(pos);
                self.write_collection(store_name, &collection).await?;
            }
        }

        self.backend.remove_item(&item_key).await?;

        tracing::debug!(store = %store_name, id = %id, "Deleted record");
        Ok(())
    }

    /// Remove every key in this namespace, across all stores.
    pub async fn clear(&self) -> Result<()> {
        let owned: Vec<String> = self
            .backend
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|key| self.keys.owns(key))
            .collect();

        if !owned.is_empty() {
            self.backend.multi_remove(&owned).await?;
        }

        tracing::info!(
            namespace = %self.keys.namespace(),
            removed = owned.len(),
            "Cleared datastore"
        );
        Ok(())
    }

    /// Bring the Collection index back in line with the data entries.
    ///
    /// Entries whose data is gone are dropped. Data keys missing from the
    /// index (typically written by `batch_save`) are appended in key order.
    /// Surviving entries keep their position.
    pub async fn reindex(&self, store_name: &str) -> Result<IndexRepair> {
        let _guard = self.lock_index(store_name).await;

        let data_keys = self.store_data_keys(store_name).await?;
        let live: HashSet<&str> = data_keys.iter().map(String::as_str).collect();
        let mut collection = self.read_collection(store_name).await?;

        let before = collection.len();
        let mut seen = HashSet::new();
        collection.retain(|key| live.contains(key.as_str()) && seen.insert(key.clone()));
        let pruned = before - collection.len();

        let mut appended = 0;
        for key in &data_keys {
            if !seen.contains(key) {
                collection.push(key.clone());
                appended += 1;
            }
        }

        let repair = IndexRepair { appended, pruned };
        if !repair.is_noop() {
            self.write_collection(store_name, &collection).await?;
            tracing::info!(
                store = %store_name,
                appended = repair.appended,
                pruned = repair.pruned,
                "Repaired collection index"
            );
        }
        Ok(repair)
    }

    /// Current Collection index of a store.
    pub async fn collection(&self, store_name: &str) -> Result<Vec<String>> {
        self.read_collection(store_name).await
    }

    async fn lock_index(&self, store_name: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .index_locks
            .entry(store_name.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    async fn store_data_keys(&self, store_name: &str) -> Result<Vec<String>> {
        Ok(self
            .backend
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|key| self.keys.is_data_key(store_name, key))
            .collect())
    }

    async fn read_record(&self, item_key: &str) -> Result<Option<Record>> {
        match self.backend.get_item(item_key).await? {
            // A stored `null` reads as no value.
            Some(value) => Ok(serde_json::from_str::<Option<Record>>(&value)?),
            None => Ok(None),
        }
    }

    async fn read_collection(&self, store_name: &str) -> Result<Vec<String>> {
        let store_key = self.keys.collection_key(store_name);
        match self.backend.get_item(&store_key).await? {
            // A stored `null` is treated like a missing index.
            Some(value) => {
                let collection: Option<Vec<String>> = serde_json::from_str(&value)?;
                Ok(collection.unwrap_or_default())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn write_collection(&self, store_name: &str, collection: &[String]) -> Result<()> {
        let store_key = self.keys.collection_key(store_name);
        self.backend
            .set_item(&store_key, serde_json::to_string(collection)?)
            .await
    }
}
