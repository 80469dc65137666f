//! Storage - origin-tagged writes over the persistent store.
//!
//! Reads go straight to the [`PersistentStore`]. Point writes take an
//! [`Origin`] and are announced on the [`ChangeFeed`] once they succeed.

use crate::{
    changes::{ChangeFeed, ChangeKind, StorageChange},
    error::Result,
    persistent::PersistentStore,
    query::{Pagination, QueryOne},
    KvBackend, Origin, Record,
};
use tokio::sync::broadcast;

/// Persistent store plus change notifications.
pub struct Storage<B> {
    store: PersistentStore<B>,
    feed: ChangeFeed,
}

impl<B: KvBackend> Storage<B> {
    pub fn new(store: PersistentStore<B>) -> Self {
        Self::with_feed(store, ChangeFeed::default())
    }

    pub fn with_feed(store: PersistentStore<B>, feed: ChangeFeed) -> Self {
        Self { store, feed }
    }

    pub fn persistent(&self) -> &PersistentStore<B> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.feed.subscribe()
    }

    /// Save a record on behalf of `origin`.
    pub async fn save(&self, store_name: &str, record: &Record, origin: Origin) -> Result<()> {
        self.store.save(store_name, record).await?;
        self.announce(store_name, ChangeKind::Save, record, origin);
        Ok(())
    }

    /// Delete a record on behalf of `origin`.
    pub async fn delete(&self, store_name: &str, record: &Record, origin: Origin) -> Result<()> {
        self.store.delete(&record.id, store_name).await?;
        self.announce(store_name, ChangeKind::Delete, record, origin);
        Ok(())
    }

    /// Bulk write used for hydration. Nothing is announced.
    pub async fn batch_save(&self, store_name: &str, records: &[Record]) -> Result<()> {
        self.store.batch_save(store_name, records).await
    }

    pub async fn get(&self, id: &str, store_name: &str) -> Result<Option<Record>> {
        self.store.get(id, store_name).await
    }

    pub async fn get_one(&self, which: QueryOne, store_name: &str) -> Result<Option<Record>> {
        self.store.get_one(which, store_name).await
    }

    pub async fn get_all(
        &self,
        store_name: &str,
        pagination: Option<Pagination>,
    ) -> Result<Vec<Record>> {
        self.store.get_all(store_name, pagination).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    fn announce(&self, store_name: &str, kind: ChangeKind, record: &Record, origin: Origin) {
        tracing::debug!(
            store = %store_name,
            id = %record.id,
            ?kind,
            ?origin,
            "Storage write"
        );
        self.feed.publish(StorageChange {
            store: store_name.to_string(),
            kind,
            record: record.clone(),
            origin,
        });
    }
}
