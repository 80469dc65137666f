//! Merge engine - applies incoming remote records to local storage.
//!
//! # Precedence
//!
//! A local mutation that the remote has not acknowledged yet wins over any
//! remote record for the same id. `merge` therefore asks the outbox first
//! and drops the remote record when anything is pending; the pending
//! mutation is reconciled with the remote later. With nothing pending the
//! remote record replaces local state (or deletes it when tombstoned).
//!
//! # Pages
//!
//! `merge_page` is the bulk path for base and catch-up sync. It skips
//! tombstones and writes the rest in one batch **without** asking the
//! outbox. It is only correct when no local mutation against these ids can
//! exist yet, such as initial hydration. Use `merge_page_checked` (or set
//! [`EngineConfig::verify_hydration`]) to have that precondition verified.
//!
//! All writes are tagged [`Origin::Sync`].

use crate::{
    config::EngineConfig,
    error::{Error, Result},
    outbox::MutationOutbox,
    storage::Storage,
    KvBackend, Origin, Record, RecordId,
};
use std::sync::Arc;

/// What `merge` did with a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The record was saved over local state
    Saved,
    /// The tombstone removed the local record
    Deleted,
    /// Local mutations are pending, the remote record was dropped
    Deferred { pending: usize },
}

impl MergeOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, MergeOutcome::Deferred { .. })
    }
}

/// Result of a page merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMerge {
    /// IDs batch-written, in page order
    pub written: Vec<RecordId>,
    /// Tombstones left out of the batch
    pub skipped_tombstones: usize,
}

/// Reconciles remote records against local storage and the outbox.
pub struct MergeEngine<B, O> {
    storage: Arc<Storage<B>>,
    outbox: Arc<O>,
    verify_hydration: bool,
}

impl<B: KvBackend, O: MutationOutbox> MergeEngine<B, O> {
    pub fn new(storage: Arc<Storage<B>>, outbox: Arc<O>) -> Self {
        Self {
            storage,
            outbox,
            verify_hydration: false,
        }
    }

    pub fn with_config(storage: Arc<Storage<B>>, outbox: Arc<O>, config: &EngineConfig) -> Self {
        Self {
            storage,
            outbox,
            verify_hydration: config.verify_hydration,
        }
    }

    pub fn storage(&self) -> &Storage<B> {
        &self.storage
    }

    /// Apply one remote record unless a local mutation for it is pending.
    pub async fn merge(&self, store_name: &str, model: &Record) -> Result<MergeOutcome> {
        let pending = self.outbox.get_for_model(store_name, &model.id).await?;

        if !pending.is_empty() {
            tracing::debug!(
                store = %store_name,
                id = %model.id,
                pending = pending.len(),
                "Local mutations pending, dropping remote record"
            );
            return Ok(MergeOutcome::Deferred {
                pending: pending.len(),
            });
        }

        if model.deleted {
            self.storage.delete(store_name, model, Origin::Sync).await?;
            Ok(MergeOutcome::Deleted)
        } else {
            self.storage.save(store_name, model, Origin::Sync).await?;
            Ok(MergeOutcome::Saved)
        }
    }

    /// Batch-write the live records of a page, skipping tombstones.
    ///
    /// The outbox is not consulted unless hydration checks are enabled.
    pub async fn merge_page(&self, store_name: &str, items: &[Record]) -> Result<PageMerge> {
        if self.verify_hydration {
            return self.merge_page_checked(store_name, items).await;
        }
        self.write_page(store_name, items).await
    }

    /// Like `merge_page`, but fails before writing anything when any live
    /// record of the page has pending local mutations.
    pub async fn merge_page_checked(
        &self,
        store_name: &str,
        items: &[Record],
    ) -> Result<PageMerge> {
        let mut conflicting = Vec::new();
        for item in items.iter().filter(|item| item.is_active()) {
            if !self
                .outbox
                .get_for_model(store_name, &item.id)
                .await?
                .is_empty()
            {
                conflicting.push(item.id.clone());
            }
        }

        if !conflicting.is_empty() {
            return Err(Error::PendingMutations {
                store: store_name.to_string(),
                ids: conflicting,
            });
        }

        self.write_page(store_name, items).await
    }

    async fn write_page(&self, store_name: &str, items: &[Record]) -> Result<PageMerge> {
        let live: Vec<Record> = items.iter().filter(|item| item.is_active()).cloned().collect();
        let skipped_tombstones = items.len() - live.len();

        self.storage.batch_save(store_name, &live).await?;

        tracing::debug!(
            store = %store_name,
            written = live.len(),
            skipped_tombstones,
            "Merged page"
        );

        Ok(PageMerge {
            written: live.into_iter().map(|item| item.id).collect(),
            skipped_tombstones,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::MemoryBackend,
        changes::ChangeKind,
        outbox::{MemoryOutbox, MutationKind},
        persistent::PersistentStore,
    };
    use serde_json::json;

    struct Fixture {
        engine: MergeEngine<MemoryBackend, MemoryOutbox>,
        outbox: Arc<MemoryOutbox>,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(Storage::new(PersistentStore::new(MemoryBackend::new())));
        let outbox = Arc::new(MemoryOutbox::new());
        Fixture {
            engine: MergeEngine::new(storage, Arc::clone(&outbox)),
            outbox,
        }
    }

    fn post(id: &str, title: &str) -> Record {
        Record::new(id)
            .with_field("title", title)
            .with_server_meta(1, 1000)
    }

    #[tokio::test]
    async fn merge_saves_when_nothing_pending() {
        let f = fixture();
        let remote = post("p1", "remote");

        let outcome = f.engine.merge("Post", &remote).await.unwrap();

        assert_eq!(outcome, MergeOutcome::Saved);
        assert_eq!(f.engine.storage().get("p1", "Post").await.unwrap(), Some(remote));
    }

    #[tokio::test]
    async fn merge_deletes_on_tombstone() {
        let f = fixture();
        f.engine.merge("Post", &post("p1", "a")).await.unwrap();

        let outcome = f
            .engine
            .merge("Post", &post("p1", "a").tombstone())
            .await
            .unwrap();

        assert_eq!(outcome, MergeOutcome::Deleted);
        assert_eq!(f.engine.storage().get("p1", "Post").await.unwrap(), None);
        assert!(f
            .engine
            .storage()
            .persistent()
            .collection("Post")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn pending_mutation_wins() {
        let f = fixture();
        let local = post("p1", "local");
        f.engine
            .storage()
            .save("Post", &local, Origin::User)
            .await
            .unwrap();
        f.outbox
            .enqueue("Post", "p1", MutationKind::Update, json!({"title": "local"}))
            .await;

        let outcome = f.engine.merge("Post", &post("p1", "remote")).await.unwrap();

        assert_eq!(outcome, MergeOutcome::Deferred { pending: 1 });
        assert!(!outcome.is_applied());
        assert_eq!(f.engine.storage().get("p1", "Post").await.unwrap(), Some(local));
    }

    #[tokio::test]
    async fn pending_mutation_blocks_remote_delete() {
        let f = fixture();
        f.engine.merge("Post", &post("p1", "a")).await.unwrap();
        f.outbox
            .enqueue("Post", "p1", MutationKind::Update, json!({}))
            .await;

        let outcome = f
            .engine
            .merge("Post", &post("p1", "a").tombstone())
            .await
            .unwrap();

        assert!(matches!(outcome, MergeOutcome::Deferred { .. }));
        assert!(f.engine.storage().get("p1", "Post").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pending_mutation_in_other_store_does_not_block() {
        let f = fixture();
        f.outbox
            .enqueue("Comment", "p1", MutationKind::Create, json!({}))
            .await;

        let outcome = f.engine.merge("Post", &post("p1", "a")).await.unwrap();
        assert_eq!(outcome, MergeOutcome::Saved);
    }

    #[tokio::test]
    async fn merge_writes_are_tagged_sync() {
        let f = fixture();
        let mut rx = f.engine.storage().subscribe();

        f.engine.merge("Post", &post("p1", "a")).await.unwrap();
        f.engine
            .merge("Post", &post("p1", "a").tombstone())
            .await
            .unwrap();

        let save = rx.try_recv().unwrap();
        let delete = rx.try_recv().unwrap();
        assert_eq!((save.kind, save.origin), (ChangeKind::Save, Origin::Sync));
        assert_eq!(
            (delete.kind, delete.origin),
            (ChangeKind::Delete, Origin::Sync)
        );
    }

    #[tokio::test]
    async fn deferred_merge_announces_nothing() {
        let f = fixture();
        f.outbox
            .enqueue("Post", "p1", MutationKind::Create, json!({}))
            .await;
        let mut rx = f.engine.storage().subscribe();

        f.engine.merge("Post", &post("p1", "a")).await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let f = fixture();
        f.engine
            .storage()
            .persistent()
            .backend()
            .reject_writes_to("@AmplifyDatastore::Post::Data::p1")
            .await;

        let err = f.engine.merge("Post", &post("p1", "a")).await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[tokio::test]
    async fn page_skips_tombstones() {
        let f = fixture();
        let page = vec![
            post("a", "a"),
            post("b", "b").tombstone(),
            post("c", "c"),
        ];

        let result = f.engine.merge_page("Post", &page).await.unwrap();

        assert_eq!(result.written, vec!["a", "c"]);
        assert_eq!(result.skipped_tombstones, 1);
        let storage = f.engine.storage();
        assert!(storage.get("a", "Post").await.unwrap().is_some());
        assert_eq!(storage.get("b", "Post").await.unwrap(), None);
        assert!(storage.get("c", "Post").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn page_with_null_deleted_is_written() {
        let f = fixture();
        let page: Vec<Record> = serde_json::from_str(
            r#"[
                {"id":"a","title":"x","_version":1,"_lastChangedAt":5,"_deleted":null},
                {"id":"b","title":"y","_version":2,"_lastChangedAt":6,"_deleted":true}
            ]"#,
        )
        .unwrap();

        let result = f.engine.merge_page("Post", &page).await.unwrap();

        assert_eq!(result.written, vec!["a"]);
        assert_eq!(result.skipped_tombstones, 1);
        let stored = f.engine.storage().get("a", "Post").await.unwrap().unwrap();
        assert!(stored.is_active());
        assert_eq!(stored.field("title"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn page_ignores_outbox_by_default() {
        let f = fixture();
        f.outbox
            .enqueue("Post", "a", MutationKind::Update, json!({}))
            .await;

        let result = f.engine.merge_page("Post", &[post("a", "remote")]).await.unwrap();

        assert_eq!(result.written, vec!["a"]);
    }

    #[tokio::test]
    async fn checked_page_rejects_pending_ids() {
        let f = fixture();
        f.outbox
            .enqueue("Post", "b", MutationKind::Update, json!({}))
            .await;

        let err = f
            .engine
            .merge_page_checked("Post", &[post("a", "a"), post("b", "b")])
            .await
            .unwrap_err();

        match err {
            Error::PendingMutations { store, ids } => {
                assert_eq!(store, "Post");
                assert_eq!(ids, vec!["b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.engine.storage().get("a", "Post").await.unwrap(), None);
    }

    #[tokio::test]
    async fn checked_page_ignores_pending_tombstones() {
        let f = fixture();
        f.outbox
            .enqueue("Post", "b", MutationKind::Update, json!({}))
            .await;

        let result = f
            .engine
            .merge_page_checked("Post", &[post("a", "a"), post("b", "b").tombstone()])
            .await
            .unwrap();

        assert_eq!(result.written, vec!["a"]);
    }

    #[tokio::test]
    async fn config_enables_hydration_checks() {
        let storage = Arc::new(Storage::new(PersistentStore::new(MemoryBackend::new())));
        let outbox = Arc::new(MemoryOutbox::new());
        outbox
            .enqueue("Post", "a", MutationKind::Create, json!({}))
            .await;
        let config = EngineConfig {
            verify_hydration: true,
            ..EngineConfig::default()
        };
        let engine = MergeEngine::with_config(storage, outbox, &config);

        let result = engine.merge_page("Post", &[post("a", "a")]).await;

        assert!(matches!(result, Err(Error::PendingMutations { .. })));
    }

    #[tokio::test]
    async fn page_failure_surfaces_batch_error() {
        let f = fixture();
        f.engine
            .storage()
            .persistent()
            .backend()
            .reject_writes_to("@AmplifyDatastore::Post::Data::c")
            .await;

        let err = f
            .engine
            .merge_page("Post", &[post("a", "a"), post("c", "c")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BatchWrite(_)));
        assert_eq!(f.engine.storage().get("a", "Post").await.unwrap(), None);
    }
}
