//! Mutation outbox contract.
//!
//! The outbox holds local mutations that the remote has not acknowledged
//! yet. The merge engine only asks one question of it: are there pending
//! mutations for this record?

use crate::{error::Result, RecordId, StoreName};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Kind of local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// A local mutation awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    pub id: String,
    pub store: StoreName,
    pub model_id: RecordId,
    pub kind: MutationKind,
    pub data: serde_json::Value,
}

/// Read side of the mutation outbox.
#[async_trait]
pub trait MutationOutbox: Send + Sync {
    /// Pending mutations referencing `model_id` within `store`, oldest first.
    async fn get_for_model(&self, store: &str, model_id: &str) -> Result<Vec<PendingMutation>>;
}

/// In-memory FIFO outbox.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    queue: RwLock<Vec<PendingMutation>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mutation and return its generated ID.
    pub async fn enqueue(
        &self,
        store: impl Into<StoreName>,
        model_id: impl Into<RecordId>,
        kind: MutationKind,
        data: serde_json::Value,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.queue.write().await.push(PendingMutation {
            id: id.clone(),
            store: store.into(),
            model_id: model_id.into(),
            kind,
            data,
        });
        id
    }

    /// Remove an acknowledged mutation. Returns whether it was present.
    pub async fn remove(&self, mutation_id: &str) -> bool {
        let mut queue = self.queue.write().await;
        let before = queue.len();
        queue.retain(|m| m.id != mutation_id);
        queue.len() != before
    }

    pub async fn len(&self) -> usize {
        self.queue.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.read().await.is_empty()
    }
}

#[async_trait]
impl MutationOutbox for MemoryOutbox {
    async fn get_for_model(&self, store: &str, model_id: &str) -> Result<Vec<PendingMutation>> {
        Ok(self
            .queue
            .read()
            .await
            .iter()
            .filter(|m| m.store == store && m.model_id == model_id)
            .cloned()
            .collect())
    }
}
