//! Error types for the datastore engine.

use crate::{RecordId, StoreName};
use thiserror::Error;

/// A single key rejected by a multi-key write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyError {
    pub key: String,
    pub message: String,
}

impl KeyError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// All possible errors from the datastore engine.
#[derive(Debug, Error)]
pub enum Error {
    // Storage errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("batch write failed for {} key(s): {}", .0.len(), join_key_errors(.0))]
    BatchWrite(Vec<KeyError>),

    // Merge errors
    #[error("outbox error: {0}")]
    Outbox(String),

    #[error("pending local mutations in store '{store}' for: {}", .ids.join(", "))]
    PendingMutations {
        store: StoreName,
        ids: Vec<RecordId>,
    },
}

fn join_key_errors(errors: &[KeyError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
