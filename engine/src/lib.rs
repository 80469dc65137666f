//! # Datastore Engine
//!
//! The local reconciliation layer of an offline-first sync engine.
//!
//! A device keeps its records in a flat key-value store while it moves
//! between offline and connected operation. Remote records arrive out of
//! band and must be reconciled with local edits that the remote has not
//! acknowledged yet. This crate provides the pieces that do that.
//!
//! ## Components
//!
//! - [`KvBackend`] - the key-value contract. [`MemoryBackend`] implements it
//!   in memory; other crates provide durable backends.
//! - [`PersistentStore`] - records keyed by `(store, id)` plus a per-store
//!   Collection index for first/last reads, batched writes and paginated
//!   scans.
//! - [`Storage`] - origin-tagged writes with a [`ChangeFeed`] so listeners
//!   can tell sync traffic from user edits.
//! - [`MutationOutbox`] - the read side of the pending-mutation queue.
//! - [`MergeEngine`] - decides, per remote record, whether to apply it or
//!   defer to a pending local mutation.
//!
//! ## Quick Start
//!
//! ```rust
//! use datastore_engine::{
//!     MemoryBackend, MemoryOutbox, MergeEngine, MergeOutcome, PersistentStore, Record, Storage,
//! };
//! use std::sync::Arc;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let storage = Arc::new(Storage::new(PersistentStore::new(MemoryBackend::new())));
//! let outbox = Arc::new(MemoryOutbox::new());
//! let engine = MergeEngine::new(Arc::clone(&storage), outbox);
//!
//! let remote = Record::new("post-1").with_field("title", "Hello");
//! let outcome = engine.merge("Post", &remote).await.unwrap();
//! assert_eq!(outcome, MergeOutcome::Saved);
//!
//! let stored = storage.get("post-1", "Post").await.unwrap();
//! assert_eq!(stored, Some(remote));
//! # });
//! # }
//! ```

pub mod backend;
pub mod changes;
pub mod config;
pub mod error;
pub mod keys;
pub mod merge;
pub mod outbox;
pub mod persistent;
pub mod query;
pub mod record;
pub mod storage;

// Re-export main types at crate root
pub use backend::{KvBackend, MemoryBackend};
pub use changes::{ChangeFeed, ChangeKind, StorageChange};
pub use config::{ConfigError, EngineConfig};
pub use error::{Error, KeyError};
pub use keys::{KeySchema, DEFAULT_NAMESPACE};
pub use merge::{MergeEngine, MergeOutcome, PageMerge};
pub use outbox::{MemoryOutbox, MutationKind, MutationOutbox, PendingMutation};
pub use persistent::{IndexRepair, PersistentStore};
pub use query::{Pagination, QueryOne};
pub use record::{Origin, Record};
pub use storage::Storage;

/// Type aliases for clarity
pub type RecordId = String;
pub type StoreName = String;
pub type Version = u64;
pub type Timestamp = u64;
