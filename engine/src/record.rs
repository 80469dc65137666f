//! Record types for storing data.

use crate::{RecordId, Timestamp, Version};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Origin of a write.
///
/// Every write that goes through [`crate::Storage`] carries one of these so
/// change listeners can tell reconciliation traffic apart from user edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Written by the sync engine while reconciling remote state
    Sync,
    /// Written on behalf of a local user action
    User,
}

impl Origin {
    pub fn is_sync(self) -> bool {
        matches!(self, Origin::Sync)
    }
}

/// Field names reserved for identity and sync metadata.
pub const RESERVED_FIELDS: [&str; 4] = ["id", "_version", "_lastChangedAt", "_deleted"];

/// A model instance together with its sync metadata.
///
/// Serializes to a flat JSON object: model fields sit next to `id`,
/// `_version`, `_lastChangedAt` and `_deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within its store
    pub id: RecordId,
    /// Server version, opaque to the merge engine
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Server timestamp of the last change, opaque to the merge engine
    #[serde(
        rename = "_lastChangedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_changed_at: Option<Timestamp>,
    /// Soft delete flag (tombstone). `null` reads as live.
    #[serde(rename = "_deleted", default, deserialize_with = "null_as_false")]
    pub deleted: bool,
    /// Model fields, never holding a reserved name
    #[serde(flatten)]
    fields: Map<String, Value>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Record {
    /// Create a live record with no fields and no server metadata.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            version: None,
            last_changed_at: None,
            deleted: false,
            fields: Map::new(),
        }
    }

    /// Set a model field. Reserved metadata names are ignored.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Attach server metadata.
    pub fn with_server_meta(mut self, version: Version, last_changed_at: Timestamp) -> Self {
        self.version = Some(version);
        self.last_changed_at = Some(last_changed_at);
        self
    }

    /// Mark as a tombstone.
    pub fn tombstone(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if RESERVED_FIELDS.contains(&name.as_str()) {
            return;
        }
        self.fields.insert(name, value.into());
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Model fields without the metadata.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Check if record is live (not a tombstone).
    pub fn is_active(&self) -> bool {
        !self.deleted
    }
}
