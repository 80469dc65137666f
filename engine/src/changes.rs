//! Change feed for storage writes.
//!
//! Every origin-tagged write is broadcast to subscribers so observers can
//! react to data changes and skip the ones the sync engine made itself.

use crate::{Origin, Record, StoreName};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default number of buffered changes per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Kind of write that produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Save,
    Delete,
}

/// A single write observed by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub store: StoreName,
    pub kind: ChangeKind,
    /// The saved record, or the record that was deleted
    pub record: Record,
    pub origin: Origin,
}

/// Broadcast channel of [`StorageChange`]s.
#[derive(Debug)]
pub struct ChangeFeed {
    sender: broadcast::Sender<StorageChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to changes published from now on.
    ///
    /// Slow subscribers that fall more than the capacity behind observe
    /// `RecvError::Lagged` and miss the overwritten changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.sender.subscribe()
    }

    /// Publish a change.
    ///
    /// Returns the number of subscribers that received it. Having none is
    /// not an error.
    pub fn publish(&self, change: StorageChange) -> usize {
        let recipients = self.sender.send(change).unwrap_or(0);
        tracing::trace!(recipients, "Published storage change");
        recipients
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(id: &str, origin: Origin) -> StorageChange {
        StorageChange {
            store: "Post".into(),
            kind: ChangeKind::Save,
            record: Record::new(id),
            origin,
        }
    }

    #[test]
    fn publish_without_subscribers() {
        let feed = ChangeFeed::default();
        assert_eq!(feed.publish(change("p1", Origin::User)), 0);
    }

    #[test]
    fn every_subscriber_receives() {
        let feed = ChangeFeed::new(8);
        let mut rx1 = feed.subscribe();
        let mut rx2 = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 2);

        assert_eq!(feed.publish(change("p1", Origin::Sync)), 2);

        assert_eq!(rx1.try_recv().unwrap().record.id, "p1");
        let received = rx2.try_recv().unwrap();
        assert!(received.origin.is_sync());
    }

    #[test]
    fn dropped_subscriber_stops_counting() {
        let feed = ChangeFeed::new(8);
        let rx = feed.subscribe();
        drop(rx);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn serializes_for_listeners() {
        let value = serde_json::to_value(change("p1", Origin::Sync)).unwrap();
        assert_eq!(value["kind"], "save");
        assert_eq!(value["origin"], "sync");
        assert_eq!(value["record"]["id"], "p1");
    }
}
