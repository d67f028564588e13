// src/realtime.rs
//
// In-process notification channel: row-change events and ephemeral broadcast
// messages fanned out over tokio broadcast channels. The coordination logic
// only depends on this narrow surface, so the hub could be swapped for a
// database-trigger or message-bus implementation without touching callers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single event delivered to subscribers. Row changes carry the table name
/// and the filter column/value they were published under; broadcast messages
/// are transient and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeMessage {
    Change {
        table: String,
        event: ChangeKind,
        filter_column: String,
        filter_value: String,
        payload: serde_json::Value,
    },
    Broadcast {
        channel: String,
        event: String,
        payload: serde_json::Value,
    },
}

/// Publish/subscribe hub. Cheap to clone; constructed once in main and
/// carried in AppState rather than living as a process-wide singleton.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<RealtimeMessage>>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn change_topic(table: &str, filter_column: &str, filter_value: &str) -> String {
        format!("change:{}:{}={}", table, filter_column, filter_value)
    }

    fn broadcast_topic(channel: &str) -> String {
        format!("broadcast:{}", channel)
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<RealtimeMessage> {
        if let Some(tx) = self.topics.read().await.get(topic) {
            return tx.clone();
        }
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to row-change events for one table, filtered by a column
    /// predicate. Each delivered event is tagged with its `ChangeKind`;
    /// subscribers match on the kinds they care about.
    pub async fn subscribe(
        &self,
        table: &str,
        filter_column: &str,
        filter_value: &str,
    ) -> broadcast::Receiver<RealtimeMessage> {
        self.sender(&Self::change_topic(table, filter_column, filter_value))
            .await
            .subscribe()
    }

    /// Subscribe to an ephemeral broadcast channel.
    pub async fn subscribe_channel(&self, channel: &str) -> broadcast::Receiver<RealtimeMessage> {
        self.sender(&Self::broadcast_topic(channel)).await.subscribe()
    }

    /// Publish a row-change event. Returns the number of receivers reached;
    /// no subscribers is not an error.
    pub async fn publish_change(
        &self,
        table: &str,
        event: ChangeKind,
        filter_column: &str,
        filter_value: &str,
        payload: serde_json::Value,
    ) -> usize {
        let msg = RealtimeMessage::Change {
            table: table.to_string(),
            event,
            filter_column: filter_column.to_string(),
            filter_value: filter_value.to_string(),
            payload,
        };
        let topic = Self::change_topic(table, filter_column, filter_value);
        match self.topics.read().await.get(&topic) {
            Some(tx) => tx.send(msg).unwrap_or(0),
            None => 0,
        }
    }

    /// Publish a transient broadcast message on a named channel.
    pub async fn broadcast(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> usize {
        let msg = RealtimeMessage::Broadcast {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        };
        let topic = Self::broadcast_topic(channel);
        match self.topics.read().await.get(&topic) {
            Some(tx) => tx.send(msg).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop topics that no longer have any live receivers.
    pub async fn prune(&self) {
        let mut topics = self.topics.write().await;
        topics.retain(|_, tx| tx.receiver_count() > 0);
    }
}

/// Channel name carrying transient events for one session (typing, presence).
pub fn session_channel(session_id: i32) -> String {
    format!("session:{}", session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn change_event_reaches_matching_subscriber() {
        let hub = RealtimeHub::new();
        let mut rx = hub.subscribe("messages", "session_id", "7").await;

        let delivered = hub
            .publish_change("messages", ChangeKind::Insert, "session_id", "7", json!({"id": 1}))
            .await;
        assert_eq!(delivered, 1);

        match rx.recv().await.unwrap() {
            RealtimeMessage::Change { table, event, filter_value, .. } => {
                assert_eq!(table, "messages");
                assert_eq!(event, ChangeKind::Insert);
                assert_eq!(filter_value, "7");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn change_event_does_not_cross_filters() {
        let hub = RealtimeHub::new();
        let _rx = hub.subscribe("messages", "session_id", "7").await;

        let delivered = hub
            .publish_change("messages", ChangeKind::Insert, "session_id", "8", json!({}))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let hub = RealtimeHub::new();
        assert_eq!(hub.broadcast("session:1", "typing", json!({})).await, 0);
    }

    #[tokio::test]
    async fn broadcast_fans_out_to_all_channel_subscribers() {
        let hub = RealtimeHub::new();
        let mut a = hub.subscribe_channel(&session_channel(3)).await;
        let mut b = hub.subscribe_channel(&session_channel(3)).await;

        let delivered = hub
            .broadcast(&session_channel(3), "typing", json!({"actor": "customer"}))
            .await;
        assert_eq!(delivered, 2);
        assert!(matches!(a.recv().await.unwrap(), RealtimeMessage::Broadcast { .. }));
        assert!(matches!(b.recv().await.unwrap(), RealtimeMessage::Broadcast { .. }));
    }

    #[tokio::test]
    async fn prune_drops_dead_topics() {
        let hub = RealtimeHub::new();
        {
            let _rx = hub.subscribe_channel("session:9").await;
        }
        hub.prune().await;
        assert_eq!(hub.broadcast("session:9", "typing", json!({})).await, 0);
    }
}
