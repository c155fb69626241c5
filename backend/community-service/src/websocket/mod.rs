/// Chat room WebSocket fan-out
///
/// Every connection to a room subscribes to that room's group in the
/// in-process [`ConnectionRegistry`]; a stored message is broadcast to all
/// subscribers of the group, the sender included.
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod message_types;
pub mod session;

/// Unique identifier for a WebSocket subscriber, used for precise cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Group name -> live subscribers
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `group`; the receiver yields every frame broadcast to it
    pub async fn add_subscriber(&self, group: &str) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        let subscribers = guard.entry(group.to_string()).or_default();
        subscribers.push(Subscriber {
            id: subscriber_id,
            sender: tx,
        });

        tracing::debug!(
            "Added subscriber {:?} to group {}, total subscribers: {}",
            subscriber_id,
            group,
            subscribers.len()
        );

        (subscriber_id, rx)
    }

    /// Leave `group`. Must be called when a connection closes; empty groups are dropped.
    pub async fn remove_subscriber(&self, group: &str, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;

        if let Some(subscribers) = guard.get_mut(group) {
            subscribers.retain(|s| s.id != subscriber_id);

            if subscribers.is_empty() {
                guard.remove(group);
                tracing::debug!("Removed empty group {} from registry", group);
            }
        }
    }

    /// Send `msg` to every subscriber of `group`, dropping dead senders
    pub async fn broadcast(&self, group: &str, msg: String) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(group) {
            let before = subscribers.len();
            subscribers.retain(|subscriber| subscriber.sender.send(msg.clone()).is_ok());

            let after = subscribers.len();
            if before != after {
                tracing::debug!(
                    "Broadcast to group {}: {} dead senders cleaned up, {} active",
                    group,
                    before - after,
                    after
                );
            }
        }
    }

    #[cfg(test)]
    async fn subscriber_count(&self, group: &str) -> usize {
        let guard = self.inner.read().await;
        guard.get(group).map(|v| v.len()).unwrap_or(0)
    }

    #[cfg(test)]
    async fn group_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_member_of_the_group_only() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registry.add_subscriber("chat_stroller").await;
        let (_b, mut rx_b) = registry.add_subscriber("chat_stroller").await;
        let (_c, mut rx_c) = registry.add_subscriber("chat_bikes").await;

        registry
            .broadcast("chat_stroller", r#"{"message":"hi","user":"ada"}"#.to_string())
            .await;

        assert_eq!(rx_a.recv().await.unwrap(), r#"{"message":"hi","user":"ada"}"#);
        assert_eq!(rx_b.recv().await.unwrap(), r#"{"message":"hi","user":"ada"}"#);
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn leaving_removes_empty_groups() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.add_subscriber("chat_stroller").await;
        let (b, _rx_b) = registry.add_subscriber("chat_stroller").await;

        registry.remove_subscriber("chat_stroller", a).await;
        assert_eq!(registry.subscriber_count("chat_stroller").await, 1);

        registry.remove_subscriber("chat_stroller", b).await;
        assert_eq!(registry.group_count().await, 0);
    }

    #[tokio::test]
    async fn dead_receivers_are_pruned_on_broadcast() {
        let registry = ConnectionRegistry::new();
        let (_a, rx_a) = registry.add_subscriber("chat_x").await;
        let (_b, _rx_b) = registry.add_subscriber("chat_x").await;
        drop(rx_a);

        registry.broadcast("chat_x", "ping".to_string()).await;
        assert_eq!(registry.subscriber_count("chat_x").await, 1);
    }
}
