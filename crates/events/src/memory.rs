//! In-process bus backed by one `tokio::sync::broadcast` channel per topic.
//!
//! Used by tests and by `BUS_BACKEND=memory`. Like the real bus it keeps
//! nothing for late subscribers: a publish with no subscribers is dropped.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use crate::bus::{BusError, MessageBus, Payload, Subscription};

/// Default buffer capacity for each topic channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
///
/// When a topic buffer is full, the oldest un-consumed messages are dropped
/// and the lagging subscriber logs how many it missed.
pub struct MemoryBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<Payload>>>,
}

impl MemoryBus {
    /// Create a bus with a specific per-topic channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<Payload> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Close every subscription on `topic`.
    ///
    /// Subscribers drain what is already buffered and then see the end of
    /// their stream. A later publish or subscribe reopens the topic.
    pub async fn close_topic(&self, topic: &str) {
        self.topics.lock().await.remove(topic);
    }

    /// Number of live subscriptions on `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        // A SendError only means there are zero receivers.
        let _ = self.sender(topic).await.send(payload.to_vec());
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let receiver = self.sender(topic).await.subscribe();
        let name = topic.to_string();

        let stream = futures::stream::unfold(receiver, move |mut rx| {
            let name = name.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(payload) => return Some((payload, rx)),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(topic = %name, skipped = n, "Subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(Subscription::new(topic, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = MemoryBus::default();
        let mut sub = bus.subscribe("jobs").await.unwrap();

        bus.publish("jobs", b"hello").await.unwrap();

        assert_eq!(sub.next().await, Some(b"hello".to_vec()));
        assert_eq!(sub.topic(), "jobs");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_payload() {
        let bus = MemoryBus::default();
        let mut first = bus.subscribe("jobs").await.unwrap();
        let mut second = bus.subscribe("jobs").await.unwrap();

        bus.publish("jobs", b"fan-out").await.unwrap();

        assert_eq!(first.next().await, Some(b"fan-out".to_vec()));
        assert_eq!(second.next().await, Some(b"fan-out".to_vec()));
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = MemoryBus::default();
        let mut updates = bus.subscribe("job_updates").await.unwrap();

        bus.publish("job_queue", b"not for you").await.unwrap();
        bus.publish("job_updates", b"for you").await.unwrap();

        assert_eq!(updates.next().await, Some(b"for you".to_vec()));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_ok() {
        let bus = MemoryBus::default();
        bus.publish("orphan", b"dropped").await.unwrap();
    }

    #[tokio::test]
    async fn close_topic_ends_subscription_after_draining() {
        let bus = MemoryBus::default();
        let mut sub = bus.subscribe("jobs").await.unwrap();

        bus.publish("jobs", b"last").await.unwrap();
        bus.close_topic("jobs").await;

        assert_eq!(sub.next().await, Some(b"last".to_vec()));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn dropping_subscription_releases_receiver() {
        let bus = MemoryBus::default();
        let sub = bus.subscribe("jobs").await.unwrap();
        assert_eq!(bus.subscriber_count("jobs").await, 1);

        drop(sub);
        assert_eq!(bus.subscriber_count("jobs").await, 0);
    }
}
