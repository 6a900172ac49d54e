//! Publish/subscribe seam to the external message bus.
//!
//! Delivery is at-least-once and unordered across topics. Nothing published
//! is retained beyond the bus process lifetime.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

/// Raw message body as it travels over the bus.
pub type Payload = Vec<u8>;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("bus did not respond within {0:?}")]
    Timeout(Duration),
}

/// A live subscription to one topic.
///
/// Dropping the subscription releases the underlying resource (the Redis
/// pub/sub connection, or the in-memory receiver).
pub struct Subscription {
    topic: String,
    stream: BoxStream<'static, Payload>,
}

impl Subscription {
    pub fn new<S>(topic: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Payload> + Send + 'static,
    {
        Self {
            topic: topic.into(),
            stream: stream.boxed(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next payload. `None` means the subscription is closed.
    pub async fn next(&mut self) -> Option<Payload> {
        self.stream.next().await
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::debug!(topic = %self.topic, "Subscription released");
    }
}

/// The external bus, shared as `Arc<dyn MessageBus>`.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` to every current subscriber of `topic`.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Start receiving messages published to `topic` from now on.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;
}
