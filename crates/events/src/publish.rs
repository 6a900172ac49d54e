//! Fire-and-forget publishing for work that has already been accepted.
//!
//! The HTTP shell answers a submission before the bus confirms the publish.
//! Each publish runs as its own task with its own timeout, and can be
//! cancelled as a group through the publisher's [`CancellationToken`]
//! (the entrypoint cancels it at shutdown). Failures are logged only.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::MessageBus;

/// Spawns detached, bounded publishes onto the bus.
#[derive(Clone)]
pub struct BackgroundPublisher {
    bus: Arc<dyn MessageBus>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl BackgroundPublisher {
    pub fn new(bus: Arc<dyn MessageBus>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            bus,
            timeout,
            cancel,
        }
    }

    /// Publish `payload` to `topic` in the background.
    ///
    /// The returned handle can be awaited or ignored; it never yields an error.
    pub fn publish(&self, topic: impl Into<String>, payload: Vec<u8>) -> JoinHandle<()> {
        let bus = Arc::clone(&self.bus);
        let timeout = self.timeout;
        let cancel = self.cancel.child_token();
        let topic = topic.into();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(topic = %topic, "Background publish cancelled");
                }
                outcome = tokio::time::timeout(timeout, bus.publish(&topic, &payload)) => {
                    match outcome {
                        Ok(Ok(())) => tracing::debug!(topic = %topic, "Background publish sent"),
                        Ok(Err(e)) => {
                            tracing::error!(topic = %topic, error = %e, "Background publish failed");
                        }
                        Err(_) => {
                            tracing::error!(
                                topic = %topic,
                                timeout_ms = timeout.as_millis() as u64,
                                "Background publish timed out",
                            );
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::bus::{BusError, Subscription};
    use crate::memory::MemoryBus;

    /// A bus whose publish never completes.
    struct StuckBus;

    #[async_trait]
    impl MessageBus for StuckBus {
        async fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), BusError> {
            std::future::pending().await
        }

        async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
            Ok(Subscription::new(topic, futures::stream::empty()))
        }
    }

    #[tokio::test]
    async fn publishes_in_background() {
        let bus = Arc::new(MemoryBus::default());
        let mut sub = bus.subscribe("job_queue").await.unwrap();
        let publisher =
            BackgroundPublisher::new(bus.clone(), Duration::from_secs(1), CancellationToken::new());

        publisher.publish("job_queue", b"job".to_vec()).await.unwrap();

        assert_eq!(sub.next().await, Some(b"job".to_vec()));
    }

    #[tokio::test]
    async fn stuck_publish_gives_up_after_timeout() {
        let publisher = BackgroundPublisher::new(
            Arc::new(StuckBus),
            Duration::from_millis(20),
            CancellationToken::new(),
        );

        let handle = publisher.publish("job_queue", b"job".to_vec());

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("publish task must end after its own timeout")
            .unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_pending_publish() {
        let cancel = CancellationToken::new();
        let publisher =
            BackgroundPublisher::new(Arc::new(StuckBus), Duration::from_secs(60), cancel.clone());

        let handle = publisher.publish("job_queue", b"job".to_vec());
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancelled publish must end promptly")
            .unwrap();
    }
}
