//! Redis pub/sub implementation of [`MessageBus`].

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;

use crate::bus::{BusError, MessageBus, Subscription};

/// How long to wait for the initial connection and `PING`.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed bus.
///
/// Publishes share one multiplexed connection. Each subscription opens its
/// own pub/sub connection, which is closed when the [`Subscription`] drops.
pub struct RedisBus {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisBus {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(redis_url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url)?;

        let mut conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| BusError::Timeout(CONNECT_TIMEOUT))??;

        let _pong: String = tokio::time::timeout(
            CONNECT_TIMEOUT,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| BusError::Timeout(CONNECT_TIMEOUT))??;

        tracing::info!("Connected to Redis bus");
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(topic)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        tracing::debug!(topic, receivers, "Published to Redis");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;
        tracing::info!(topic, "Subscribed to Redis channel");

        let stream = pubsub
            .into_on_message()
            .map(|msg| msg.get_payload_bytes().to_vec());

        Ok(Subscription::new(topic, stream))
    }
}
