//! Job relay: bus -> store + observers.
//!
//! [`JobRelayWorker`] subscribes to the update topic and, for every
//! delivered payload, decodes a [`JobUpdateEvent`], applies it to the store
//! and broadcasts it through the hub. Persistence and notification are
//! independent best-effort steps: a store failure is logged and the update
//! is still broadcast. Malformed payloads are logged and skipped.
//!
//! The bus may redeliver. Applying an update is an overwrite keyed by job id,
//! so a duplicate leaves the store unchanged and observers see a repeated,
//! harmless status. Updates carry no ordering token, so a redelivered older
//! update can overwrite a newer one.

use std::sync::Arc;

use swarm_core::messages::{JobUpdateBroadcast, JobUpdateEvent, JOB_UPDATES_TOPIC};
use swarm_core::retry::{retry_fixed, RetryPolicy};
use swarm_db::JobStore;
use swarm_events::{BroadcastHub, BusError, MessageBus, Subscription};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to subscribe to '{topic}': {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: BusError,
    },
}

/// What happened to a single delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Persisted and broadcast.
    Applied,
    /// Broadcast, but the store rejected the update.
    StoreFailed,
    /// Could not be decoded; discarded.
    Malformed,
}

/// Bridges the update topic to the store and the broadcast hub.
pub struct JobRelayWorker {
    store: Arc<dyn JobStore>,
    bus: Arc<dyn MessageBus>,
    hub: BroadcastHub,
    topic: String,
    resubscribe_policy: RetryPolicy,
}

impl JobRelayWorker {
    /// Create a worker listening on [`JOB_UPDATES_TOPIC`].
    pub fn new(store: Arc<dyn JobStore>, bus: Arc<dyn MessageBus>, hub: BroadcastHub) -> Self {
        Self {
            store,
            bus,
            hub,
            topic: JOB_UPDATES_TOPIC.to_string(),
            resubscribe_policy: RetryPolicy::default(),
        }
    }

    /// Listen on a different topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Retry policy used to resubscribe when the update subscription closes.
    pub fn with_resubscribe(mut self, policy: RetryPolicy) -> Self {
        self.resubscribe_policy = policy;
        self
    }

    /// Subscribe, then relay on a spawned task until `cancel` fires.
    ///
    /// Subscribing happens before this returns, so a bus that cannot be
    /// reached surfaces here rather than inside the background task. The
    /// task only ends with an error when resubscribing has been exhausted.
    pub async fn start(
        self,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<(), RelayError>>, RelayError> {
        let subscription = self.subscribe().await?;
        Ok(tokio::spawn(self.relay(subscription, cancel)))
    }

    /// Subscribe and relay on the current task until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), RelayError> {
        let subscription = self.subscribe().await?;
        self.relay(subscription, cancel).await
    }

    async fn subscribe(&self) -> Result<Subscription, RelayError> {
        self.bus
            .subscribe(&self.topic)
            .await
            .map_err(|source| RelayError::Subscribe {
                topic: self.topic.clone(),
                source,
            })
    }

    /// Replace a closed subscription, retrying with fixed backoff.
    ///
    /// `None` means `cancel` fired while waiting.
    async fn resubscribe(
        &self,
        cancel: &CancellationToken,
    ) -> Option<Result<Subscription, RelayError>> {
        let this = self;
        let attempt = retry_fixed(&self.resubscribe_policy, "update subscription", move || {
            this.subscribe()
        });
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = attempt => Some(result),
        }
    }

    /// A payload already being handled when `cancel` fires is finished; no
    /// further receive is attempted. The subscription is dropped, and so
    /// released, on every exit path.
    async fn relay(
        self,
        mut subscription: Subscription,
        cancel: CancellationToken,
    ) -> Result<(), RelayError> {
        tracing::info!(topic = %self.topic, "Job relay started");

        loop {
            let payload = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Job relay shutting down");
                    return Ok(());
                }
                next = subscription.next() => next,
            };

            match payload {
                Some(payload) => {
                    self.handle_payload(&payload).await;
                }
                None => {
                    tracing::warn!(topic = %self.topic, "Update subscription closed, resubscribing");
                    subscription = match self.resubscribe(&cancel).await {
                        Some(Ok(fresh)) => fresh,
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Job relay could not resubscribe, stopping");
                            return Err(e);
                        }
                        None => {
                            tracing::info!("Job relay shutting down");
                            return Ok(());
                        }
                    };
                    tracing::info!(topic = %self.topic, "Update subscription restored");
                }
            }
        }
    }

    /// Decode, persist and broadcast one payload.
    pub async fn handle_payload(&self, payload: &[u8]) -> RelayOutcome {
        let event = match JobUpdateEvent::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bytes = payload.len(),
                    "Discarding malformed job update",
                );
                return RelayOutcome::Malformed;
            }
        };

        let job_id = event.job_id;
        let status = event.status;

        let outcome = match self
            .store
            .upsert_job_status(job_id, status, &event.result)
            .await
        {
            Ok(()) => {
                tracing::info!(job_id = %job_id, status = %status, "Job status persisted");
                RelayOutcome::Applied
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job_id,
                    status = %status,
                    error = %e,
                    "Failed to persist job status, broadcasting anyway",
                );
                RelayOutcome::StoreFailed
            }
        };

        let report = self.hub.broadcast(&JobUpdateBroadcast::from(event)).await;
        tracing::debug!(
            job_id = %job_id,
            delivered = report.delivered,
            dropped = report.dropped,
            "Job update broadcast",
        );

        outcome
    }
}
