//! Broadcast hub: fan-out of live updates to connected observers.
//!
//! The observer registry is owned by a single actor task. [`BroadcastHub`]
//! is a cheap, cloneable handle that talks to it over an ordered command
//! channel, so registration, removal and delivery never interleave and
//! nobody outside the actor ever touches the map.
//!
//! Each observer is the sending half of a bounded queue; the connection
//! task owns the receiving half and writes frames to the socket. Delivery
//! to one observer waits at most [`HubConfig::write_timeout`] for queue
//! space, and all observers are served concurrently, so one wedged
//! connection delays a broadcast by at most one timeout. Observers that
//! time out or whose connection is gone are removed. Removing an observer
//! drops its sender, which ends the connection task's stream and closes
//! the connection exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A serialized message, shared by every observer it is delivered to.
pub type Frame = Arc<str>;

/// Process-unique observer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// The hub's handle on one connection.
#[derive(Debug)]
pub struct Observer {
    id: ObserverId,
    sender: mpsc::Sender<Frame>,
}

impl Observer {
    pub fn id(&self) -> ObserverId {
        self.id
    }
}

/// Tunables for the hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Upper bound on waiting for one observer to accept a frame.
    pub write_timeout: Duration,
    /// Frames buffered per observer before writes start waiting.
    pub observer_buffer: usize,
    /// Pending commands buffered before callers start waiting.
    pub command_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(2),
            observer_buffer: 64,
            command_buffer: 256,
        }
    }
}

/// Outcome of a single broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers that accepted the frame.
    pub delivered: usize,
    /// Observers removed because the write failed or timed out.
    pub dropped: usize,
}

enum Command {
    Register(Observer),
    Unregister(ObserverId),
    Broadcast {
        frame: Frame,
        done: oneshot::Sender<BroadcastReport>,
    },
    Count(oneshot::Sender<usize>),
    CloseAll(oneshot::Sender<usize>),
}

/// Handle to the hub actor.
///
/// The actor stops once every handle has been dropped.
#[derive(Clone)]
pub struct BroadcastHub {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    observer_buffer: usize,
}

impl BroadcastHub {
    /// Spawn the hub actor on the current runtime.
    pub fn spawn(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (commands, inbox) = mpsc::channel(config.command_buffer.max(1));
        let actor = HubActor {
            observers: HashMap::new(),
            write_timeout: config.write_timeout,
        };
        let handle = tokio::spawn(actor.run(inbox));

        let hub = Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            observer_buffer: config.observer_buffer.max(1),
        };
        (hub, handle)
    }

    /// Create a new observer and the receiving half its connection drains.
    ///
    /// The observer receives nothing until it is passed to [`register`](Self::register).
    pub fn observer(&self) -> (Observer, mpsc::Receiver<Frame>) {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.observer_buffer);
        (Observer { id, sender }, receiver)
    }

    /// Add an observer to the active set.
    pub async fn register(&self, observer: Observer) {
        self.send(Command::Register(observer)).await;
    }

    /// Remove an observer and close its connection. No-op if absent.
    pub async fn unregister(&self, id: ObserverId) {
        self.send(Command::Unregister(id)).await;
    }

    /// Serialize `message` once and deliver it to every registered observer.
    ///
    /// Never fails: serialization and per-observer errors are logged and
    /// reflected in the returned report.
    pub async fn broadcast<T: Serialize>(&self, message: &T) -> BroadcastReport {
        match serde_json::to_string(message) {
            Ok(text) => self.broadcast_frame(Frame::from(text)).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize broadcast message");
                BroadcastReport::default()
            }
        }
    }

    /// Deliver an already-serialized frame to every registered observer.
    pub async fn broadcast_frame(&self, frame: Frame) -> BroadcastReport {
        let (done, report) = oneshot::channel();
        if !self.send(Command::Broadcast { frame, done }).await {
            return BroadcastReport::default();
        }
        report.await.unwrap_or_default()
    }

    /// Number of currently registered observers.
    pub async fn observer_count(&self) -> usize {
        let (reply, count) = oneshot::channel();
        if !self.send(Command::Count(reply)).await {
            return 0;
        }
        count.await.unwrap_or_default()
    }

    /// Drop every observer, closing all connections. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let (reply, count) = oneshot::channel();
        if !self.send(Command::CloseAll(reply)).await {
            return 0;
        }
        count.await.unwrap_or_default()
    }

    async fn send(&self, command: Command) -> bool {
        if self.commands.send(command).await.is_err() {
            tracing::warn!("Broadcast hub has stopped, command dropped");
            return false;
        }
        true
    }
}

/// Sole owner of the observer registry.
struct HubActor {
    observers: HashMap<ObserverId, mpsc::Sender<Frame>>,
    write_timeout: Duration,
}

impl HubActor {
    async fn run(mut self, mut inbox: mpsc::Receiver<Command>) {
        while let Some(command) = inbox.recv().await {
            match command {
                Command::Register(observer) => {
                    self.observers.insert(observer.id, observer.sender);
                    tracing::info!(
                        observer_id = %observer.id,
                        count = self.observers.len(),
                        "Observer connected",
                    );
                }
                Command::Unregister(id) => {
                    if self.observers.remove(&id).is_some() {
                        tracing::info!(
                            observer_id = %id,
                            count = self.observers.len(),
                            "Observer disconnected",
                        );
                    }
                }
                Command::Broadcast { frame, done } => {
                    let report = self.deliver(frame).await;
                    let _ = done.send(report);
                }
                Command::Count(reply) => {
                    let _ = reply.send(self.observers.len());
                }
                Command::CloseAll(reply) => {
                    let count = self.observers.len();
                    self.observers.clear();
                    tracing::info!(count, "Closed all observers");
                    let _ = reply.send(count);
                }
            }
        }
        tracing::debug!("Broadcast hub stopped");
    }

    async fn deliver(&mut self, frame: Frame) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if self.observers.is_empty() {
            return report;
        }

        let timeout = self.write_timeout;
        let writes = self.observers.iter().map(|(&id, sender)| {
            let frame = Arc::clone(&frame);
            async move { (id, sender.send_timeout(frame, timeout).await) }
        });
        let outcomes = join_all(writes).await;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(
                        observer_id = %id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Observer write timed out, dropping",
                    );
                    self.observers.remove(&id);
                    report.dropped += 1;
                }
                Err(SendTimeoutError::Closed(_)) => {
                    tracing::debug!(observer_id = %id, "Observer connection gone, dropping");
                    self.observers.remove(&id);
                    report.dropped += 1;
                }
            }
        }

        report
    }
}
