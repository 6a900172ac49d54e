use std::sync::Arc;

use swarm_db::JobStore;
use swarm_events::{BackgroundPublisher, BroadcastHub};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is a handle.
#[derive(Clone)]
pub struct AppState {
    /// Durable job storage.
    pub store: Arc<dyn JobStore>,
    /// Fan-out hub for WebSocket observers.
    pub hub: BroadcastHub,
    /// Fire-and-forget bus publishes for accepted submissions.
    pub publisher: BackgroundPublisher,
    pub config: Arc<ServerConfig>,
}
