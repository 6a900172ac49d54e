use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use swarm_events::BroadcastHub;

use crate::state::AppState;

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let write_timeout = state.config.hub.write_timeout;
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, write_timeout))
}

/// Manage a single WebSocket connection after upgrade.
///
/// A writer task drains the observer queue into the sink and sends periodic
/// pings. The current task reads inbound messages until the peer goes away
/// or the writer stops, then unregisters the observer.
async fn handle_socket(socket: WebSocket, hub: BroadcastHub, write_timeout: Duration) {
    let (observer, mut frames) = hub.observer();
    let id = observer.id();
    hub.register(observer).await;
    tracing::info!(observer_id = %id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            let msg = tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => Message::Text(frame.to_string().into()),
                    None => {
                        // Hub dropped us or is shutting down.
                        let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
                        break;
                    }
                },
                _ = heartbeat.tick() => Message::Ping(Default::default()),
            };

            match tokio::time::timeout(write_timeout, sink.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(observer_id = %id, error = %e, "WebSocket sink closed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(observer_id = %id, "WebSocket write timed out");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(observer_id = %id, "Pong received");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(observer_id = %id, error = %e, "WebSocket receive error");
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    hub.unregister(id).await;
    send_task.abort();
    tracing::info!(observer_id = %id, "WebSocket disconnected");
}
