//! WebSocket observer connections.
//!
//! Each upgraded socket registers an observer with the
//! [`BroadcastHub`](swarm_events::BroadcastHub) and forwards the frames it
//! receives. Inbound messages are read only to notice disconnects.

pub mod handler;

pub use handler::ws_handler;
