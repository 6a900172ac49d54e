//! Shared domain types for the swarm job relay.
//!
//! Everything that crosses a crate boundary lives here: job identity and
//! status, the messages exchanged over the bus and with observers, and the
//! error and retry primitives used during startup.

pub mod error;
pub mod job;
pub mod messages;
pub mod retry;
pub mod types;
