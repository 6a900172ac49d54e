//! Background workers that run alongside the API server.
//!
//! [`JobRelayWorker`] moves job status updates from the bus into the store
//! and out to live observers.

pub mod relay;

pub use relay::{JobRelayWorker, RelayError, RelayOutcome};
