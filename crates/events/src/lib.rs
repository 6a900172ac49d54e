//! Swarm message bus and live broadcast infrastructure.
//!
//! This crate provides:
//!
//! - [`MessageBus`]: the publish/subscribe seam to the external bus, with
//!   [`RedisBus`] for production and [`MemoryBus`] for in-process use.
//! - [`BroadcastHub`]: single-owner actor that fans frames out to every
//!   connected observer with a bounded per-write timeout.
//! - [`BackgroundPublisher`]: fire-and-forget publishes that never fail
//!   the caller.

pub mod bus;
pub mod hub;
pub mod memory;
pub mod publish;
pub mod redis_bus;

pub use bus::{BusError, MessageBus, Payload, Subscription};
pub use hub::{BroadcastHub, BroadcastReport, Frame, HubConfig, Observer, ObserverId};
pub use memory::MemoryBus;
pub use publish::BackgroundPublisher;
pub use redis_bus::RedisBus;
