//! # reel-server
//!
//! Live-update fan-out over Server-Sent Events.
//!
//! - [`hub::EventHub`]: publishing façade; builds typed events and hands the
//!   same `Arc<Event>` to the broker and the in-process [`emitter`]
//! - [`live::broker`]: single-writer actor owning the client registry
//! - [`live::heartbeat`]: periodic ping and staleness sweep
//! - [`live::stream`]: `GET /api/live` handshake and streaming body
//! - [`server::LiveServer`]: Axum router, health, stats, Prometheus metrics
//! - Graceful shutdown via [`shutdown::ShutdownCoordinator`]

#![deny(unsafe_code)]

pub mod config;
pub mod emitter;
pub mod errors;
pub mod health;
pub mod hub;
pub mod live;
pub mod metrics;
pub mod server;
pub mod shutdown;

#[cfg(test)]
mod test_support;

pub use config::{LiveConfig, ServerConfig};
pub use emitter::{ChannelEmitter, NoopEmitter, RuntimeEmitter};
pub use errors::{ClientError, HandshakeError, ServerError, TransportError};
pub use hub::EventHub;
pub use live::broker::{Broker, BrokerHandle, Delivery, RemoveReason};
pub use live::client::Client;
pub use live::heartbeat::SweepReport;
pub use live::registry::BrokerStats;
pub use live::transport::{ChannelTransport, StreamTransport};
pub use server::LiveServer;
pub use shutdown::ShutdownCoordinator;
