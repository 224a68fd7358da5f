//! SSE client registry, broker actor, heartbeat, and the streaming handshake.

pub mod broker;
pub mod client;
pub mod heartbeat;
pub mod registry;
pub mod stream;
pub mod transport;
