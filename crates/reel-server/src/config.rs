//! Server and live-update configuration.

use std::time::Duration;

use reel_settings::{LiveSettings, ReelSettings, ServerSettings};
use serde::{Deserialize, Serialize};

/// HTTP bind configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
        }
    }
}

/// Broker, heartbeat, and per-client limits.
#[derive(Clone, Debug)]
pub struct LiveConfig {
    /// Pending broadcasts held before new ones are dropped.
    pub broadcast_queue_capacity: usize,
    /// Frames buffered per client between the broker and the socket.
    pub client_buffer_frames: usize,
    /// Interval between heartbeat sweeps. Zero disables the sweep.
    pub heartbeat_interval: Duration,
    /// Clients not pinged successfully for longer than this are evicted.
    pub stale_after: Duration,
    /// Deadline for a single frame write.
    pub write_timeout: Duration,
    /// Buffer of the in-process runtime event channel.
    pub runtime_channel_capacity: usize,
}

impl LiveConfig {
    /// Staleness threshold the heartbeat actually applies.
    ///
    /// A client pinged on one sweep is last seen a full interval earlier on
    /// the next, so the threshold is raised to at least two intervals.
    pub fn effective_stale_after(&self) -> Duration {
        self.stale_after.max(self.heartbeat_interval.saturating_mul(2))
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self::from(&LiveSettings::default())
    }
}

impl From<&LiveSettings> for LiveConfig {
    fn from(settings: &LiveSettings) -> Self {
        Self {
            broadcast_queue_capacity: settings.broadcast_queue_capacity,
            client_buffer_frames: settings.client_buffer_frames,
            heartbeat_interval: settings.heartbeat_interval(),
            stale_after: settings.stale_after(),
            write_timeout: settings.write_timeout(),
            runtime_channel_capacity: settings.runtime_channel_capacity,
        }
    }
}

/// Build both configs from loaded settings.
pub fn from_settings(settings: &ReelSettings) -> (ServerConfig, LiveConfig) {
    (
        ServerConfig::from(&settings.server),
        LiveConfig::from(&settings.live),
    )
}
