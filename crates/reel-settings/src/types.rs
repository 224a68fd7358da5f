//! Settings type definitions.
//!
//! All types use camelCase JSON and `#[serde(default)]`, so a partial file
//! only needs the keys it overrides.

use std::time::Duration;

use reel_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "live": { "heartbeatIntervalMs": 15000 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReelSettings {
    /// HTTP bind settings.
    pub server: ServerSettings,
    /// Live-update broker tuning.
    pub live: LiveSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// HTTP bind settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

/// Broker, heartbeat, and per-client limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveSettings {
    /// Pending broadcasts held before new ones are dropped.
    pub broadcast_queue_capacity: usize,
    /// Frames buffered per client between the broker and the socket.
    pub client_buffer_frames: usize,
    /// Interval between heartbeat sweeps in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// A client not pinged successfully for this long is evicted.
    pub stale_after_ms: u64,
    /// Deadline for a single frame write in milliseconds.
    pub write_timeout_ms: u64,
    /// Buffer of the in-process runtime event channel.
    pub runtime_channel_capacity: usize,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            broadcast_queue_capacity: 1000,
            client_buffer_frames: 64,
            heartbeat_interval_ms: 30_000,
            stale_after_ms: 300_000,
            write_timeout_ms: 5_000,
            runtime_channel_capacity: 256,
        }
    }
}

impl LiveSettings {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Staleness threshold as a [`Duration`].
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    /// Write deadline as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
