//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

use crate::live::registry::BrokerStats;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered SSE clients.
    pub connections: usize,
    /// Projects with at least one registered client.
    pub projects: usize,
    /// Events dropped because the broadcast queue was full.
    pub dropped_events: u64,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    stats: &BrokerStats,
    dropped_events: u64,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.total_clients,
        projects: stats.projects.len(),
        dropped_events,
    }
}
