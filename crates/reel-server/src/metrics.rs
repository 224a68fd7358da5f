//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup, before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// SSE connections registered total (counter).
pub const SSE_CONNECTIONS_TOTAL: &str = "reel_sse_connections_total";
/// SSE clients removed total (counter, labels: reason).
pub const SSE_DISCONNECTIONS_TOTAL: &str = "reel_sse_disconnections_total";
/// Currently registered SSE clients (gauge).
pub const SSE_CONNECTIONS_ACTIVE: &str = "reel_sse_connections_active";
/// Events accepted for fan-out (counter, labels: type).
pub const BROADCAST_EVENTS_TOTAL: &str = "reel_broadcast_events_total";
/// Events dropped because the broadcast queue was full (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "reel_broadcast_drops_total";
/// Per-client send failures during fan-out or ping (counter).
pub const SEND_FAILURES_TOTAL: &str = "reel_send_failures_total";
/// Events that could not be encoded to the wire format (counter).
pub const ENCODE_FAILURES_TOTAL: &str = "reel_encode_failures_total";
/// Heartbeat sweeps completed (counter).
pub const HEARTBEAT_SWEEPS_TOTAL: &str = "reel_heartbeat_sweeps_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_prefixed_snake_case() {
        let names = [
            SSE_CONNECTIONS_TOTAL,
            SSE_DISCONNECTIONS_TOTAL,
            SSE_CONNECTIONS_ACTIVE,
            BROADCAST_EVENTS_TOTAL,
            BROADCAST_DROPS_TOTAL,
            SEND_FAILURES_TOTAL,
            ENCODE_FAILURES_TOTAL,
            HEARTBEAT_SWEEPS_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("reel_"), "metric '{name}' must be prefixed");
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
