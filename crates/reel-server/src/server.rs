//! `LiveServer`: Axum HTTP server for the live-update endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::hub::EventHub;
use crate::live::registry::BrokerStats;
use crate::live::stream::live_handler;
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Event hub (broker + runtime emitter).
    pub hub: Arc<EventHub>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

impl FromRef<AppState> for Arc<EventHub> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.hub)
    }
}

/// HTTP front of the live-update layer.
pub struct LiveServer {
    config: ServerConfig,
    hub: Arc<EventHub>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl LiveServer {
    /// Create a server. `hub` should run on a child of `shutdown`'s token so
    /// that streams end when the server drains.
    pub fn new(
        config: ServerConfig,
        hub: Arc<EventHub>,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            config,
            hub,
            shutdown,
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/live", get(live_handler))
            .route("/api/live/stats", get(stats_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.bind_addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serve on `listener` until the shutdown token fires and every open
    /// stream has ended.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        info!(addr = ?local, "live server listening");
        let token = self.shutdown.token();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;
        info!("live server stopped");
        Ok(())
    }

    /// Bind and serve.
    pub async fn listen(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Get the event hub.
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.hub.stats();
    Json(health::health_check(
        state.start_time,
        &stats,
        state.hub.dropped_events(),
    ))
}

/// GET /api/live/stats
async fn stats_handler(State(state): State<AppState>) -> Json<BrokerStats> {
    Json(state.hub.stats())
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
