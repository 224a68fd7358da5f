//! Process-wide shutdown via `CancellationToken`.
//!
//! The HTTP server's graceful shutdown waits for open responses, and an SSE
//! response only ends when its client is closed. The hub's broker therefore
//! runs on a child of the coordinator's token: cancelling it closes every
//! client, which ends every stream, which lets the server drain.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::hub::EventHub;

/// Default time to wait for tasks before giving up.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinates shutdown of the broker and the HTTP server.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Clone of the root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel everything, stop the hub, then wait up to `timeout` for
    /// `handles` (typically the server task).
    pub async fn graceful_shutdown(
        &self,
        hub: &EventHub,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        info!(
            clients = hub.client_count(),
            task_count = handles.len(),
            "shutting down live updates"
        );

        let drain = async {
            hub.shutdown().await;
            let _ = futures::future::join_all(handles).await;
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some tasks may still be running");
        } else {
            info!("shutdown complete");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
