//! # reel-live
//!
//! Live-update server binary. Loads settings, starts the SSE server, and
//! mirrors every published event to an in-process listener.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use reel_core::logging::{LogFormat, init_subscriber};
use reel_server::{ChannelEmitter, EventHub, LiveServer, ShutdownCoordinator, config, metrics};
use reel_settings::ReelSettings;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// reel live-update server.
#[derive(Parser, Debug)]
#[command(name = "reel-live", about = "reel live-update server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.reel/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `reel_server=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format: `compact` or `json` (overrides settings).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Load settings and layer the command-line overrides on top.
    fn resolve_settings(&self) -> Result<ReelSettings> {
        let mut settings = match &self.settings {
            Some(path) => reel_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => reel_settings::load_settings().context("Failed to load settings")?,
        };
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
        Ok(settings)
    }
}

/// Trace every mirrored event until `cancel` fires.
fn spawn_runtime_listener(emitter: &ChannelEmitter, cancel: CancellationToken) -> JoinHandle<()> {
    let mut rx = emitter.subscribe();
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => break,
                received = rx.recv() => received,
            };
            match received {
                Ok(event) => tracing::debug!(
                    event_type = %event.event_type(),
                    project_id = %event.project_id(),
                    "runtime event"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "runtime listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.resolve_settings()?;

    init_subscriber(&settings.logging.level, settings.logging.format);

    let (server_config, live_config) = config::from_settings(&settings);

    let coordinator = Arc::new(ShutdownCoordinator::new());
    let emitter = ChannelEmitter::new(live_config.runtime_channel_capacity);
    let listener_task = spawn_runtime_listener(&emitter, coordinator.token());

    let hub = Arc::new(EventHub::new(
        live_config,
        Arc::new(emitter),
        coordinator.token().child_token(),
    ));

    let mut server = LiveServer::new(server_config, Arc::clone(&hub), Arc::clone(&coordinator));
    match metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder not installed"),
    }
    let server = Arc::new(server);

    let listener = server.bind().await.context("Failed to bind live server")?;
    let addr = listener.local_addr().context("Failed to read bound address")?;
    tracing::info!("reel live server listening on http://{addr}");

    let server_task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = server.serve(listener).await {
                tracing::error!(error = %e, "live server failed");
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    coordinator
        .graceful_shutdown(&hub, vec![server_task, listener_task], None)
        .await;
    Ok(())
}
