//! `EventHub`: the publishing façade in front of the broker.
//!
//! Built once at startup and shared by `Arc` with every domain service that
//! publishes, and with the SSE handler. Services call a `broadcast_*` method
//! only after their own write has committed; the hub never touches persisted
//! state.

use std::sync::Arc;

use reel_core::{ClientId, Event, ProjectId};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::LiveConfig;
use crate::emitter::RuntimeEmitter;
use crate::errors::HandshakeError;
use crate::live::broker::{Broker, BrokerHandle, Delivery, RemoveReason};
use crate::live::client::Client;
use crate::live::registry::BrokerStats;
use crate::live::transport::StreamTransport;

/// Fans events out to SSE clients and mirrors them to the runtime emitter.
pub struct EventHub {
    broker: Broker,
    emitter: Arc<dyn RuntimeEmitter>,
    config: LiveConfig,
}

impl EventHub {
    /// Start the broker and bind the runtime emitter.
    ///
    /// Cancelling `cancel` stops the broker (and closes every client).
    pub fn new(
        config: LiveConfig,
        emitter: Arc<dyn RuntimeEmitter>,
        cancel: CancellationToken,
    ) -> Self {
        let broker = Broker::spawn(&config, cancel);
        Self {
            broker,
            emitter,
            config,
        }
    }

    /// Live configuration in effect.
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Underlying broker handle.
    pub fn broker(&self) -> &BrokerHandle {
        self.broker.handle()
    }

    /// Create a client for `project_id` on `transport` and register it.
    ///
    /// The returned client is already queued for registration; the caller
    /// keeps the connection open until [`Client::closed`] resolves and then
    /// calls [`close_client`](Self::close_client).
    pub fn open_client(
        &self,
        project_id: ProjectId,
        transport: Arc<dyn StreamTransport>,
    ) -> Result<Arc<Client>, HandshakeError> {
        let id = ClientId::generate();
        let client = Client::new(id, project_id, transport, self.config.write_timeout)
            .map_err(|error| {
                warn!(%project_id, %error, "rejecting live connection");
                HandshakeError::StreamingUnsupported
            })?;
        let client = Arc::new(client);
        self.broker.handle().add(Arc::clone(&client));
        Ok(client)
    }

    /// Unregister a client whose connection ended. Idempotent, and a no-op
    /// once another client has taken over its ID.
    pub fn close_client(&self, client: &Arc<Client>) {
        self.broker
            .handle()
            .release(client, RemoveReason::Disconnected);
    }

    /// Hand an event to the broker and the runtime emitter. Never blocks.
    pub fn publish(&self, event: Event) -> Delivery {
        let event = Arc::new(event);
        let delivery = self.broker.handle().broadcast(Arc::clone(&event));
        self.emitter.emit(&event);
        delivery
    }

    /// Publish `highlights_updated`.
    pub fn broadcast_highlights_updated(
        &self,
        project_id: ProjectId,
        highlights: Vec<Value>,
    ) -> Delivery {
        self.publish(Event::highlights_updated(project_id, highlights))
    }

    /// Publish `highlights_deleted`.
    pub fn broadcast_highlights_deleted(
        &self,
        project_id: ProjectId,
        highlight_ids: Vec<i64>,
    ) -> Delivery {
        self.publish(Event::highlights_deleted(project_id, highlight_ids))
    }

    /// Publish `highlights_reordered`.
    pub fn broadcast_highlights_reordered(
        &self,
        project_id: ProjectId,
        new_order: Vec<Value>,
    ) -> Delivery {
        self.publish(Event::highlights_reordered(project_id, new_order))
    }

    /// Publish `project_updated`.
    pub fn broadcast_project_updated(&self, project_id: ProjectId, project: Value) -> Delivery {
        self.publish(Event::project_updated(project_id, project))
    }

    /// Publish `chat_message_added`.
    pub fn broadcast_chat_message_added(
        &self,
        project_id: ProjectId,
        endpoint_id: &str,
        session_id: &str,
        message: Value,
    ) -> Delivery {
        self.publish(Event::chat_message_added(
            project_id,
            endpoint_id,
            session_id,
            message,
        ))
    }

    /// Publish `chat_history_cleared`.
    pub fn broadcast_chat_history_cleared(
        &self,
        project_id: ProjectId,
        endpoint_id: &str,
        session_id: &str,
    ) -> Delivery {
        self.publish(Event::chat_history_cleared(project_id, endpoint_id, session_id))
    }

    /// Publish `chat_session_updated`.
    pub fn broadcast_chat_session_updated(
        &self,
        project_id: ProjectId,
        endpoint_id: &str,
        session_id: &str,
        messages: Vec<Value>,
    ) -> Delivery {
        self.publish(Event::chat_session_updated(
            project_id,
            endpoint_id,
            session_id,
            messages,
        ))
    }

    /// Publish `chat_progress`.
    pub fn broadcast_chat_progress(
        &self,
        project_id: ProjectId,
        endpoint_id: &str,
        session_id: &str,
        message: &str,
    ) -> Delivery {
        self.publish(Event::chat_progress(
            project_id,
            endpoint_id,
            session_id,
            message,
        ))
    }

    /// Latest client counts.
    pub fn stats(&self) -> BrokerStats {
        self.broker.handle().stats()
    }

    /// Registered clients across all projects.
    pub fn client_count(&self) -> usize {
        self.stats().total_clients
    }

    /// Registered clients for one project.
    pub fn project_client_count(&self, project_id: ProjectId) -> usize {
        self.stats().project_clients(project_id)
    }

    /// Receiver notified after every registration change.
    pub fn subscribe_stats(&self) -> watch::Receiver<BrokerStats> {
        self.broker.handle().subscribe_stats()
    }

    /// Events dropped because the broadcast queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.broker.handle().dropped_events()
    }

    /// Stop the broker, closing every client. Idempotent.
    pub async fn shutdown(&self) {
        self.broker.shutdown().await;
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.broker.is_shutting_down()
    }
}
