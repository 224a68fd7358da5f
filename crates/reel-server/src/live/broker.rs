//! Single-writer broker actor.
//!
//! One task owns the [`Registry`] and is the only code that mutates it. The
//! outside world talks to it through a [`BrokerHandle`]:
//!
//! - control commands (add, remove, snapshot) go through an unbounded queue,
//!   whose volume is bounded by the number of live connections;
//! - broadcasts go through a bounded queue fed with `try_send`, so a producer
//!   never waits on a slow consumer. When the queue is full the newest event
//!   is dropped and counted.
//!
//! The loop is `biased`: cancellation first, then control, then broadcasts,
//! so a client added before a broadcast is enqueued is registered first.
//! After every mutation the actor publishes a [`BrokerStats`] snapshot on a
//! `watch` channel; stat reads never reach the actor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use reel_core::{ClientId, Event};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::Client;
use super::heartbeat::run_heartbeat;
use super::registry::{BrokerStats, Registry};
use crate::config::LiveConfig;
use crate::metrics::{
    BROADCAST_DROPS_TOTAL, BROADCAST_EVENTS_TOTAL, ENCODE_FAILURES_TOTAL, SEND_FAILURES_TOTAL,
    SSE_CONNECTIONS_ACTIVE, SSE_CONNECTIONS_TOTAL, SSE_DISCONNECTIONS_TOTAL,
};

/// Message sent to a client right after it is registered.
const CONNECTED_MESSAGE: &str = "Connected to live updates";

/// Why a client left the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveReason {
    /// The peer went away or the handler finished.
    Disconnected,
    /// A broadcast write failed.
    SendFailed,
    /// A heartbeat write failed.
    PingFailed,
    /// No successful ping within the staleness window.
    Stale,
    /// The `connected` confirmation could not be written.
    ConnectFailed,
    /// The broker stopped.
    Shutdown,
}

impl RemoveReason {
    /// Label used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::SendFailed => "send_failed",
            Self::PingFailed => "ping_failed",
            Self::Stale => "stale",
            Self::ConnectFailed => "connect_failed",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Outcome of handing an event to the broker. Never a delivery guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted into the broadcast queue.
    Queued,
    /// Discarded because the broadcast queue was full.
    Dropped,
    /// Discarded because the broker has stopped.
    Stopped,
}

enum Command {
    Add(Arc<Client>),
    Remove {
        id: ClientId,
        reason: RemoveReason,
        /// When set, only this exact client is removed, never a replacement
        /// registered under the same ID.
        expected: Option<Arc<Client>>,
    },
    Snapshot(oneshot::Sender<Vec<Arc<Client>>>),
}

/// Cheap, cloneable entry point to a running broker.
#[derive(Clone)]
pub struct BrokerHandle {
    control: mpsc::UnboundedSender<Command>,
    events: mpsc::Sender<Arc<Event>>,
    stats: watch::Receiver<BrokerStats>,
    dropped: Arc<AtomicU64>,
}

impl BrokerHandle {
    /// Register a client. After shutdown the client is closed immediately.
    pub fn add(&self, client: Arc<Client>) {
        if let Err(mpsc::error::SendError(Command::Add(client))) =
            self.control.send(Command::Add(client))
        {
            debug!(client_id = %client.id(), "broker stopped, closing new client");
            client.close();
        }
    }

    /// Unregister whichever client holds `id`. Unknown IDs and post-shutdown
    /// calls are no-ops.
    pub fn remove(&self, id: ClientId, reason: RemoveReason) {
        self.submit_remove(id, reason, None);
    }

    /// Unregister `client` if it is still the one registered under its ID.
    /// A newer client that replaced it is left alone.
    pub fn release(&self, client: &Arc<Client>, reason: RemoveReason) {
        self.submit_remove(client.id().clone(), reason, Some(Arc::clone(client)));
    }

    fn submit_remove(&self, id: ClientId, reason: RemoveReason, expected: Option<Arc<Client>>) {
        let command = Command::Remove {
            id,
            reason,
            expected,
        };
        if self.control.send(command).is_err() {
            debug!(reason = reason.as_str(), "broker stopped, ignoring remove");
        }
    }

    /// Enqueue an event for fan-out without waiting.
    pub fn broadcast(&self, event: Arc<Event>) -> Delivery {
        let event_type = event.event_type();
        let project_id = event.project_id();
        match self.events.try_send(event) {
            Ok(()) => {
                counter!(BROADCAST_EVENTS_TOTAL, "type" => event_type.as_str()).increment(1);
                Delivery::Queued
            }
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                counter!(BROADCAST_DROPS_TOTAL).increment(1);
                warn!(
                    %project_id,
                    %event_type,
                    "broadcast queue full, dropping event"
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%project_id, %event_type, "broker stopped, discarding event");
                Delivery::Stopped
            }
        }
    }

    /// Owned copy of every registered client, via a round-trip to the actor.
    /// Empty once the broker has stopped.
    pub async fn snapshot(&self) -> Vec<Arc<Client>> {
        let (tx, rx) = oneshot::channel();
        if self.control.send(Command::Snapshot(tx)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Latest published client counts.
    pub fn stats(&self) -> BrokerStats {
        self.stats.borrow().clone()
    }

    /// Receiver notified after every registry mutation.
    pub fn subscribe_stats(&self) -> watch::Receiver<BrokerStats> {
        self.stats.clone()
    }

    /// Events dropped because the broadcast queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the actor has stopped accepting commands.
    pub fn is_stopped(&self) -> bool {
        self.control.is_closed()
    }
}

/// Owns the broker actor and heartbeat tasks.
pub struct Broker {
    handle: BrokerHandle,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Broker {
    /// Spawn the actor (and the heartbeat sweep unless its interval is zero).
    ///
    /// Cancelling `cancel` stops both; [`shutdown`](Self::shutdown) cancels
    /// and waits for them.
    pub fn spawn(config: &LiveConfig, cancel: CancellationToken) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(config.broadcast_queue_capacity.max(1));
        let (stats_tx, stats_rx) = watch::channel(BrokerStats::default());

        let handle = BrokerHandle {
            control: control_tx,
            events: events_tx,
            stats: stats_rx,
            dropped: Arc::new(AtomicU64::new(0)),
        };

        let actor = BrokerActor {
            registry: Registry::new(),
            control: control_rx,
            events: events_rx,
            stats: stats_tx,
            cancel: cancel.clone(),
        };
        let mut tasks = vec![tokio::spawn(actor.run())];

        if config.heartbeat_interval.is_zero() {
            info!("heartbeat sweep disabled");
        } else {
            let stale_after = config.effective_stale_after();
            if stale_after != config.stale_after {
                warn!(
                    configured_ms = config.stale_after.as_millis(),
                    interval_ms = config.heartbeat_interval.as_millis(),
                    effective_ms = stale_after.as_millis(),
                    "stale threshold shorter than two heartbeat intervals, raising it"
                );
            }
            tasks.push(tokio::spawn(run_heartbeat(
                handle.clone(),
                config.heartbeat_interval,
                stale_after,
                cancel.clone(),
            )));
        }

        Self {
            handle,
            cancel,
            tasks: Mutex::new(tasks),
        }
    }

    /// Handle for submitting commands and broadcasts.
    pub fn handle(&self) -> &BrokerHandle {
        &self.handle
    }

    /// Stop the actor and heartbeat, closing every client. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(error) = task.await {
                warn!(%error, "broker task ended abnormally");
            }
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct BrokerActor {
    registry: Registry,
    control: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Receiver<Arc<Event>>,
    stats: watch::Sender<BrokerStats>,
    cancel: CancellationToken,
}

impl BrokerActor {
    async fn run(mut self) {
        debug!("broker actor started");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(command) = self.control.recv() => self.handle(command).await,
                Some(event) = self.events.recv() => self.fan_out(&event).await,
                else => break,
            }
        }
        self.stop().await;
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Add(client) => self.add(client).await,
            Command::Remove {
                id,
                reason,
                expected,
            } => self.remove(&id, reason, expected.as_ref()),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    async fn add(&mut self, client: Arc<Client>) {
        let id = client.id().clone();
        let project_id = client.project_id();
        if let Some(previous) = self.registry.insert(Arc::clone(&client)) {
            debug!(client_id = %id, "replacing client with duplicate id");
            previous.close();
        }
        counter!(SSE_CONNECTIONS_TOTAL).increment(1);
        self.publish_stats();
        info!(
            client_id = %id,
            %project_id,
            clients = self.registry.len(),
            "client registered"
        );

        let hello = Event::connected(project_id, id.clone(), CONNECTED_MESSAGE);
        if let Err(error) = client.send(&hello).await {
            warn!(client_id = %id, %error, "failed to confirm connection");
            self.remove(&id, RemoveReason::ConnectFailed, Some(&client));
        }
    }

    fn remove(&mut self, id: &ClientId, reason: RemoveReason, expected: Option<&Arc<Client>>) {
        let removed = match expected {
            Some(expected) => self.registry.remove_if_same(id, expected),
            None => self.registry.remove(id),
        };
        let Some(client) = removed else {
            debug!(client_id = %id, reason = reason.as_str(), "client already removed");
            return;
        };
        counter!(SSE_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
        self.publish_stats();
        client.close();
        info!(
            client_id = %id,
            project_id = %client.project_id(),
            reason = reason.as_str(),
            clients = self.registry.len(),
            "client removed"
        );
    }

    async fn fan_out(&mut self, event: &Event) {
        let project_id = event.project_id();
        let event_type = event.event_type();
        let recipients = self.registry.project_snapshot(project_id);
        if recipients.is_empty() {
            debug!(%project_id, %event_type, "no clients for project");
            return;
        }

        let frame = match event.to_wire_format() {
            Ok(frame) => frame,
            Err(error) => {
                counter!(ENCODE_FAILURES_TOTAL).increment(1);
                warn!(%project_id, %event_type, %error, "failed to encode event");
                return;
            }
        };

        let results = join_all(recipients.iter().map(|client| {
            let frame = frame.clone();
            async move { (client, client.send_frame(frame).await) }
        }))
        .await;

        let failed: Vec<&Arc<Client>> = results
            .into_iter()
            .filter_map(|(client, result)| {
                let error = result.err()?;
                counter!(SEND_FAILURES_TOTAL).increment(1);
                warn!(client_id = %client.id(), %error, "send failed, evicting client");
                Some(client)
            })
            .collect();

        debug!(
            %project_id,
            %event_type,
            recipients = recipients.len(),
            failed = failed.len(),
            "broadcast event to project"
        );
        for client in failed {
            self.remove(client.id(), RemoveReason::SendFailed, Some(client));
        }
    }

    async fn stop(mut self) {
        // Refuse new commands, then settle the ones already queued.
        self.control.close();
        while let Ok(command) = self.control.try_recv() {
            match command {
                Command::Add(client) => client.close(),
                Command::Remove {
                    id,
                    reason,
                    expected,
                } => self.remove(&id, reason, expected.as_ref()),
                Command::Snapshot(reply) => {
                    let _ = reply.send(Vec::new());
                }
            }
        }

        self.events.close();
        let mut discarded = 0usize;
        while self.events.try_recv().is_ok() {
            discarded += 1;
        }

        let clients = self.registry.drain();
        let _ = join_all(clients.iter().map(|client| async move {
            let farewell = Event::disconnected(client.project_id());
            if let Err(error) = client.send(&farewell).await {
                debug!(client_id = %client.id(), %error, "farewell not delivered");
            }
            client.close();
        }))
        .await;

        counter!(SSE_DISCONNECTIONS_TOTAL, "reason" => RemoveReason::Shutdown.as_str())
            .increment(clients.len() as u64);
        self.publish_stats();
        info!(clients = clients.len(), discarded, "broker stopped");
    }

    #[allow(clippy::cast_precision_loss)]
    fn publish_stats(&self) {
        let stats = self.registry.stats();
        gauge!(SSE_CONNECTIONS_ACTIVE).set(stats.total_clients as f64);
        let _ = self.stats.send_replace(stats);
    }
}
