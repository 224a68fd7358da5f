//! In-process sink that mirrors every published event.
//!
//! The hub hands each event to the broker (remote SSE clients) and to a
//! [`RuntimeEmitter`] (embedded UI, in-process listeners). Both receive the
//! same `Arc<Event>`, so the two audiences see an identical per-project
//! sequence.

use std::sync::Arc;

use reel_core::Event;
use tokio::sync::broadcast;
use tracing::trace;

/// Sink for events consumed inside the process.
///
/// `emit` is called on the publisher's thread and must never block.
pub trait RuntimeEmitter: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: &Arc<Event>);
}

/// Emitter backed by a `tokio::sync::broadcast` channel.
///
/// Listeners that fall behind lose the oldest events and observe
/// `RecvError::Lagged`; the publisher is never slowed down.
#[derive(Clone, Debug)]
pub struct ChannelEmitter {
    tx: broadcast::Sender<Arc<Event>>,
}

impl ChannelEmitter {
    /// Create an emitter retaining up to `capacity` events per listener.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Attach a new listener. It sees events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Event>> {
        self.tx.subscribe()
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl RuntimeEmitter for ChannelEmitter {
    fn emit(&self, event: &Arc<Event>) {
        // Err only means nobody is listening.
        if self.tx.send(Arc::clone(event)).is_err() {
            trace!(event_type = %event.event_type(), "no runtime listeners");
        }
    }
}

/// Emitter for deployments without an embedded runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEmitter;

impl RuntimeEmitter for NoopEmitter {
    fn emit(&self, _event: &Arc<Event>) {}
}
