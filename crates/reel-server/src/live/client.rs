//! One live streaming connection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use reel_core::{ClientId, Event, HEARTBEAT_FRAME, ProjectId};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::transport::StreamTransport;
use crate::errors::ClientError;

/// A registered (or about to be registered) SSE subscriber.
///
/// A client never evicts itself: any error from [`send`](Self::send) or
/// [`send_ping`](Self::send_ping) means the caller must submit a removal.
pub struct Client {
    id: ClientId,
    project_id: ProjectId,
    transport: Arc<dyn StreamTransport>,
    /// Last successful heartbeat (initially the connection time).
    last_ping: Mutex<Instant>,
    connected_at: Instant,
    /// Fired exactly once by [`close`](Self::close).
    done: CancellationToken,
    write_timeout: Duration,
}

impl Client {
    /// Bind a client to `transport`.
    ///
    /// Fails with [`ClientError::StreamingUnsupported`] when the transport
    /// cannot deliver frames incrementally.
    pub fn new(
        id: ClientId,
        project_id: ProjectId,
        transport: Arc<dyn StreamTransport>,
        write_timeout: Duration,
    ) -> Result<Self, ClientError> {
        if !transport.supports_flush() {
            return Err(ClientError::StreamingUnsupported);
        }
        let now = Instant::now();
        Ok(Self {
            id,
            project_id,
            transport,
            last_ping: Mutex::new(now),
            connected_at: now,
            done: CancellationToken::new(),
            write_timeout,
        })
    }

    /// Client ID.
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Project this client subscribed to.
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// When the client was created.
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Time of the last successful ping.
    pub fn last_ping(&self) -> Instant {
        *self.last_ping.lock()
    }

    /// Time elapsed since the last successful ping.
    pub fn since_last_ping(&self) -> Duration {
        self.last_ping.lock().elapsed()
    }

    /// Encode `event` and write it.
    pub async fn send(&self, event: &Event) -> Result<(), ClientError> {
        let frame = event.to_wire_format()?;
        self.send_frame(frame).await
    }

    /// Write an already encoded frame within the write deadline.
    pub async fn send_frame(&self, frame: Bytes) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        match tokio::time::timeout(self.write_timeout, self.transport.write_frame(frame)).await {
            Ok(result) => result.map_err(ClientError::from),
            Err(_) => Err(ClientError::WriteTimeout(self.write_timeout)),
        }
    }

    /// Write a heartbeat comment and record the ping time on success.
    pub async fn send_ping(&self) -> Result<(), ClientError> {
        self.send_frame(Bytes::from_static(HEARTBEAT_FRAME.as_bytes()))
            .await?;
        *self.last_ping.lock() = Instant::now();
        Ok(())
    }

    /// Signal `done`. Safe to call any number of times.
    pub fn close(&self) {
        self.done.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Resolves once the client is closed.
    pub async fn closed(&self) {
        self.done.cancelled().await;
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
