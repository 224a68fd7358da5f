//! Byte-stream abstraction a [`Client`](super::client::Client) writes frames to.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::errors::TransportError;

/// A one-way stream that delivers whole SSE frames to a remote peer.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Whether each written frame reaches the peer without waiting for the
    /// response to finish. Checked once, when the client is created.
    fn supports_flush(&self) -> bool;

    /// Write and flush one frame.
    async fn write_frame(&self, frame: Bytes) -> Result<(), TransportError>;
}

/// Transport backed by a bounded channel whose receiver is the HTTP body.
///
/// Every frame becomes one body chunk, which hyper writes out as soon as it is
/// polled. Dropping the receiver (peer gone) turns writes into
/// [`TransportError::Closed`].
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelTransport {
    /// Create a transport buffering up to `capacity` frames.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StreamTransport for ChannelTransport {
    fn supports_flush(&self) -> bool {
        true
    }

    async fn write_frame(&self, frame: Bytes) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }
}
