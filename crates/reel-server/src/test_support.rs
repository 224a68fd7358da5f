//! In-memory transport for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::errors::TransportError;
use crate::live::transport::StreamTransport;

/// Records every frame; can be told to fail or stall writes.
pub(crate) struct RecordingTransport {
    frames: Mutex<Vec<Bytes>>,
    flushable: bool,
    fail: AtomicBool,
    stall: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::with_flush(true))
    }

    pub(crate) fn unflushable() -> Arc<Self> {
        Arc::new(Self::with_flush(false))
    }

    fn with_flush(flushable: bool) -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            flushable,
            fail: AtomicBool::new(false),
            stall: AtomicBool::new(false),
        }
    }

    pub(crate) fn fail_writes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn stall_writes(&self) {
        self.stall.store(true, Ordering::SeqCst);
    }

    pub(crate) fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.frames
            .lock()
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }

    /// Concatenation of every recorded frame.
    pub(crate) fn stream_text(&self) -> String {
        self.texts().concat()
    }
}

#[async_trait]
impl StreamTransport for RecordingTransport {
    fn supports_flush(&self) -> bool {
        self.flushable
    }

    async fn write_frame(&self, frame: Bytes) -> Result<(), TransportError> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Write("forced failure".into()));
        }
        self.frames.lock().push(frame);
        Ok(())
    }
}

/// Poll `condition` until it holds, panicking after two seconds.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
