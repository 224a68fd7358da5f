//! Error types for the live-update server.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reel_core::CoreError;
use thiserror::Error;

/// Failure of the underlying byte stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The receiving side is gone (peer disconnected).
    #[error("stream closed by peer")]
    Closed,
    /// Any other write failure.
    #[error("stream write failed: {0}")]
    Write(String),
}

/// Failure of a client operation. Callers treat any of these as "client is dead".
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection cannot flush frames incrementally.
    #[error("connection does not support incremental flushing")]
    StreamingUnsupported,
    /// The client was already closed.
    #[error("client is closed")]
    Closed,
    /// A frame write exceeded its deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),
    /// The transport rejected the frame.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The event could not be encoded.
    #[error(transparent)]
    Encode(#[from] CoreError),
}

/// Rejection of an inbound streaming request. Nothing is registered.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The project query parameter is absent or empty.
    #[error("missing required query parameter `projectId`")]
    MissingProject,
    /// The project query parameter is not a valid project id.
    #[error("invalid project id: {0:?}")]
    InvalidProject(String),
    /// The response stream cannot be flushed incrementally.
    #[error("streaming is not supported by this connection")]
    StreamingUnsupported,
}

impl HandshakeError {
    /// HTTP status for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingProject | Self::InvalidProject(_) => StatusCode::BAD_REQUEST,
            Self::StreamingUnsupported => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingProject => "MISSING_PROJECT_ID",
            Self::InvalidProject(_) => "INVALID_PROJECT_ID",
            Self::StreamingUnsupported => "STREAMING_UNSUPPORTED",
        }
    }
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Server startup failure.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
