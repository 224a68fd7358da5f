//! `GET /api/live?projectId=<id>`: the SSE handshake.
//!
//! The response body is the connection's lifetime anchor. It forwards frames
//! from the client's transport until the client is closed (eviction or
//! shutdown) or hyper drops it (peer disconnected). Either way the body's
//! drop guard submits the idempotent removal; no task is spawned per
//! connection.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::{self, HeaderName};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use reel_core::ProjectId;
use serde::Deserialize;
use tracing::debug;

use super::client::Client;
use super::transport::ChannelTransport;
use crate::errors::HandshakeError;
use crate::hub::EventHub;

/// Query string of the streaming endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveQuery {
    /// Project to subscribe to.
    pub project_id: Option<String>,
}

/// Validate the `projectId` parameter.
pub fn parse_project(raw: Option<&str>) -> Result<ProjectId, HandshakeError> {
    let raw = raw.filter(|r| !r.is_empty()).ok_or(HandshakeError::MissingProject)?;
    raw.parse()
        .map_err(|_| HandshakeError::InvalidProject(raw.to_owned()))
}

/// GET /api/live
pub async fn live_handler(
    State(hub): State<Arc<EventHub>>,
    Query(query): Query<LiveQuery>,
) -> Result<Response, HandshakeError> {
    let project_id = parse_project(query.project_id.as_deref())?;
    open_stream(&hub, project_id)
}

/// Register a client for `project_id` and build its streaming response.
pub fn open_stream(
    hub: &Arc<EventHub>,
    project_id: ProjectId,
) -> Result<Response, HandshakeError> {
    let (transport, mut frames) = ChannelTransport::new(hub.config().client_buffer_frames);
    let client = hub.open_client(project_id, Arc::new(transport))?;
    debug!(client_id = %client.id(), %project_id, "live stream opened");

    let guard = RemoveOnDrop {
        hub: Arc::clone(hub),
        client: Arc::clone(&client),
    };

    let body = async_stream::stream! {
        let _guard = guard;
        loop {
            // Frames first, so a farewell written just before close is flushed.
            let next = tokio::select! {
                biased;
                frame = frames.recv() => frame,
                () = client.closed() => None,
            };
            match next {
                Some(frame) => yield Ok::<Bytes, Infallible>(frame),
                None => break,
            }
        }
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Submits the client's removal when the response body goes away.
struct RemoveOnDrop {
    hub: Arc<EventHub>,
    client: Arc<Client>,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        debug!(client_id = %self.client.id(), "live stream ended");
        self.hub.close_client(&self.client);
    }
}
