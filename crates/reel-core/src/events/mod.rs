//! Live-update events and their SSE wire format.
//!
//! An [`Event`] is built once by the producer, then shared (behind an `Arc`)
//! between the streaming broker and the embedded-runtime sink, so both observe
//! the very same object. Fields are private: the type tag is derived from the
//! payload and the timestamp is captured at construction.
//!
//! # Wire format
//!
//! ```text
//! data: {"type":"project_updated","projectId":"42","data":{...},"timestamp":"..."}
//!
//! ```

pub mod payload;

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use payload::{
    ChatHistoryCleared, ChatMessageAdded, ChatProgress, ChatSessionUpdated, Connected,
    Disconnected, EventPayload, HighlightsDeleted, HighlightsReordered, HighlightsUpdated,
    ProjectUpdated,
};

use crate::errors::Result;
use crate::ids::{ClientId, ProjectId};

/// SSE comment line used as a liveness probe. Parsers ignore it.
pub const HEARTBEAT_FRAME: &str = ": ping\n\n";

/// Event type tag as it appears on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The highlight list of a project changed.
    HighlightsUpdated,
    /// Highlights were deleted.
    HighlightsDeleted,
    /// Highlights were reordered.
    HighlightsReordered,
    /// Project metadata changed.
    ProjectUpdated,
    /// A chat message was stored.
    ChatMessageAdded,
    /// A chat session's history was cleared.
    ChatHistoryCleared,
    /// A chat session was replaced wholesale.
    ChatSessionUpdated,
    /// Progress of a long-running chat operation.
    ChatProgress,
    /// Sent once to a client right after registration.
    Connected,
    /// Sent to clients when the server stops streaming.
    Disconnected,
}

impl EventType {
    /// Every event type, in catalog order.
    pub const ALL: [Self; 10] = [
        Self::HighlightsUpdated,
        Self::HighlightsDeleted,
        Self::HighlightsReordered,
        Self::ProjectUpdated,
        Self::ChatMessageAdded,
        Self::ChatHistoryCleared,
        Self::ChatSessionUpdated,
        Self::ChatProgress,
        Self::Connected,
        Self::Disconnected,
    ];

    /// Wire name of the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighlightsUpdated => "highlights_updated",
            Self::HighlightsDeleted => "highlights_deleted",
            Self::HighlightsReordered => "highlights_reordered",
            Self::ProjectUpdated => "project_updated",
            Self::ChatMessageAdded => "chat_message_added",
            Self::ChatHistoryCleared => "chat_history_cleared",
            Self::ChatSessionUpdated => "chat_session_updated",
            Self::ChatProgress => "chat_progress",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, project-scoped notification.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    project_id: ProjectId,
    data: EventPayload,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Build an event, stamping it with the current time.
    pub fn new(project_id: ProjectId, payload: impl Into<EventPayload>) -> Self {
        let data = payload.into();
        Self {
            event_type: data.event_type(),
            project_id,
            data,
            timestamp: Utc::now(),
        }
    }

    /// `highlights_updated`
    pub fn highlights_updated(project_id: ProjectId, highlights: Vec<Value>) -> Self {
        Self::new(project_id, HighlightsUpdated { highlights })
    }

    /// `highlights_deleted`
    pub fn highlights_deleted(project_id: ProjectId, highlight_ids: Vec<i64>) -> Self {
        Self::new(project_id, HighlightsDeleted { highlight_ids })
    }

    /// `highlights_reordered`
    pub fn highlights_reordered(project_id: ProjectId, new_order: Vec<Value>) -> Self {
        Self::new(project_id, HighlightsReordered { new_order })
    }

    /// `project_updated`
    pub fn project_updated(project_id: ProjectId, project: Value) -> Self {
        Self::new(project_id, ProjectUpdated { project })
    }

    /// `chat_message_added`
    pub fn chat_message_added(
        project_id: ProjectId,
        endpoint_id: impl Into<String>,
        session_id: impl Into<String>,
        message: Value,
    ) -> Self {
        Self::new(
            project_id,
            ChatMessageAdded {
                endpoint_id: endpoint_id.into(),
                session_id: session_id.into(),
                message,
            },
        )
    }

    /// `chat_history_cleared`
    pub fn chat_history_cleared(
        project_id: ProjectId,
        endpoint_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self::new(
            project_id,
            ChatHistoryCleared {
                endpoint_id: endpoint_id.into(),
                session_id: session_id.into(),
            },
        )
    }

    /// `chat_session_updated`
    pub fn chat_session_updated(
        project_id: ProjectId,
        endpoint_id: impl Into<String>,
        session_id: impl Into<String>,
        messages: Vec<Value>,
    ) -> Self {
        Self::new(
            project_id,
            ChatSessionUpdated {
                endpoint_id: endpoint_id.into(),
                session_id: session_id.into(),
                messages,
            },
        )
    }

    /// `chat_progress`
    pub fn chat_progress(
        project_id: ProjectId,
        endpoint_id: impl Into<String>,
        session_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            project_id,
            ChatProgress {
                endpoint_id: endpoint_id.into(),
                session_id: session_id.into(),
                message: message.into(),
            },
        )
    }

    /// `connected`
    pub fn connected(
        project_id: ProjectId,
        client_id: ClientId,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            project_id,
            Connected {
                client_id,
                message: message.into(),
            },
        )
    }

    /// `disconnected`
    pub fn disconnected(project_id: ProjectId) -> Self {
        Self::new(project_id, Disconnected::default())
    }

    /// Type tag.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Fan-out scope.
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Typed payload.
    pub fn payload(&self) -> &EventPayload {
        &self.data
    }

    /// Construction time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Serialize the envelope as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize the envelope as one SSE message: `data: <json>\n\n`.
    pub fn to_wire_format(&self) -> Result<Bytes> {
        let json = self.to_json()?;
        let mut frame = String::with_capacity(json.len() + 8);
        frame.push_str("data: ");
        frame.push_str(&json);
        frame.push_str("\n\n");
        Ok(Bytes::from(frame))
    }
}
