//! Per-type payload shapes.
//!
//! Highlights, projects, and chat messages are owned by the persistence
//! layer; they travel here as opaque JSON values.

use serde::Serialize;
use serde_json::Value;

use super::EventType;
use crate::ids::ClientId;

/// `highlights_updated`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightsUpdated {
    /// The full, current highlight list of the project.
    pub highlights: Vec<Value>,
}

/// `highlights_deleted`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightsDeleted {
    /// IDs of the highlights that no longer exist.
    pub highlight_ids: Vec<i64>,
}

/// `highlights_reordered`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightsReordered {
    /// Highlights in their new order.
    pub new_order: Vec<Value>,
}

/// `project_updated`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdated {
    /// The updated project record.
    pub project: Value,
}

/// `chat_message_added`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageAdded {
    /// Chat endpoint the session belongs to.
    pub endpoint_id: String,
    /// Chat session.
    pub session_id: String,
    /// The stored message.
    pub message: Value,
}

/// `chat_history_cleared`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryCleared {
    /// Chat endpoint the session belongs to.
    pub endpoint_id: String,
    /// Chat session whose history was cleared.
    pub session_id: String,
}

/// `chat_session_updated`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionUpdated {
    /// Chat endpoint the session belongs to.
    pub endpoint_id: String,
    /// Chat session.
    pub session_id: String,
    /// Complete message list of the session.
    pub messages: Vec<Value>,
}

/// `chat_progress`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatProgress {
    /// Chat endpoint the session belongs to.
    pub endpoint_id: String,
    /// Chat session.
    pub session_id: String,
    /// Human-readable progress line.
    pub message: String,
}

/// `connected`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    /// ID assigned to the new connection.
    pub client_id: ClientId,
    /// Greeting text.
    pub message: String,
}

/// `disconnected`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Disconnected {}

/// Closed set of payloads, one per [`EventType`].
///
/// Serialized without a tag: the envelope carries the type next to `data`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// See [`HighlightsUpdated`].
    HighlightsUpdated(HighlightsUpdated),
    /// See [`HighlightsDeleted`].
    HighlightsDeleted(HighlightsDeleted),
    /// See [`HighlightsReordered`].
    HighlightsReordered(HighlightsReordered),
    /// See [`ProjectUpdated`].
    ProjectUpdated(ProjectUpdated),
    /// See [`ChatMessageAdded`].
    ChatMessageAdded(ChatMessageAdded),
    /// See [`ChatHistoryCleared`].
    ChatHistoryCleared(ChatHistoryCleared),
    /// See [`ChatSessionUpdated`].
    ChatSessionUpdated(ChatSessionUpdated),
    /// See [`ChatProgress`].
    ChatProgress(ChatProgress),
    /// See [`Connected`].
    Connected(Connected),
    /// See [`Disconnected`].
    Disconnected(Disconnected),
}

impl EventPayload {
    /// The type tag that goes with this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::HighlightsUpdated(_) => EventType::HighlightsUpdated,
            Self::HighlightsDeleted(_) => EventType::HighlightsDeleted,
            Self::HighlightsReordered(_) => EventType::HighlightsReordered,
            Self::ProjectUpdated(_) => EventType::ProjectUpdated,
            Self::ChatMessageAdded(_) => EventType::ChatMessageAdded,
            Self::ChatHistoryCleared(_) => EventType::ChatHistoryCleared,
            Self::ChatSessionUpdated(_) => EventType::ChatSessionUpdated,
            Self::ChatProgress(_) => EventType::ChatProgress,
            Self::Connected(_) => EventType::Connected,
            Self::Disconnected(_) => EventType::Disconnected,
        }
    }
}

macro_rules! payload_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for EventPayload {
                fn from(payload: $variant) -> Self {
                    Self::$variant(payload)
                }
            }
        )*
    };
}

payload_from!(
    HighlightsUpdated,
    HighlightsDeleted,
    HighlightsReordered,
    ProjectUpdated,
    ChatMessageAdded,
    ChatHistoryCleared,
    ChatSessionUpdated,
    ChatProgress,
    Connected,
    Disconnected,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn highlights_deleted_uses_camel_case() {
        let payload = EventPayload::from(HighlightsDeleted {
            highlight_ids: vec![1, 2],
        });
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"highlightIds": [1, 2]})
        );
    }

    #[test]
    fn chat_fields_use_camel_case() {
        let payload = EventPayload::from(ChatSessionUpdated {
            endpoint_id: "ep".into(),
            session_id: "s1".into(),
            messages: vec![json!({"role": "user"})],
        });
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["endpointId"], "ep");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn disconnected_serializes_as_empty_object() {
        let payload = EventPayload::from(Disconnected::default());
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({}));
    }

    #[test]
    fn every_variant_maps_to_its_type() {
        let cases = [
            (
                EventPayload::from(HighlightsUpdated { highlights: vec![] }),
                EventType::HighlightsUpdated,
            ),
            (
                EventPayload::from(HighlightsReordered { new_order: vec![] }),
                EventType::HighlightsReordered,
            ),
            (
                EventPayload::from(ProjectUpdated { project: json!({}) }),
                EventType::ProjectUpdated,
            ),
            (
                EventPayload::from(ChatHistoryCleared {
                    endpoint_id: "e".into(),
                    session_id: "s".into(),
                }),
                EventType::ChatHistoryCleared,
            ),
            (
                EventPayload::from(Connected {
                    client_id: ClientId::from("c"),
                    message: "hi".into(),
                }),
                EventType::Connected,
            ),
        ];
        for (payload, expected) in cases {
            assert_eq!(payload.event_type(), expected);
        }
    }
}
