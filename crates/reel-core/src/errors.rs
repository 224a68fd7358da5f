//! Core error types.

use thiserror::Error;

/// Errors produced while building or encoding events.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A project identifier did not parse as an integer.
    #[error("invalid project id: {0:?}")]
    InvalidProjectId(String),
    /// An event payload could not be encoded as JSON.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_project_id_display() {
        let err = CoreError::InvalidProjectId("abc".into());
        assert_eq!(err.to_string(), "invalid project id: \"abc\"");
    }

    #[test]
    fn serialize_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Serialize(_)));
        assert!(err.to_string().starts_with("failed to serialize event"));
    }
}
