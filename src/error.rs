//! Error types for image generation and history persistence.

use std::time::Duration;

/// Marker Gemini puts in the body when the configured key or project cannot
/// see the requested model.
const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Maximum length of a service error message kept for display.
const MAX_ERROR_MESSAGE_LEN: usize = 300;

/// Errors that can occur during a generation cycle.
#[derive(Debug, thiserror::Error)]
pub enum WarrickError {
    /// No API credential could be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// The service rejected the configured credential or entity.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized message from the response body.
        message: String,
    },

    /// The response carried no candidates or no content parts.
    #[error("empty response: {0}")]
    EmptyResponse(String),

    /// Content parts were returned but none of them held image data.
    #[error("no image data in response")]
    NoImageData,

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 or image data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Operation timed out (e.g., image decode).
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error (e.g., writing the history file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Coarse classification used to decide how a failure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credential or bad local configuration.
    Configuration,
    /// The service answered, but not with an image.
    Protocol,
    /// The service rejected the credential; key selection may help.
    Authorization,
    /// Network or service failure.
    Transport,
    /// Local failures (I/O, decode, timeouts, bad arguments).
    Internal,
}

impl WarrickError {
    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::EmptyResponse(_) | Self::NoImageData | Self::ContentBlocked(_) => {
                ErrorKind::Protocol
            }
            Self::Auth(_) => ErrorKind::Authorization,
            Self::Api { message, .. } if message.contains(ENTITY_NOT_FOUND) => {
                ErrorKind::Authorization
            }
            Self::Api { .. } | Self::Network(_) => ErrorKind::Transport,
            Self::Decode(_)
            | Self::Timeout(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidRequest(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if re-selecting the API key could fix this error.
    pub fn is_authorization(&self) -> bool {
        self.kind() == ErrorKind::Authorization
    }
}

/// Trims a service error body down to something safe to show a user.
///
/// Prefers the `error.message` field of a Google-style JSON error body and
/// collapses whitespace. Long messages are truncated on a char boundary.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.to_string());

    let collapsed = extracted.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    truncated.push('…');
    truncated
}

/// Returns true if a 404 body is Gemini's "entity not found" rejection.
pub(crate) fn is_entity_not_found(text: &str) -> bool {
    text.contains(ENTITY_NOT_FOUND)
}

/// Result type alias for warrick operations.
pub type Result<T> = std::result::Result<T, WarrickError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            WarrickError::Config("no key".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(WarrickError::NoImageData.kind(), ErrorKind::Protocol);
        assert_eq!(
            WarrickError::EmptyResponse("no parts".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            WarrickError::Auth("bad key".into()).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            WarrickError::Api {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            WarrickError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_entity_not_found_is_authorization() {
        let err = WarrickError::Api {
            status: 404,
            message: "Requested entity was not found.".into(),
        };
        assert!(err.is_authorization());
        assert!(!WarrickError::NoImageData.is_authorization());
    }

    #[test]
    fn test_error_display() {
        let err = WarrickError::Api {
            status: 500,
            message: "Internal".into(),
        };
        assert_eq!(err.to_string(), "API error: 500 - Internal");

        let err = WarrickError::Config("API_KEY is not set".into());
        assert_eq!(err.to_string(), "configuration error: API_KEY is not set");
    }

    #[test]
    fn test_sanitize_extracts_google_message() {
        let body = r#"{"error": {"code": 400, "message": "Invalid   aspect\nratio", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(sanitize_error_message(body), "Invalid aspect ratio");
    }

    #[test]
    fn test_sanitize_truncates_long_text() {
        let body = "x".repeat(1000);
        let sanitized = sanitize_error_message(&body);
        assert_eq!(sanitized.chars().count(), MAX_ERROR_MESSAGE_LEN + 1);
        assert!(sanitized.ends_with('…'));
    }
}
