//! Decode errors for wire records and realtime frames

use thiserror::Error;

/// Error raised while turning a raw server shape into a typed value
#[derive(Debug, Error)]
pub enum ModelError {
    /// Event name outside the known taxonomy
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Payload did not match the schema of its event kind
    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },

    /// REST envelope is missing a required field
    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    /// Record lacks a field under every name the server uses for it
    #[error("Record is missing {0}")]
    Incomplete(&'static str),

    /// Server answered with `success: false`
    #[error("Server reported failure: {0}")]
    Rejected(String),

    /// JSON parsing error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid_payload(event: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPayload {
            event: event.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for decode operations
pub type ModelResult<T> = Result<T, ModelError>;
