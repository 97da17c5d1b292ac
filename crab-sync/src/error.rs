//! Sync engine error types

use shared::ModelError;
use thiserror::Error;

/// Sync engine error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Realtime channel failure (connect, read or write)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Channel rejected the credential
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// No active session
    #[error("No active session")]
    NoSession,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure class, decides between retry and surfacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retried with backoff
    Transport,
    /// Terminal for the attempt
    Auth,
    /// Isolated to one store
    Resource,
    /// Dropped
    Malformed,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Http(e) if e.is_decode() => ErrorKind::Malformed,
            SyncError::Http(_) | SyncError::Transport(_) => ErrorKind::Transport,
            SyncError::Unauthorized | SyncError::Forbidden(_) | SyncError::Auth(_) => {
                ErrorKind::Auth
            }
            SyncError::NotFound(_)
            | SyncError::Validation(_)
            | SyncError::NoSession
            | SyncError::Internal(_) => ErrorKind::Resource,
            SyncError::InvalidResponse(_) | SyncError::Serialization(_) => ErrorKind::Malformed,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }
}

impl From<ModelError> for SyncError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Serialization(e) => SyncError::Serialization(e),
            other => SyncError::InvalidResponse(other.to_string()),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
