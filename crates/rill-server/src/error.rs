//! Error types for the Rill server.

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured host/port do not form a socket address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
