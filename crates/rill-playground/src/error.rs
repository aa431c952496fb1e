//! Error types for the playground core.

use std::time::Duration;

use rill_engine::EngineError;

/// Playground error type.
#[derive(Debug, thiserror::Error)]
pub enum PlaygroundError {
    /// The engine failed to run a stage (not a diagnostic).
    #[error("Compilation failed: {0}")]
    Engine(#[from] EngineError),

    /// A compile ran past the configured timeout and was abandoned.
    #[error("Compilation timed out after {0:?}")]
    TimedOut(Duration),

    /// The link shortener could not produce a short link.
    #[error("Link shortener error: {0}")]
    Shortener(String),

    /// A share link did not carry decodable source.
    #[error("Invalid share link: {0}")]
    InvalidShareLink(String),
}

impl From<reqwest::Error> for PlaygroundError {
    fn from(e: reqwest::Error) -> Self {
        Self::Shortener(e.to_string())
    }
}

/// Result type for playground operations.
pub type PlaygroundResult<T> = Result<T, PlaygroundError>;
