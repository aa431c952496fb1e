//! Error types for rill-engine.
//!
//! Problems in the user's program are never errors here: they are reported
//! as [`Diagnostic`](crate::Diagnostic) data. These variants cover failures
//! of the engine invocation itself.

use thiserror::Error;

use crate::stage::PipelineStage;

/// Result type for engine invocations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Fatal engine failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The compiler panicked while running a stage.
    #[error("internal compiler error during {stage}: {message}")]
    Internal {
        stage: PipelineStage,
        message: String,
    },

    /// The blocking task running the stage was cancelled before it finished.
    #[error("{stage} was cancelled before completion")]
    Cancelled { stage: PipelineStage },

    /// Injected or externally reported failure (used by alternative engines).
    #[error("engine failure: {0}")]
    Failed(String),
}

impl EngineError {
    /// Stage that was running when the failure occurred, if known.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Internal { stage, .. } | Self::Cancelled { stage } => Some(*stage),
            Self::Failed(_) => None,
        }
    }
}
