//! Rill playground core.
//!
//! Sits between an interactive editor and the non-reentrant compiler engine:
//!
//! - **Queue**: single-flight FIFO of work units ([`SerialTaskQueue`])
//! - **Session**: mutation-style facade over immutable engine handles
//!   ([`CompilerSession`])
//! - **Controller**: turns editor changes into queued compiles and publishes
//!   their results ([`PipelineController`])
//! - **Render**: diagnostics with source context
//! - **Share**: shareable, optionally shortened links

pub mod config;
pub mod controller;
pub mod error;
pub mod queue;
pub mod render;
pub mod session;
pub mod share;

pub use config::PlaygroundConfig;
pub use controller::{
    CompileStatus, ControllerConfig, Cursor, EditorSnapshot, PipelineController, PublishedResult,
};
pub use error::{PlaygroundError, PlaygroundResult};
pub use queue::{QueueConfig, QueuePhase, QueueStats, SerialTaskQueue, SubmitOutcome, WorkUnit};
pub use render::{render_diagnostic, render_diagnostics};
pub use session::CompilerSession;
pub use share::{ShareConfig, ShareLink, ShareLinks, decode_share_link};

pub use rill_engine::{EngineSettings, PipelineStage};
