//! WebSocket protocol messages.
//!
//! Every connection is one editor. The client reports edits, cursor moves and
//! stage selection; the server pushes a `result` message whenever a compile
//! publishes.
//!
//! Cursor rows and columns are 1-based, as editors display them; a zero in
//! either coordinate clears the breakpoint.

use rill_engine::PipelineStage;
use rill_playground::PublishedResult;
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Source and cursor changed together (typing).
    Edit {
        source: String,
        row: u32,
        column: u32,
    },

    /// Replace the source text.
    SetSource { source: String },

    /// Move the cursor. A zero row or column clears the breakpoint.
    SetCursor { row: u32, column: u32 },

    /// Choose how far the pipeline runs.
    SelectStage { stage: PipelineStage },

    /// Request the latest published result.
    GetResult,

    /// Request a share link for the current source.
    Share,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A compile finished (or the client asked for the latest result).
    Result(PublishedResult),

    /// Share link for the current source.
    ShareLink { url: String, shortened: bool },

    /// The client sent something the server could not handle.
    Error { message: String },
}
