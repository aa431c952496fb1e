//! Salsa input types for the engine.
//!
//! One engine owns one input of each kind and updates them with setters
//! before every staged run, so memoized results for superseded source text
//! are replaced rather than accumulated.

use crate::span::Position;

/// Input: program source text.
#[salsa::input(debug)]
pub struct SourceProgram {
    pub text: String,
}

/// Input: breakpoint position, if any.
#[salsa::input]
pub struct BreakpointInput {
    pub position: Option<Position>,
}

/// Input: engine limits.
#[salsa::input]
pub struct EngineSettingsInput {
    /// Step budget for one execution
    pub max_steps: u64,

    /// Printed bytes kept before output is truncated
    pub max_output_bytes: usize,

    /// Deepest expression nesting the parser accepts
    pub max_nesting: usize,
}
