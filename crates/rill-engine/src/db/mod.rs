//! Salsa-based incremental computation database for the engine.
//!
//! - [`inputs`] - Input types (source, breakpoint, settings)
//! - [`queries`] - Tracked query functions, one per pipeline stage

mod inputs;
mod queries;

use salsa::Setter;
use serde::{Deserialize, Serialize};

pub use inputs::{BreakpointInput, EngineSettingsInput, SourceProgram};
pub use queries::{
    ParsedProgram, ValidatedProgram, execute_program, locate_breakpoint, lower_program,
    parse_program, validate_program,
};

use crate::span::Position;

/// The concrete database implementation.
#[salsa::db]
#[derive(Default, Clone)]
pub struct EngineDatabase {
    storage: salsa::Storage<Self>,
}

#[salsa::db]
impl salsa::Database for EngineDatabase {}

impl EngineDatabase {
    /// Create a new, empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source text input.
    pub fn source(&self, text: impl Into<String>) -> SourceProgram {
        SourceProgram::new(self, text.into())
    }

    /// Replace the text of an existing source input.
    ///
    /// Everything derived from the source is invalidated. Unchanged text is
    /// left alone so no new revision is started.
    pub fn update_source(&mut self, source: SourceProgram, text: &str) {
        if source.text(&*self) != text {
            source.set_text(self).to(text.to_string());
        }
    }

    /// Create a breakpoint input.
    pub fn breakpoint(&self, position: Option<Position>) -> BreakpointInput {
        BreakpointInput::new(self, position)
    }

    /// Move an existing breakpoint input. Parsing and validation stay valid.
    pub fn update_breakpoint(&mut self, breakpoint: BreakpointInput, position: Option<Position>) {
        if breakpoint.position(&*self) != position {
            breakpoint.set_position(self).to(position);
        }
    }

    /// Create a settings input.
    pub fn settings(&self, settings: &EngineSettings) -> EngineSettingsInput {
        EngineSettingsInput::new(
            self,
            settings.max_steps,
            settings.max_output_bytes,
            settings.max_nesting,
        )
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Interpreter step budget for one execution.
    pub max_steps: u64,
    /// Printed bytes kept before output is truncated.
    pub max_output_bytes: usize,
    /// Deepest expression nesting accepted by the parser. Deeper input is
    /// reported as a diagnostic instead of being compiled.
    pub max_nesting: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_output_bytes: 64 * 1024,
            max_nesting: 128,
        }
    }
}
