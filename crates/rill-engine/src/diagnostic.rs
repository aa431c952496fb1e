//! Diagnostics reported about the user's program.
//!
//! Diagnostics are ordinary result data: a stage that finds problems in the
//! source still succeeds and carries them in its report.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::{LineIndex, SourceRange, Span};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// Compiler phase that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lex,
    Parse,
    Validate,
    Runtime,
}

/// A single problem in the user's source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub phase: Phase,
    pub message: String,
    /// Editor coordinates of the primary span.
    pub range: SourceRange,
    /// Byte span of the primary location.
    #[serde(skip)]
    pub span: Span,
    /// Optional label printed under the primary span.
    pub label: Option<String>,
}

impl Diagnostic {
    pub fn error(phase: Phase, message: impl Into<String>, span: Span, lines: &LineIndex) -> Self {
        Self {
            severity: Severity::Error,
            phase,
            message: message.into(),
            range: lines.range(span),
            span,
            label: None,
        }
    }

    pub fn warning(
        phase: Phase,
        message: impl Into<String>,
        span: Span,
        lines: &LineIndex,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(phase, message, span, lines)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.range.start)
    }
}
