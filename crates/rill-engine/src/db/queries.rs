//! Salsa tracked query functions.
//!
//! Each pipeline stage is a memoized query. Moving the breakpoint only
//! invalidates lowering and execution; parsing and validation are reused as
//! long as the source input is the same.

use std::sync::Arc;

use crate::bir::{Bir, lower};
use crate::diagnostic::Diagnostic;
use crate::interp::{Execution, ExecutionLimits, execute};
use crate::span::{LineIndex, SourceRange};
use crate::syntax::{ExprId, SyntaxTree, parse};
use crate::validate::{ValidatedTree, validate};

use super::inputs::{BreakpointInput, EngineSettingsInput, SourceProgram};

/// Syntax tree plus lexical and parse diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProgram {
    pub tree: SyntaxTree,
    pub diagnostics: Vec<Diagnostic>,
    pub lines: LineIndex,
}

/// Name-resolved tree plus validation diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedProgram {
    pub tree: ValidatedTree,
    pub diagnostics: Vec<Diagnostic>,
}

/// Tracked function: lex and parse the source.
#[salsa::tracked]
pub fn parse_program(
    db: &dyn salsa::Database,
    source: SourceProgram,
    settings: EngineSettingsInput,
) -> Arc<ParsedProgram> {
    let text = source.text(db);
    let lines = LineIndex::new(&text);
    let (tree, diagnostics) = parse(&text, &lines, settings.max_nesting(db));
    tracing::trace!(exprs = tree.expr_count, diagnostics = diagnostics.len(), "parsed program");
    Arc::new(ParsedProgram {
        tree,
        diagnostics,
        lines,
    })
}

/// Tracked function: resolve names in the parsed program.
#[salsa::tracked]
pub fn validate_program(
    db: &dyn salsa::Database,
    source: SourceProgram,
    settings: EngineSettingsInput,
) -> Arc<ValidatedProgram> {
    let parsed = parse_program(db, source, settings);
    let (tree, diagnostics) = validate(&parsed.tree, &parsed.lines);
    Arc::new(ValidatedProgram { tree, diagnostics })
}

/// Tracked function: the expression selected by the breakpoint and its range.
///
/// Returns `None` when no breakpoint is set or the position does not fall
/// inside any expression.
#[salsa::tracked]
pub fn locate_breakpoint(
    db: &dyn salsa::Database,
    source: SourceProgram,
    breakpoint: BreakpointInput,
    settings: EngineSettingsInput,
) -> Option<(ExprId, SourceRange)> {
    let position = breakpoint.position(db)?;
    let parsed = parse_program(db, source, settings);
    let offset = parsed.lines.offset(position)?;
    let expr = parsed.tree.innermost_at(offset)?;
    Some((expr.id, parsed.lines.range(expr.span)))
}

/// Tracked function: lower the validated program to BIR.
#[salsa::tracked]
pub fn lower_program(
    db: &dyn salsa::Database,
    source: SourceProgram,
    breakpoint: BreakpointInput,
    settings: EngineSettingsInput,
) -> Arc<Bir> {
    let validated = validate_program(db, source, settings);
    let target = locate_breakpoint(db, source, breakpoint, settings).map(|(id, _)| id);
    Arc::new(lower(&validated.tree, target))
}

/// Tracked function: run the lowered program.
#[salsa::tracked]
pub fn execute_program(
    db: &dyn salsa::Database,
    source: SourceProgram,
    breakpoint: BreakpointInput,
    settings: EngineSettingsInput,
) -> Arc<Execution> {
    let parsed = parse_program(db, source, settings);
    let bir = lower_program(db, source, breakpoint, settings);
    let limits = ExecutionLimits {
        max_steps: settings.max_steps(db),
        max_output_bytes: settings.max_output_bytes(db),
    };
    let execution = execute(&bir, &parsed.lines, limits);
    tracing::trace!(
        steps = execution.steps,
        completed = execution.completed,
        "executed program"
    );
    Arc::new(execution)
}
