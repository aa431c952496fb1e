//! Plain-text rendering of diagnostics with source context.
//!
//! ```text
//! error: cannot find variable `y`
//!  --> 1:9
//!   |
//! 1 | let x = y
//!   |         ^
//! ```

use std::fmt::Write;

use rill_engine::{Diagnostic, LineIndex};

/// Render every diagnostic against `source`, separated by blank lines.
pub fn render_diagnostics(source: &str, diagnostics: &[Diagnostic]) -> String {
    let lines = LineIndex::new(source);
    diagnostics
        .iter()
        .map(|diagnostic| render_diagnostic(&lines, diagnostic))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render one diagnostic. Multi-line ranges are underlined on their first line.
pub fn render_diagnostic(lines: &LineIndex, diagnostic: &Diagnostic) -> String {
    let mut out = String::new();
    let start = diagnostic.range.start;
    let end = diagnostic.range.end;
    let _ = writeln!(out, "{}: {}", diagnostic.severity, diagnostic.message);
    let _ = writeln!(out, " --> {}", start);

    let Some(text) = lines.line_text(start.row as usize) else {
        return out;
    };
    let line_number = (start.row + 1).to_string();
    let gutter = " ".repeat(line_number.len());

    let line_chars = text.chars().count() as u32;
    let width = if end.row == start.row {
        end.column.saturating_sub(start.column)
    } else {
        line_chars.saturating_sub(start.column)
    }
    .max(1);

    let _ = writeln!(out, "{gutter} |");
    let _ = writeln!(out, "{line_number} | {text}");
    let _ = write!(
        out,
        "{gutter} | {}{}",
        " ".repeat(start.column as usize),
        "^".repeat(width as usize)
    );
    if let Some(label) = &diagnostic.label {
        let _ = write!(out, " {label}");
    }
    out.push('\n');
    out
}
