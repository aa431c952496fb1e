//! Human-readable printing of published results.

use rill_playground::{CompileStatus, PublishedResult};

use crate::colors::{self, Style};

/// Print a result: status line, output, diagnostics and heap snapshots.
pub fn print_result(result: &PublishedResult) {
    let errors = result.diagnostics.iter().filter(|d| d.is_error()).count();
    let warnings = result.diagnostics.len() - errors;

    match &result.status {
        CompileStatus::Failed { message } => {
            println!("{}", Style::Error.paint(format!("✗ {}", message)));
        }
        CompileStatus::Pending => {
            println!("{}", Style::Muted.paint("… pending"));
        }
        CompileStatus::Succeeded if errors > 0 => {
            let summary = format!(
                "✗ {} ({} error(s), {} warning(s))",
                result.stage, errors, warnings
            );
            println!("{}", Style::Error.paint(summary));
        }
        CompileStatus::Succeeded => {
            println!(
                "{} {}",
                Style::Success.paint(format!("✓ {}", result.stage)),
                Style::Muted.paint(format!("({} warning(s))", warnings))
            );
        }
    }

    if !result.output.is_empty() {
        println!("{}", "─".repeat(50));
        print!("{}", result.output);
        if !result.output.ends_with('\n') {
            println!();
        }
    }

    if !result.rendered_diagnostics.is_empty() {
        println!("{}", "─".repeat(50));
        let style = if errors > 0 { Style::Error } else { Style::Warning };
        print!("{}", style.paint(&result.rendered_diagnostics));
    }

    for range in &result.breakpoint_ranges {
        println!(
            "{} {} - {}",
            Style::Label.paint("breakpoint:"),
            range.start,
            range.end
        );
    }
    print_heap("heap before", &result.heap_before);
    print_heap("heap after", &result.heap_after);
    colors::flush_stdout();
}

fn print_heap(title: &str, snapshot: &str) {
    if snapshot.is_empty() {
        return;
    }
    println!("{}", Style::Heading.paint(format!("{}:", title)));
    for line in snapshot.lines() {
        println!("  {}", line);
    }
}
