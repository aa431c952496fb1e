//! Watch command: recompile a program on every change.

use std::path::Path;

use rill_engine::PipelineStage;
use rill_playground::{Cursor, EditorSnapshot, PipelineController, PlaygroundConfig};

use crate::colors::{self, Style};
use crate::output::print_result;
use crate::watcher::{FileEvent, FileWatcher};

/// Execute the watch command.
pub async fn execute(
    file: &str,
    stage: PipelineStage,
    cursor: Cursor,
    clear_screen: bool,
) -> anyhow::Result<()> {
    let path = Path::new(file);
    if !path.exists() {
        anyhow::bail!("File not found: {}", file);
    }
    let abs_path = path.canonicalize()?;

    println!(
        "\n{} - {}",
        Style::Heading.paint("Rill Watch"),
        Style::Label.paint(abs_path.display())
    );
    println!(
        "{}",
        Style::Muted.paint("Watching for changes... (Ctrl+C to stop)")
    );

    let mut controller = PipelineController::new(&PlaygroundConfig::default());
    let mut results = controller.subscribe();

    // Print every published result as it arrives.
    let printer = tokio::spawn(async move {
        while results.changed().await.is_ok() {
            let result = results.borrow_and_update().clone();
            if clear_screen {
                clear_terminal();
            }
            println!();
            print_result(&result);
        }
    });

    let submit = |controller: &mut PipelineController, source: String| {
        controller.update(EditorSnapshot {
            source,
            cursor,
            stage,
        })
    };

    submit(&mut controller, std::fs::read_to_string(&abs_path)?);

    let mut watcher = FileWatcher::new(&abs_path)?;
    loop {
        tokio::select! {
            event = watcher.recv() => match event {
                Some(FileEvent::Modified(_)) => match std::fs::read_to_string(&abs_path) {
                    Ok(source) => {
                        if submit(&mut controller, source).is_none() {
                            tracing::debug!("File touched without changes");
                        }
                    }
                    Err(e) => eprintln!("{} {}", Style::Error.paint("Error:"), e),
                },
                Some(FileEvent::Removed(path)) => {
                    eprintln!(
                        "\n{} File removed: {}",
                        Style::Warning.paint("Warning:"),
                        path.display()
                    );
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.wait_idle().await;
    printer.abort();
    Ok(())
}

/// Clear the terminal screen.
fn clear_terminal() {
    print!("\x1B[2J\x1B[1;1H");
    colors::flush_stdout();
}
