//! Run command: compile a program once.

use std::path::Path;

use rill_engine::PipelineStage;
use rill_playground::{Cursor, EditorSnapshot, PipelineController, PlaygroundConfig};

use crate::output::print_result;

/// Compile `file` through `stage` and print the result.
///
/// Fails when the result carries error diagnostics or the engine failed.
pub async fn execute(file: &str, stage: PipelineStage, cursor: Cursor, json: bool) -> anyhow::Result<()> {
    let path = Path::new(file);
    if !path.exists() {
        anyhow::bail!("File not found: {}", file);
    }
    let source = std::fs::read_to_string(path)?;

    let mut controller = PipelineController::new(&PlaygroundConfig::default());
    controller.update(EditorSnapshot {
        source,
        cursor,
        stage,
    });
    controller.wait_idle().await;
    let result = controller.latest();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if result.has_errors() {
        anyhow::bail!("{} failed for {}", stage, file);
    }
    Ok(())
}
