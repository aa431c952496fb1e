//! File watcher for detecting program changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use tokio::sync::mpsc;

/// File change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File was written (or recreated).
    Modified(PathBuf),
    /// File was removed.
    Removed(PathBuf),
}

/// Watches a single file through its parent directory.
pub struct FileWatcher {
    /// Debouncer handle (kept alive to maintain watcher).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    rx: mpsc::UnboundedReceiver<FileEvent>,
}

impl FileWatcher {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let target = path.as_ref().to_path_buf();
        let watch_path = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(
            Duration::from_millis(200),
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        if event.path != target {
                            continue;
                        }
                        let file_event = if event.path.exists() {
                            FileEvent::Modified(event.path.clone())
                        } else {
                            FileEvent::Removed(event.path.clone())
                        };
                        let _ = tx.send(file_event);
                    }
                }
                Err(e) => tracing::warn!("File watch error: {}", e),
            },
        )?;

        debouncer
            .watcher()
            .watch(&watch_path, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _debouncer: debouncer,
            rx,
        })
    }

    /// Receive the next file event.
    pub async fn recv(&mut self) -> Option<FileEvent> {
        self.rx.recv().await
    }
}
