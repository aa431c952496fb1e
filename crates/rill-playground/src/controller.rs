//! Pipeline controller: turns editor state changes into queued compiles.
//!
//! Each change of the (source, cursor, stage) tuple becomes one work unit on
//! the [`SerialTaskQueue`]. Units run in order against the shared
//! [`CompilerSession`] and publish their result on a watch channel, so the
//! visible result always ends at the latest submitted tuple.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};

use rill_engine::{CompilerHandle, Diagnostic, EngineHandle, PipelineStage, SourceRange};

use crate::config::PlaygroundConfig;
use crate::error::PlaygroundError;
use crate::queue::{QueueConfig, SerialTaskQueue, SubmitOutcome, WorkUnit};
use crate::render::render_diagnostics;
use crate::session::CompilerSession;

/// Editor cursor in 1-based rows and columns, the way editors show them.
///
/// A zero in either coordinate means "no breakpoint"; the default cursor is
/// the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub row: u32,
    pub column: u32,
}

impl Cursor {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// Everything a work unit needs, captured at submission time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub source: String,
    pub cursor: Cursor,
    pub stage: PipelineStage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CompileStatus {
    /// Nothing has finished yet.
    #[default]
    Pending,
    Succeeded,
    /// The engine failed; output and diagnostics are from the last success.
    Failed { message: String },
}

/// The visible result of the latest finished work unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedResult {
    /// Generation of the unit that published this result.
    pub generation: u64,
    pub stage: PipelineStage,
    pub status: CompileStatus,
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics rendered with source context.
    pub rendered_diagnostics: String,
    pub breakpoint_ranges: Vec<SourceRange>,
    pub heap_before: String,
    pub heap_after: String,
}

impl PublishedResult {
    pub fn has_errors(&self) -> bool {
        matches!(self.status, CompileStatus::Failed { .. })
            || self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Skip units that a later submission has superseded. Off by default:
    /// every unit runs and publishes, in order.
    pub skip_superseded: bool,

    /// Longest a single compile may run before it is published as failed.
    /// `None` waits indefinitely.
    pub compile_timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            skip_superseded: false,
            compile_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Turns editor changes into compiles on a [`SerialTaskQueue`] and
/// publishes what they produce.
pub struct PipelineController<H: CompilerHandle = EngineHandle> {
    session: Arc<Mutex<CompilerSession<H>>>,
    queue: SerialTaskQueue,
    config: ControllerConfig,
    snapshot: EditorSnapshot,
    submitted: Option<EditorSnapshot>,
    generation: Arc<AtomicU64>,
    results: Arc<watch::Sender<PublishedResult>>,
}

impl PipelineController<EngineHandle> {
    /// A controller over a fresh engine configured by `config`.
    pub fn new(config: &PlaygroundConfig) -> Self {
        Self::with_session(
            CompilerSession::new(config.engine.clone()),
            config.queue.clone(),
            config.controller.clone(),
        )
    }
}

impl<H: CompilerHandle> PipelineController<H> {
    /// A controller driving an existing session.
    pub fn with_session(
        session: CompilerSession<H>,
        queue: QueueConfig,
        config: ControllerConfig,
    ) -> Self {
        let (results, _) = watch::channel(PublishedResult::default());
        Self {
            session: Arc::new(Mutex::new(session)),
            queue: SerialTaskQueue::new(queue),
            config,
            snapshot: EditorSnapshot::default(),
            submitted: None,
            generation: Arc::new(AtomicU64::new(0)),
            results: Arc::new(results),
        }
    }

    /// Editor state as last set, submitted or not.
    pub fn snapshot(&self) -> &EditorSnapshot {
        &self.snapshot
    }

    /// Replace the source text and queue a compile if anything changed.
    pub fn set_source_text(&mut self, source: impl Into<String>) -> Option<u64> {
        let snapshot = EditorSnapshot {
            source: source.into(),
            ..self.snapshot.clone()
        };
        self.update(snapshot)
    }

    /// Move the cursor, and with it the breakpoint.
    pub fn set_cursor(&mut self, cursor: Cursor) -> Option<u64> {
        let snapshot = EditorSnapshot {
            cursor,
            ..self.snapshot.clone()
        };
        self.update(snapshot)
    }

    /// Pick the stage compiles run through.
    pub fn select_stage(&mut self, stage: PipelineStage) -> Option<u64> {
        let snapshot = EditorSnapshot {
            stage,
            ..self.snapshot.clone()
        };
        self.update(snapshot)
    }

    /// Submit a compile for `snapshot` unless it equals the last submitted
    /// one. Returns the generation of the queued unit.
    pub fn update(&mut self, snapshot: EditorSnapshot) -> Option<u64> {
        self.snapshot = snapshot;
        if self.submitted.as_ref() == Some(&self.snapshot) {
            return None;
        }
        self.submitted = Some(self.snapshot.clone());
        Some(self.submit(self.snapshot.clone()))
    }

    /// Queue a compile for the current snapshot even if it did not change.
    pub fn refresh(&mut self) -> u64 {
        self.submitted = Some(self.snapshot.clone());
        self.submit(self.snapshot.clone())
    }

    fn submit(&self, snapshot: EditorSnapshot) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let label = format!("compile #{} ({})", generation, snapshot.stage);
        let session = self.session.clone();
        let results = self.results.clone();
        let latest = self.generation.clone();
        let skip_superseded = self.config.skip_superseded;
        let compile_timeout = self.config.compile_timeout;

        let unit = WorkUnit::new(label, move || async move {
            if skip_superseded && latest.load(Ordering::SeqCst) != generation {
                tracing::debug!(generation, "skipping superseded compile");
                return Ok(());
            }

            let mut session = session.lock().await;
            let apply = session.apply(
                &snapshot.source,
                snapshot.cursor.row,
                snapshot.cursor.column,
                snapshot.stage,
            );
            // A timed-out unit still publishes; the session keeps its last
            // good state because the apply future is dropped before adopting.
            let outcome = match compile_timeout {
                Some(limit) => match tokio::time::timeout(limit, apply).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(generation, ?limit, "compile timed out");
                        Err(PlaygroundError::TimedOut(limit))
                    }
                },
                None => apply.await,
            };

            let result = match &outcome {
                Ok(()) => collect(&session, generation, snapshot.stage),
                Err(e) => {
                    let previous = results.borrow().clone();
                    PublishedResult {
                        generation,
                        stage: snapshot.stage,
                        status: CompileStatus::Failed {
                            message: e.to_string(),
                        },
                        ..previous
                    }
                }
            };
            results.send_replace(result);
            outcome.map_err(anyhow::Error::from)
        });

        if self.queue.submit(unit) == SubmitOutcome::StartedLoop {
            tracing::trace!(generation, "started compile loop");
        }
        generation
    }

    /// Generation of the most recent submission, 0 before any.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Receiver that sees every published result from now on.
    pub fn subscribe(&self) -> watch::Receiver<PublishedResult> {
        self.results.subscribe()
    }

    /// The most recently published result.
    pub fn latest(&self) -> PublishedResult {
        self.results.borrow().clone()
    }

    /// Queue the compiles run on, for its stats.
    pub fn queue(&self) -> &SerialTaskQueue {
        &self.queue
    }

    /// Wait until every submitted compile has run.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    /// Shared session; locking it waits for the running compile.
    pub fn session(&self) -> Arc<Mutex<CompilerSession<H>>> {
        self.session.clone()
    }
}

fn collect<H: CompilerHandle>(
    session: &CompilerSession<H>,
    generation: u64,
    stage: PipelineStage,
) -> PublishedResult {
    let diagnostics = session.diagnostics();
    PublishedResult {
        generation,
        stage,
        status: CompileStatus::Succeeded,
        output: session.output().to_string(),
        rendered_diagnostics: render_diagnostics(session.source_text(), &diagnostics),
        diagnostics,
        breakpoint_ranges: session.breakpoint_ranges(),
        heap_before: session.heap_before().to_string(),
        heap_after: session.heap_after().to_string(),
    }
}
