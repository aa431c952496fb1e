//! Immutable engine handles.
//!
//! An [`EngineHandle`] is a snapshot of the engine's state: source text,
//! breakpoint, and the report of the last pipeline stage that ran. Every
//! operation consumes the handle and returns a new one; nothing is ever
//! changed in place.
//!
//! Handles derived from one another share a single salsa database, which
//! only serves as a cache: a staged run first brings the database inputs in
//! line with the handle's own source and breakpoint.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::db::{
    BreakpointInput, EngineDatabase, EngineSettings, EngineSettingsInput, SourceProgram,
    execute_program, locate_breakpoint, lower_program, parse_program, validate_program,
};
use crate::diagnostic::Diagnostic;
use crate::error::{EngineError, EngineResult};
use crate::span::{Position, SourceRange};
use crate::stage::PipelineStage;

/// The request/response contract of a versioned, non-reentrant compiler.
///
/// Derivations consume `self` and produce the successor handle. Staged
/// derivations are asynchronous and may fail with an [`EngineError`]; such a
/// failure is distinct from diagnostics, which are ordinary result data.
pub trait CompilerHandle: Clone + Send + 'static {
    fn with_source_text(self, text: &str) -> Self;
    fn with_breakpoint(self, position: Position) -> Self;
    fn without_breakpoint(self) -> Self;

    fn syntax(self) -> impl Future<Output = EngineResult<Self>> + Send;
    fn validated(self) -> impl Future<Output = EngineResult<Self>> + Send;
    fn bir(self) -> impl Future<Output = EngineResult<Self>> + Send;
    fn execute(self) -> impl Future<Output = EngineResult<Self>> + Send;

    fn output(&self) -> &str;
    fn num_diagnostics(&self) -> usize;
    fn diagnostic(&self, index: usize) -> Option<&Diagnostic>;
    fn num_breakpoint_ranges(&self) -> usize;
    fn breakpoint_range(&self, index: usize) -> Option<SourceRange>;
    fn heap_before(&self) -> &str;
    fn heap_after(&self) -> &str;

    fn source_text(&self) -> &str;
    fn breakpoint(&self) -> Option<Position>;
    /// Stage whose results the handle carries, `None` if nothing ran since
    /// the last input change.
    fn stage(&self) -> Option<PipelineStage>;

    /// Run through `stage`.
    fn run(self, stage: PipelineStage) -> impl Future<Output = EngineResult<Self>> + Send {
        async move {
            match stage {
                PipelineStage::Syntax => self.syntax().await,
                PipelineStage::Validated => self.validated().await,
                PipelineStage::Bir => self.bir().await,
                PipelineStage::Execute => self.execute().await,
            }
        }
    }
}

/// Results of the last staged run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Option<PipelineStage>,
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
    pub breakpoint_ranges: Vec<SourceRange>,
    pub heap_before: String,
    pub heap_after: String,
}

/// Database plus the one input of each kind it is driven through.
///
/// Inputs are updated with setters, so the database holds memoized results
/// for the latest source only. The surrounding mutex makes engine work
/// single-flight: a run whose caller gave up still finishes before the
/// next run starts.
struct Engine {
    db: EngineDatabase,
    source: SourceProgram,
    breakpoint: BreakpointInput,
    settings: EngineSettingsInput,
}

impl Engine {
    fn new(settings: &EngineSettings) -> Self {
        let db = EngineDatabase::new();
        Self {
            source: db.source(""),
            breakpoint: db.breakpoint(None),
            settings: db.settings(settings),
            db,
        }
    }

    fn compute(
        &mut self,
        text: &str,
        position: Option<Position>,
        stage: PipelineStage,
    ) -> StageReport {
        self.db.update_source(self.source, text);
        self.db.update_breakpoint(self.breakpoint, position);
        compute_report(&self.db, self.source, self.breakpoint, self.settings, stage)
    }
}

/// Handle onto the salsa-backed engine.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<Mutex<Engine>>,
    text: Arc<str>,
    position: Option<Position>,
    report: Arc<StageReport>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("text", &self.text)
            .field("position", &self.position)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl EngineHandle {
    /// A handle with empty source, no breakpoint and no results.
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            engine: Arc::new(Mutex::new(Engine::new(&settings))),
            text: Arc::from(""),
            position: None,
            report: Arc::default(),
        }
    }

    /// The full report of the last staged run.
    pub fn report(&self) -> &StageReport {
        &self.report
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.report.diagnostics
    }

    /// Input changed: results of earlier runs no longer apply.
    fn reset_report(mut self) -> Self {
        self.report = Arc::default();
        self
    }

    async fn derive_through(self, stage: PipelineStage) -> EngineResult<Self> {
        let engine = self.engine.clone();
        let text = self.text.clone();
        let position = self.position;
        let task = tokio::task::spawn_blocking(move || {
            // A panic mid-query leaves the inputs intact; the next run resets them.
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            engine.compute(&text, position, stage)
        });

        match task.await {
            Ok(report) => {
                tracing::debug!(
                    %stage,
                    diagnostics = report.diagnostics.len(),
                    "engine stage finished"
                );
                Ok(Self {
                    report: Arc::new(report),
                    ..self
                })
            }
            Err(err) if err.is_panic() => {
                let payload = err.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(%stage, %message, "engine panicked");
                Err(EngineError::Internal { stage, message })
            }
            Err(_) => Err(EngineError::Cancelled { stage }),
        }
    }
}

fn compute_report(
    db: &EngineDatabase,
    source: SourceProgram,
    breakpoint: BreakpointInput,
    settings: EngineSettingsInput,
    stage: PipelineStage,
) -> StageReport {
    let parsed = parse_program(db, source, settings);
    let breakpoint_ranges = locate_breakpoint(db, source, breakpoint, settings)
        .map(|(_, range)| vec![range])
        .unwrap_or_default();

    let mut report = StageReport {
        stage: Some(stage),
        breakpoint_ranges,
        diagnostics: parsed.diagnostics.clone(),
        ..StageReport::default()
    };

    if stage == PipelineStage::Syntax {
        report.output = parsed.tree.dump();
        return report;
    }

    let validated = validate_program(db, source, settings);
    report.diagnostics.extend(validated.diagnostics.iter().cloned());

    match stage {
        PipelineStage::Validated => report.output = validated.tree.dump(),
        PipelineStage::Bir => report.output = lower_program(db, source, breakpoint, settings).dump(),
        _ => {
            // Static errors mean there is nothing meaningful to run.
            if report.diagnostics.iter().any(Diagnostic::is_error) {
                return report;
            }
            let execution = execute_program(db, source, breakpoint, settings);
            report.output = execution.output.clone();
            report.diagnostics.extend(execution.diagnostics.iter().cloned());
            report.heap_before = execution.heap_before.clone();
            report.heap_after = execution.heap_after.clone();
        }
    }
    report
}

impl CompilerHandle for EngineHandle {
    fn with_source_text(self, text: &str) -> Self {
        if &*self.text == text {
            return self;
        }
        Self {
            text: Arc::from(text),
            ..self
        }
        .reset_report()
    }

    fn with_breakpoint(self, position: Position) -> Self {
        self.set_position(Some(position))
    }

    fn without_breakpoint(self) -> Self {
        self.set_position(None)
    }

    async fn syntax(self) -> EngineResult<Self> {
        self.derive_through(PipelineStage::Syntax).await
    }

    async fn validated(self) -> EngineResult<Self> {
        self.derive_through(PipelineStage::Validated).await
    }

    async fn bir(self) -> EngineResult<Self> {
        self.derive_through(PipelineStage::Bir).await
    }

    async fn execute(self) -> EngineResult<Self> {
        self.derive_through(PipelineStage::Execute).await
    }

    fn output(&self) -> &str {
        &self.report.output
    }

    fn num_diagnostics(&self) -> usize {
        self.report.diagnostics.len()
    }

    fn diagnostic(&self, index: usize) -> Option<&Diagnostic> {
        self.report.diagnostics.get(index)
    }

    fn num_breakpoint_ranges(&self) -> usize {
        self.report.breakpoint_ranges.len()
    }

    fn breakpoint_range(&self, index: usize) -> Option<SourceRange> {
        self.report.breakpoint_ranges.get(index).copied()
    }

    fn heap_before(&self) -> &str {
        &self.report.heap_before
    }

    fn heap_after(&self) -> &str {
        &self.report.heap_after
    }

    fn source_text(&self) -> &str {
        &self.text
    }

    fn breakpoint(&self) -> Option<Position> {
        self.position
    }

    fn stage(&self) -> Option<PipelineStage> {
        self.report.stage
    }
}

impl EngineHandle {
    fn set_position(self, position: Option<Position>) -> Self {
        if self.position == position {
            return self;
        }
        Self { position, ..self }.reset_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(text: &str) -> EngineHandle {
        EngineHandle::default().with_source_text(text)
    }

    #[tokio::test]
    async fn test_execute_reports_output() {
        let handle = handle("let x = 1 print(x)").execute().await.unwrap();
        assert_eq!(handle.output(), "1\n=> ()\n");
        assert_eq!(handle.num_diagnostics(), 0);
        assert_eq!(handle.stage(), Some(PipelineStage::Execute));
    }

    #[tokio::test]
    async fn test_syntax_stage_dumps_tree() {
        let handle = handle("1 + 2").syntax().await.unwrap();
        assert_eq!(handle.output(), "Binary(+)\n  Integer(1)\n  Integer(2)\n");
    }

    #[tokio::test]
    async fn test_incomplete_source_reports_diagnostic() {
        let handle = handle("let x = ").execute().await.unwrap();
        assert_eq!(handle.num_diagnostics(), 1);
        assert_eq!(
            handle.diagnostic(0).unwrap().message,
            "expected expression, found end of input"
        );
        assert_eq!(handle.output(), "");
        assert!(handle.diagnostic(1).is_none());
    }

    #[tokio::test]
    async fn test_derivations_do_not_touch_old_handle() {
        let old = handle("print(1)").execute().await.unwrap();
        let new = old.clone().with_source_text("print(2)").execute().await.unwrap();
        assert_eq!(old.output(), "1\n=> ()\n");
        assert_eq!(old.source_text(), "print(1)");
        assert_eq!(new.output(), "2\n=> ()\n");
    }

    #[tokio::test]
    async fn test_input_change_clears_results() {
        let ran = handle("print(1)").execute().await.unwrap();
        let edited = ran.clone().with_source_text("print(3)");
        assert_eq!(edited.stage(), None);
        assert_eq!(edited.output(), "");

        // Same text keeps the results.
        let same = ran.with_source_text("print(1)");
        assert_eq!(same.output(), "1\n=> ()\n");
    }

    #[tokio::test]
    async fn test_breakpoint_ranges_and_heap() {
        let handle = handle("let xs = [1]\npush(xs, 2)")
            .with_breakpoint(Position::new(1, 0))
            .execute()
            .await
            .unwrap();
        assert_eq!(handle.num_breakpoint_ranges(), 1);
        let range = handle.breakpoint_range(0).unwrap();
        assert_eq!(range.start, Position::new(1, 0));
        assert_eq!(range.end, Position::new(1, 11));
        assert!(handle.heap_before().contains("list@0 = [1]"));
        assert!(handle.heap_after().contains("list@0 = [1, 2]"));

        let cleared = handle.without_breakpoint().execute().await.unwrap();
        assert_eq!(cleared.num_breakpoint_ranges(), 0);
        assert_eq!(cleared.heap_before(), "");
        assert_eq!(cleared.heap_after(), "");
    }

    #[tokio::test]
    async fn test_breakpoint_range_reported_by_every_stage() {
        for stage in PipelineStage::ALL {
            let handle = handle("let x = 1")
                .with_breakpoint(Position::new(0, 8))
                .run(stage)
                .await
                .unwrap();
            assert_eq!(handle.num_breakpoint_ranges(), 1, "{}", stage);
        }
    }

    #[tokio::test]
    async fn test_edits_reuse_the_same_inputs() {
        let first = handle("print(0)").execute().await.unwrap();
        let source = first.engine.lock().unwrap().source;

        let mut current = first;
        for i in 1..=20 {
            current = current
                .with_source_text(&format!("print({})", i))
                .with_breakpoint(Position::new(0, 6))
                .execute()
                .await
                .unwrap();
        }
        assert_eq!(current.output(), "20\n=> ()\n");
        assert_eq!(current.engine.lock().unwrap().source, source);
    }

    #[tokio::test]
    async fn test_old_handle_reruns_its_own_source() {
        let old = handle("print(1)");
        let new = old.clone().with_source_text("print(2)").execute().await.unwrap();
        assert_eq!(new.output(), "2\n=> ()\n");

        let rerun = old.execute().await.unwrap();
        assert_eq!(rerun.output(), "1\n=> ()\n");
        assert_eq!(rerun.source_text(), "print(1)");
    }

    #[tokio::test]
    async fn test_abandoned_run_does_not_disturb_next_run() {
        let settings = EngineSettings {
            max_steps: 3_000_000,
            ..EngineSettings::default()
        };
        let slow = EngineHandle::new(settings)
            .with_source_text("let i = 0 while true { i := i + 1 }");
        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(1), slow.clone().execute()).await;
        assert!(abandoned.is_err());

        let next = slow.with_source_text("print(5)").execute().await.unwrap();
        assert_eq!(next.output(), "5\n=> ()\n");
        assert_eq!(next.num_diagnostics(), 0);
    }
}
