//! Compiler session: a stable facade over the handle-replacing engine API.
//!
//! The session owns exactly one engine handle. Every operation derives a
//! successor from it and adopts the successor as a whole; callers never see
//! a half-updated handle. A staged operation that fails leaves the last
//! successfully computed handle in place.
//!
//! Breakpoints are given in editor coordinates: rows and columns start at 1,
//! and a zero in either coordinate means "no breakpoint". The engine itself
//! works with 0-based [`Position`]s.

use rill_engine::{
    CompilerHandle, Diagnostic, EngineHandle, EngineSettings, PipelineStage, Position, SourceRange,
};

use crate::error::PlaygroundResult;

/// Mutation-style access to one engine handle.
///
/// Used from a single work unit at a time; the queue in front of it is what
/// keeps engine calls from overlapping.
pub struct CompilerSession<H: CompilerHandle = EngineHandle> {
    handle: H,
    version: u64,
}

impl CompilerSession<EngineHandle> {
    /// A session over a fresh engine.
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_handle(EngineHandle::new(settings))
    }
}

impl Default for CompilerSession<EngineHandle> {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl<H: CompilerHandle> CompilerSession<H> {
    /// A session starting from an existing handle, at version 0.
    pub fn with_handle(handle: H) -> Self {
        Self { handle, version: 0 }
    }

    fn adopt(&mut self, handle: H) {
        self.handle = handle;
        self.version += 1;
    }

    /// Replace the source text. Nothing is checked until a stage runs.
    ///
    /// Results of the previous run are dropped with the old handle.
    pub fn set_source_text(&mut self, text: &str) {
        let next = self.handle.clone().with_source_text(text);
        self.adopt(next);
    }

    /// Set the breakpoint at a 1-based editor position, or clear it when
    /// either coordinate is zero.
    ///
    /// The origin doubles as "no breakpoint". Since editor coordinates start
    /// at 1, `(0, 0)` never names a real character.
    pub fn set_breakpoint(&mut self, row: u32, column: u32) {
        let next = breakpoint_at(self.handle.clone(), row, column);
        self.adopt(next);
    }

    /// Run through [`PipelineStage::Syntax`].
    pub async fn syntax(&mut self) -> PlaygroundResult<()> {
        self.run(PipelineStage::Syntax).await
    }

    /// Run through [`PipelineStage::Validated`].
    pub async fn validated(&mut self) -> PlaygroundResult<()> {
        self.run(PipelineStage::Validated).await
    }

    /// Run through [`PipelineStage::Bir`].
    pub async fn bir(&mut self) -> PlaygroundResult<()> {
        self.run(PipelineStage::Bir).await
    }

    /// Run through [`PipelineStage::Execute`].
    pub async fn execute(&mut self) -> PlaygroundResult<()> {
        self.run(PipelineStage::Execute).await
    }

    /// Run the engine through `stage` and adopt the resulting handle.
    ///
    /// On failure the current handle stays, and so does the version.
    pub async fn run(&mut self, stage: PipelineStage) -> PlaygroundResult<()> {
        let next = self.handle.clone().run(stage).await?;
        self.adopt(next);
        Ok(())
    }

    /// Apply one editor state and run it through `stage` in a single step.
    ///
    /// The source text, breakpoint and stage results are all derived from a
    /// copy of the current handle, and the copy is adopted only once the run
    /// succeeds. A failed run, or a dropped future, leaves the session on
    /// its last good state: previous source, breakpoint and results.
    pub async fn apply(
        &mut self,
        text: &str,
        row: u32,
        column: u32,
        stage: PipelineStage,
    ) -> PlaygroundResult<()> {
        let candidate = breakpoint_at(self.handle.clone().with_source_text(text), row, column);
        let next = candidate.run(stage).await?;
        self.adopt(next);
        Ok(())
    }

    /// Incremented every time a new handle is adopted.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The handle currently held.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Source text of the current handle.
    pub fn source_text(&self) -> &str {
        self.handle.source_text()
    }

    /// Breakpoint of the current handle, as a 0-based engine position.
    pub fn breakpoint(&self) -> Option<Position> {
        self.handle.breakpoint()
    }

    /// Stage the current results come from, `None` before the first run
    /// after an input change.
    pub fn stage(&self) -> Option<PipelineStage> {
        self.handle.stage()
    }

    /// Output text of the last run: a tree dump, a BIR listing or the
    /// program's printed output, depending on the stage.
    pub fn output(&self) -> &str {
        self.handle.output()
    }

    pub fn num_diagnostics(&self) -> usize {
        self.handle.num_diagnostics()
    }

    /// Diagnostic at `index`, in the order the stages reported them.
    pub fn diagnostic(&self, index: usize) -> Option<&Diagnostic> {
        self.handle.diagnostic(index)
    }

    /// All diagnostics of the last run.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        (0..self.num_diagnostics())
            .filter_map(|i| self.diagnostic(i).cloned())
            .collect()
    }

    pub fn num_breakpoint_ranges(&self) -> usize {
        self.handle.num_breakpoint_ranges()
    }

    /// Source range of the expression the breakpoint selected.
    pub fn breakpoint_range(&self, index: usize) -> Option<SourceRange> {
        self.handle.breakpoint_range(index)
    }

    /// All breakpoint ranges of the last run.
    pub fn breakpoint_ranges(&self) -> Vec<SourceRange> {
        (0..self.num_breakpoint_ranges())
            .filter_map(|i| self.breakpoint_range(i))
            .collect()
    }

    /// Heap just before the breakpoint expression first ran. Empty unless
    /// the last run executed the program and reached the breakpoint.
    pub fn heap_before(&self) -> &str {
        self.handle.heap_before()
    }

    /// Heap just after the breakpoint expression first ran.
    pub fn heap_after(&self) -> &str {
        self.handle.heap_after()
    }
}

/// Derive the breakpoint for a 1-based editor position.
fn breakpoint_at<H: CompilerHandle>(handle: H, row: u32, column: u32) -> H {
    if row != 0 && column != 0 {
        handle.with_breakpoint(Position::new(row - 1, column - 1))
    } else {
        handle.without_breakpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaygroundError;

    #[tokio::test]
    async fn test_origin_clears_breakpoint() {
        let mut session = CompilerSession::default();
        session.set_source_text("let x = 1\nlet y = x");

        session.set_breakpoint(2, 9);
        assert_eq!(session.breakpoint(), Some(Position::new(1, 8)));
        session.set_breakpoint(0, 0);
        assert_eq!(session.breakpoint(), None);

        // Either coordinate at zero counts as unset.
        session.set_breakpoint(2, 9);
        session.set_breakpoint(0, 4);
        assert_eq!(session.breakpoint(), None);
        session.set_breakpoint(2, 9);
        session.set_breakpoint(1, 0);
        assert_eq!(session.breakpoint(), None);
    }

    #[tokio::test]
    async fn test_first_character_can_be_selected() {
        let mut session = CompilerSession::default();
        session.set_source_text("let x = 1");
        session.set_breakpoint(1, 1);
        assert_eq!(session.breakpoint(), Some(Position::new(0, 0)));

        session.execute().await.unwrap();
        assert_eq!(session.num_breakpoint_ranges(), 1);
        assert_eq!(session.breakpoint_range(0).unwrap().start, Position::new(0, 0));
    }

    #[tokio::test]
    async fn test_breakpoint_range_after_run() {
        let mut session = CompilerSession::default();
        session.set_source_text("let x = 1\nlet y = x");
        session.set_breakpoint(2, 9);
        session.execute().await.unwrap();

        assert_eq!(
            session.breakpoint_ranges(),
            vec![SourceRange {
                start: Position::new(1, 8),
                end: Position::new(1, 9),
            }]
        );
        assert_eq!(session.heap_before(), "stack:\n  x = 1\nheap:\n  (empty)\n");
        assert_eq!(session.heap_after(), "stack:\n  x = 1\nheap:\n  (empty)\n");

        session.set_breakpoint(0, 0);
        session.execute().await.unwrap();
        assert_eq!(session.num_breakpoint_ranges(), 0);
    }

    #[tokio::test]
    async fn test_stages_are_idempotent() {
        let mut session = CompilerSession::default();
        session.set_source_text("let xs = [1, 2]\nprint(len(xs))");
        session.set_breakpoint(2, 7);
        for stage in PipelineStage::ALL {
            session.run(stage).await.unwrap();
            let first = (session.output().to_string(), session.diagnostics());
            session.run(stage).await.unwrap();
            let second = (session.output().to_string(), session.diagnostics());
            assert_eq!(first, second, "{}", stage);
            assert_eq!(session.stage(), Some(stage));
        }
    }

    #[tokio::test]
    async fn test_version_counts_adopted_handles() {
        let mut session = CompilerSession::default();
        assert_eq!(session.version(), 0);
        session.set_source_text("1");
        session.set_breakpoint(0, 0);
        session.syntax().await.unwrap();
        assert_eq!(session.version(), 3);

        session.apply("2", 1, 1, PipelineStage::Execute).await.unwrap();
        assert_eq!(session.version(), 4);
        assert_eq!(session.output(), "=> 2\n");
    }

    /// Engine wrapper whose staged runs fail while the source says "boom".
    #[derive(Clone)]
    struct Flaky {
        inner: EngineHandle,
    }

    impl Flaky {
        async fn staged(self, stage: PipelineStage) -> rill_engine::EngineResult<Self> {
            if self.inner.source_text().contains("boom") {
                return Err(rill_engine::EngineError::Failed("injected".to_string()));
            }
            Ok(Self {
                inner: self.inner.run(stage).await?,
            })
        }
    }

    impl CompilerHandle for Flaky {
        fn with_source_text(self, text: &str) -> Self {
            Self {
                inner: self.inner.with_source_text(text),
            }
        }
        fn with_breakpoint(self, position: Position) -> Self {
            Self {
                inner: self.inner.with_breakpoint(position),
            }
        }
        fn without_breakpoint(self) -> Self {
            Self {
                inner: self.inner.without_breakpoint(),
            }
        }
        async fn syntax(self) -> rill_engine::EngineResult<Self> {
            self.staged(PipelineStage::Syntax).await
        }
        async fn validated(self) -> rill_engine::EngineResult<Self> {
            self.staged(PipelineStage::Validated).await
        }
        async fn bir(self) -> rill_engine::EngineResult<Self> {
            self.staged(PipelineStage::Bir).await
        }
        async fn execute(self) -> rill_engine::EngineResult<Self> {
            self.staged(PipelineStage::Execute).await
        }
        fn output(&self) -> &str {
            self.inner.output()
        }
        fn num_diagnostics(&self) -> usize {
            self.inner.num_diagnostics()
        }
        fn diagnostic(&self, index: usize) -> Option<&Diagnostic> {
            self.inner.diagnostic(index)
        }
        fn num_breakpoint_ranges(&self) -> usize {
            self.inner.num_breakpoint_ranges()
        }
        fn breakpoint_range(&self, index: usize) -> Option<SourceRange> {
            self.inner.breakpoint_range(index)
        }
        fn heap_before(&self) -> &str {
            self.inner.heap_before()
        }
        fn heap_after(&self) -> &str {
            self.inner.heap_after()
        }
        fn source_text(&self) -> &str {
            self.inner.source_text()
        }
        fn breakpoint(&self) -> Option<Position> {
            self.inner.breakpoint()
        }
        fn stage(&self) -> Option<PipelineStage> {
            self.inner.stage()
        }
    }

    fn flaky_session() -> CompilerSession<Flaky> {
        CompilerSession::with_handle(Flaky {
            inner: EngineHandle::default(),
        })
    }

    #[tokio::test]
    async fn test_failed_apply_keeps_last_good_state() {
        let mut session = flaky_session();
        session
            .apply("let xs = [7]\nprint(xs)", 2, 1, PipelineStage::Execute)
            .await
            .unwrap();
        let version = session.version();
        let heap_before = session.heap_before().to_string();
        assert!(!heap_before.is_empty());

        let err = session
            .apply("boom", 0, 0, PipelineStage::Execute)
            .await
            .unwrap_err();
        assert!(matches!(err, PlaygroundError::Engine(_)));
        assert_eq!(session.version(), version);
        assert_eq!(session.source_text(), "let xs = [7]\nprint(xs)");
        assert_eq!(session.breakpoint(), Some(Position::new(1, 0)));
        assert_eq!(session.output(), "[7]\n=> ()\n");
        assert_eq!(session.heap_before(), heap_before);
        assert_eq!(session.stage(), Some(PipelineStage::Execute));
    }

    #[tokio::test]
    async fn test_failed_stage_keeps_current_handle() {
        let mut session = flaky_session();
        session.set_source_text("print(7)");
        session.execute().await.unwrap();
        assert_eq!(session.output(), "7\n=> ()\n");

        session.set_source_text("boom");
        let version = session.version();
        let err = session.execute().await.unwrap_err();
        assert!(matches!(err, PlaygroundError::Engine(_)));
        assert_eq!(session.version(), version);
        assert_eq!(session.source_text(), "boom");
        assert_eq!(session.stage(), None);
    }
}
