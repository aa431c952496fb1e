//! Compiler engine for the Rill playground language.
//!
//! This crate provides:
//! - Lexer and parser producing a syntax tree with spans
//! - Name validation (variables resolved to slots)
//! - Lowering to BIR, a basic-block intermediate representation
//! - A step-bounded interpreter with breakpoint heap snapshots
//! - Salsa-based incremental computation over all of the above
//! - [`EngineHandle`], an immutable handle whose operations each produce a new handle
//!
//! # Example
//!
//! ```ignore
//! let handle = EngineHandle::new(EngineSettings::default())
//!     .with_source_text("let x = 1 print(x)")
//!     .execute()
//!     .await?;
//! assert_eq!(handle.output(), "1\n=> ()\n");
//! ```

pub mod bir;
pub mod db;
pub mod diagnostic;
pub mod error;
pub mod handle;
pub mod interp;
pub mod span;
pub mod stage;
pub mod syntax;
pub mod validate;

pub use db::{EngineDatabase, EngineSettings};
pub use diagnostic::{Diagnostic, Phase, Severity};
pub use error::{EngineError, EngineResult};
pub use handle::{CompilerHandle, EngineHandle, StageReport};
pub use span::{LineIndex, Position, SourceRange, Span};
pub use stage::PipelineStage;
