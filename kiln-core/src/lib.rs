//! Middle tier of the kiln compiler.
//!
//! This crate carries a parsed compilation unit from its raw syntax tree
//! to a form ready for native code emission, and provides the builtin
//! buffer/view namespace that user code reaches as `kiln.*`:
//!
//!   parse tree
//!     -> pipeline   (ordered, mode-dependent stages)
//!     -> builtins   (resolution of `kiln.X`, lazy utility templates)
//!     -> codegen    (collaborator; receives deduplicated templates)
//!
//! The parser, type inference, optimizations and the native back end are
//! collaborators behind the traits in [`parser`], [`pipeline::transforms`]
//! and [`codegen`].

// ---------------------------------------------------------------------
// Error handling, diagnostics and configuration
// ---------------------------------------------------------------------

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod span;

// ---------------------------------------------------------------------
// Tree and collaborator seams
// ---------------------------------------------------------------------

pub mod ast;
pub mod codegen;
pub mod parser;

// ---------------------------------------------------------------------
// Builtin namespace: types, scopes, templates, buffers
// ---------------------------------------------------------------------

pub mod buffer;
pub mod builtins;
pub mod scope;
pub mod types;
pub mod utility;

// ---------------------------------------------------------------------
// Pipeline orchestration
// ---------------------------------------------------------------------

pub mod context;
pub mod declarations;
pub mod pipeline;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use config::CompileOptions;
pub use context::Context;
pub use diagnostic::Diagnostics;
pub use error::{BufferError, CompileError, CoreError, InternalError, StageError};
pub use pipeline::{Pipeline, PipelineMode, PipelineOutcome, run_pipeline};
