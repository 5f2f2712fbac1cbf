//! Core of the blockwire visual programming language.
//!
//! A program is a graph of blocks joined by wires between terminals. The
//! pipeline is roughly:
//!
//!   graph document (.json) + custom-block library
//!     -> parser / library   (ProgramDocument, catalog registration)
//!     -> analysis           (inlined Program: entry points, memo points, slots)
//!     -> backend            (tree-walking interpreter, or wasm via wasmi)
//!
//! Both backends drive a host-supplied [`RuntimeContext`] and must be
//! observationally equivalent. Higher-level tools (the CLI, game hosts)
//! should depend on this crate rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and configuration
// ---------------------------------------------------------------------

pub mod error;
pub mod config;

// ---------------------------------------------------------------------
// Front-end: signal types, terminal layout, catalog, documents
// ---------------------------------------------------------------------

pub mod types;
pub mod layout;
pub mod catalog;
pub mod ast;
pub mod parser;
pub mod library;

// ---------------------------------------------------------------------
// Semantic layer: analysed program
// ---------------------------------------------------------------------

pub mod hir;
pub mod analysis;

// ---------------------------------------------------------------------
// Runtime: context contract, storage and shared math
// ---------------------------------------------------------------------

pub mod context;
pub mod storage;
pub mod math;

// ---------------------------------------------------------------------
// Back-ends
// ---------------------------------------------------------------------

pub mod backend;
pub mod interpreter;
pub mod builtins;
pub mod codegen_wasm;
pub mod compiler;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod scenarios;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use analysis::build_program;
pub use backend::{Backend, BackendKind, LateUpdate, load_backend};
pub use catalog::BlockCatalog;
pub use compiler::{CompilationArtifact, CompiledProgram, compile_wasm};
pub use config::RunConfig;
pub use context::{EffectLog, HeadlessContext, RuntimeContext};
pub use error::CoreError;
pub use hir::Program;
pub use interpreter::Interpreter;
pub use library::{load_library, load_program};
pub use parser::{parse_document, read_document};
