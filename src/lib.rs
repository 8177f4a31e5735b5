//! # YASDL compiler
//!
//! Compiler for YASDL, a declarative schema language that describes
//! relational database structures with object-oriented reuse: multiple
//! inheritance, polymorphic implementation trees, stubs, and parametric
//! final-implementation references.
//!
//! The compiler ingests one or more top-level schema documents, follows
//! their cross-schema dependencies, runs eight ordered phases of semantic
//! analysis, and produces an annotated intermediate representation that
//! DDL generators consume.
//!
//! ## Architecture
//!
//! ```text
//! lexer      - logos tokenizer (case-insensitive names)
//! parser     - hand-written recursive descent, produces arena nodes
//! loader     - phase 0: imports, fetching, canonical identities
//! resolve    - phases 1-8: local checks, implementation trees,
//!              inheritance + members, name binding, realization,
//!              requirements, global checks, driver checks
//! compile    - high-level API and the compilation result
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use yasdl::{compile, CompileOptions};
//!
//! let options = CompileOptions::from_env();
//! match compile(&["myapp/main.yasdl".to_string()], &options) {
//!     Ok(compilation) => {
//!         for &fieldset in &compilation.toplevel_fieldsets {
//!             println!("table {}", compilation.arena.path(fieldset));
//!         }
//!     }
//!     Err(failure) => {
//!         eprintln!("{}", failure.render());
//!         std::process::exit(failure.status.code());
//!     }
//! }
//! ```

pub mod ast;
pub mod compile;
pub mod error;
pub mod foundation;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod resolve;

pub use compile::{
    compile, compile_with, exit_status, Compilation, CompileOptions, ConstraintInfo, ExitStatus,
    Failure, FieldInfo, IndexInfo,
};
pub use error::{Code, DiagKind, Diagnostic, DiagnosticFormatter, Diagnostics, Severity};
pub use loader::{Fetcher, FsFetcher, MemoryFetcher};
pub use resolve::drivers::{StandardTypes, TypeInfo, TypeRegistry};

/// Compiler version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
