//! typst-prep - Typst template preprocessor
//!
//! A preprocessing layer in front of the Typst compiler. It takes a Typst
//! template that may carry Tera templating syntax, injects call data as Typst
//! variables, resolves the template's import graph into a scratch directory,
//! runs `typst compile` and hands back the artifact as a path or as bytes.
//!
//! # Architecture Overview
//!
//! One compilation flows through these stages:
//!
//! ```text
//! source ─► gate ─► render ─► inject data ─► resolve imports ─► materialize ─► typst compile ─► artifact
//!                                                                   │                              │
//!                                                                   └────────── cleanup ◄──────────┘
//! ```
//!
//! - **Gate**: templates calling process, evaluation or file functions are rejected
//! - **Render**: Tera renders the entrypoint with the call's bindings
//! - **Inject data**: `#!import "<path>" with_data: <name>` becomes `#let` declarations
//! - **Resolve imports**: every reachable `#import "..." : ...` target is discovered
//!   once, given a collision-free scratch name, and every directive is rewritten
//!   to point at it
//! - **Materialize**: dependencies and the entrypoint are written to the scratch directory
//! - **Cleanup**: scratch files are deleted on every exit path, optionally
//!   preserved in a debug directory first
//!
//! # Core Modules
//!
//! ## Pipeline
//! - [`service`] - [`TypstService`](service::TypstService), the public entry point
//! - [`markup`] - Typst value literals and import directive scanning
//! - [`templating`] - Tera rendering and the deny-list gate
//! - [`resolver`] - import graph discovery, scratch naming and rewriting
//! - [`workspace`] - scratch directory, per-compilation job directories and debug preservation
//! - [`compiler`] - external compiler invocation with timeout
//!
//! ## Supporting Modules
//! - [`config`] - typed configuration with validated partial updates
//! - [`core`] - error types
//! - [`constants`] - defaults, file name prefixes and limits
//! - [`utils`] - file system helpers and input validation
//!
//! # Import Syntax
//!
//! ```typst
//! // Standard import, resolved relative to the importing file
//! #import "Styles.typ" : *
//!
//! // Relative to the project base path
//! #import "resources/typst/shared/Letterhead.typ" : letterhead
//!
//! // Data injection from the call's bindings
//! #!import "Invoice.typ" with_data: invoice
//! ```
//!
//! Files named `*.tera.typ` are rendered with the call's bindings before
//! their imports are rewritten; all other dependencies are copied as-is.
//!
//! # Configuration
//!
//! See [`config`] for fields, defaults and `TYPST_*` environment variables.
//! Invalid values (a binary path or format containing shell metacharacters,
//! a negative or non-numeric timeout) are replaced by defaults.

pub mod compiler;
pub mod config;
pub mod constants;
pub mod core;
pub mod markup;
pub mod resolver;
pub mod service;
pub mod templating;
pub mod utils;
pub mod workspace;

pub use config::{ConfigUpdate, TypstConfig};
pub use crate::core::{Result, TypstError};
pub use markup::Bindings;
pub use service::{CompileOptions, TypstService};

// Test utilities (only available in tests or with the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
