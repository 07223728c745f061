#![forbid(unsafe_code)]
//! xplatter: one API description in, a C ABI and its platform bindings out.
//!
//! A YAML description of handles and interfaces, plus the FlatBuffers schemas it references, is
//! loaded, resolved and validated by the frontend. The backend then runs the emitters planned for
//! the description's targets and implementation language: a C header, Kotlin/JNI, Swift and
//! JavaScript/WebAssembly bindings, and C, C++, Rust or Go implementation scaffolds.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module
//!   enforces `#![deny(clippy::unwrap_used)]`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//! - **Emitter invariants**: an inconsistency the validator should have caught is an
//!   `EmitError::Internal`, never a panic.

pub mod backend;
pub mod cli;
pub mod frontend;
pub mod pipeline;
pub mod version;

pub use backend::{Artifact, EmitContext, EmitError};
pub use frontend::{ApiDescription, ResolvedTypeMap, ValidationReport, load_path, load_str, validate};
pub use pipeline::{GenerateOptions, PipelineError, Prepared};
pub use version::XPLATTER_VERSION;
