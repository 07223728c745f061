//! xplatter backend
//!
//! Lowers a validated description and its resolved types into artifacts. The flow is:
//! 1. [`planner`] picks emitter names for `(targets, impl_lang)`
//! 2. each name is looked up in the [`registry`] and run over one frozen [`EmitContext`]
//! 3. the collected [`Artifact`]s go back to the driver, which owns all file writes
//!
//! ## Module Organization
//!
//! - `emit/` - one module per emitter
//! - `ctypes.rs` - C ABI lowering shared by every emitter that talks to the header
//! - `layout.rs` - wasm32 record layout for the JS and Go wasm emitters
//! - `writer.rs` - indented text buffer
//! - `banner.rs` - first lines of every emitted file
//! - `flatc.rs` - external FlatBuffers compiler invocation

pub mod artifact;
pub mod banner;
pub mod context;
pub mod ctypes;
pub mod emit;
pub mod errors;
pub mod flatc;
pub mod layout;
pub mod planner;
pub mod registry;
pub mod writer;

pub use artifact::Artifact;
pub use context::EmitContext;
pub use errors::EmitError;
pub use flatc::FlatcError;
pub use planner::{EmitterPlan, plan};
pub use registry::{Emitter, EmitterRegistry};
