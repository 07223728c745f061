//! Provide the shared, pure vocabulary of the xplatter generator.
//!
//! This crate is intentionally small and dependency-free. It contains deterministic helpers that every
//! emitter and the semantic validator agree on:
//! - the primitive type registry with per-language spellings and WebAssembly-32 sizes,
//! - the target-platform and implementation-language registries,
//! - classification of the single-string type encoding used by API descriptions, and
//! - identifier naming transforms (C ABI symbols, handle typedefs, Pascal/camel case).
//!
//! ## Notes
//!
//! - This is a “semantic core” crate: **no IO**, no global state, and no generator-specific types.
//! - Anything two emitters must agree on belongs here or in the shared backend helpers, never inside one emitter.

pub mod lang;
pub mod naming;
pub mod types;

pub use lang::impl_langs::ImplLangId;
pub use lang::primitives::PrimitiveId;
pub use lang::targets::TargetId;
pub use types::{Transfer, TypeRef};
