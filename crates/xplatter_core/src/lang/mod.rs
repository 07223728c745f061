//! Vocabulary registries for the generator.
//!
//! Callers work with **stable IDs** (`PrimitiveId`, `TargetId`, `ImplLangId`) and look up spellings and
//! per-language metadata through `const` registry tables, instead of matching on strings across emitters.
//!
//! ## Notes
//! - Registries are **pure**: no IR types, no IO, no side effects.
//! - Each table is stored in identifier order; `info_for` indexes it directly and the guardrail tests
//!   keep the order honest.
//!
//! ## Examples
//! ```rust
//! use xplatter_core::lang::primitives::{self, PrimitiveId};
//!
//! assert_eq!(primitives::from_str("uint16"), Some(PrimitiveId::UInt16));
//! assert_eq!(primitives::info_for(PrimitiveId::UInt16).c, "uint16_t");
//! ```

pub mod impl_langs;
pub mod primitives;
pub mod targets;
