//! Built-in emitters.
//!
//! One module per emitter (the build-system module holds four). [`FACTORIES`] is what the registry
//! is filled from at startup.

pub mod build_system;
pub mod cheader;
pub mod cpp;
pub mod go;
pub mod go_wasm;
pub mod jswasm;
pub mod kotlin;
pub mod platform_services;
pub mod rust;
pub mod swift;

#[cfg(test)]
pub mod test_support;

use super::registry::EmitterFactory;

/// Every built-in emitter, bindings first, then implementation scaffolds.
pub const FACTORIES: &[EmitterFactory] = &[
    cheader::emitter,
    kotlin::emitter,
    swift::emitter,
    jswasm::emitter,
    cpp::emitter,
    rust::emitter,
    go::emitter,
    go_wasm::emitter,
    build_system::c_emitter,
    build_system::cpp_emitter,
    build_system::rust_emitter,
    build_system::go_emitter,
    platform_services::emitter,
];
