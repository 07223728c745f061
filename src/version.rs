//! xplatter version information.
//!
//! Banners, `xplatter version` and clap all read this one constant, taken from Cargo metadata at
//! compile time.

/// The xplatter version string (for example, `0.3.0`).
pub const XPLATTER_VERSION: &str = env!("CARGO_PKG_VERSION");
