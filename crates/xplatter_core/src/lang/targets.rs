//! Target platform vocabulary.
//!
//! ## Notes
//! - [`TARGETS`] is stored in the default generation order: when an API description omits
//!   `targets`, every platform is generated in exactly this order.
//!
//! ## Examples
//! ```rust
//! use xplatter_core::lang::targets::{self, TargetId};
//!
//! assert_eq!(targets::from_str("macos"), Some(TargetId::Macos));
//! assert!(targets::info_for(TargetId::Linux).desktop);
//! ```

/// Stable identifier for target platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    Android,
    Ios,
    Web,
    Windows,
    Macos,
    Linux,
}

/// Metadata for a target platform.
#[derive(Debug, Clone, Copy)]
pub struct TargetInfo {
    pub id: TargetId,
    pub canonical: &'static str,
    pub description: &'static str,
    /// Desktop targets share one platform-services stub.
    pub desktop: bool,
}

/// Registry of target platforms, in [`TargetId`] order.
pub const TARGETS: &[TargetInfo] = &[
    info(TargetId::Android, "android", "Kotlin/JNI binding over the C ABI.", false),
    info(TargetId::Ios, "ios", "Swift binding over the C ABI.", false),
    info(TargetId::Web, "web", "ES module loading a WebAssembly binary.", false),
    info(TargetId::Windows, "windows", "C header consumed directly.", true),
    info(TargetId::Macos, "macos", "Swift binding over the C ABI.", true),
    info(TargetId::Linux, "linux", "C header consumed directly.", true),
];

/// Resolve a target spelling.
pub fn from_str(name: &str) -> Option<TargetId> {
    TARGETS.iter().find(|t| t.canonical == name).map(|t| t.id)
}

/// Return the canonical spelling for a target.
pub fn as_str(id: TargetId) -> &'static str {
    info_for(id).canonical
}

/// Return the full metadata entry for a target.
pub fn info_for(id: TargetId) -> &'static TargetInfo {
    &TARGETS[id as usize]
}

/// Every target, in default generation order.
pub fn all() -> Vec<TargetId> {
    TARGETS.iter().map(|t| t.id).collect()
}

const fn info(id: TargetId, canonical: &'static str, description: &'static str, desktop: bool) -> TargetInfo {
    TargetInfo {
        id,
        canonical,
        description,
        desktop,
    }
}
