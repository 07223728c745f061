//! Implementation language vocabulary.
//!
//! The implementation language decides which scaffold emitters run. The GC-language entry is
//! spelled `go` canonically and also accepts the `go-like` alias.
//!
//! ## Examples
//! ```rust
//! use xplatter_core::lang::impl_langs::{self, ImplLangId};
//!
//! assert_eq!(impl_langs::from_str("go-like"), Some(ImplLangId::Go));
//! assert_eq!(impl_langs::as_str(ImplLangId::Go), "go");
//! ```

/// Stable identifier for implementation languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplLangId {
    C,
    Cpp,
    Rust,
    Go,
}

/// Metadata for an implementation language.
#[derive(Debug, Clone, Copy)]
pub struct ImplLangInfo {
    pub id: ImplLangId,
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    /// Source extension of generated implementation files.
    pub extension: &'static str,
    /// Whether an `impl_<lang>` emitter exists (C implementations only get build files and stubs).
    pub has_impl_emitter: bool,
}

/// Registry of implementation languages, in [`ImplLangId`] order.
pub const IMPL_LANGS: &[ImplLangInfo] = &[
    info(ImplLangId::C, "c", &[], "c", false),
    info(ImplLangId::Cpp, "cpp", &[], "cpp", true),
    info(ImplLangId::Rust, "rust", &[], "rs", true),
    info(ImplLangId::Go, "go", &["go-like"], "go", true),
];

/// Resolve an implementation language spelling (canonical or alias).
pub fn from_str(name: &str) -> Option<ImplLangId> {
    IMPL_LANGS
        .iter()
        .find(|l| l.canonical == name || l.aliases.contains(&name))
        .map(|l| l.id)
}

/// Return the canonical spelling for an implementation language.
pub fn as_str(id: ImplLangId) -> &'static str {
    info_for(id).canonical
}

/// Return the full metadata entry for an implementation language.
pub fn info_for(id: ImplLangId) -> &'static ImplLangInfo {
    &IMPL_LANGS[id as usize]
}

/// Every accepted spelling, canonical names first.
pub fn spellings() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = IMPL_LANGS.iter().map(|l| l.canonical).collect();
    out.extend(IMPL_LANGS.iter().flat_map(|l| l.aliases.iter().copied()));
    out
}

const fn info(
    id: ImplLangId,
    canonical: &'static str,
    aliases: &'static [&'static str],
    extension: &'static str,
    has_impl_emitter: bool,
) -> ImplLangInfo {
    ImplLangInfo {
        id,
        canonical,
        aliases,
        extension,
        has_impl_emitter,
    }
}
