//! Emitter planning.
//!
//! Turns `(targets, impl_lang)` into the ordered, duplicate-free list of emitter names to run, and
//! the list of flatc language front-ends the same inputs need.

use xplatter_core::lang::impl_langs;
use xplatter_core::{ImplLangId, TargetId};

use super::registry::EmitterRegistry;

/// Ordered set of emitter names; insertion order is preserved and repeats are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitterPlan {
    names: Vec<&'static str>,
}

impl EmitterPlan {
    fn push(&mut self, name: &'static str) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names the registry does not know, if any.
    pub fn unregistered(&self, registry: &EmitterRegistry) -> Vec<&'static str> {
        self.names.iter().copied().filter(|n| !registry.contains(n)).collect()
    }
}

impl IntoIterator for EmitterPlan {
    type Item = &'static str;
    type IntoIter = std::vec::IntoIter<&'static str>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

fn target_emitter(target: TargetId) -> Option<&'static str> {
    match target {
        TargetId::Android => Some("kotlin"),
        TargetId::Ios | TargetId::Macos => Some("swift"),
        TargetId::Web => Some("jswasm"),
        TargetId::Windows | TargetId::Linux => None,
    }
}

fn impl_emitters(lang: ImplLangId) -> &'static [&'static str] {
    match lang {
        ImplLangId::C => &["impl_c_build_system", "impl_platform_services"],
        ImplLangId::Cpp => &["impl_cpp", "impl_cpp_build_system", "impl_platform_services"],
        ImplLangId::Rust => &["impl_rust", "impl_rust_build_system", "impl_platform_services"],
        ImplLangId::Go => &["impl_go", "impl_go_build_system", "impl_platform_services"],
    }
}

/// Plan the emitters for a target set and implementation language.
pub fn plan(targets: &[TargetId], lang: ImplLangId) -> EmitterPlan {
    let mut plan = EmitterPlan::default();
    plan.push("cheader");
    for target in targets {
        if let Some(name) = target_emitter(*target) {
            plan.push(name);
        }
    }
    for name in impl_emitters(lang) {
        plan.push(name);
    }
    if lang == ImplLangId::Go && targets.contains(&TargetId::Web) {
        plan.push("impl_go_wasm");
    }
    tracing::debug!(impl_lang = impl_langs::as_str(lang), emitters = ?plan.names, "planned emitters");
    plan
}

/// A flatc language front-end: the flag and the output subdirectory it writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatcLanguage {
    pub flag: &'static str,
    pub out_dir: &'static str,
}

const KOTLIN: FlatcLanguage = FlatcLanguage { flag: "--kotlin", out_dir: "flatbuffers/kotlin" };
const SWIFT: FlatcLanguage = FlatcLanguage { flag: "--swift", out_dir: "flatbuffers/swift" };
const TS: FlatcLanguage = FlatcLanguage { flag: "--ts", out_dir: "flatbuffers/ts" };
const CPP: FlatcLanguage = FlatcLanguage { flag: "--cpp", out_dir: "flatbuffers/cpp" };
const RUST: FlatcLanguage = FlatcLanguage { flag: "--rust", out_dir: "flatbuffers/rust" };
const GO: FlatcLanguage = FlatcLanguage { flag: "--go", out_dir: "flatbuffers/go" };

/// flatc front-ends for the targets, then the implementation language, deduplicated by flag.
pub fn flatc_languages(targets: &[TargetId], lang: ImplLangId) -> Vec<FlatcLanguage> {
    let mut out: Vec<FlatcLanguage> = Vec::new();
    let mut push = |l: FlatcLanguage| {
        if !out.iter().any(|existing| existing.flag == l.flag) {
            out.push(l);
        }
    };
    for target in targets {
        match target {
            TargetId::Android => push(KOTLIN),
            TargetId::Ios | TargetId::Macos => push(SWIFT),
            TargetId::Web => push(TS),
            TargetId::Windows | TargetId::Linux => {}
        }
    }
    match lang {
        ImplLangId::Cpp => push(CPP),
        ImplLangId::Rust => push(RUST),
        ImplLangId::Go => push(GO),
        ImplLangId::C => {}
    }
    out
}
