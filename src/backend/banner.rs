//! Banners at the top of every emitted file.
//!
//! Generated files say they are machine-managed; scaffolds say they belong to the user and will not
//! be overwritten.

use crate::version::XPLATTER_VERSION;

/// Comment syntax of the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `// ...` (C, C++, Rust, Go, JS, Kotlin, Swift)
    Slash,
    /// `# ...` (Makefile, CMake, TOML, .gitignore)
    Hash,
}

impl CommentStyle {
    fn prefix(self) -> &'static str {
        match self {
            CommentStyle::Slash => "//",
            CommentStyle::Hash => "#",
        }
    }
}

/// Banner for a machine-managed file.
///
/// The first line follows the `Code generated ... DO NOT EDIT.` convention tools recognise.
pub fn generated(style: CommentStyle, source_name: &str) -> String {
    let p = style.prefix();
    format!(
        "{p} Code generated by xplatter {XPLATTER_VERSION} from {source_name}. DO NOT EDIT.\n{p} Regenerate with `xplatter generate {source_name}`.\n\n"
    )
}

/// Banner for a user-owned scaffold.
pub fn scaffold(style: CommentStyle, source_name: &str) -> String {
    let p = style.prefix();
    format!(
        "{p} Scaffold generated by xplatter {XPLATTER_VERSION} from {source_name}.\n{p} This file is yours to edit; xplatter will not overwrite it.\n\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_banner_is_recognisable() {
        let text = generated(CommentStyle::Slash, "api.yaml");
        assert!(text.starts_with("// Code generated by xplatter "));
        assert!(text.lines().next().is_some_and(|l| l.ends_with("DO NOT EDIT.")));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn scaffold_banner_uses_hash_comments() {
        let text = scaffold(CommentStyle::Hash, "api.yaml");
        assert!(text.lines().take(2).all(|l| l.starts_with("# ")));
        assert!(text.contains("will not overwrite"));
    }
}
