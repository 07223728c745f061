//! Output records produced by emitters.

use std::path::{Path, PathBuf};

/// One file an emitter wants written.
///
/// `is_scaffold` files belong to the user once written: the driver only creates them when absent.
/// `is_project_file` files live beside user code, in the parent of the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: String,
    pub is_scaffold: bool,
    pub is_project_file: bool,
}

impl Artifact {
    /// A machine-managed file, overwritten on every run.
    pub fn generated(path: impl Into<PathBuf>, content: String) -> Self {
        Self {
            path: path.into(),
            content,
            is_scaffold: false,
            is_project_file: false,
        }
    }

    /// A user-editable file, written only when missing.
    pub fn scaffold(path: impl Into<PathBuf>, content: String) -> Self {
        Self {
            is_scaffold: true,
            ..Self::generated(path, content)
        }
    }

    /// Place this artifact beside user code rather than under the output directory.
    pub fn in_project(mut self) -> Self {
        self.is_project_file = true;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    /// Where this artifact lands for a given output directory.
    pub fn destination(&self, output_dir: &Path) -> PathBuf {
        if self.is_project_file {
            let parent = output_dir.parent().unwrap_or_else(|| Path::new(""));
            parent.join(&self.path)
        } else {
            output_dir.join(&self.path)
        }
    }
}
