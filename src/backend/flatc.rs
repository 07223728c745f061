//! flatc wrapper - runs the FlatBuffers compiler for each needed language
//!
//! One invocation per language front-end, writing into `<output>/flatbuffers/<lang>/`. The binary
//! is found from an explicit path, then `XPLATTER_FLATC_PATH`, then `PATH`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use xplatter_core::{ImplLangId, TargetId};

use super::planner::{self, FlatcLanguage};

pub const FLATC_ENV: &str = "XPLATTER_FLATC_PATH";

#[derive(Debug, thiserror::Error)]
pub enum FlatcError {
    #[error("failed to start {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("flatc {flag} failed ({status}):\n{output}")]
    Failed {
        flag: &'static str,
        status: String,
        output: String,
    },
}

/// One planned flatc run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatcInvocation {
    pub language: FlatcLanguage,
    pub args: Vec<OsString>,
}

impl FlatcInvocation {
    /// Shell-like rendering for `Would run:` / `Running:` lines.
    pub fn display(&self, binary: &Path) -> String {
        let mut parts = vec![binary.display().to_string()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// Everything a flatc step needs.
#[derive(Debug, Clone)]
pub struct FlatcConfig {
    pub binary: PathBuf,
    pub schema_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub targets: Vec<TargetId>,
    pub impl_lang: ImplLangId,
}

impl FlatcConfig {
    pub fn invocations(&self) -> Vec<FlatcInvocation> {
        planner::flatc_languages(&self.targets, self.impl_lang)
            .into_iter()
            .map(|language| {
                let mut args: Vec<OsString> = vec![
                    language.flag.into(),
                    "-o".into(),
                    self.output_dir.join(language.out_dir).into_os_string(),
                ];
                args.extend(self.schema_files.iter().map(|p| p.clone().into_os_string()));
                FlatcInvocation { language, args }
            })
            .collect()
    }

    /// Run every invocation, stopping at the first failure. Returns the number of runs.
    pub fn run(&self) -> Result<usize, FlatcError> {
        let invocations = self.invocations();
        for inv in &invocations {
            tracing::info!(command = %inv.display(&self.binary), "running flatc");
            let output = Command::new(&self.binary)
                .args(&inv.args)
                .output()
                .map_err(|source| FlatcError::Spawn {
                    binary: self.binary.clone(),
                    source,
                })?;
            if !output.status.success() {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                return Err(FlatcError::Failed {
                    flag: inv.language.flag,
                    status: output.status.to_string(),
                    output: text,
                });
            }
        }
        Ok(invocations.len())
    }
}

/// Locate flatc: explicit path, then the environment override, then `PATH`.
pub fn find_flatc(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(FLATC_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    search_path(std::env::var_os("PATH")?, "flatc")
}

fn search_path(path_var: OsString, name: &str) -> Option<PathBuf> {
    let exe = if cfg!(windows) { format!("{name}.exe") } else { name.to_string() };
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(&exe))
        .find(|candidate| candidate.is_file())
}
