//! Artifact writing and user-facing progress lines.
//!
//! Progress goes to stdout and is silenced by `--quiet`; logs go through `tracing` to stderr.
//! Scaffolds are only created when absent, and nothing is touched in a dry run.

use std::fs;
use std::path::{Component, Path};

use crate::backend::Artifact;

use super::{CliError, CliResult};

/// Stdout reporter honouring `--quiet` and `--verbose`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console {
    quiet: bool,
    verbose: bool,
}

impl Console {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self { quiet, verbose }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// A normal progress line.
    pub fn say(&self, line: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", line.as_ref());
        }
    }

    /// A per-file line, shown with `--verbose` only.
    pub fn detail(&self, line: impl AsRef<str>) {
        if self.verbose && !self.quiet {
            println!("  {}", line.as_ref());
        }
    }

    /// A line shown even with `--quiet` (dry-run listings).
    pub fn always(&self, line: impl AsRef<str>) {
        println!("{}", line.as_ref());
    }
}

/// Counts reported in the final summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub preserved: usize,
}

impl WriteSummary {
    /// `Generated N files in DIR[, K scaffold file(s) preserved]`.
    pub fn line(&self, output_dir: &Path) -> String {
        let mut line = format!("Generated {} files in {}", self.written, output_dir.display());
        if self.preserved > 0 {
            line.push_str(&format!(", {} scaffold file(s) preserved", self.preserved));
        }
        line
    }
}

/// Reject output directories that climb out of the working tree.
///
/// Absolute paths are allowed but logged.
pub fn validate_output_dir(dir: &Path) -> CliResult<()> {
    if dir.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(CliError::failure(format!(
            "Output directory '{}' contains path traversal (..)",
            dir.display()
        )));
    }
    if dir.is_absolute() {
        tracing::warn!(
            "Using absolute output path: {}. Consider using a relative path.",
            dir.display()
        );
    }
    Ok(())
}

/// Remove a previous output directory. Missing directories are fine.
pub fn clean_output_dir(dir: &Path, console: &Console) -> CliResult<()> {
    console.say(format!("Cleaning {}", dir.display()));
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CliError::failure(format!("Error removing '{}': {}", dir.display(), e))),
    }
}

/// Write every artifact under `output_dir` (project files go to its parent).
pub fn write_artifacts(
    output_dir: &Path,
    artifacts: &[Artifact],
    dry_run: bool,
    console: &Console,
) -> CliResult<WriteSummary> {
    let mut summary = WriteSummary::default();
    for artifact in artifacts {
        let dest = artifact.destination(output_dir);
        if artifact.is_scaffold && dest.exists() {
            summary.preserved += 1;
            console.detail(format!("Scaffold exists, skipped: {}", dest.display()));
            continue;
        }
        if dry_run {
            console.always(format!("  Would write: {}", dest.display()));
            continue;
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CliError::failure(format!("Error creating directory '{}': {}", parent.display(), e)))?;
        }
        fs::write(&dest, artifact.bytes())
            .map_err(|e| CliError::failure(format!("Error writing '{}': {}", dest.display(), e)))?;
        summary.written += 1;
        console.detail(format!("Wrote: {}", dest.display()));
    }
    tracing::info!(written = summary.written, preserved = summary.preserved, "artifacts written");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_components_are_rejected() {
        assert!(validate_output_dir(Path::new("../out")).is_err());
        assert!(validate_output_dir(Path::new("a/../../b")).is_err());
        assert!(validate_output_dir(Path::new("out/generated")).is_ok());
    }

    #[test]
    fn summary_mentions_preserved_scaffolds_only_when_present() {
        let dir = Path::new("generated");
        let plain = WriteSummary { written: 3, preserved: 0 };
        assert_eq!(plain.line(dir), "Generated 3 files in generated");
        let kept = WriteSummary { written: 2, preserved: 1 };
        assert_eq!(kept.line(dir), "Generated 2 files in generated, 1 scaffold file(s) preserved");
    }

    #[test]
    fn scaffolds_are_written_once() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("generated");
        let console = Console::new(true, false);
        let artifacts = vec![
            Artifact::generated("api.h", "v1".to_string()),
            Artifact::scaffold("Makefile", "mine".to_string()).in_project(),
        ];
        let first = write_artifacts(&out, &artifacts, false, &console).expect("writes");
        assert_eq!(first, WriteSummary { written: 2, preserved: 0 });
        fs::write(tmp.path().join("Makefile"), "edited").expect("edit");

        let second = write_artifacts(&out, &artifacts, false, &console).expect("writes");
        assert_eq!(second, WriteSummary { written: 1, preserved: 1 });
        assert_eq!(fs::read_to_string(tmp.path().join("Makefile")).expect("read"), "edited");
        assert_eq!(fs::read_to_string(out.join("api.h")).expect("read"), "v1");
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("generated");
        let artifacts = vec![Artifact::generated("api.h", String::new())];
        let summary = write_artifacts(&out, &artifacts, true, &Console::new(true, false)).expect("dry run");
        assert_eq!(summary.written, 0);
        assert!(!out.exists());
    }

    #[test]
    fn cleaning_a_missing_directory_is_fine() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let console = Console::new(true, false);
        assert!(clean_output_dir(&tmp.path().join("absent"), &console).is_ok());
        let present = tmp.path().join("present");
        fs::create_dir_all(present.join("nested")).expect("mkdir");
        clean_output_dir(&present, &console).expect("cleans");
        assert!(!present.exists());
    }
}
