//! The codegen pipeline: load, resolve, validate, emit.
//!
//! Every phase reads the frozen output of the previous one. Emission collects all artifacts before
//! returning, so a failing emitter never leaves a half-written output tree; writing them is the
//! caller's job.

use std::path::{Path, PathBuf};

use xplatter_core::{ImplLangId, TargetId};

use crate::backend::context::{DEFAULT_GENERATED_DIR, EmitContext};
use crate::backend::errors::EmitError;
use crate::backend::flatc::FlatcError;
use crate::backend::{Artifact, planner, registry};
use crate::frontend::loader::{self, LoadError};
use crate::frontend::model::ApiDescription;
use crate::frontend::resolver::{self, ResolveError, ResolvedTypeMap};
use crate::frontend::validator::{self, ValidationReport};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("resolving FlatBuffers schemas: {0}")]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Validation(#[from] ValidationReport),
    #[error("emitting: {0}")]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Flatc(#[from] FlatcError),
    #[error("planned emitters are not registered: {}", .0.join(", "))]
    Unregistered(Vec<&'static str>),
}

/// Flags of the `generate` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub output_dir: PathBuf,
    pub flatc: Option<PathBuf>,
    pub impl_lang: Option<ImplLangId>,
    pub targets: Option<Vec<TargetId>>,
    pub dry_run: bool,
    pub clean: bool,
    pub skip_flatc: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_GENERATED_DIR),
            flatc: None,
            impl_lang: None,
            targets: None,
            dry_run: false,
            clean: false,
            skip_flatc: false,
        }
    }
}

/// A loaded, resolved and validated description.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub source: PathBuf,
    pub api: ApiDescription,
    pub types: ResolvedTypeMap,
    /// Absolute locations of the referenced `.fbs` files, in description order.
    pub schema_files: Vec<PathBuf>,
}

/// Where referenced schemas are looked up: beside the description, then beside the executable.
pub fn schema_search_dirs(source: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    match source.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dirs.push(dir.to_path_buf()),
        _ => dirs.push(PathBuf::from(".")),
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        if !dirs.contains(&exe_dir) {
            dirs.push(exe_dir);
        }
    }
    dirs
}

/// Load, apply overrides, resolve schemas and validate.
#[tracing::instrument(skip_all, fields(source = %source.display()))]
pub fn prepare(
    source: &Path,
    impl_lang: Option<ImplLangId>,
    targets: Option<Vec<TargetId>>,
) -> Result<Prepared, PipelineError> {
    let mut api = loader::load_path(source)?;
    api.apply_overrides(impl_lang, targets);

    let search_dirs = schema_search_dirs(source);
    let schema_files = api
        .flatbuffers
        .iter()
        .map(|rel| resolver::resolve_schema_path(rel, &search_dirs))
        .collect::<Result<Vec<_>, _>>()?;
    let types = resolver::parse_files(&search_dirs, &api.flatbuffers)?;
    tracing::info!(types = types.len(), schemas = schema_files.len(), "resolved FlatBuffers types");

    validator::validate(&api, Some(&types)).into_result()?;
    tracing::info!(api = %api.api.name, "description is valid");

    Ok(Prepared {
        source: source.to_path_buf(),
        api,
        types,
        schema_files,
    })
}

/// Final component of the output directory, which project files use to reach generated ones.
pub fn generated_dir_name(output_dir: &Path) -> String {
    output_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_GENERATED_DIR.to_string())
}

/// Run every planned emitter and collect their artifacts.
#[tracing::instrument(skip_all, fields(api = %prepared.api.api.name, generated_dir))]
pub fn emit(prepared: &Prepared, generated_dir: &str) -> Result<Vec<Artifact>, PipelineError> {
    let api = &prepared.api;
    let plan = planner::plan(&api.effective_targets(), api.api.impl_lang);
    let registry = registry::global();
    let missing = plan.unregistered(registry);
    if !missing.is_empty() {
        return Err(PipelineError::Unregistered(missing));
    }

    let ctx = EmitContext::new(api, &prepared.types)
        .with_source(&prepared.source)
        .with_generated_dir(generated_dir);
    let mut artifacts = Vec::new();
    for name in plan {
        let Some(emitter) = registry.get(name) else {
            return Err(PipelineError::Unregistered(vec![name]));
        };
        let produced = emitter.emit(&ctx)?;
        tracing::debug!(emitter = name, artifacts = produced.len(), "emitter finished");
        artifacts.extend(produced);
    }
    Ok(artifacts)
}
