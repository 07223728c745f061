//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fs;
use std::path::{Path, PathBuf};

use xplatter_core::ImplLangId;
use xplatter_core::lang::impl_langs;

use crate::backend::flatc::{self, FlatcConfig};
use crate::frontend::diagnostics::{self, Diagnostic};
use crate::frontend::loader::LoadError;
use crate::frontend::schema;
use crate::pipeline::{self, GenerateOptions, PipelineError, Prepared};
use crate::version::XPLATTER_VERSION;

use super::output::{self, Console};
use super::{CliError, CliResult, ExitCode};

/// Turn a pipeline failure into the user-facing error, printing located diagnostics first when
/// verbose.
fn report(file: &Path, err: PipelineError, console: &Console) -> CliError {
    let diags = match &err {
        PipelineError::Load(LoadError::Shape(shape)) => vec![Diagnostic::from_shape(shape)],
        PipelineError::Validation(report) => Diagnostic::from_report(report),
        _ => Vec::new(),
    };
    if console.is_verbose() {
        let name = file.display().to_string();
        for diag in &diags {
            diagnostics::print_diagnostic(&name, diag);
        }
    }
    CliError::failure(format!("error: {err}"))
}

// ============================================================================
// validate
// ============================================================================

pub fn validate(file: &Path, console: &Console) -> CliResult<ExitCode> {
    console.say(format!("Validating {}", file.display()));
    let prepared = pipeline::prepare(file, None, None).map_err(|e| report(file, e, console))?;
    let api = &prepared.api;
    console.detail(format!("API: {} v{} ({})", api.api.name, api.api.version, api.impl_lang_name()));
    console.detail(format!("FlatBuffers schemas: {}", api.flatbuffers.len()));
    console.detail(format!("Handles: {}", api.handles.len()));
    console.detail(format!("Interfaces: {}", api.interfaces.len()));
    console.detail(format!("Resolved types: {}", prepared.types.len()));
    console.say("Validation passed.");
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// generate
// ============================================================================

pub fn generate(opts: GenerateOptions, file: &Path, console: &Console) -> CliResult<ExitCode> {
    output::validate_output_dir(&opts.output_dir)?;
    console.say(format!("Generating from {}", file.display()));

    let prepared = pipeline::prepare(file, opts.impl_lang, opts.targets.clone()).map_err(|e| report(file, e, console))?;
    let generated_dir = pipeline::generated_dir_name(&opts.output_dir);
    let artifacts = pipeline::emit(&prepared, &generated_dir).map_err(|e| report(file, e, console))?;

    if opts.clean {
        if opts.dry_run {
            console.say(format!("Would clean {}", opts.output_dir.display()));
        } else {
            output::clean_output_dir(&opts.output_dir, console)?;
        }
    }

    let summary = output::write_artifacts(&opts.output_dir, &artifacts, opts.dry_run, console)?;
    if !opts.skip_flatc {
        run_flatc(&prepared, &opts, console).map_err(|e| report(file, e, console))?;
    }
    if !opts.dry_run {
        console.say(summary.line(&opts.output_dir));
    }
    Ok(ExitCode::SUCCESS)
}

/// FlatBuffers code for the target and implementation languages. A missing compiler only warns.
fn run_flatc(prepared: &Prepared, opts: &GenerateOptions, console: &Console) -> Result<(), PipelineError> {
    if prepared.schema_files.is_empty() {
        return Ok(());
    }
    let found = flatc::find_flatc(opts.flatc.as_deref());
    let config = FlatcConfig {
        binary: found.clone().unwrap_or_else(|| PathBuf::from("flatc")),
        schema_files: prepared.schema_files.clone(),
        output_dir: opts.output_dir.clone(),
        targets: prepared.api.effective_targets(),
        impl_lang: prepared.api.api.impl_lang,
    };
    if opts.dry_run {
        for inv in config.invocations() {
            console.always(format!("  Would run: {}", inv.display(&config.binary)));
        }
        return Ok(());
    }
    if found.is_none() {
        tracing::warn!(
            "flatc not found; FlatBuffers code was not generated. Pass --flatc, set {}, or use --skip-flatc.",
            flatc::FLATC_ENV
        );
        return Ok(());
    }
    let runs = config.run()?;
    console.detail(format!("flatc ran {runs} invocation(s)"));
    Ok(())
}

// ============================================================================
// init
// ============================================================================

const STARTER_SCHEMA: &str = "namespace Common;

enum ErrorCode : int32 {
    Ok = 0,
    InvalidArgument = 1,
    OutOfMemory = 2,
    NotFound = 3,
    InternalError = 4
}
";

fn starter_description(name: &str, impl_lang: ImplLangId) -> String {
    format!(
        r#"api:
  name: {name}
  version: 0.1.0
  description: "TODO: describe your API"
  impl_lang: {lang}

flatbuffers:
  - schemas/types.fbs

handles:
  - name: Instance
    description: "Main instance handle"

interfaces:
  - name: lifecycle
    constructors:
      - name: create_instance
        returns:
          type: handle:Instance
        error: Common.ErrorCode
"#,
        lang = impl_langs::as_str(impl_lang)
    )
}

fn is_api_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn init(name: &str, impl_lang: ImplLangId, output_dir: &Path, console: &Console) -> CliResult<ExitCode> {
    if !is_api_name(name) {
        return Err(CliError::failure(format!(
            "API name '{name}' must start with a lowercase letter and contain only lowercase letters, digits and underscores"
        )));
    }
    console.say(format!("Initializing project {name} in {}", output_dir.display()));

    let description = output_dir.join(format!("{name}.yaml"));
    let schema_dir = output_dir.join("schemas");
    let schema_file = schema_dir.join("types.fbs");
    for path in [&description, &schema_file] {
        if path.exists() {
            return Err(CliError::failure(format!("Refusing to overwrite existing file '{}'", path.display())));
        }
    }

    fs::create_dir_all(&schema_dir)
        .map_err(|e| CliError::failure(format!("Error creating directory '{}': {}", schema_dir.display(), e)))?;
    fs::write(&description, starter_description(name, impl_lang))
        .map_err(|e| CliError::failure(format!("Error writing '{}': {}", description.display(), e)))?;
    fs::write(&schema_file, STARTER_SCHEMA)
        .map_err(|e| CliError::failure(format!("Error writing '{}': {}", schema_file.display(), e)))?;

    console.say("Created:");
    console.say(format!("  {}", description.display()));
    console.say(format!("  {}", schema_file.display()));
    console.say(format!("\nNext: xplatter validate {}", description.display()));
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// dump_schema / version
// ============================================================================

pub fn dump_schema(output: Option<&Path>, console: &Console) -> CliResult<ExitCode> {
    let text = schema::SCHEMA_JSON.trim_end();
    match output {
        None => console.always(text),
        Some(path) => {
            fs::write(path, format!("{text}\n"))
                .map_err(|e| CliError::failure(format!("Error writing schema to '{}': {}", path.display(), e)))?;
            console.say(format!("Schema written to {}", path.display()));
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn version() -> CliResult<ExitCode> {
    println!("xplatter {XPLATTER_VERSION}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::load_str;

    #[test]
    fn starter_description_loads() {
        for lang in [ImplLangId::C, ImplLangId::Cpp, ImplLangId::Rust, ImplLangId::Go] {
            let api = load_str(&starter_description("my_api", lang)).expect("starter loads");
            assert_eq!(api.api.impl_lang, lang);
            assert_eq!(api.handles[0].name, "Instance");
            assert_eq!(api.interfaces[0].constructors[0].name, "create_instance");
        }
    }

    #[test]
    fn starter_schema_declares_the_error_enum() {
        let types = crate::frontend::resolver::parse_str(STARTER_SCHEMA).expect("parses");
        let info = types.get("Common.ErrorCode").expect("enum resolved");
        let names: Vec<&str> = info.enum_values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["Ok", "InvalidArgument", "OutOfMemory", "NotFound", "InternalError"]);
    }

    #[test]
    fn api_names_are_lower_snake() {
        assert!(is_api_name("my_api"));
        assert!(is_api_name("a1"));
        assert!(!is_api_name("MyApi"));
        assert!(!is_api_name("1api"));
        assert!(!is_api_name(""));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let console = Console::new(true, false);
        init("demo", ImplLangId::Rust, tmp.path(), &console).expect("first init");
        assert!(tmp.path().join("demo.yaml").is_file());
        assert!(tmp.path().join("schemas/types.fbs").is_file());
        let err = init("demo", ImplLangId::Rust, tmp.path(), &console).expect_err("second init");
        assert!(err.message.contains("Refusing to overwrite"));
    }
}
