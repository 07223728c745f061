//! CLI module for xplatter
//!
//! This module provides the command-line interface for the generator.
//!
//! ## Commands
//!
//! - `validate <file>` - Load, resolve and validate an API description
//! - `generate <file>` - Generate the C ABI header, bindings and scaffolds
//! - `init` - Write a starter description and schema
//! - `dump_schema` - Print the embedded structural schema
//! - `version` - Print the version
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `output` - Artifact writing, dry runs and user-facing progress lines
//!
//! ## Design
//!
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod output;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xplatter_core::lang::{impl_langs, targets};
use xplatter_core::{ImplLangId, TargetId};

use crate::version::XPLATTER_VERSION;

/// Environment variable holding the log filter; `RUST_LOG` is the fallback.
pub const LOG_ENV: &str = "XPLATTER_LOG";

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Cross-platform C ABI and binding generator
#[derive(Parser, Debug)]
#[command(name = "xplatter")]
#[command(version = XPLATTER_VERSION)]
#[command(about = "Generate a C ABI, platform bindings and implementation scaffolds from one API description", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Show per-file progress and debug logs
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load, resolve and validate an API description
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Generate the C ABI header, platform bindings and implementation scaffolds
    Generate(GenerateArgs),

    /// Scaffold a new project with a starter API description and schema
    Init {
        /// API name
        #[arg(short, long, default_value = "my_api")]
        name: String,
        /// Implementation language (c, cpp, rust, go)
        #[arg(long = "impl-lang", default_value = "cpp", value_parser = parse_impl_lang)]
        impl_lang: ImplLangId,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print the embedded API description schema
    #[command(name = "dump_schema", alias = "dump-schema")]
    DumpSchema {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the version
    Version,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "./generated")]
    pub output: PathBuf,
    /// Path to the FlatBuffers compiler
    #[arg(short, long)]
    pub flatc: Option<PathBuf>,
    /// Override impl_lang from the description
    #[arg(long = "impl-lang", value_parser = parse_impl_lang)]
    pub impl_lang: Option<ImplLangId>,
    /// Override targets (comma-separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_target)]
    pub targets: Vec<TargetId>,
    /// Show what would be generated without writing
    #[arg(long)]
    pub dry_run: bool,
    /// Remove the output directory first
    #[arg(long)]
    pub clean: bool,
    /// Skip flatc even when it is available
    #[arg(long)]
    pub skip_flatc: bool,
}

fn parse_impl_lang(s: &str) -> Result<ImplLangId, String> {
    impl_langs::from_str(s)
        .ok_or_else(|| format!("unknown implementation language '{s}' (expected one of: {})", impl_langs::spellings().join(", ")))
}

fn parse_target(s: &str) -> Result<TargetId, String> {
    targets::from_str(s.trim()).ok_or_else(|| {
        let known: Vec<&str> = targets::all().into_iter().map(targets::as_str).collect();
        format!("unknown target '{s}' (expected one of: {})", known.join(", "))
    })
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    let console = output::Console::new(cli.quiet, cli.verbose);
    match cli.command {
        Command::Validate { file } => commands::validate(&file, &console),
        Command::Generate(args) => commands::generate(args.to_options(), &args.file, &console),
        Command::Init {
            name,
            impl_lang,
            output,
        } => commands::init(&name, impl_lang, &output, &console),
        Command::DumpSchema { output } => commands::dump_schema(output.as_deref(), &console),
        Command::Version => commands::version(),
    }
}

impl GenerateArgs {
    fn to_options(&self) -> crate::pipeline::GenerateOptions {
        crate::pipeline::GenerateOptions {
            output_dir: self.output.clone(),
            flatc: self.flatc.clone(),
            impl_lang: self.impl_lang,
            targets: (!self.targets.is_empty()).then(|| self.targets.clone()),
            dry_run: self.dry_run,
            clean: self.clean,
            skip_flatc: self.skip_flatc,
        }
    }
}

/// Install the stderr subscriber. The filter comes from `XPLATTER_LOG`, then `RUST_LOG`, then the
/// verbosity flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let fallback = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
