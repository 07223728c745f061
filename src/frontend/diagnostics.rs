//! Diagnostics and error reporting for API descriptions.
//!
//! Turns shape violations and semantic reports into uniform, optionally colored terminal output
//! that names the description file and the path inside it.

use std::fmt;

use super::schema::ShapeError;
use super::validator::ValidationReport;

/// A located problem in an API description.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    /// JSON pointer (shape) or IR path (semantic).
    pub path: Option<String>,
    pub kind: DiagnosticKind,
    pub notes: Vec<String>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            kind,
            notes: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Diagnostic for the first shape violation.
    pub fn from_shape(err: &ShapeError) -> Self {
        let pointer = if err.pointer.is_empty() { "/" } else { err.pointer.as_str() };
        let diag = Diagnostic::new(DiagnosticKind::Shape, err.message.clone()).at(pointer);
        if err.message.starts_with("unknown property") {
            diag.with_hint("run `xplatter dump_schema` to see every allowed key")
        } else {
            diag
        }
    }

    /// One diagnostic per accumulated semantic error.
    pub fn from_report(report: &ValidationReport) -> Vec<Self> {
        report
            .errors
            .iter()
            .map(|e| Diagnostic::new(DiagnosticKind::Semantic, e.message.clone()).at(e.path.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Shape,
    Semantic,
    Warning,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Shape => write!(f, "schema error"),
            DiagnosticKind::Semantic => write!(f, "validation error"),
            DiagnosticKind::Warning => write!(f, "warning"),
        }
    }
}

/// Render a diagnostic for the terminal.
pub fn render(file_name: &str, diag: &Diagnostic, color: bool) -> String {
    let (red, yellow, cyan, bold, reset) = if color {
        ("\x1b[31m", "\x1b[33m", "\x1b[36m", "\x1b[1m", "\x1b[0m")
    } else {
        ("", "", "", "", "")
    };
    let kind_color = match diag.kind {
        DiagnosticKind::Shape | DiagnosticKind::Semantic => red,
        DiagnosticKind::Warning => yellow,
    };

    let mut out = format!(
        "{bold}{kind_color}{kind}{reset}{bold}: {message}{reset}\n",
        kind = diag.kind,
        message = diag.message,
    );
    match &diag.path {
        Some(path) => out.push_str(&format!("  {cyan}-->{reset} {file_name} @ {path}\n")),
        None => out.push_str(&format!("  {cyan}-->{reset} {file_name}\n")),
    }
    for note in &diag.notes {
        out.push_str(&format!("  {cyan}={reset} note: {note}\n"));
    }
    for hint in &diag.hints {
        out.push_str(&format!("  {cyan}={reset} hint: {hint}\n"));
    }
    out
}

/// Print a diagnostic to stderr.
pub fn print_diagnostic(file_name: &str, diag: &Diagnostic) {
    eprint!("{}", render(file_name, diag, use_color()));
}

fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}
