//! Define error types for emission.
//!
//! Emission errors mean the validator let something through that an emitter cannot lower. They are
//! always fatal and always name the emitter and the offending type or operation.

/// Error during emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// A type an emitter needs is missing from the resolved schemas.
    MissingType { emitter: &'static str, ty: String },
    /// A parameter or return type outside the lowering table.
    Unsupported { emitter: &'static str, detail: String },
    /// An inconsistency the validator should have rejected.
    Internal { emitter: &'static str, detail: String },
    /// Generated Rust did not parse back (formatting step).
    SynParse { emitter: &'static str, detail: String },
}

impl EmitError {
    pub fn missing_type(emitter: &'static str, ty: impl Into<String>) -> Self {
        EmitError::MissingType { emitter, ty: ty.into() }
    }

    pub fn unsupported(emitter: &'static str, detail: impl Into<String>) -> Self {
        EmitError::Unsupported {
            emitter,
            detail: detail.into(),
        }
    }

    pub fn internal(emitter: &'static str, detail: impl Into<String>) -> Self {
        EmitError::Internal {
            emitter,
            detail: detail.into(),
        }
    }

    pub fn emitter(&self) -> &'static str {
        match self {
            EmitError::MissingType { emitter, .. }
            | EmitError::Unsupported { emitter, .. }
            | EmitError::Internal { emitter, .. }
            | EmitError::SynParse { emitter, .. } => emitter,
        }
    }
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::MissingType { emitter, ty } => {
                write!(f, "{}: FlatBuffers type {} not found in resolved schemas", emitter, ty)
            }
            EmitError::Unsupported { emitter, detail } => write!(f, "{}: unsupported: {}", emitter, detail),
            EmitError::Internal { emitter, detail } => write!(f, "{}: internal error: {}", emitter, detail),
            EmitError::SynParse { emitter, detail } => write!(f, "{}: generated Rust does not parse: {}", emitter, detail),
        }
    }
}

impl std::error::Error for EmitError {}
