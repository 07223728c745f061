//! Load an API description: read, check its shape, materialise the IR.
//!
//! Shape checking happens on the generic document tree before any typed deserialisation, so the
//! author sees a JSON pointer to the first offending node rather than a serde message.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::model::ApiDescription;
use super::schema::{self, ShapeError};

/// Descriptions larger than this are rejected before parsing.
pub const MAX_DESCRIPTION_SIZE: u64 = 8 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("reading API description {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("API description {} is too large ({size} bytes, limit {MAX_DESCRIPTION_SIZE})", path.display())]
    TooLarge { path: PathBuf, size: u64 },
    #[error("parsing YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("schema validation: {0}")]
    Shape(#[from] ShapeError),
    #[error("building API description: {0}")]
    Materialize(#[source] serde_json::Error),
}

/// Read and load a description from disk.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_path(path: &Path) -> Result<ApiDescription, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > MAX_DESCRIPTION_SIZE {
        return Err(LoadError::TooLarge {
            path: path.to_path_buf(),
            size,
        });
    }
    let text = std::fs::read_to_string(path).map_err(io_err)?;
    load_str(&text)
}

/// Load a description from YAML text.
pub fn load_str(text: &str) -> Result<ApiDescription, LoadError> {
    let doc: Value = serde_yaml::from_str(text)?;
    schema::validate(&doc)?;
    let api: ApiDescription = serde_json::from_value(doc).map_err(LoadError::Materialize)?;
    tracing::debug!(
        api = %api.api.name,
        handles = api.handles.len(),
        interfaces = api.interfaces.len(),
        "loaded API description"
    );
    Ok(api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xplatter_core::{ImplLangId, TargetId};

    const MINIMAL: &str = r#"
api:
  name: test_api
  version: 1.0.0
  impl_lang: go-like
  targets: [ios, web]
flatbuffers:
  - schemas/common.fbs
handles:
  - name: Engine
interfaces:
  - name: lifecycle
    constructors:
      - name: create_engine
        returns:
          type: handle:Engine
        error: Common.ErrorCode
    methods:
      - name: set_name
        parameters:
          - name: engine
            type: handle:Engine
          - name: name
            type: string
"#;

    #[test]
    fn loads_typed_ir() {
        let api = load_str(MINIMAL).unwrap();
        assert_eq!(api.api.name, "test_api");
        assert_eq!(api.api.impl_lang, ImplLangId::Go);
        assert_eq!(api.api.targets, vec![TargetId::Ios, TargetId::Web]);
        assert_eq!(api.interfaces[0].constructed_handle(), Some("Engine"));
        assert_eq!(api.interfaces[0].methods[0].leading_handle(), Some("Engine"));
    }

    #[test]
    fn shape_errors_carry_a_pointer() {
        let text = MINIMAL.replace("version: 1.0.0", "version: one");
        match load_str(&text) {
            Err(LoadError::Shape(err)) => assert_eq!(err.pointer, "/api/version"),
            other => panic!("expected shape error, got {other:?}"),
        }
    }

    #[test]
    fn yaml_syntax_errors_are_reported() {
        assert!(matches!(load_str("api: [unclosed"), Err(LoadError::Yaml(_))));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_path(Path::new("does/not/exist.yaml")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.yaml"));
    }
}
