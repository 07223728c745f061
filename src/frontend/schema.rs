//! Embedded structural schema for API descriptions.
//!
//! The schema is a JSON Schema (draft 2020-12) document compiled into the binary and checked with
//! the `jsonschema` crate. [`validate`] reports the first violation with a JSON pointer into the
//! description.

use std::sync::OnceLock;

use jsonschema::Validator;
use jsonschema::error::ValidationErrorKind;
use serde_json::Value;

/// The structural schema, as shipped (also printed by `dump_schema`).
pub const SCHEMA_JSON: &str = include_str!("schema/api_definition.schema.json");

/// A shape violation: where, and what was expected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", display_pointer(.pointer))]
pub struct ShapeError {
    /// JSON pointer to the offending node (`""` is the document root).
    pub pointer: String,
    pub message: String,
}

impl ShapeError {
    fn new(pointer: &str, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.to_string(),
            message: message.into(),
        }
    }
}

fn display_pointer(pointer: &str) -> &str {
    if pointer.is_empty() { "/" } else { pointer }
}

static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

/// The compiled schema, built on first use.
fn validator() -> Result<&'static Validator, ShapeError> {
    VALIDATOR
        .get_or_init(|| {
            let schema: Value =
                serde_json::from_str(SCHEMA_JSON).map_err(|e| format!("embedded schema is not valid JSON: {e}"))?;
            jsonschema::validator_for(&schema).map_err(|e| format!("embedded schema does not compile: {e}"))
        })
        .as_ref()
        .map_err(|message| ShapeError::new("", message.clone()))
}

/// Validate a document against the embedded schema.
pub fn validate(doc: &Value) -> Result<(), ShapeError> {
    let validator = validator()?;
    validator.validate(doc).map_err(|err| {
        let pointer = err.instance_path.to_string();
        match &err.kind {
            // Point at the first unexpected key rather than the object holding it.
            ValidationErrorKind::AdditionalProperties { unexpected } if !unexpected.is_empty() => {
                let key = &unexpected[0];
                ShapeError::new(&format!("{pointer}/{}", escape_token(key)), format!("unknown property '{key}'"))
            }
            _ => ShapeError::new(&pointer, err.to_string()),
        }
    })
}

/// RFC 6901 token escaping.
fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "api": { "name": "test_api", "version": "1.0.0", "impl_lang": "cpp" },
            "flatbuffers": ["schemas/common.fbs"],
            "handles": [{ "name": "Engine" }],
            "interfaces": [{
                "name": "lifecycle",
                "constructors": [{
                    "name": "create_engine",
                    "returns": { "type": "handle:Engine" },
                    "error": "Common.ErrorCode"
                }]
            }]
        })
    }

    #[test]
    fn accepts_minimal_description() {
        assert_eq!(validate(&minimal()), Ok(()));
    }

    #[test]
    fn rejects_missing_top_level_key() {
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove("flatbuffers");
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.pointer, "");
        assert!(err.message.contains("flatbuffers"));
        assert!(err.to_string().starts_with("/: "));
    }

    #[test]
    fn rejects_unknown_keys_in_defs() {
        let mut doc = minimal();
        doc["interfaces"][0]["constructors"][0]["bogus"] = json!(true);
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.pointer, "/interfaces/0/constructors/0/bogus");
        assert_eq!(err.message, "unknown property 'bogus'");
    }

    #[test]
    fn rejects_string_return_types() {
        let mut doc = minimal();
        doc["interfaces"][0]["constructors"][0]["returns"]["type"] = json!("string");
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.pointer, "/interfaces/0/constructors/0/returns/type");
    }

    #[test]
    fn rejects_bad_names_and_enums() {
        let mut doc = minimal();
        doc["api"]["name"] = json!("TestApi");
        assert_eq!(validate(&doc).unwrap_err().pointer, "/api/name");

        let mut doc = minimal();
        doc["api"]["impl_lang"] = json!("java");
        assert_eq!(validate(&doc).unwrap_err().pointer, "/api/impl_lang");

        let mut doc = minimal();
        doc["api"]["targets"] = json!(["ios", "ios"]);
        assert_eq!(validate(&doc).unwrap_err().pointer, "/api/targets");
    }

    #[test]
    fn accepts_go_like_alias() {
        let mut doc = minimal();
        doc["api"]["impl_lang"] = json!("go-like");
        assert_eq!(validate(&doc), Ok(()));
    }

    #[test]
    fn rejects_buffers_of_non_primitives() {
        let mut doc = minimal();
        doc["interfaces"][0]["methods"] = json!([{
            "name": "upload",
            "parameters": [{ "name": "data", "type": "buffer<Foo>", "transfer": "ref" }]
        }]);
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.pointer, "/interfaces/0/methods/0/parameters/0/type");
    }

    #[test]
    fn rejects_wrong_node_types() {
        let mut doc = minimal();
        doc["handles"] = json!({ "name": "Engine" });
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.pointer, "/handles");
        assert!(err.message.contains("array"), "{}", err.message);
    }

    #[test]
    fn rejects_empty_interface_lists() {
        let mut doc = minimal();
        doc["interfaces"] = json!([]);
        assert_eq!(validate(&doc).unwrap_err().pointer, "/interfaces");
    }
}
