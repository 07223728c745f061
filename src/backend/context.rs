//! Everything an emitter reads.

use std::path::Path;

use xplatter_core::TypeRef;
use xplatter_core::naming;

use super::errors::EmitError;
use crate::frontend::model::ApiDescription;
use crate::frontend::resolver::{EnumValue, ResolvedTypeMap, TypeInfo};

/// Name of the output directory when the caller does not pick one.
pub const DEFAULT_GENERATED_DIR: &str = "generated";

/// Frozen inputs shared by every emitter in a run.
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    pub api: &'a ApiDescription,
    pub types: &'a ResolvedTypeMap,
    /// The description file, when generation started from one.
    pub source_path: Option<&'a Path>,
    /// Final component of the output directory; project files reference generated ones through it.
    pub generated_dir: &'a str,
}

impl<'a> EmitContext<'a> {
    pub fn new(api: &'a ApiDescription, types: &'a ResolvedTypeMap) -> Self {
        Self {
            api,
            types,
            source_path: None,
            generated_dir: DEFAULT_GENERATED_DIR,
        }
    }

    pub fn with_source(mut self, path: &'a Path) -> Self {
        self.source_path = Some(path);
        self
    }

    pub fn with_generated_dir(mut self, dir: &'a str) -> Self {
        self.generated_dir = dir;
        self
    }

    pub fn api_name(&self) -> &'a str {
        &self.api.api.name
    }

    pub fn pascal_api(&self) -> String {
        naming::pascal_case(self.api_name())
    }

    /// File name shown in banners.
    pub fn source_name(&self) -> String {
        self.source_path
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.yaml", self.api_name()))
    }

    /// Look up a resolved type, failing as an internal error of `emitter`.
    pub fn type_info(&self, emitter: &'static str, name: &str) -> Result<&'a TypeInfo, EmitError> {
        self.types
            .get(name)
            .ok_or_else(|| EmitError::missing_type(emitter, name))
    }

    /// Whether a qualified name is a resolved enum.
    pub fn is_enum(&self, name: &str) -> bool {
        self.types.get(name).is_some_and(TypeInfo::is_enum)
    }

    /// Classify a type string, failing as an internal error of `emitter`.
    pub fn classify<'t>(&self, emitter: &'static str, ty: &'t str) -> Result<TypeRef<'t>, EmitError> {
        TypeRef::parse(ty).ok_or_else(|| EmitError::unsupported(emitter, format!("unknown type class {ty:?}")))
    }

    /// The value a scaffold reports for a generic failure of `error_type`: `InternalError` when the
    /// enum has it, else its first non-zero value.
    pub fn failure_value(&self, emitter: &'static str, error_type: &str) -> Result<&'a EnumValue, EmitError> {
        let info = self.type_info(emitter, error_type)?;
        info.enum_values
            .iter()
            .find(|v| v.name == "InternalError")
            .or_else(|| info.enum_values.iter().find(|v| v.value != 0))
            .ok_or_else(|| EmitError::internal(emitter, format!("error enum {error_type} has no failure value")))
    }

    /// C constant naming [`Self::failure_value`], as declared in the header.
    pub fn failure_constant(&self, emitter: &'static str, error_type: &str) -> Result<String, EmitError> {
        let value = self.failure_value(emitter, error_type)?;
        Ok(format!("{}_{}", naming::c_type_name(error_type), value.name))
    }

    /// Qualified types used as method or constructor returns, in first-use order.
    pub fn returned_qualified_types(&self) -> Vec<&'a str> {
        let mut out: Vec<&'a str> = Vec::new();
        for iface in &self.api.interfaces {
            for m in iface.constructors.iter().chain(iface.methods.iter()) {
                if let Some(TypeRef::Qualified(name)) = m.returns.as_ref().and_then(|r| TypeRef::parse(&r.ty)) {
                    if !out.contains(&name) {
                        out.push(name);
                    }
                }
            }
        }
        out
    }

    /// Qualified record (struct/table) types crossing the boundary as parameters or returns.
    pub fn boundary_record_types(&self) -> Vec<&'a str> {
        let mut out: Vec<&'a str> = Vec::new();
        for iface in &self.api.interfaces {
            for m in iface.constructors.iter().chain(iface.methods.iter()) {
                let params = m.parameters.iter().map(|p| p.ty.as_str());
                let ret = m.returns.as_ref().map(|r| r.ty.as_str());
                for ty in params.chain(ret) {
                    if let Some(TypeRef::Qualified(name)) = TypeRef::parse(ty) {
                        let record = self.types.get(name).is_some_and(TypeInfo::is_record);
                        if record && !out.contains(&name) {
                            out.push(name);
                        }
                    }
                }
            }
        }
        out
    }
}
