//! Semantic validation of the IR.
//!
//! Checks the rules the structural schema cannot express. Every rule runs; violations are
//! accumulated into a [`ValidationReport`] and the caller decides at the end.

use std::collections::HashSet;
use std::fmt;

use xplatter_core::naming;
use xplatter_core::types::{self, TypeRef};
use xplatter_core::{Transfer, lang::primitives};

use super::model::{ApiDescription, InterfaceDef, MethodDef, ParameterDef};
use super::resolver::{ResolvedTypeMap, TypeKind};

/// One semantic violation, located by an IR path such as `interfaces[0].methods[1].returns.type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was found, the whole report otherwise.
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_valid() { Ok(()) } else { Err(self) }
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed ({} error(s))", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Validate an API description.
///
/// `resolved` may be `None` when no schema information is available; type-existence checks are
/// skipped then, everything else still runs.
#[tracing::instrument(skip_all, fields(api = %api.api.name))]
pub fn validate(api: &ApiDescription, resolved: Option<&ResolvedTypeMap>) -> ValidationReport {
    let mut v = Validator {
        api,
        resolved,
        handles: api.handles.iter().map(|h| h.name.as_str()).collect(),
        report: ValidationReport::default(),
    };
    v.check_handles();
    v.check_interfaces();
    tracing::debug!(errors = v.report.len(), "semantic validation finished");
    v.report
}

struct Validator<'a> {
    api: &'a ApiDescription,
    resolved: Option<&'a ResolvedTypeMap>,
    handles: HashSet<&'a str>,
    report: ValidationReport,
}

impl<'a> Validator<'a> {
    fn check_handles(&mut self) {
        let api = self.api;
        let mut seen = HashSet::new();
        for (i, handle) in api.handles.iter().enumerate() {
            if !types::is_pascal_identifier(&handle.name) {
                self.report.push(
                    format!("handles[{i}].name"),
                    format!("handle name {:?} must be PascalCase", handle.name),
                );
            }
            if !seen.insert(handle.name.as_str()) {
                self.report.push(
                    format!("handles[{i}].name"),
                    format!("duplicate handle name {:?}", handle.name),
                );
            }
        }
    }

    fn check_interfaces(&mut self) {
        let api = self.api;
        let mut seen = HashSet::new();
        for (i, iface) in api.interfaces.iter().enumerate() {
            let path = format!("interfaces[{i}]");
            if !seen.insert(iface.name.as_str()) {
                self.report.push(
                    format!("{path}.name"),
                    format!("duplicate interface name {:?}", iface.name),
                );
            }
            if iface.constructors.is_empty() && iface.methods.is_empty() {
                self.report.push(
                    path.clone(),
                    format!("interface {:?} must declare at least one constructor or method", iface.name),
                );
            }
            self.check_names(&path, iface);
            self.check_constructors(&path, iface);
            for (j, method) in iface.methods.iter().enumerate() {
                self.check_method(&format!("{path}.methods[{j}]"), method);
            }
        }
    }

    /// Constructor and method names share one namespace per interface, together with the
    /// synthetic destructor.
    fn check_names(&mut self, path: &str, iface: &InterfaceDef) {
        let mut seen: HashSet<&str> = HashSet::new();
        for (j, ctor) in iface.constructors.iter().enumerate() {
            if !seen.insert(ctor.name.as_str()) {
                self.report.push(
                    format!("{path}.constructors[{j}].name"),
                    format!("duplicate constructor name {:?} in interface {:?}", ctor.name, iface.name),
                );
            }
        }
        let destructor = iface.destructor().map(|d| d.name);
        for (j, method) in iface.methods.iter().enumerate() {
            if !seen.insert(method.name.as_str()) {
                self.report.push(
                    format!("{path}.methods[{j}].name"),
                    format!("method name {:?} collides with another name in interface {:?}", method.name, iface.name),
                );
            } else if destructor.as_deref() == Some(method.name.as_str()) {
                self.report.push(
                    format!("{path}.methods[{j}].name"),
                    format!("method name {:?} collides with the generated destructor", method.name),
                );
            }
        }
    }

    fn check_constructors(&mut self, path: &str, iface: &InterfaceDef) {
        let mut constructed: Option<&str> = None;
        for (j, ctor) in iface.constructors.iter().enumerate() {
            let ctor_path = format!("{path}.constructors[{j}]");
            if !naming::is_constructor_name(&ctor.name) {
                self.report.push(
                    format!("{ctor_path}.name"),
                    format!("constructor name {:?} must be 'create' or start with 'create_'", ctor.name),
                );
            }
            if ctor.error.is_none() {
                self.report
                    .push(format!("{ctor_path}.error"), "constructors must declare an error type");
            }
            match ctor.returns.as_ref().map(|r| (r, TypeRef::parse(&r.ty))) {
                None => self.report.push(format!("{ctor_path}.returns"), "constructors must return a handle"),
                Some((_, Some(TypeRef::Handle(handle)))) => {
                    if let Some(first) = constructed {
                        if first != handle {
                            self.report.push(
                                format!("{ctor_path}.returns.type"),
                                format!(
                                    "constructor returns handle {handle:?} but interface {:?} constructs {first:?}",
                                    iface.name
                                ),
                            );
                        }
                    } else {
                        constructed = Some(handle);
                    }
                }
                Some((r, _)) => self.report.push(
                    format!("{ctor_path}.returns.type"),
                    format!("constructors must return a handle, got {:?}", r.ty),
                ),
            }
            for (k, param) in ctor.parameters.iter().enumerate() {
                if matches!(TypeRef::parse(&param.ty), Some(TypeRef::Handle(_))) {
                    self.report.push(
                        format!("{ctor_path}.parameters[{k}].type"),
                        "constructors may not take handle parameters",
                    );
                }
            }
            self.check_method(&ctor_path, ctor);
        }
    }

    fn check_method(&mut self, path: &str, method: &MethodDef) {
        for (k, param) in method.parameters.iter().enumerate() {
            self.check_parameter(&format!("{path}.parameters[{k}]"), param);
        }
        if let Some(ret) = &method.returns {
            self.check_return(&format!("{path}.returns.type"), &ret.ty);
        }
        if let Some(err) = &method.error {
            self.check_error_type(&format!("{path}.error"), err);
        }
    }

    fn check_parameter(&mut self, path: &str, param: &ParameterDef) {
        let type_path = format!("{path}.type");
        let transfer_path = format!("{path}.transfer");
        if let Some(elem) = types::buffer_element(&param.ty) {
            let primitive = primitives::from_str(elem).filter(|p| primitives::info_for(*p).is_buffer_element());
            if primitive.is_none() {
                self.report.push(
                    type_path,
                    format!("buffer element type {elem:?} must be a numeric primitive"),
                );
            }
            if !matches!(param.transfer, Some(Transfer::Ref | Transfer::RefMut)) {
                self.report
                    .push(transfer_path, "buffer parameters must use 'ref' or 'ref_mut' transfer");
            }
            return;
        }
        match TypeRef::parse(&param.ty) {
            Some(TypeRef::Primitive(_)) => {}
            Some(TypeRef::String) => {
                if param.transfer.is_some_and(|t| t != Transfer::Ref) {
                    self.report
                        .push(transfer_path, "string parameters are always borrowed; transfer must be 'ref'");
                }
            }
            Some(TypeRef::Handle(handle)) => {
                self.check_handle_ref(&type_path, handle);
                if param.transfer.is_some_and(|t| t != Transfer::Value) {
                    self.report
                        .push(transfer_path, "handle parameters are copied; transfer must be 'value'");
                }
            }
            Some(TypeRef::Qualified(name)) => self.check_qualified(&type_path, name),
            Some(TypeRef::Buffer(_)) | None => {
                self.report.push(type_path, format!("unknown type {:?}", param.ty));
            }
        }
    }

    fn check_return(&mut self, path: &str, ty: &str) {
        if ty == "string" || types::buffer_element(ty).is_some() {
            self.report.push(
                path,
                format!("{ty:?} cannot be returned; return a FlatBuffers type instead"),
            );
            return;
        }
        match TypeRef::parse(ty) {
            Some(TypeRef::Primitive(_)) => {}
            Some(TypeRef::Handle(handle)) => self.check_handle_ref(path, handle),
            Some(TypeRef::Qualified(name)) => self.check_qualified(path, name),
            _ => self.report.push(path, format!("unknown return type {ty:?}")),
        }
    }

    fn check_handle_ref(&mut self, path: &str, handle: &str) {
        if !self.handles.contains(handle) {
            self.report
                .push(path, format!("handle {handle:?} is not declared in the handles section"));
        }
    }

    fn check_qualified(&mut self, path: &str, name: &str) {
        let Some(resolved) = self.resolved else { return };
        match resolved.get(name) {
            None => self
                .report
                .push(path, format!("FlatBuffers type {name:?} not found in schemas")),
            Some(info) if info.kind == TypeKind::Union => self.report.push(
                path,
                format!("union type {name:?} cannot cross the C ABI; wrap it in a table"),
            ),
            Some(_) => {}
        }
    }

    fn check_error_type(&mut self, path: &str, name: &str) {
        let Some(resolved) = self.resolved else { return };
        match resolved.get(name) {
            None => self
                .report
                .push(path, format!("error type {name:?} not found in schemas")),
            Some(info) if info.kind != TypeKind::Enum => self.report.push(
                path,
                format!("error type {name:?} must be an enum, got {}", info.kind),
            ),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::loader::load_str;
    use crate::frontend::resolver::parse_str;

    const TYPES: &str = r#"
namespace Common;
enum ErrorCode : int32 { Ok = 0, InvalidArgument = 1, InternalError = 4 }
table Info { name: string; }
union Any { Info }
"#;

    fn check(yaml_interfaces: &str) -> ValidationReport {
        let text = format!(
            "api:\n  name: test_api\n  version: 1.0.0\n  impl_lang: cpp\nflatbuffers: [types.fbs]\nhandles:\n  - name: Engine\n  - name: Scene\ninterfaces:\n{yaml_interfaces}"
        );
        let api = load_str(&text).unwrap();
        let resolved = parse_str(TYPES).unwrap();
        validate(&api, Some(&resolved))
    }

    #[test]
    fn valid_description_passes() {
        let report = check(
            r#"
  - name: lifecycle
    constructors:
      - name: create_engine
        returns: { type: "handle:Engine" }
        error: Common.ErrorCode
    methods:
      - name: info
        parameters:
          - { name: engine, type: "handle:Engine" }
        returns: { type: Common.Info }
"#,
        );
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn constructor_discipline_is_enforced() {
        let report = check(
            r#"
  - name: lifecycle
    constructors:
      - name: make_engine
        returns: { type: int32 }
      - name: create_scene
        parameters:
          - { name: engine, type: "handle:Engine" }
        returns: { type: "handle:Scene" }
        error: Common.ErrorCode
"#,
        );
        let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"interfaces[0].constructors[0].name"));
        assert!(paths.contains(&"interfaces[0].constructors[0].error"));
        assert!(paths.contains(&"interfaces[0].constructors[0].returns.type"));
        assert!(paths.contains(&"interfaces[0].constructors[1].parameters[0].type"));
    }

    #[test]
    fn mismatched_constructed_handles_are_reported() {
        let report = check(
            r#"
  - name: lifecycle
    constructors:
      - name: create_engine
        returns: { type: "handle:Engine" }
        error: Common.ErrorCode
      - name: create_scene
        returns: { type: "handle:Scene" }
        error: Common.ErrorCode
"#,
        );
        assert_eq!(report.len(), 1, "{report}");
        assert_eq!(report.errors[0].path, "interfaces[0].constructors[1].returns.type");
    }

    #[test]
    fn errors_accumulate_across_the_description() {
        let report = check(
            r#"
  - name: io
    methods:
      - name: upload
        parameters:
          - { name: data, type: "buffer<uint8>" }
          - { name: label, type: string, transfer: value }
          - { name: target, type: "handle:Missing" }
          - { name: any, type: Common.Any }
        error: Common.Info
      - name: upload
  - name: io
    methods:
      - name: ping
"#,
        );
        let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "interfaces[0].methods[1].name",
                "interfaces[0].methods[0].parameters[0].transfer",
                "interfaces[0].methods[0].parameters[1].transfer",
                "interfaces[0].methods[0].parameters[2].type",
                "interfaces[0].methods[0].parameters[3].type",
                "interfaces[0].methods[0].error",
                "interfaces[1].name",
            ]
        );
    }

    #[test]
    fn methods_may_not_shadow_the_destructor() {
        let report = check(
            r#"
  - name: lifecycle
    constructors:
      - name: create
        returns: { type: "handle:Engine" }
        error: Common.ErrorCode
    methods:
      - name: destroy_engine
        parameters:
          - { name: engine, type: "handle:Engine" }
"#,
        );
        assert_eq!(report.len(), 1, "{report}");
        assert!(report.errors[0].message.contains("destructor"));
    }

    #[test]
    fn empty_interfaces_are_rejected() {
        let report = check("  - name: nothing\n");
        assert_eq!(report.errors[0].path, "interfaces[0]");
    }

    #[test]
    fn type_checks_are_skipped_without_schemas() {
        let text = "api:\n  name: t\n  version: 1.0.0\n  impl_lang: c\nflatbuffers: [x.fbs]\ninterfaces:\n  - name: i\n    methods:\n      - name: m\n        returns: { type: Nope.Missing }\n        error: Nope.Err\n";
        let api = load_str(text).unwrap();
        assert!(validate(&api, None).is_valid());
    }
}
