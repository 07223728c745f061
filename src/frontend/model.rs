//! The API description IR.
//!
//! Built once by the loader, adjusted only by [`ApiDescription::apply_overrides`], then read-only for
//! the rest of the run. Emitters never mutate it.
//!
//! Besides the authored entities, the model derives two things every emitter relies on:
//! - the *constructed handle* of an interface (the handle its constructors return), and
//! - the synthetic destructor `destroy_<snake(H)>` owned by that interface.
//!
//! [`InterfaceDef::operations`] yields constructors, then the destructor, then methods; every
//! emitter walks interfaces in that order.

use std::borrow::Cow;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use xplatter_core::lang::{impl_langs, targets};
use xplatter_core::naming;
use xplatter_core::{ImplLangId, TargetId, Transfer, TypeRef};

/// Root of the IR.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiDescription {
    pub api: ApiMetadata,
    pub flatbuffers: Vec<String>,
    #[serde(default)]
    pub handles: Vec<HandleDef>,
    pub interfaces: Vec<InterfaceDef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiMetadata {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "impl_lang_serde")]
    pub impl_lang: ImplLangId,
    #[serde(default, with = "targets_serde", skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HandleDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InterfaceDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub constructors: Vec<MethodDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

/// A constructor or a method. Both share one shape in the description.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, with = "transfer_serde", skip_serializing_if = "Option::is_none")]
    pub transfer: Option<Transfer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReturnDef {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The four C ABI shapes of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodShape {
    InfallibleVoid,
    InfallibleValue,
    FallibleVoid,
    FallibleValue,
}

impl ApiDescription {
    /// Targets to generate for; all six when the description lists none.
    pub fn effective_targets(&self) -> Vec<TargetId> {
        if self.api.targets.is_empty() {
            targets::all()
        } else {
            self.api.targets.clone()
        }
    }

    pub fn has_target(&self, target: TargetId) -> bool {
        self.effective_targets().contains(&target)
    }

    /// Apply command-line overrides. This is the only mutation the IR sees after loading.
    pub fn apply_overrides(&mut self, impl_lang: Option<ImplLangId>, targets: Option<Vec<TargetId>>) {
        if let Some(lang) = impl_lang {
            self.api.impl_lang = lang;
        }
        if let Some(targets) = targets.filter(|t| !t.is_empty()) {
            self.api.targets = targets;
        }
    }

    pub fn handle(&self, name: &str) -> Option<&HandleDef> {
        self.handles.iter().find(|h| h.name == name)
    }

    /// The interface owning a handle's lifecycle: the first one whose constructors return it.
    pub fn handle_owner(&self, handle: &str) -> Option<&InterfaceDef> {
        self.interfaces
            .iter()
            .find(|iface| iface.constructed_handle() == Some(handle))
    }

    /// C ABI symbol of the destructor for `handle`, if some interface owns it.
    pub fn destructor_symbol(&self, handle: &str) -> Option<String> {
        self.handle_owner(handle)
            .map(|iface| naming::c_symbol(&self.api.name, &iface.name, &naming::destructor_name(handle)))
    }

    /// Distinct error types across constructors and methods, in first-use order.
    pub fn error_types(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for iface in &self.interfaces {
            for method in iface.constructors.iter().chain(iface.methods.iter()) {
                if let Some(err) = method.error.as_deref() {
                    if !out.contains(&err) {
                        out.push(err);
                    }
                }
            }
        }
        out
    }

    pub fn impl_lang_name(&self) -> &'static str {
        impl_langs::as_str(self.api.impl_lang)
    }
}

impl InterfaceDef {
    /// The handle returned by this interface's constructors (taken from the first one).
    pub fn constructed_handle(&self) -> Option<&str> {
        self.constructors
            .first()
            .and_then(|c| c.returns.as_ref())
            .and_then(|r| TypeRef::parse(&r.ty))
            .and_then(|t| t.handle_name())
    }

    /// The synthetic destructor for the constructed handle.
    pub fn destructor(&self) -> Option<MethodDef> {
        let handle = self.constructed_handle()?;
        Some(MethodDef {
            name: naming::destructor_name(handle),
            description: Some(format!("Destroy a {handle} created by this interface.")),
            parameters: vec![ParameterDef {
                name: naming::handle_to_snake(handle),
                ty: format!("handle:{handle}"),
                transfer: None,
                description: None,
            }],
            returns: None,
            error: None,
        })
    }

    /// Constructors, then the synthetic destructor, then methods.
    pub fn operations(&self) -> Vec<Operation<'_>> {
        let mut ops: Vec<Operation<'_>> = self
            .constructors
            .iter()
            .map(|m| Operation::new(self, OperationKind::Constructor, Cow::Borrowed(m)))
            .collect();
        if let Some(dtor) = self.destructor() {
            ops.push(Operation::new(self, OperationKind::Destructor, Cow::Owned(dtor)));
        }
        ops.extend(
            self.methods
                .iter()
                .map(|m| Operation::new(self, OperationKind::Method, Cow::Borrowed(m))),
        );
        ops
    }
}

impl MethodDef {
    pub fn is_fallible(&self) -> bool {
        self.error.is_some()
    }

    pub fn shape(&self) -> MethodShape {
        match (self.error.is_some(), self.returns.is_some()) {
            (false, false) => MethodShape::InfallibleVoid,
            (false, true) => MethodShape::InfallibleValue,
            (true, false) => MethodShape::FallibleVoid,
            (true, true) => MethodShape::FallibleValue,
        }
    }

    pub fn return_type(&self) -> Option<&str> {
        self.returns.as_ref().map(|r| r.ty.as_str())
    }

    /// Handle name of the first parameter, when it is handle-typed.
    pub fn leading_handle(&self) -> Option<&str> {
        self.parameters
            .first()
            .and_then(|p| TypeRef::parse(&p.ty))
            .and_then(|t| t.handle_name())
    }
}

impl ParameterDef {
    /// Transfer with the per-class default applied (`string` is always borrowed).
    pub fn effective_transfer(&self) -> Transfer {
        match (self.transfer, self.ty.as_str()) {
            (Some(t), _) => t,
            (None, "string") => Transfer::Ref,
            (None, _) => Transfer::Value,
        }
    }
}

/// Whether an operation was authored or synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Constructor,
    Destructor,
    Method,
}

/// One C ABI entry point of an interface.
#[derive(Debug, Clone)]
pub struct Operation<'a> {
    pub interface: &'a InterfaceDef,
    pub kind: OperationKind,
    pub method: Cow<'a, MethodDef>,
}

impl<'a> Operation<'a> {
    fn new(interface: &'a InterfaceDef, kind: OperationKind, method: Cow<'a, MethodDef>) -> Self {
        Self { interface, kind, method }
    }

    pub fn symbol(&self, api: &str) -> String {
        naming::c_symbol(api, &self.interface.name, &self.method.name)
    }

    /// `<Interface><Method>` in PascalCase, used for native wrapper names.
    pub fn pascal_name(&self) -> String {
        format!(
            "{}{}",
            naming::pascal_case(&self.interface.name),
            naming::pascal_case(&self.method.name)
        )
    }

    pub fn is_lifecycle(&self) -> bool {
        self.kind != OperationKind::Method
    }
}

impl Deref for Operation<'_> {
    type Target = MethodDef;

    fn deref(&self) -> &MethodDef {
        &self.method
    }
}

mod impl_lang_serde {
    use super::*;

    pub fn serialize<S: Serializer>(lang: &ImplLangId, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(impl_langs::as_str(*lang))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ImplLangId, D::Error> {
        let raw = String::deserialize(d)?;
        impl_langs::from_str(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown impl_lang '{raw}'")))
    }
}

mod targets_serde {
    use super::*;

    pub fn serialize<S: Serializer>(list: &[TargetId], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(list.iter().map(|t| targets::as_str(*t)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<TargetId>, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        raw.iter()
            .map(|name| {
                targets::from_str(name)
                    .ok_or_else(|| serde::de::Error::custom(format!("unknown target '{name}'")))
            })
            .collect()
    }
}

mod transfer_serde {
    use super::*;

    pub fn serialize<S: Serializer>(transfer: &Option<Transfer>, s: S) -> Result<S::Ok, S::Error> {
        match transfer {
            Some(t) => s.serialize_str(t.as_str()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Transfer>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|name| {
            Transfer::from_str(&name)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown transfer '{name}'")))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, ret: Option<&str>, error: Option<&str>) -> MethodDef {
        MethodDef {
            name: name.to_string(),
            description: None,
            parameters: Vec::new(),
            returns: ret.map(|t| ReturnDef {
                ty: t.to_string(),
                description: None,
            }),
            error: error.map(str::to_string),
        }
    }

    fn lifecycle() -> InterfaceDef {
        InterfaceDef {
            name: "lifecycle".to_string(),
            description: None,
            constructors: vec![method("create_engine", Some("handle:Engine"), Some("Common.ErrorCode"))],
            methods: vec![method("tick", None, None)],
        }
    }

    #[test]
    fn operations_follow_lifecycle_order() {
        let iface = lifecycle();
        let ops = iface.operations();
        let names: Vec<&str> = ops.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, ["create_engine", "destroy_engine", "tick"]);
        assert_eq!(ops[1].kind, OperationKind::Destructor);
        assert_eq!(ops[1].shape(), MethodShape::InfallibleVoid);
        assert_eq!(ops[1].parameters[0].name, "engine");
        assert_eq!(ops[1].parameters[0].ty, "handle:Engine");
        assert_eq!(ops[0].symbol("test_api"), "test_api_lifecycle_create_engine");
    }

    #[test]
    fn interface_without_constructors_has_no_destructor() {
        let mut iface = lifecycle();
        iface.constructors.clear();
        assert!(iface.destructor().is_none());
        assert_eq!(iface.operations().len(), 1);
    }

    #[test]
    fn shapes_cover_the_cross_product() {
        assert_eq!(method("a", None, None).shape(), MethodShape::InfallibleVoid);
        assert_eq!(method("a", Some("int32"), None).shape(), MethodShape::InfallibleValue);
        assert_eq!(method("a", None, Some("E")).shape(), MethodShape::FallibleVoid);
        assert_eq!(method("a", Some("int32"), Some("E")).shape(), MethodShape::FallibleValue);
    }

    #[test]
    fn string_parameters_default_to_ref() {
        let p = ParameterDef {
            name: "name".to_string(),
            ty: "string".to_string(),
            transfer: None,
            description: None,
        };
        assert_eq!(p.effective_transfer(), Transfer::Ref);
    }
}
