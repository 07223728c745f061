//! Go implementation emitter (cgo build).
//!
//! The package is always `main`: it is built with cgo as a shared library, or for `wasip1` by the
//! companion `impl_go_wasm` emitter. Files both builds compile (`<api>_interface.go`,
//! `<api>_types.go`) never import `C`. The cgo shim declares the C types in its own preamble
//! instead of including the header, because `//export` writes prototypes that would clash with it.
//!
//! Handles are keys into a `sync.Map`. A constructor stores a fresh `<Handle>Impl`, the destructor
//! deletes it, and a method whose first parameter is a handle looks the value up and calls through
//! the Go interface. `<Handle>Impl` implements every interface with a method on that handle, so the
//! lookup succeeds whichever interface constructed it. Methods without a leading handle are stubs.

use xplatter_core::lang::primitives::{self, PrimitiveId};
use xplatter_core::naming;
use xplatter_core::{Transfer, TypeRef};

use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::ctypes::{self, OUT_RESULT};
use crate::backend::errors::EmitError;
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;
use crate::frontend::model::{InterfaceDef, MethodDef, MethodShape, Operation, OperationKind, ParameterDef};
use crate::frontend::resolver::{FieldDef, FieldType, TypeInfo, TypeKind};

pub const NAME: &str = "impl_go";

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for", "func", "go",
    "goto", "if", "import", "interface", "map", "package", "range", "return", "select", "struct", "switch", "type",
    "var",
];

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    let api = ctx.api_name();
    let go = GoGen::new(ctx, NAME);
    let mut out = vec![
        Artifact::generated(format!("{api}_interface.go"), go.interface_file()?),
        Artifact::generated(format!("{api}_cgo.go"), Cgo { go: &go }.file()?),
    ];
    if !ctx.types.is_empty() {
        out.push(Artifact::generated(format!("{api}_types.go"), go.types_file()));
    }
    out.push(Artifact::scaffold(format!("{api}_impl.go"), go.impl_file()?).in_project());
    out.push(Artifact::scaffold("go.mod", go_mod(ctx)).in_project());
    out.push(Artifact::scaffold(".gitignore", gitignore(ctx)).in_project());
    Ok(out)
}

/// A Go identifier for a user-supplied name.
pub(super) fn go_ident(name: &str) -> String {
    if GO_KEYWORDS.contains(&name) { format!("{name}_") } else { name.to_string() }
}

/// cgo exposes a C field that is a Go keyword with a leading underscore.
pub(super) fn cgo_field(name: &str) -> String {
    if GO_KEYWORDS.contains(&name) { format!("_{name}") } else { name.to_string() }
}

pub(super) fn go_prim(p: PrimitiveId) -> &'static str {
    primitives::info_for(p).go
}

/// A value moving between C memory and Go, as a record field, vector element or result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum GoValue {
    Prim(PrimitiveId),
    String,
    Enum { qualified: String, base: PrimitiveId },
    Record(String),
}

impl GoValue {
    pub(super) fn go_type(&self) -> String {
        match self {
            GoValue::Prim(p) => go_prim(*p).to_string(),
            GoValue::String => "string".to_string(),
            GoValue::Enum { qualified, .. } | GoValue::Record(qualified) => naming::flat_type_name(qualified),
        }
    }

    /// cgo spelling of the C storage.
    fn cgo_type(&self) -> String {
        match self {
            GoValue::Prim(p) => primitives::info_for(*p).cgo.to_string(),
            GoValue::String => "*C.char".to_string(),
            GoValue::Enum { qualified, .. } | GoValue::Record(qualified) => format!("C.{}", naming::c_type_name(qualified)),
        }
    }
}

/// Shape of a record field on the Go side. Fields naming neither an enum nor a record stay opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum GoField {
    Scalar(GoValue),
    Vector(GoValue),
    Opaque,
}

/// Shared Go vocabulary of the cgo and wasm emitters.
pub(super) struct GoGen<'a> {
    pub ctx: &'a EmitContext<'a>,
    pub emitter: &'static str,
}

impl<'a> GoGen<'a> {
    pub(super) fn new(ctx: &'a EmitContext<'a>, emitter: &'static str) -> Self {
        Self { ctx, emitter }
    }

    pub(super) fn named_value(&self, qualified: &str) -> Option<GoValue> {
        let info = self.ctx.types.get(qualified)?;
        if info.is_enum() {
            Some(GoValue::Enum {
                qualified: qualified.to_string(),
                base: info.abi_scalar(),
            })
        } else if info.is_record() {
            Some(GoValue::Record(qualified.to_string()))
        } else {
            None
        }
    }

    fn scalar_value(&self, ty: &FieldType) -> Option<GoValue> {
        match ty {
            FieldType::Primitive(p) => Some(GoValue::Prim(*p)),
            FieldType::String => Some(GoValue::String),
            FieldType::Named(name) => self.named_value(name),
            FieldType::Vector(_) => None,
        }
    }

    pub(super) fn field(&self, ty: &FieldType) -> GoField {
        match ty {
            FieldType::Vector(inner) => self.scalar_value(inner).map_or(GoField::Opaque, GoField::Vector),
            other => self.scalar_value(other).map_or(GoField::Opaque, GoField::Scalar),
        }
    }

    /// Value class of a parameter or return type string.
    pub(super) fn type_value(&self, ty: &str) -> Result<Option<GoValue>, EmitError> {
        Ok(match self.ctx.classify(self.emitter, ty)? {
            TypeRef::Primitive(p) => Some(GoValue::Prim(p)),
            TypeRef::String => Some(GoValue::String),
            TypeRef::Qualified(q) => Some(
                self.named_value(q)
                    .ok_or_else(|| EmitError::missing_type(self.emitter, q))?,
            ),
            TypeRef::Handle(_) | TypeRef::Buffer(_) => None,
        })
    }

    pub(super) fn arg_name(p: &ParameterDef) -> String {
        go_ident(&naming::camel_case(&p.name))
    }

    pub(super) fn param_type(&self, p: &ParameterDef) -> Result<String, EmitError> {
        Ok(match self.ctx.classify(self.emitter, &p.ty)? {
            TypeRef::String => "string".to_string(),
            TypeRef::Buffer(e) => format!("[]{}", go_prim(e)),
            TypeRef::Handle(_) => "uintptr".to_string(),
            TypeRef::Primitive(prim) => go_prim(prim).to_string(),
            TypeRef::Qualified(q) => {
                let flat = naming::flat_type_name(q);
                if p.effective_transfer() == Transfer::RefMut { format!("*{flat}") } else { flat }
            }
        })
    }

    pub(super) fn return_type(&self, ty: &str) -> Result<String, EmitError> {
        match self.ctx.classify(self.emitter, ty)? {
            TypeRef::Handle(_) => Ok("uintptr".to_string()),
            TypeRef::Primitive(p) => Ok(go_prim(p).to_string()),
            TypeRef::Qualified(q) => Ok(naming::flat_type_name(q)),
            TypeRef::String | TypeRef::Buffer(_) => {
                Err(EmitError::unsupported(self.emitter, format!("{ty} cannot be returned by value")))
            }
        }
    }

    pub(super) fn zero(&self, ty: &str) -> Result<String, EmitError> {
        Ok(match self.ctx.classify(self.emitter, ty)? {
            TypeRef::Primitive(PrimitiveId::Bool) => "false".to_string(),
            TypeRef::Qualified(q) if !self.ctx.is_enum(q) => format!("{}{{}}", naming::flat_type_name(q)),
            _ => "0".to_string(),
        })
    }

    /// Methods dispatched through the Go interface: those whose first parameter is a handle.
    pub(super) fn dispatched(iface: &InterfaceDef) -> Vec<&MethodDef> {
        iface.methods.iter().filter(|m| m.leading_handle().is_some()).collect()
    }

    pub(super) fn interface_name(iface: &InterfaceDef) -> String {
        naming::pascal_case(&iface.name)
    }

    /// The value stored behind every handle of type `handle`.
    pub(super) fn handle_struct(handle: &str) -> String {
        format!("{handle}Impl")
    }

    /// Interfaces with at least one method on `handle`, which `<Handle>Impl` must satisfy.
    pub(super) fn interfaces_on(&self, handle: &str) -> Vec<&'a InterfaceDef> {
        self.ctx
            .api
            .interfaces
            .iter()
            .filter(|iface| Self::dispatched(iface).iter().any(|m| m.leading_handle() == Some(handle)))
            .collect()
    }

    /// `Name(params) results` as declared in the Go interface; the leading handle is dropped.
    pub(super) fn method_signature(&self, m: &MethodDef) -> Result<String, EmitError> {
        let mut params = Vec::new();
        for p in m.parameters.iter().skip(1) {
            params.push(format!("{} {}", Self::arg_name(p), self.param_type(p)?));
        }
        let results = match (m.shape(), m.return_type()) {
            (MethodShape::FallibleValue, Some(ty)) => format!(" ({}, error)", self.return_type(ty)?),
            (MethodShape::FallibleVoid, _) => " error".to_string(),
            (MethodShape::InfallibleValue, Some(ty)) => format!(" {}", self.return_type(ty)?),
            _ => String::new(),
        };
        Ok(format!("{}({}){results}", naming::pascal_case(&m.name), params.join(", ")))
    }

    fn header(&self, w: &mut CodeWriter) {
        w.write(&banner::generated(CommentStyle::Slash, &self.ctx.source_name()));
    }

    pub(super) fn interface_file(&self) -> Result<String, EmitError> {
        let mut w = CodeWriter::go();
        self.header(&mut w);
        w.line("package main");
        for iface in &self.ctx.api.interfaces {
            let methods = Self::dispatched(iface);
            if methods.is_empty() {
                continue;
            }
            let name = Self::interface_name(iface);
            let mut sigs = Vec::with_capacity(methods.len());
            for m in &methods {
                sigs.push(self.method_signature(m)?);
            }
            let mut owners: Vec<String> = Vec::new();
            for owner in methods.iter().filter_map(|m| m.leading_handle()).map(Self::handle_struct) {
                if !owners.contains(&owner) {
                    owners.push(owner);
                }
            }
            w.blank_line();
            w.comment(&format!("{name} is implemented by {}.", owners.join(", ")));
            if let Some(desc) = &iface.description {
                w.comment(desc);
            }
            w.block(&format!("type {name} interface"), |w| w.lines(&sigs));
        }
        Ok(w.finish())
    }

    pub(super) fn types_file(&self) -> String {
        let mut w = CodeWriter::go();
        self.header(&mut w);
        w.line("package main");
        let errors = self.ctx.api.error_types();
        let has_error_enum = self.ctx.types.of_kind(TypeKind::Enum).any(|(name, _)| errors.contains(&name));
        if has_error_enum {
            w.blank_line();
            w.line("import \"strconv\"");
        }
        for (name, info) in self.ctx.types.of_kind(TypeKind::Enum) {
            self.write_enum(&mut w, name, info, errors.contains(&name));
        }
        for kind in [TypeKind::Struct, TypeKind::Table] {
            for (name, info) in self.ctx.types.of_kind(kind) {
                self.write_record(&mut w, name, info);
            }
        }
        w.finish()
    }

    fn write_enum(&self, w: &mut CodeWriter, name: &str, info: &TypeInfo, is_error: bool) {
        let flat = naming::flat_type_name(name);
        w.blank_line();
        w.comment(&format!("{flat} mirrors the {name} enum."));
        w.line(&format!("type {flat} {}", go_prim(info.enum_base())));
        if !info.enum_values.is_empty() {
            let width = info.enum_values.iter().map(|v| flat.len() + v.name.len()).max().unwrap_or(0);
            w.blank_line();
            w.line("const (");
            w.indented(|w| {
                for v in &info.enum_values {
                    let constant = format!("{flat}{}", v.name);
                    w.line(&format!("{constant:<width$} {flat} = {}", v.value));
                }
            });
            w.line(")");
        }
        if !is_error {
            return;
        }
        w.blank_line();
        w.comment(&format!("Error lets implementations return a {flat} as an error."));
        w.block(&format!("func (e {flat}) Error() string"), |w| {
            let mut seen = Vec::new();
            w.line("switch e {");
            for v in &info.enum_values {
                if seen.contains(&v.value) {
                    continue;
                }
                seen.push(v.value);
                w.line(&format!("case {flat}{}:", v.name));
                w.indented(|w| w.line(&format!("return \"{}\"", v.name)));
            }
            w.line("}");
            w.line(&format!("return \"{flat}(\" + strconv.Itoa(int(e)) + \")\""));
        });
        w.blank_line();
        w.comment("Code is the C ABI discriminant.");
        w.block(&format!("func (e {flat}) Code() int32"), |w| w.line("return int32(e)"));
    }

    fn write_record(&self, w: &mut CodeWriter, name: &str, info: &TypeInfo) {
        let flat = naming::flat_type_name(name);
        let fields: Vec<(String, String)> = info
            .fields
            .iter()
            .filter_map(|f| {
                let ty = match self.field(&f.ty) {
                    GoField::Scalar(v) => v.go_type(),
                    GoField::Vector(v) => format!("[]{}", v.go_type()),
                    GoField::Opaque => return None,
                };
                Some((naming::pascal_case(&f.name), ty))
            })
            .collect();
        let width = fields.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
        w.blank_line();
        w.comment(&format!("{flat} mirrors the {name} {}.", info.kind));
        w.block(&format!("type {flat} struct"), |w| {
            for (field, ty) in &fields {
                w.line(&format!("{field:<width$} {ty}"));
            }
        });
    }

    pub(super) fn impl_file(&self) -> Result<String, EmitError> {
        let mut w = CodeWriter::go();
        w.write(&banner::scaffold(CommentStyle::Slash, &self.ctx.source_name()));
        w.line("package main");
        for handle in &self.ctx.api.handles {
            let strukt = Self::handle_struct(&handle.name);
            let ifaces = self.interfaces_on(&handle.name);
            w.blank_line();
            if ifaces.is_empty() {
                w.comment(&format!("{strukt} is the value behind every {} handle.", handle.name));
            } else {
                let names: Vec<String> = ifaces.iter().map(|i| Self::interface_name(i)).collect();
                w.comment(&format!(
                    "{strukt} is the value behind every {} handle and implements {}.",
                    handle.name,
                    names.join(", ")
                ));
            }
            w.line(&format!("type {strukt} struct{{}}"));
            if !ifaces.is_empty() {
                w.blank_line();
                for iface in &ifaces {
                    w.line(&format!("var _ {} = (*{strukt})(nil)", Self::interface_name(iface)));
                }
            }
            let receiver = naming::lower_first(&strukt).chars().next().unwrap_or('s');
            for m in ifaces.iter().flat_map(|iface| Self::dispatched(iface)) {
                let sig = self.method_signature(m)?;
                let ret = match (m.shape(), m.return_type()) {
                    (MethodShape::FallibleValue, Some(ty)) => Some(format!("return {}, nil", self.zero(ty)?)),
                    (MethodShape::FallibleVoid, _) => Some("return nil".to_string()),
                    (MethodShape::InfallibleValue, Some(ty)) => Some(format!("return {}", self.zero(ty)?)),
                    _ => None,
                };
                w.blank_line();
                w.block(&format!("func ({receiver} *{strukt}) {sig}"), |w| {
                    w.comment("TODO: implement");
                    if let Some(ret) = &ret {
                        w.line(ret);
                    }
                });
            }
        }
        w.blank_line();
        w.comment("main is required by -buildmode=c-shared and wasip1 builds.");
        w.line("func main() {}");
        Ok(w.finish())
    }

    /// The `<Handle>Impl` stored behind the handle constructor `op` returns.
    pub(super) fn constructed_struct(&self, op: &Operation<'_>) -> Result<String, EmitError> {
        op.return_type()
            .and_then(TypeRef::parse)
            .and_then(|t| t.handle_name())
            .map(Self::handle_struct)
            .ok_or_else(|| EmitError::internal(self.emitter, format!("constructor {} returns no handle", op.name)))
    }

    /// Numeric code reported when a dispatched method cannot reach its implementation.
    pub(super) fn failure_code(&self, m: &MethodDef) -> Result<i64, EmitError> {
        match m.error.as_deref() {
            Some(err) => Ok(self.ctx.failure_value(self.emitter, err)?.value),
            None => Ok(0),
        }
    }
}

/// The cgo shim.
struct Cgo<'g, 'a> {
    go: &'g GoGen<'a>,
}

impl Cgo<'_, '_> {
    fn ctx(&self) -> &EmitContext<'_> {
        self.go.ctx
    }

    fn file(&self) -> Result<String, EmitError> {
        let mut w = CodeWriter::go();
        self.go.header(&mut w);
        w.line("//go:build !wasip1");
        w.blank_line();
        w.line("package main");
        w.blank_line();

        let mut preamble = CodeWriter::new();
        preamble.lines(["#include <stdint.h>", "#include <stdbool.h>", "#include <stdlib.h>", ""]);
        ctypes::write_c_typedefs(self.ctx(), &mut preamble);
        w.line("/*");
        w.write(preamble.finish().trim_end());
        w.blank_line();
        w.line("*/");
        w.line("import \"C\"");
        w.blank_line();
        w.line("import (");
        w.indented(|w| w.lines(["\"errors\"", "\"sync\"", "\"sync/atomic\"", "\"unsafe\""]));
        w.line(")");
        w.blank_line();
        write_cgo_helpers(&mut w);

        for kind in [TypeKind::Struct, TypeKind::Table] {
            for (name, info) in self.ctx().types.of_kind(kind) {
                self.write_converters(&mut w, name, info);
            }
        }

        for iface in &self.ctx().api.interfaces {
            w.line(&format!("/* {} */", iface.name));
            w.blank_line();
            for op in iface.operations() {
                self.write_export(&mut w, &op)?;
                w.blank_line();
            }
        }
        Ok(w.finish())
    }

    /// Go expression reading C storage `expr` as `value`.
    fn from_c(value: &GoValue, expr: &str) -> String {
        match value {
            GoValue::Prim(p) => format!("{}({expr})", go_prim(*p)),
            GoValue::String => format!("C.GoString({expr})"),
            GoValue::Enum { .. } => format!("{}({expr})", value.go_type()),
            GoValue::Record(_) => format!("_fromC{}(&{expr})", value.go_type()),
        }
    }

    /// Statement storing Go expression `src` into C storage `dst`.
    fn to_c(value: &GoValue, dst: &str, src: &str) -> String {
        match value {
            GoValue::String => format!("{dst} = _retainString(key, {src})"),
            GoValue::Record(_) => format!("_toC{}({src}, &{dst}, key)", value.go_type()),
            _ => format!("{dst} = {}({src})", value.cgo_type()),
        }
    }

    fn write_converters(&self, w: &mut CodeWriter, name: &str, info: &TypeInfo) {
        let flat = naming::flat_type_name(name);
        let c_ty = format!("C.{}", naming::c_type_name(name));
        let fields: Vec<(&FieldDef, GoField)> = info.fields.iter().map(|f| (f, self.go.field(&f.ty))).collect();

        w.block(&format!("func _fromC{flat}(c *{c_ty}) {flat}"), |w| {
            w.line(&format!("var g {flat}"));
            for (f, kind) in &fields {
                let go_name = naming::pascal_case(&f.name);
                let c_name = cgo_field(&f.name);
                match kind {
                    GoField::Scalar(v) => w.line(&format!("g.{go_name} = {}", Self::from_c(v, &format!("c.{c_name}")))),
                    GoField::Vector(v) => {
                        let count = format!("c.{}_count", f.name);
                        w.block(&format!("if c.{c_name} != nil && {count} > 0"), |w| {
                            w.line(&format!("src := unsafe.Slice(c.{c_name}, int({count}))"));
                            w.line(&format!("g.{go_name} = make([]{}, len(src))", v.go_type()));
                            w.block("for i := range src", |w| {
                                w.line(&format!("g.{go_name}[i] = {}", Self::from_c(v, "src[i]")));
                            });
                        });
                    }
                    GoField::Opaque => {}
                }
            }
            w.line("return g");
        });
        w.blank_line();

        w.block(&format!("func _toC{flat}(g {flat}, c *{c_ty}, key uintptr)"), |w| {
            for (f, kind) in &fields {
                let go_name = naming::pascal_case(&f.name);
                let c_name = cgo_field(&f.name);
                match kind {
                    GoField::Scalar(v) => w.line(&Self::to_c(v, &format!("c.{c_name}"), &format!("g.{go_name}"))),
                    GoField::Vector(v) => {
                        w.block(&format!("if n := len(g.{go_name}); n > 0"), |w| {
                            w.line(&format!(
                                "dst := unsafe.Slice((*{})(_retainArray(key, n, unsafe.Sizeof(*c.{c_name}))), n)",
                                v.cgo_type()
                            ));
                            w.block(&format!("for i, v := range g.{go_name}"), |w| {
                                w.line(&Self::to_c(v, "dst[i]", "v"));
                            });
                            w.line(&format!("c.{c_name} = &dst[0]"));
                            w.line(&format!("c.{}_count = C.uint32_t(n)", f.name));
                        });
                    }
                    GoField::Opaque => {}
                }
            }
        });
        w.blank_line();
    }

    fn cgo_params(&self, p: &ParameterDef) -> Result<Vec<String>, EmitError> {
        let name = go_ident(&p.name);
        Ok(match self.ctx().classify(NAME, &p.ty)? {
            TypeRef::String => vec![format!("{name} *C.char")],
            TypeRef::Buffer(e) => vec![
                format!("{name} *{}", primitives::info_for(e).cgo),
                format!("{}_len C.uint32_t", p.name),
            ],
            TypeRef::Handle(h) => vec![format!("{name} C.{}", naming::handle_typedef(h))],
            TypeRef::Primitive(prim) => vec![format!("{name} {}", primitives::info_for(prim).cgo)],
            TypeRef::Qualified(q) => {
                let c = naming::c_type_name(q);
                match p.effective_transfer() {
                    Transfer::Value => vec![format!("{name} C.{c}")],
                    Transfer::Ref | Transfer::RefMut => vec![format!("{name} *C.{c}")],
                }
            }
        })
    }

    /// cgo spelling of a value type.
    fn cgo_value(&self, ty: &str) -> Result<String, EmitError> {
        Ok(format!("C.{}", ctypes::c_value_type(NAME, ty)?))
    }

    fn c_zero(&self, ty: &str) -> Result<String, EmitError> {
        Ok(match self.ctx().classify(NAME, ty)? {
            TypeRef::Handle(_) => "nil".to_string(),
            TypeRef::Primitive(PrimitiveId::Bool) => "false".to_string(),
            TypeRef::Qualified(q) if !self.ctx().is_enum(q) => format!("C.{}{{}}", naming::c_type_name(q)),
            _ => "0".to_string(),
        })
    }

    fn write_export(&self, w: &mut CodeWriter, op: &Operation<'_>) -> Result<(), EmitError> {
        let symbol = op.symbol(self.ctx().api_name());
        let mut params = Vec::new();
        for p in &op.parameters {
            params.extend(self.cgo_params(p)?);
        }
        let ret = match (op.shape(), op.return_type()) {
            (MethodShape::FallibleValue, Some(ty)) => {
                params.push(format!("{OUT_RESULT} *{}", self.cgo_value(ty)?));
                " C.int32_t".to_string()
            }
            (MethodShape::FallibleVoid, _) => " C.int32_t".to_string(),
            (MethodShape::InfallibleValue, Some(ty)) => format!(" {}", self.cgo_value(ty)?),
            _ => String::new(),
        };
        let body = match op.kind {
            OperationKind::Constructor => self.constructor_body(op)?,
            OperationKind::Destructor => self.destructor_body(op),
            OperationKind::Method if op.leading_handle().is_some() => self.dispatch_body(op)?,
            OperationKind::Method => self.stub_body(op)?,
        };
        w.line(&format!("//export {symbol}"));
        w.block(&format!("func {symbol}({}){ret}", params.join(", ")), |w| w.lines(&body));
        Ok(())
    }

    fn constructor_body(&self, op: &Operation<'_>) -> Result<Vec<String>, EmitError> {
        let handle = op
            .return_type()
            .and_then(TypeRef::parse)
            .and_then(|t| t.handle_name())
            .ok_or_else(|| EmitError::internal(NAME, format!("constructor {} returns no handle", op.name)))?;
        let typedef = naming::handle_typedef(handle);
        let mut body = vec![format!("key := _allocHandle(&{}{{}})", self.go.constructed_struct(op)?)];
        if op.shape() == MethodShape::FallibleValue {
            body.push(format!("*{OUT_RESULT} = C.{typedef}(unsafe.Pointer(key))"));
            body.push("return 0".to_string());
        } else {
            body.push(format!("return C.{typedef}(unsafe.Pointer(key))"));
        }
        Ok(body)
    }

    fn destructor_body(&self, op: &Operation<'_>) -> Vec<String> {
        let handle = op.parameters.first().map(|p| go_ident(&p.name)).unwrap_or_default();
        vec![format!("_freeHandle(uintptr(unsafe.Pointer({handle})))")]
    }

    /// `return ...` for the early exits of `op`.
    fn bail(&self, op: &Operation<'_>) -> Result<String, EmitError> {
        Ok(match (op.shape(), op.return_type()) {
            (MethodShape::FallibleValue | MethodShape::FallibleVoid, _) => {
                format!("return C.int32_t({})", self.go.failure_code(op)?)
            }
            (MethodShape::InfallibleValue, Some(ty)) => format!("return {}", self.c_zero(ty)?),
            _ => "return".to_string(),
        })
    }

    fn stub_body(&self, op: &Operation<'_>) -> Result<Vec<String>, EmitError> {
        let mut body = vec![format!("// TODO: implement {}; no handle selects an implementation.", op.name)];
        match (op.shape(), op.return_type()) {
            (MethodShape::FallibleValue | MethodShape::FallibleVoid, _) => body.push("return 0".to_string()),
            (MethodShape::InfallibleValue, Some(ty)) => body.push(format!("return {}", self.c_zero(ty)?)),
            _ => {}
        }
        Ok(body)
    }

    fn dispatch_body(&self, op: &Operation<'_>) -> Result<Vec<String>, EmitError> {
        let ctx = self.ctx();
        let handle_param = op
            .parameters
            .first()
            .map(|p| go_ident(&p.name))
            .ok_or_else(|| EmitError::internal(NAME, format!("{} has no leading handle", op.name)))?;
        let bail = self.bail(op)?;
        let mut body = vec![
            format!("key := uintptr(unsafe.Pointer({handle_param}))"),
            format!("impl, ok := _lookup(key).({})", GoGen::interface_name(op.interface)),
            "if !ok {".to_string(),
            format!("\t{bail}"),
            "}".to_string(),
        ];

        let returns_record = op.return_type().is_some_and(|ty| crate::backend::layout::is_record_type(ctx.types, ty));
        let mut marshals_out = returns_record;
        let mut args = Vec::new();
        let mut writebacks = Vec::new();
        for p in op.parameters.iter().skip(1) {
            let name = go_ident(&p.name);
            let arg = match ctx.classify(NAME, &p.ty)? {
                TypeRef::String => format!("C.GoString({name})"),
                TypeRef::Buffer(e) => format!(
                    "unsafe.Slice((*{})(unsafe.Pointer({name})), int({}_len))",
                    go_prim(e),
                    p.name
                ),
                TypeRef::Handle(_) => format!("uintptr(unsafe.Pointer({name}))"),
                TypeRef::Primitive(prim) => format!("{}({name})", go_prim(prim)),
                TypeRef::Qualified(q) => {
                    let value = self
                        .go
                        .named_value(q)
                        .ok_or_else(|| EmitError::missing_type(NAME, q))?;
                    match p.effective_transfer() {
                        Transfer::Value => Self::from_c(&value, &name),
                        Transfer::Ref => match value {
                            GoValue::Record(_) => format!("_fromC{}({name})", value.go_type()),
                            _ => Self::from_c(&value, &format!("*{name}")),
                        },
                        Transfer::RefMut => {
                            let local = format!("{}Go", GoGen::arg_name(p));
                            let flat = value.go_type();
                            if matches!(value, GoValue::Record(_)) {
                                body.push(format!("{local} := _fromC{flat}({name})"));
                                writebacks.push(format!("_toC{flat}({local}, {name}, key)"));
                                marshals_out = true;
                            } else {
                                body.push(format!("{local} := {flat}(*{name})"));
                                writebacks.push(format!("*{name} = {}({local})", value.cgo_type()));
                            }
                            format!("&{local}")
                        }
                    }
                }
            };
            args.push(arg);
        }
        if marshals_out {
            body.insert(5, "_release(key)".to_string());
        }

        let call = format!("impl.{}({})", naming::pascal_case(&op.name), args.join(", "));
        let fallback = self.go.failure_code(op)?;
        match (op.shape(), op.return_type()) {
            (MethodShape::FallibleValue, Some(ty)) => {
                body.push(format!("result, err := {call}"));
                body.extend(writebacks);
                body.push("if err != nil {".to_string());
                body.push(format!("\treturn _errorCode(err, {fallback})"));
                body.push("}".to_string());
                body.extend(self.store_result(ty)?);
                body.push("return 0".to_string());
            }
            (MethodShape::FallibleVoid, _) => {
                body.push(format!("err := {call}"));
                body.extend(writebacks);
                body.push("if err != nil {".to_string());
                body.push(format!("\treturn _errorCode(err, {fallback})"));
                body.push("}".to_string());
                body.push("return 0".to_string());
            }
            (MethodShape::InfallibleValue, Some(ty)) => {
                body.push(format!("result := {call}"));
                body.extend(writebacks);
                body.extend(self.return_result(ty)?);
            }
            _ => {
                body.push(call);
                body.extend(writebacks);
            }
        }
        Ok(body)
    }

    fn store_result(&self, ty: &str) -> Result<Vec<String>, EmitError> {
        let c = self.cgo_value(ty)?;
        Ok(match self.ctx().classify(NAME, ty)? {
            TypeRef::Handle(_) => vec![format!("*{OUT_RESULT} = {c}(unsafe.Pointer(result))")],
            TypeRef::Qualified(q) if !self.ctx().is_enum(q) => {
                vec![format!("_toC{}(result, {OUT_RESULT}, key)", naming::flat_type_name(q))]
            }
            _ => vec![format!("*{OUT_RESULT} = {c}(result)")],
        })
    }

    fn return_result(&self, ty: &str) -> Result<Vec<String>, EmitError> {
        let c = self.cgo_value(ty)?;
        Ok(match self.ctx().classify(NAME, ty)? {
            TypeRef::Handle(_) => vec![format!("return {c}(unsafe.Pointer(result))")],
            TypeRef::Qualified(q) if !self.ctx().is_enum(q) => vec![
                format!("var out {c}"),
                format!("_toC{}(result, &out, key)", naming::flat_type_name(q)),
                "return out".to_string(),
            ],
            _ => vec![format!("return {c}(result)")],
        })
    }
}

fn write_cgo_helpers(w: &mut CodeWriter) {
    w.comment("Handles are keys into _handles; C only ever sees the key.");
    w.line("var (");
    w.indented(|w| w.lines(["_handles    sync.Map", "_nextHandle atomic.Uintptr"]));
    w.line(")");
    w.blank_line();
    w.block("func _allocHandle(impl any) uintptr", |w| {
        w.lines(["key := _nextHandle.Add(1)", "_handles.Store(key, impl)", "return key"]);
    });
    w.blank_line();
    w.block("func _lookup(key uintptr) any", |w| {
        w.lines(["impl, _ := _handles.Load(key)", "return impl"]);
    });
    w.blank_line();
    w.block("func _freeHandle(key uintptr)", |w| {
        w.lines(["_handles.Delete(key)", "_release(key)"]);
    });
    w.blank_line();
    w.comment("Memory handed to C in results stays valid until the next call on the same handle");
    w.comment("or until the handle is destroyed.");
    w.line("var (");
    w.indented(|w| w.lines(["_retainMu sync.Mutex", "_retained = map[uintptr][]unsafe.Pointer{}"]));
    w.line(")");
    w.blank_line();
    w.block("func _retain(key uintptr, p unsafe.Pointer) unsafe.Pointer", |w| {
        w.lines([
            "_retainMu.Lock()",
            "defer _retainMu.Unlock()",
            "_retained[key] = append(_retained[key], p)",
            "return p",
        ]);
    });
    w.blank_line();
    w.block("func _release(key uintptr)", |w| {
        w.lines(["_retainMu.Lock()", "ptrs := _retained[key]", "delete(_retained, key)", "_retainMu.Unlock()"]);
        w.block("for _, p := range ptrs", |w| w.line("C.free(p)"));
    });
    w.blank_line();
    w.block("func _retainString(key uintptr, s string) *C.char", |w| {
        w.line("return (*C.char)(_retain(key, unsafe.Pointer(C.CString(s))))");
    });
    w.blank_line();
    w.block("func _retainArray(key uintptr, n int, elemSize uintptr) unsafe.Pointer", |w| {
        w.line("return _retain(key, C.calloc(C.size_t(n), C.size_t(elemSize)))");
    });
    w.blank_line();
    w.comment("_errorCode maps an error returned by an implementation to its C discriminant.");
    w.block("func _errorCode(err error, fallback C.int32_t) C.int32_t", |w| {
        w.line("var coded interface{ Code() int32 }");
        w.block("if errors.As(err, &coded)", |w| w.line("return C.int32_t(coded.Code())"));
        w.line("return fallback");
    });
    w.blank_line();
}

fn go_mod(ctx: &EmitContext<'_>) -> String {
    let mut w = CodeWriter::go();
    w.write(&banner::scaffold(CommentStyle::Slash, &ctx.source_name()));
    w.line(&format!("module {}", ctx.api_name().replace('_', "-")));
    w.blank_line();
    w.line("go 1.24");
    w.finish()
}

fn gitignore(ctx: &EmitContext<'_>) -> String {
    let api = ctx.api_name();
    let mut w = CodeWriter::go();
    w.write(&banner::scaffold(CommentStyle::Hash, &ctx.source_name()));
    w.line(&format!("# Go sources copied from {}/ by the Makefile.", ctx.generated_dir));
    w.lines([
        format!("{api}_interface.go"),
        format!("{api}_cgo.go"),
        format!("{api}_types.go"),
        format!("{api}_wasm.go"),
    ]);
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emit::test_support::{content, fixture, greeter, minimal, paths, run};

    #[test]
    fn artifact_set() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        assert_eq!(
            paths(&arts),
            [
                "example_app_interface.go",
                "example_app_cgo.go",
                "example_app_types.go",
                "example_app_impl.go",
                "go.mod",
                ".gitignore"
            ]
        );
        assert!(arts[3..].iter().all(|a| a.is_scaffold && a.is_project_file));
    }

    #[test]
    fn interface_drops_the_leading_handle() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let iface = content(&arts, "example_app_interface.go");
        assert!(iface.contains("type Renderer interface {"));
        assert!(iface.contains("\tBeginFrame() error\n"));
        assert!(iface.contains("\tSetTitle(title string)\n"));
        assert!(iface.contains("\tUploadPixels(pixels []uint8, format RenderingTextureFormat) error\n"));
        assert!(iface.contains("\tGetConfig() (RenderingRendererConfig, error)\n"));
        assert!(iface.contains("\tReadDepth(dest []float32) (int32, error)\n"));
        assert!(!iface.contains("type Info interface"), "info has no handle methods");
        assert!(!iface.contains("import \"C\""));
    }

    #[test]
    fn cgo_lifecycle_allocates_and_frees_handles() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let cgo = content(&arts, "test_api_cgo.go");
        assert!(cgo.contains("//go:build !wasip1\n\npackage main"));
        assert!(cgo.contains("//export test_api_lifecycle_create_engine\nfunc test_api_lifecycle_create_engine(out_result *C.engine_handle) C.int32_t {"));
        assert!(cgo.contains("\tkey := _allocHandle(&EngineImpl{})\n\t*out_result = C.engine_handle(unsafe.Pointer(key))\n\treturn 0\n"));
        assert!(cgo.contains("func test_api_lifecycle_destroy_engine(engine C.engine_handle) {\n\t_freeHandle(uintptr(unsafe.Pointer(engine)))\n}"));
        assert!(cgo.contains("typedef struct engine_s* engine_handle;"));
    }

    #[test]
    fn cgo_dispatches_through_the_interface() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let cgo = content(&arts, "example_app_cgo.go");
        assert!(cgo.contains("\timpl, ok := _lookup(key).(Renderer)\n\tif !ok {\n\t\treturn C.int32_t(4)\n\t}\n"));
        assert!(cgo.contains("impl.UploadPixels(unsafe.Slice((*uint8)(unsafe.Pointer(pixels)), int(pixels_len)), RenderingTextureFormat(format))"));
        assert!(cgo.contains("impl.SetTitle(C.GoString(title))"));
        assert!(cgo.contains("\t\treturn _errorCode(err, 4)\n"));
        assert!(cgo.contains("\t_toCRenderingRendererConfig(result, out_result, key)\n"));
        assert!(cgo.contains("\treturn C.uint64_t(result)\n"));
        assert!(cgo.contains("func _fromCRenderingRendererConfig(c *C.Rendering_RendererConfig) RenderingRendererConfig {"));
        assert!(cgo.contains("\tc.message = _retainString(key, g.Message)\n"));
    }

    #[test]
    fn cgo_handle_less_methods_are_stubs() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let cgo = content(&arts, "example_app_cgo.go");
        assert!(cgo.contains("func example_app_info_scale(value C.double, enabled C.bool) C.double {\n\t// TODO: implement scale; no handle selects an implementation.\n\treturn 0\n}"));
        assert!(cgo.contains("\treturn C.Hello_Greeting{}\n"));
    }

    #[test]
    fn types_mirror_enums_and_records() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let go = content(&arts, "example_app_types.go");
        assert!(go.contains("import \"strconv\""));
        assert!(go.contains("type CommonErrorCode int32"));
        assert!(go.contains("\tCommonErrorCodeInternalError   CommonErrorCode = 4\n"));
        assert!(go.contains("func (e CommonErrorCode) Code() int32 {"));
        assert!(go.contains("type RenderingTextureFormat uint8"));
        assert!(!go.contains("func (e RenderingTextureFormat) Error()"));
        assert!(go.contains("type HelloGreeting struct {\n\tMessage string\n\tApiImpl string\n}"));
    }

    #[test]
    fn impl_scaffold_satisfies_interfaces() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let go = content(&arts, "example_app_impl.go");
        assert!(go.starts_with("// Scaffold generated by xplatter"));
        assert!(go.contains("type EngineImpl struct{}"));
        assert!(go.contains("type RendererImpl struct{}"));
        assert!(!go.contains("LifecycleImpl"));
        assert!(go.contains("var _ Renderer = (*RendererImpl)(nil)"));
        assert!(go.contains("func (r *RendererImpl) GetConfig() (RenderingRendererConfig, error) {\n\t// TODO: implement\n\treturn RenderingRendererConfig{}, nil\n}"));
        assert!(go.contains("func main() {}"));
        let module = content(&arts, "go.mod");
        assert!(module.contains("module example-app\n\ngo 1.24\n"));
    }

    #[test]
    fn handles_built_by_one_interface_dispatch_through_another() {
        let (api, types) = greeter();
        let arts = run(emitter(), &api, &types);
        let cgo = content(&arts, "hello_cgo.go");
        assert!(cgo.contains("func hello_lifecycle_create_greeter(out_result *C.greeter_handle) C.int32_t {\n\tkey := _allocHandle(&GreeterImpl{})\n"));
        assert!(cgo.contains("\timpl, ok := _lookup(key).(Greeter)\n"));

        let iface = content(&arts, "hello_interface.go");
        assert!(iface.contains("// Greeter is implemented by GreeterImpl.\ntype Greeter interface {"));
        assert!(!iface.contains("type Lifecycle interface"));

        let scaffold = content(&arts, "hello_impl.go");
        assert!(scaffold.contains("type GreeterImpl struct{}\n\nvar _ Greeter = (*GreeterImpl)(nil)\n"));
        assert!(scaffold.contains("func (g *GreeterImpl) SayHello(name string) (HelloGreeting, error) {"));
        assert!(scaffold.contains("func (g *GreeterImpl) Style() HelloStyle {"));
        assert!(!scaffold.contains("LifecycleImpl"));
    }
}
