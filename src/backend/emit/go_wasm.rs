//! Go implementation emitter (`wasip1` build).
//!
//! Emits `<api>_wasm.go`, the `//go:wasmexport` twin of the cgo shim. There is no C here: records
//! are read and written in linear memory at the offsets [`layout`] computes, so the JavaScript
//! binding and this file agree byte for byte.
//!
//! wasmexport only admits 32/64-bit integers, floats and pointers, so 8/16-bit integers and `bool`
//! widen to `int32`/`uint32`. An infallible record return becomes a leading `sret` pointer the
//! caller allocates.

use xplatter_core::lang::primitives::{self, PrimitiveId};
use xplatter_core::naming;
use xplatter_core::{Transfer, TypeRef};

use super::go::{GoField, GoGen, GoValue, go_ident, go_prim};
use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::ctypes::{OUT_RESULT, PLATFORM_SERVICES, PlatformService};
use crate::backend::errors::EmitError;
use crate::backend::layout::{self, POINTER_SIZE, StructLayout};
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;
use crate::frontend::model::{MethodShape, Operation, OperationKind, ParameterDef};
use crate::frontend::resolver::TypeKind;

pub const NAME: &str = "impl_go_wasm";

/// Leading parameter of infallible record returns.
const SRET: &str = "sret";

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    let go = GoGen::new(ctx, NAME);
    let file = Wasm { go: &go }.file()?;
    Ok(vec![Artifact::generated(format!("{}_wasm.go", ctx.api_name()), file)])
}

/// Parameter and result spelling of a primitive at the wasm boundary.
fn wasm_prim(p: PrimitiveId) -> &'static str {
    match p {
        PrimitiveId::Int8 | PrimitiveId::Int16 | PrimitiveId::Int32 => "int32",
        PrimitiveId::UInt8 | PrimitiveId::UInt16 | PrimitiveId::UInt32 | PrimitiveId::Bool => "uint32",
        other => go_prim(other),
    }
}

fn layout_error(err: layout::LayoutError) -> EmitError {
    EmitError::internal(NAME, err.to_string())
}

/// `ptr + 8`, or `ptr` at offset zero.
fn at(base: &str, offset: u32) -> String {
    if offset == 0 { base.to_string() } else { format!("{base} + {offset}") }
}

fn load_u32(addr: &str) -> String {
    format!("*(*uint32)(unsafe.Pointer({addr}))")
}

/// Go expression reading `value` stored at `addr`.
fn read(value: &GoValue, addr: &str) -> String {
    match value {
        GoValue::Prim(PrimitiveId::Bool) => format!("*(*byte)(unsafe.Pointer({addr})) != 0"),
        GoValue::Prim(p) => format!("*(*{})(unsafe.Pointer({addr}))", go_prim(*p)),
        GoValue::String => format!("_cstring(uintptr({}))", load_u32(addr)),
        GoValue::Enum { base, .. } => format!("{}(*(*{})(unsafe.Pointer({addr})))", value.go_type(), go_prim(*base)),
        GoValue::Record(_) => format!("_read{}({addr})", value.go_type()),
    }
}

/// Statement storing Go expression `src` as `value` at `addr`.
fn write(value: &GoValue, addr: &str, src: &str) -> String {
    match value {
        GoValue::Prim(PrimitiveId::Bool) => format!("*(*byte)(unsafe.Pointer({addr})) = byte(_b2u({src}))"),
        GoValue::Prim(p) => format!("*(*{})(unsafe.Pointer({addr})) = {src}", go_prim(*p)),
        GoValue::String => format!("{} = _wasmString(key, {src})", load_u32(addr)),
        GoValue::Enum { base, .. } => {
            let base = go_prim(*base);
            format!("*(*{base})(unsafe.Pointer({addr})) = {base}({src})")
        }
        GoValue::Record(_) => format!("_write{}({src}, {addr}, key)", value.go_type()),
    }
}

struct Wasm<'g, 'a> {
    go: &'g GoGen<'a>,
}

impl Wasm<'_, '_> {
    fn ctx(&self) -> &EmitContext<'_> {
        self.go.ctx
    }

    fn file(&self) -> Result<String, EmitError> {
        let ctx = self.ctx();
        let mut w = CodeWriter::go();
        w.write(&banner::generated(CommentStyle::Slash, &ctx.source_name()));
        w.line("//go:build wasip1");
        w.blank_line();
        w.line("package main");
        w.blank_line();
        w.line("import (");
        w.indented(|w| w.lines(["\"errors\"", "\"sync\"", "\"sync/atomic\"", "\"unsafe\""]));
        w.line(")");
        w.blank_line();
        write_wasm_helpers(&mut w);
        write_platform_imports(&mut w, ctx.api_name());

        for kind in [TypeKind::Struct, TypeKind::Table] {
            for (name, _) in ctx.types.of_kind(kind) {
                let layout = layout::struct_layout(ctx.types, name).map_err(layout_error)?;
                self.write_codecs(&mut w, name, &layout)?;
            }
        }

        for iface in &ctx.api.interfaces {
            w.line(&format!("/* {} */", iface.name));
            w.blank_line();
            for op in iface.operations() {
                self.write_export(&mut w, &op)?;
                w.blank_line();
            }
        }
        Ok(w.finish())
    }

    /// Byte stride of one vector element.
    fn stride(&self, value: &GoValue) -> Result<u32, EmitError> {
        Ok(match value {
            GoValue::Prim(p) => primitives::info_for(*p).wasm_size,
            GoValue::String => POINTER_SIZE,
            GoValue::Enum { base, .. } => primitives::info_for(*base).wasm_size,
            GoValue::Record(q) => layout::struct_layout(self.ctx().types, q).map_err(layout_error)?.size,
        })
    }

    fn write_codecs(&self, w: &mut CodeWriter, name: &str, layout: &StructLayout) -> Result<(), EmitError> {
        let flat = naming::flat_type_name(name);
        let info = self.ctx().type_info(NAME, name)?;

        let mut scalars = Vec::new();
        let mut vectors = Vec::new();
        for field in &info.fields {
            let Some(slot) = layout.field(&field.name) else {
                continue;
            };
            let go_name = naming::pascal_case(&field.name);
            match self.go.field(&field.ty) {
                GoField::Scalar(v) => scalars.push((go_name, v, slot.offset)),
                GoField::Vector(v) => {
                    let count = layout
                        .field(&format!("{}_count", field.name))
                        .ok_or_else(|| EmitError::internal(NAME, format!("{name}.{} has no count slot", field.name)))?;
                    let stride = self.stride(&v)?;
                    vectors.push((go_name, v, slot.offset, count.offset, stride));
                }
                GoField::Opaque => {}
            }
        }

        w.block(&format!("func _read{flat}(ptr uintptr) {flat}"), |w| {
            w.line(&format!("var g {flat}"));
            for (field, value, offset) in &scalars {
                w.line(&format!("g.{field} = {}", read(value, &at("ptr", *offset))));
            }
            for (field, value, offset, count, stride) in &vectors {
                let head = format!(
                    "if data, n := uintptr({}), int({}); data != 0 && n > 0",
                    load_u32(&at("ptr", *offset)),
                    load_u32(&at("ptr", *count))
                );
                w.block(&head, |w| {
                    w.line(&format!("g.{field} = make([]{}, n)", value.go_type()));
                    w.block(&format!("for i := range g.{field}"), |w| {
                        w.line(&format!(
                            "g.{field}[i] = {}",
                            read(value, &format!("data + uintptr(i)*{stride}"))
                        ));
                    });
                });
            }
            w.line("return g");
        });
        w.blank_line();

        w.block(&format!("func _write{flat}(g {flat}, ptr uintptr, key uintptr)"), |w| {
            for (field, value, offset) in &scalars {
                w.line(&write(value, &at("ptr", *offset), &format!("g.{field}")));
            }
            for (field, value, offset, count, stride) in &vectors {
                let data_slot = load_u32(&at("ptr", *offset));
                let count_slot = load_u32(&at("ptr", *count));
                w.block_with(&format!("if n := len(g.{field}); n > 0"), "} else {", |w| {
                    w.line(&format!("data := _retain(key, uint32(n*{stride}))"));
                    w.block(&format!("for i, v := range g.{field}"), |w| {
                        w.line(&write(value, &format!("data + uintptr(i)*{stride}"), "v"));
                    });
                    w.line(&format!("{data_slot} = uint32(data)"));
                    w.line(&format!("{count_slot} = uint32(n)"));
                });
                w.indented(|w| {
                    w.line(&format!("{data_slot} = 0"));
                    w.line(&format!("{count_slot} = 0"));
                });
                w.line("}");
            }
        });
        w.blank_line();
        Ok(())
    }

    fn wasm_params(&self, p: &ParameterDef) -> Result<Vec<String>, EmitError> {
        let name = go_ident(&p.name);
        Ok(match self.ctx().classify(NAME, &p.ty)? {
            TypeRef::Buffer(_) => vec![format!("{name} uintptr"), format!("{}_len uint32", p.name)],
            TypeRef::String | TypeRef::Handle(_) => vec![format!("{name} uintptr")],
            TypeRef::Primitive(prim) => vec![format!("{name} {}", wasm_prim(prim))],
            TypeRef::Qualified(q) => match (self.go.named_value(q), p.effective_transfer()) {
                (Some(GoValue::Enum { base, .. }), Transfer::Value) => vec![format!("{name} {}", wasm_prim(base))],
                (Some(_), _) => vec![format!("{name} uintptr")],
                (None, _) => return Err(EmitError::missing_type(NAME, q)),
            },
        })
    }

    /// Result type of an infallible value return; `None` for sret records.
    fn wasm_result(&self, ty: &str) -> Result<Option<String>, EmitError> {
        Ok(match self.ctx().classify(NAME, ty)? {
            TypeRef::Handle(_) => Some("uintptr".to_string()),
            TypeRef::Primitive(p) => Some(wasm_prim(p).to_string()),
            TypeRef::Qualified(q) => match self.go.named_value(q) {
                Some(GoValue::Enum { base, .. }) => Some(wasm_prim(base).to_string()),
                Some(_) => None,
                None => return Err(EmitError::missing_type(NAME, q)),
            },
            TypeRef::String | TypeRef::Buffer(_) => {
                return Err(EmitError::unsupported(NAME, format!("{ty} cannot be returned by value")));
            }
        })
    }

    fn write_export(&self, w: &mut CodeWriter, op: &Operation<'_>) -> Result<(), EmitError> {
        let symbol = op.symbol(self.ctx().api_name());
        let mut params = Vec::new();
        let mut result = String::new();
        let mut sret = false;
        match (op.shape(), op.return_type()) {
            (MethodShape::FallibleValue, Some(_)) => result = " int32".to_string(),
            (MethodShape::FallibleVoid, _) => result = " int32".to_string(),
            (MethodShape::InfallibleValue, Some(ty)) => match self.wasm_result(ty)? {
                Some(r) => result = format!(" {r}"),
                None => {
                    params.push(format!("{SRET} uintptr"));
                    sret = true;
                }
            },
            _ => {}
        }
        for p in &op.parameters {
            params.extend(self.wasm_params(p)?);
        }
        if op.shape() == MethodShape::FallibleValue {
            params.push(format!("{OUT_RESULT} uintptr"));
        }

        let body = match op.kind {
            OperationKind::Constructor => self.constructor_body(op)?,
            OperationKind::Destructor => {
                let handle = op.parameters.first().map(|p| go_ident(&p.name)).unwrap_or_default();
                vec![format!("_freeHandle({handle})")]
            }
            OperationKind::Method if op.leading_handle().is_some() => self.dispatch_body(op, sret)?,
            OperationKind::Method => {
                let mut body = vec![format!("// TODO: implement {}; no handle selects an implementation.", op.name)];
                if !result.is_empty() {
                    body.push("return 0".to_string());
                }
                body
            }
        };
        w.line(&format!("//go:wasmexport {symbol}"));
        w.block(&format!("func {symbol}({}){result}", params.join(", ")), |w| w.lines(&body));
        Ok(())
    }

    fn constructor_body(&self, op: &Operation<'_>) -> Result<Vec<String>, EmitError> {
        let mut body = vec![format!("key := _allocHandle(&{}{{}})", self.go.constructed_struct(op)?)];
        if op.shape() == MethodShape::FallibleValue {
            body.push(format!("{} = uint32(key)", load_u32(OUT_RESULT)));
            body.push("return 0".to_string());
        } else {
            body.push("return key".to_string());
        }
        Ok(body)
    }

    fn dispatch_body(&self, op: &Operation<'_>, sret: bool) -> Result<Vec<String>, EmitError> {
        let ctx = self.ctx();
        let handle = op
            .parameters
            .first()
            .map(|p| go_ident(&p.name))
            .ok_or_else(|| EmitError::internal(NAME, format!("{} has no leading handle", op.name)))?;
        let bail = match op.shape() {
            MethodShape::FallibleValue | MethodShape::FallibleVoid => format!("return {}", self.go.failure_code(op)?),
            MethodShape::InfallibleValue if !sret => "return 0".to_string(),
            _ => "return".to_string(),
        };
        let mut body = vec![
            format!("key := {handle}"),
            format!("impl, ok := _lookup(key).({})", GoGen::interface_name(op.interface)),
            "if !ok {".to_string(),
            format!("\t{bail}"),
            "}".to_string(),
        ];

        let mut marshals_out = op.return_type().is_some_and(|ty| layout::is_record_type(ctx.types, ty));
        let mut args = Vec::new();
        let mut writebacks = Vec::new();
        for p in op.parameters.iter().skip(1) {
            let name = go_ident(&p.name);
            let arg = match ctx.classify(NAME, &p.ty)? {
                TypeRef::String => format!("_cstring({name})"),
                TypeRef::Buffer(e) => format!(
                    "unsafe.Slice((*{})(unsafe.Pointer({name})), int({}_len))",
                    go_prim(e),
                    p.name
                ),
                TypeRef::Handle(_) => name,
                TypeRef::Primitive(PrimitiveId::Bool) => format!("{name} != 0"),
                TypeRef::Primitive(prim) => format!("{}({name})", go_prim(prim)),
                TypeRef::Qualified(q) => {
                    let value = self.go.named_value(q).ok_or_else(|| EmitError::missing_type(NAME, q))?;
                    match (p.effective_transfer(), &value) {
                        (Transfer::Value, GoValue::Enum { .. }) => format!("{}({name})", value.go_type()),
                        (Transfer::RefMut, _) => {
                            let local = format!("{}Go", GoGen::arg_name(p));
                            body.push(format!("{local} := {}", read(&value, &name)));
                            writebacks.push(write(&value, &name, &local));
                            marshals_out |= matches!(value, GoValue::Record(_));
                            format!("&{local}")
                        }
                        _ => read(&value, &name),
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
                body.push(self.store(ty, OUT_RESULT)?);
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
                if sret {
                    body.push(self.store(ty, SRET)?);
                } else {
                    body.push(self.widen(ty)?);
                }
            }
            _ => {
                body.push(call);
                body.extend(writebacks);
            }
        }
        Ok(body)
    }

    /// Store `result` of type `ty` through the pointer `dest`.
    fn store(&self, ty: &str, dest: &str) -> Result<String, EmitError> {
        Ok(match self.ctx().classify(NAME, ty)? {
            TypeRef::Handle(_) => format!("{} = uint32(result)", load_u32(dest)),
            _ => {
                let value = self.go.type_value(ty)?.ok_or_else(|| {
                    EmitError::unsupported(NAME, format!("{ty} cannot be returned by value"))
                })?;
                write(&value, dest, "result")
            }
        })
    }

    /// `return result` widened to its wasm result type.
    fn widen(&self, ty: &str) -> Result<String, EmitError> {
        Ok(match self.ctx().classify(NAME, ty)? {
            TypeRef::Handle(_) => "return result".to_string(),
            TypeRef::Primitive(PrimitiveId::Bool) => "return _b2u(result)".to_string(),
            TypeRef::Primitive(p) => format!("return {}(result)", wasm_prim(p)),
            TypeRef::Qualified(q) => match self.go.named_value(q) {
                Some(GoValue::Enum { base, .. }) => format!("return {}(result)", wasm_prim(base)),
                _ => return Err(EmitError::internal(NAME, format!("{q} is returned through {SRET}"))),
            },
            TypeRef::String | TypeRef::Buffer(_) => {
                return Err(EmitError::unsupported(NAME, format!("{ty} cannot be returned by value")));
            }
        })
    }
}

fn write_wasm_helpers(w: &mut CodeWriter) {
    w.comment("Allocations handed to the host stay reachable here until it frees them.");
    w.line("var _wasmAllocs sync.Map");
    w.blank_line();
    w.line("//go:wasmexport malloc");
    w.block("func _wasmMalloc(size uint32) uintptr", |w| {
        w.lines([
            "buf := make([]byte, max(size, 1))",
            "ptr := uintptr(unsafe.Pointer(&buf[0]))",
            "_wasmAllocs.Store(ptr, buf)",
            "return ptr",
        ]);
    });
    w.blank_line();
    w.line("//go:wasmexport free");
    w.block("func _wasmFree(ptr uintptr)", |w| w.line("_wasmAllocs.Delete(ptr)"));
    w.blank_line();
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
    w.comment("Memory written into results stays valid until the next call on the same handle");
    w.comment("or until the handle is destroyed.");
    w.line("var (");
    w.indented(|w| w.lines(["_retainMu sync.Mutex", "_retained = map[uintptr][]uintptr{}"]));
    w.line(")");
    w.blank_line();
    w.block("func _retain(key uintptr, size uint32) uintptr", |w| {
        w.lines([
            "ptr := _wasmMalloc(size)",
            "_retainMu.Lock()",
            "_retained[key] = append(_retained[key], ptr)",
            "_retainMu.Unlock()",
            "return ptr",
        ]);
    });
    w.blank_line();
    w.block("func _release(key uintptr)", |w| {
        w.lines(["_retainMu.Lock()", "ptrs := _retained[key]", "delete(_retained, key)", "_retainMu.Unlock()"]);
        w.block("for _, p := range ptrs", |w| w.line("_wasmFree(p)"));
    });
    w.blank_line();
    w.comment("_cstring reads a NUL-terminated string from linear memory.");
    w.block("func _cstring(ptr uintptr) string", |w| {
        w.block("if ptr == 0", |w| w.line("return \"\""));
        w.line("n := 0");
        w.block("for *(*byte)(unsafe.Pointer(ptr + uintptr(n))) != 0", |w| w.line("n++"));
        w.line("return string(unsafe.Slice((*byte)(unsafe.Pointer(ptr)), n))");
    });
    w.blank_line();
    w.comment("_wasmString copies s into retained memory with a trailing NUL.");
    w.block("func _wasmString(key uintptr, s string) uint32", |w| {
        w.lines([
            "ptr := _retain(key, uint32(len(s)+1))",
            "buf := unsafe.Slice((*byte)(unsafe.Pointer(ptr)), len(s)+1)",
            "copy(buf, s)",
            "buf[len(s)] = 0",
            "return uint32(ptr)",
        ]);
    });
    w.blank_line();
    w.block("func _b2u(b bool) uint32", |w| {
        w.block("if b", |w| w.line("return 1"));
        w.line("return 0");
    });
    w.blank_line();
    w.block("func _errorCode(err error, fallback int32) int32", |w| {
        w.line("var coded interface{ Code() int32 }");
        w.block("if errors.As(err, &coded)", |w| w.line("return coded.Code()"));
        w.line("return fallback");
    });
    w.blank_line();
}

/// Go spelling of a platform-service C type.
fn service_type(c: &str) -> &'static str {
    match c {
        "int32_t" => "int32",
        "uint32_t" => "uint32",
        _ => "uintptr",
    }
}

fn write_platform_imports(w: &mut CodeWriter, api: &str) {
    w.comment("Platform services provided by the host.");
    w.blank_line();
    for service in &PLATFORM_SERVICES {
        write_platform_import(w, api, service);
    }
    w.blank_line();
}

fn write_platform_import(w: &mut CodeWriter, api: &str, service: &PlatformService) {
    let params: Vec<String> = service
        .params
        .iter()
        .map(|(ty, name)| format!("{} {}", naming::camel_case(name), service_type(ty)))
        .collect();
    let ret = match service.ret {
        "void" => String::new(),
        other => format!(" {}", service_type(other)),
    };
    w.line(&format!("//go:wasmimport env {}", service.symbol(api)));
    w.line(&format!(
        "func _platform{}({}){ret}",
        naming::pascal_case(service.name),
        params.join(", ")
    ));
}
