//! C ABI lowering shared by every emitter.
//!
//! The C header is the contract; everything here decides how an IR type appears in it. Emitters
//! that speak C (header, C++ shim, JNI, C scaffold, cgo preamble) format signatures through
//! [`CSignature`], and every other emitter reads the same shapes to stay in agreement.

use xplatter_core::lang::primitives;
use xplatter_core::naming;
use xplatter_core::{Transfer, TypeRef};

use super::context::EmitContext;
use super::errors::EmitError;
use super::writer::CodeWriter;
use crate::frontend::model::{MethodDef, MethodShape, Operation, ParameterDef};
use crate::frontend::resolver::{FieldDef, FieldType, TypeKind};

/// Prototypes longer than this are written one parameter per line.
pub const MAX_PROTOTYPE_WIDTH: usize = 80;

/// Name of the trailing out-parameter of fallible value-returning operations.
pub const OUT_RESULT: &str = "out_result";

/// One lowered C parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CParam {
    pub ty: String,
    pub name: String,
}

impl CParam {
    fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
        }
    }

    pub fn decl(&self) -> String {
        format!("{} {}", self.ty, self.name)
    }
}

/// The C form of a value type (returns, out-param pointees, by-value qualified params).
pub fn c_value_type(emitter: &'static str, ty: &str) -> Result<String, EmitError> {
    match TypeRef::parse(ty) {
        Some(TypeRef::Handle(h)) => Ok(naming::handle_typedef(h)),
        Some(TypeRef::Primitive(p)) => Ok(primitives::info_for(p).c.to_string()),
        Some(TypeRef::Qualified(q)) => Ok(naming::c_type_name(q)),
        Some(TypeRef::String) | Some(TypeRef::Buffer(_)) => Err(EmitError::unsupported(
            emitter,
            format!("{ty} cannot cross the C boundary as a value"),
        )),
        None => Err(EmitError::unsupported(emitter, format!("unknown type class {ty:?}"))),
    }
}

/// Lower one IR parameter; buffers expand to pointer + `<name>_len`.
pub fn c_params_for(emitter: &'static str, p: &ParameterDef) -> Result<Vec<CParam>, EmitError> {
    let transfer = p.effective_transfer();
    let lowered = match TypeRef::parse(&p.ty) {
        Some(TypeRef::String) => vec![CParam::new("const char*", &p.name)],
        Some(TypeRef::Buffer(elem)) => {
            let c = primitives::info_for(elem).c;
            let ptr = if transfer.is_mut() { format!("{c}*") } else { format!("const {c}*") };
            vec![CParam::new(ptr, &p.name), CParam::new("uint32_t", format!("{}_len", p.name))]
        }
        Some(TypeRef::Handle(h)) => vec![CParam::new(naming::handle_typedef(h), &p.name)],
        Some(TypeRef::Primitive(prim)) => vec![CParam::new(primitives::info_for(prim).c, &p.name)],
        Some(TypeRef::Qualified(q)) => {
            let c = naming::c_type_name(q);
            let ty = match transfer {
                Transfer::Value => c,
                Transfer::Ref => format!("const {c}*"),
                Transfer::RefMut => format!("{c}*"),
            };
            vec![CParam::new(ty, &p.name)]
        }
        None => return Err(EmitError::unsupported(emitter, format!("unknown type class {:?}", p.ty))),
    };
    Ok(lowered)
}

/// A complete C ABI signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSignature {
    pub ret: String,
    pub name: String,
    pub params: Vec<CParam>,
    /// Pointee of `out_result`, for fallible value-returning operations.
    pub out_pointee: Option<String>,
}

impl CSignature {
    /// Lower a method under the four-way shape table.
    pub fn for_method(emitter: &'static str, symbol: String, method: &MethodDef) -> Result<Self, EmitError> {
        let mut params = Vec::new();
        for p in &method.parameters {
            params.extend(c_params_for(emitter, p)?);
        }
        let mut out_pointee = None;
        let ret = match (method.shape(), method.return_type()) {
            (MethodShape::InfallibleVoid, _) => "void".to_string(),
            (MethodShape::FallibleVoid, _) => "int32_t".to_string(),
            (MethodShape::InfallibleValue, Some(ty)) => c_value_type(emitter, ty)?,
            (MethodShape::FallibleValue, Some(ty)) => {
                let pointee = c_value_type(emitter, ty)?;
                params.push(CParam::new(format!("{pointee}*"), OUT_RESULT));
                out_pointee = Some(pointee);
                "int32_t".to_string()
            }
            (shape, None) => return Err(EmitError::internal(emitter, format!("{shape:?} without a return type"))),
        };
        Ok(Self {
            ret,
            name: symbol,
            params,
            out_pointee,
        })
    }

    pub fn for_operation(ctx: &EmitContext<'_>, emitter: &'static str, op: &Operation<'_>) -> Result<Self, EmitError> {
        Self::for_method(emitter, op.symbol(ctx.api_name()), op)
    }

    /// `a, b, c` or `void`.
    pub fn param_list(&self) -> String {
        if self.params.is_empty() {
            "void".to_string()
        } else {
            self.params.iter().map(CParam::decl).collect::<Vec<_>>().join(", ")
        }
    }

    /// Argument names in call order.
    pub fn arg_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// Signature head without a trailing `;` or body: `[prefix ]ret name(params)`.
    pub fn head(&self, prefix: Option<&str>) -> String {
        let lead = match prefix {
            Some(p) => format!("{p} {} {}", self.ret, self.name),
            None => format!("{} {}", self.ret, self.name),
        };
        format!("{lead}({})", self.param_list())
    }

    /// Write the signature, wrapping one parameter per line past [`MAX_PROTOTYPE_WIDTH`].
    ///
    /// The width excludes `prefix` (the export macro). `terminator` is `;` for prototypes and
    /// ` {` for definitions.
    pub fn write(&self, w: &mut CodeWriter, prefix: Option<&str>, terminator: &str) {
        if self.head(None).len() <= MAX_PROTOTYPE_WIDTH || self.params.is_empty() {
            w.line(&format!("{}{terminator}", self.head(prefix)));
            return;
        }
        let lead = match prefix {
            Some(p) => format!("{p} {} {}(", self.ret, self.name),
            None => format!("{} {}(", self.ret, self.name),
        };
        w.line(&lead);
        w.indented(|w| {
            let last = self.params.len() - 1;
            for (i, p) in self.params.iter().enumerate() {
                if i == last {
                    w.line(&format!("{}){terminator}", p.decl()));
                } else {
                    w.line(&format!("{},", p.decl()));
                }
            }
        });
    }
}

/// One of the six fixed platform-service functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformService {
    /// Suffix after `<api>_`.
    pub name: &'static str,
    pub ret: &'static str,
    /// `(type, name)` pairs.
    pub params: &'static [(&'static str, &'static str)],
}

impl PlatformService {
    pub fn symbol(&self, api: &str) -> String {
        naming::service_symbol(api, self.name)
    }

    pub fn param_list(&self) -> String {
        if self.params.is_empty() {
            return "void".to_string();
        }
        self.params
            .iter()
            .map(|(ty, name)| format!("{ty} {name}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Prototype with the return type padded so names line up.
    pub fn prototype(&self, api: &str) -> String {
        let ret = match self.ret {
            "void" => "void".to_string(),
            other => format!("{other:<8}"),
        };
        format!("{ret} {}({});", self.symbol(api), self.param_list())
    }
}

pub const PLATFORM_SERVICES: [PlatformService; 6] = [
    PlatformService {
        name: "log_sink",
        ret: "void",
        params: &[("int32_t", "level"), ("const char*", "tag"), ("const char*", "message")],
    },
    PlatformService {
        name: "resource_count",
        ret: "uint32_t",
        params: &[],
    },
    PlatformService {
        name: "resource_name",
        ret: "int32_t",
        params: &[("uint32_t", "index"), ("char*", "buffer"), ("uint32_t", "buffer_size")],
    },
    PlatformService {
        name: "resource_exists",
        ret: "int32_t",
        params: &[("const char*", "name")],
    },
    PlatformService {
        name: "resource_size",
        ret: "uint32_t",
        params: &[("const char*", "name")],
    },
    PlatformService {
        name: "resource_read",
        ret: "int32_t",
        params: &[("const char*", "name"), ("uint8_t*", "buffer"), ("uint32_t", "buffer_size")],
    },
];

/// `typedef struct engine_s* engine_handle;` for every declared handle.
pub fn write_handle_typedefs(ctx: &EmitContext<'_>, w: &mut CodeWriter) {
    for h in &ctx.api.handles {
        w.line(&format!(
            "typedef struct {}* {};",
            naming::handle_struct_tag(&h.name),
            naming::handle_typedef(&h.name)
        ));
    }
    if !ctx.api.handles.is_empty() {
        w.blank_line();
    }
}

/// C definitions of the resolved schema types: enums, then structs, then tables, each by name.
pub fn write_fbs_typedefs(ctx: &EmitContext<'_>, w: &mut CodeWriter) {
    for (name, info) in ctx.types.of_kind(TypeKind::Enum) {
        let c_name = naming::c_type_name(name);
        w.line("typedef enum {");
        w.indented(|w| {
            let count = info.enum_values.len();
            for (i, v) in info.enum_values.iter().enumerate() {
                let sep = if i + 1 < count { "," } else { "" };
                w.line(&format!("{c_name}_{} = {}{sep}", v.name, v.value));
            }
        });
        w.line(&format!("}} {c_name};"));
        w.blank_line();
    }
    for kind in [TypeKind::Struct, TypeKind::Table] {
        for (name, info) in ctx.types.of_kind(kind) {
            let c_name = naming::c_type_name(name);
            w.line(&format!("typedef struct {c_name} {{"));
            w.indented(|w| {
                for field in &info.fields {
                    for decl in c_field_decls(field) {
                        w.line(&format!("{decl};"));
                    }
                }
            });
            w.line(&format!("}} {c_name};"));
            w.blank_line();
        }
    }
}

/// Handle typedefs plus schema types, without guards or prototypes (cgo preambles, C scaffolds).
pub fn write_c_typedefs(ctx: &EmitContext<'_>, w: &mut CodeWriter) {
    write_handle_typedefs(ctx, w);
    write_fbs_typedefs(ctx, w);
}

fn c_field_type(ty: &FieldType) -> String {
    match ty {
        FieldType::Primitive(p) => primitives::info_for(*p).c.to_string(),
        FieldType::String => "const char*".to_string(),
        FieldType::Vector(inner) => format!("const {}*", c_field_type(inner)),
        FieldType::Named(name) => naming::c_type_name(name),
    }
}

/// Declarations for one record field; vectors add `uint32_t <name>_count`.
pub fn c_field_decls(field: &FieldDef) -> Vec<String> {
    let mut out = vec![format!("{} {}", c_field_type(&field.ty), field.name)];
    if matches!(field.ty, FieldType::Vector(_)) {
        out.push(format!("uint32_t {}_count", field.name));
    }
    out
}
