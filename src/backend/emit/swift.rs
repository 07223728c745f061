//! Swift emitter: `<Pascal>.swift`.
//!
//! The C declarations reach Swift through the module map or bridging header of the consuming
//! target, so records and enums keep their imported C names (`Rendering_RendererConfig`).

use xplatter_core::lang::primitives::{self, PrimitiveId};
use xplatter_core::naming;
use xplatter_core::{Transfer, TypeRef};

use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::errors::EmitError;
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;
use crate::frontend::model::{HandleDef, MethodShape, Operation, OperationKind, ParameterDef};

pub const NAME: &str = "swift";

const SWIFT_KEYWORDS: &[&str] = &[
    "as", "break", "case", "catch", "class", "continue", "default", "defer", "deinit", "do", "else", "enum",
    "extension", "false", "for", "func", "guard", "if", "import", "in", "init", "inout", "internal", "is", "let",
    "nil", "operator", "private", "protocol", "public", "repeat", "return", "self", "static", "struct", "subscript",
    "super", "switch", "throw", "throws", "true", "try", "var", "where", "while",
];

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    Ok(vec![Artifact::generated(format!("{}.swift", ctx.pascal_api()), render(ctx)?)])
}

fn swift_ident(name: &str) -> String {
    let camel = naming::camel_case(name);
    if SWIFT_KEYWORDS.contains(&camel.as_str()) { format!("`{camel}`") } else { camel }
}

/// Swift case name for a schema enum value: `InvalidArgument` → `invalidArgument`,
/// `RGBA8` → `rgba8`, `NOT_FOUND` → `notFound`.
fn case_name(value: &str) -> String {
    if value.contains('_') {
        return swift_ident(&value.to_ascii_lowercase());
    }
    let chars: Vec<char> = value.chars().collect();
    let mut run = chars.iter().take_while(|c| c.is_ascii_uppercase()).count();
    if run > 1 && run < chars.len() && chars[run].is_ascii_lowercase() {
        run -= 1;
    }
    let lowered: String = chars[..run].iter().map(char::to_ascii_lowercase).collect();
    let rest: String = chars[run..].iter().collect();
    let name = format!("{lowered}{rest}");
    if SWIFT_KEYWORDS.contains(&name.as_str()) { format!("`{name}`") } else { name }
}

fn render(ctx: &EmitContext<'_>) -> Result<String, EmitError> {
    let mut w = CodeWriter::new();
    w.write(&banner::generated(CommentStyle::Slash, &ctx.source_name()));
    w.line("import Foundation");
    w.blank_line();

    for error in ctx.api.error_types() {
        write_error_enum(ctx, &mut w, error)?;
    }
    for handle in &ctx.api.handles {
        write_handle_class(ctx, &mut w, handle)?;
    }
    write_namespace(ctx, &mut w)?;
    Ok(w.finish())
}

fn write_error_enum(ctx: &EmitContext<'_>, w: &mut CodeWriter, error: &str) -> Result<(), EmitError> {
    let info = ctx.type_info(NAME, error)?;
    let name = naming::flat_type_name(error);
    let fallback = info
        .enum_values
        .iter()
        .find(|v| v.name == "InternalError")
        .or_else(|| info.enum_values.last())
        .ok_or_else(|| EmitError::unsupported(NAME, format!("error enum {error} has no values")))?;

    w.line(&format!("public enum {name}: Int32, Error {{"));
    w.indented(|w| {
        for v in &info.enum_values {
            w.line(&format!("case {} = {}", case_name(&v.name), v.value));
        }
        w.blank_line();
        w.block(&format!("static func fromCode(_ code: Int32) -> {name}"), |w| {
            w.line(&format!("return {name}(rawValue: code) ?? .{}", case_name(&fallback.name)));
        });
    });
    w.line("}");
    w.blank_line();
    Ok(())
}

fn write_handle_class(ctx: &EmitContext<'_>, w: &mut CodeWriter, handle: &HandleDef) -> Result<(), EmitError> {
    if let Some(desc) = &handle.description {
        w.line(&format!("/// {desc}"));
    }
    w.line(&format!("public final class {} {{", handle.name));
    w.indent();
    w.line("let handle: OpaquePointer");
    w.blank_line();
    w.block("init(handle: OpaquePointer)", |w| w.line("self.handle = handle"));
    if let Some(symbol) = ctx.api.destructor_symbol(&handle.name) {
        w.blank_line();
        w.block("deinit", |w| w.line(&format!("{symbol}(handle)")));
    }

    for iface in &ctx.api.interfaces {
        for op in iface.operations() {
            let constructs = op.kind == OperationKind::Constructor
                && op.return_type().and_then(TypeRef::parse).and_then(|t| t.handle_name()) == Some(handle.name.as_str());
            if constructs {
                w.blank_line();
                write_function(ctx, w, &op, Receiver::Static)?;
            }
        }
    }
    for iface in &ctx.api.interfaces {
        for op in iface.operations() {
            if op.kind == OperationKind::Method && op.leading_handle() == Some(handle.name.as_str()) {
                w.blank_line();
                write_function(ctx, w, &op, Receiver::Instance)?;
            }
        }
    }
    w.dedent();
    w.line("}");
    w.blank_line();
    Ok(())
}

/// Methods without a declared leading handle live in a caseless enum named after the API.
fn write_namespace(ctx: &EmitContext<'_>, w: &mut CodeWriter) -> Result<(), EmitError> {
    let mut free = Vec::new();
    for iface in &ctx.api.interfaces {
        for op in iface.operations() {
            let bound = op.leading_handle().is_some_and(|h| ctx.api.handle(h).is_some());
            if op.kind == OperationKind::Method && !bound {
                free.push(op);
            }
        }
    }
    if free.is_empty() {
        return Ok(());
    }
    w.line(&format!("public enum {} {{", ctx.pascal_api()));
    w.indent();
    for (i, op) in free.iter().enumerate() {
        if i > 0 {
            w.blank_line();
        }
        write_function(ctx, w, op, Receiver::Static)?;
    }
    w.dedent();
    w.line("}");
    w.blank_line();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Receiver {
    Static,
    /// The first parameter is `self`.
    Instance,
}

fn swift_return_type(ctx: &EmitContext<'_>, ty: &str) -> Result<String, EmitError> {
    Ok(match ctx.classify(NAME, ty)? {
        TypeRef::Handle(h) => h.to_string(),
        TypeRef::Primitive(p) => primitives::info_for(p).swift.to_string(),
        TypeRef::Qualified(q) => naming::c_type_name(q),
        TypeRef::String | TypeRef::Buffer(_) => {
            return Err(EmitError::unsupported(NAME, format!("{ty} cannot be returned across the C boundary")));
        }
    })
}

/// Zero value for an out-parameter of type `ty`.
fn zero_value(ctx: &EmitContext<'_>, ty: &str) -> Result<String, EmitError> {
    Ok(match ctx.classify(NAME, ty)? {
        TypeRef::Primitive(PrimitiveId::Bool) => "false".to_string(),
        TypeRef::Primitive(_) => "0".to_string(),
        TypeRef::Qualified(q) => format!("{}()", naming::c_type_name(q)),
        TypeRef::Handle(_) => "nil".to_string(),
        TypeRef::String | TypeRef::Buffer(_) => {
            return Err(EmitError::unsupported(NAME, format!("{ty} cannot be returned across the C boundary")));
        }
    })
}

/// Parameter declarations, C call arguments, and the scoped accessors the call nests in.
struct Lowered {
    decls: Vec<String>,
    args: Vec<String>,
    scopes: Vec<String>,
}

fn lower_params(ctx: &EmitContext<'_>, params: &[ParameterDef]) -> Result<Lowered, EmitError> {
    let mut out = Lowered {
        decls: Vec::new(),
        args: Vec::new(),
        scopes: Vec::new(),
    };
    for p in params {
        let name = swift_ident(&p.name);
        let ptr = format!("{}Ptr", naming::camel_case(&p.name));
        let transfer = p.effective_transfer();
        match ctx.classify(NAME, &p.ty)? {
            TypeRef::String => {
                out.decls.push(format!("{name}: String"));
                out.scopes.push(format!("{name}.withCString {{ {ptr} in"));
                out.args.push(ptr);
            }
            TypeRef::Buffer(elem) => {
                let swift = primitives::info_for(elem).swift;
                if transfer.is_mut() {
                    out.decls.push(format!("{name}: inout [{swift}]"));
                    out.scopes.push(format!("{name}.withUnsafeMutableBufferPointer {{ {ptr} in"));
                } else {
                    out.decls.push(format!("{name}: [{swift}]"));
                    out.scopes.push(format!("{name}.withUnsafeBufferPointer {{ {ptr} in"));
                }
                out.args.push(format!("{ptr}.baseAddress"));
                out.args.push(format!("UInt32({ptr}.count)"));
            }
            TypeRef::Handle(h) => {
                out.decls.push(format!("{name}: {h}"));
                out.args.push(format!("{name}.handle"));
            }
            TypeRef::Primitive(prim) => {
                out.decls.push(format!("{name}: {}", primitives::info_for(prim).swift));
                out.args.push(name);
            }
            TypeRef::Qualified(q) => {
                let c = naming::c_type_name(q);
                let record = ctx.type_info(NAME, q)?.is_record();
                match transfer {
                    Transfer::RefMut if record => {
                        out.decls.push(format!("{name}: inout {c}"));
                        out.args.push(format!("&{name}"));
                    }
                    Transfer::Ref if record => {
                        out.decls.push(format!("{name}: {c}"));
                        out.scopes.push(format!("withUnsafePointer(to: {name}) {{ {ptr} in"));
                        out.args.push(ptr);
                    }
                    _ => {
                        out.decls.push(format!("{name}: {c}"));
                        out.args.push(name);
                    }
                }
            }
        }
    }
    Ok(out)
}

fn write_function(
    ctx: &EmitContext<'_>,
    w: &mut CodeWriter,
    op: &Operation<'_>,
    receiver: Receiver,
) -> Result<(), EmitError> {
    let params = match receiver {
        Receiver::Instance => &op.parameters[1..],
        Receiver::Static => &op.parameters[..],
    };
    let mut lowered = lower_params(ctx, params)?;
    if receiver == Receiver::Instance {
        lowered.args.insert(0, "handle".to_string());
    }
    let error = op.error.as_deref().map(naming::flat_type_name);
    let ret = op.return_type().map(|t| swift_return_type(ctx, t)).transpose()?;

    let mut head = String::from("public ");
    if receiver == Receiver::Static {
        head.push_str("static ");
    }
    head.push_str(&format!("func {}({})", swift_ident(&op.name), lowered.decls.join(", ")));
    if error.is_some() {
        head.push_str(" throws");
    }
    if let Some(r) = &ret {
        head.push_str(&format!(" -> {r}"));
    }

    if let Some(desc) = &op.description {
        w.line(&format!("/// {desc}"));
    }
    w.line(&format!("{head} {{"));
    w.indent();

    let returns = ret.is_some();
    let throws = error.is_some();
    for (i, scope) in lowered.scopes.iter().enumerate() {
        let lead = match (i == 0 && returns, throws) {
            (true, true) => "return try ",
            (true, false) => "return ",
            (false, true) => "try ",
            (false, false) => "",
        };
        w.line(&format!("{lead}{scope}"));
        w.indent();
    }

    let symbol = op.symbol(ctx.api_name());
    let mut args = lowered.args;
    match (op.shape(), op.return_type(), error) {
        (MethodShape::InfallibleVoid, _, _) => w.line(&format!("{symbol}({})", args.join(", "))),
        (MethodShape::InfallibleValue, Some(ty), _) => {
            let call = format!("{symbol}({})", args.join(", "));
            match TypeRef::parse(ty).and_then(|t| t.handle_name()) {
                Some(h) => w.line(&format!("return {h}(handle: {call}!)")),
                None => w.line(&format!("return {call}")),
            }
        }
        (MethodShape::FallibleVoid, _, Some(error)) => {
            w.line(&format!("let code = {symbol}({})", args.join(", ")));
            w.block("guard code == 0 else", |w| w.line(&format!("throw {error}.fromCode(code)")));
        }
        (MethodShape::FallibleValue, Some(ty), Some(error)) => {
            args.push("&result".to_string());
            let handle = TypeRef::parse(ty).and_then(|t| t.handle_name());
            match handle {
                Some(_) => w.line("var result: OpaquePointer? = nil"),
                None => w.line(&format!(
                    "var result: {} = {}",
                    swift_return_type(ctx, ty)?,
                    zero_value(ctx, ty)?
                )),
            }
            w.line(&format!("let code = {symbol}({})", args.join(", ")));
            match handle {
                Some(h) => {
                    w.block("guard code == 0, let ptr = result else", |w| {
                        w.line(&format!("throw {error}.fromCode(code)"));
                    });
                    w.line(&format!("return {h}(handle: ptr)"));
                }
                None => {
                    w.block("guard code == 0 else", |w| w.line(&format!("throw {error}.fromCode(code)")));
                    w.line("return result");
                }
            }
        }
        (shape, _, _) => {
            return Err(EmitError::internal(NAME, format!("{} has shape {shape:?} but no matching signature", op.name)));
        }
    }

    for _ in &lowered.scopes {
        w.dedent();
        w.line("}");
    }
    w.dedent();
    w.line("}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emit::test_support::{content, fixture, minimal, paths, run};

    #[test]
    fn single_source_file() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        assert_eq!(paths(&arts), ["ExampleApp.swift"]);
        assert!(content(&arts, "ExampleApp.swift").contains("import Foundation\n"));
    }

    #[test]
    fn error_enum_enumerates_resolved_values() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let swift = content(&arts, "TestApi.swift");
        assert!(swift.contains(
            "public enum CommonErrorCode: Int32, Error {\n    case ok = 0\n    case invalidArgument = 1\n    case outOfMemory = 2\n    case notFound = 3\n    case internalError = 4\n"
        ));
        assert!(swift.contains("return CommonErrorCode(rawValue: code) ?? .internalError"));
    }

    #[test]
    fn handle_class_owns_its_lifetime() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let swift = content(&arts, "TestApi.swift");
        assert!(swift.contains("/// The engine instance.\npublic final class Engine {\n    let handle: OpaquePointer\n"));
        assert!(swift.contains("    deinit {\n        test_api_lifecycle_destroy_engine(handle)\n    }\n"));
        assert!(swift.contains(
            "    public static func createEngine() throws -> Engine {\n        var result: OpaquePointer? = nil\n        let code = test_api_lifecycle_create_engine(&result)\n        guard code == 0, let ptr = result else {\n            throw CommonErrorCode.fromCode(code)\n        }\n        return Engine(handle: ptr)\n    }\n"
        ));
        assert!(!swift.contains("public enum TestApi"), "no free functions");
    }

    #[test]
    fn declarations_close_without_a_trailing_blank_line() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let swift = content(&arts, "ExampleApp.swift");
        assert!(!swift.contains("\n\n}"), "blank line before a closing brace");
        assert!(!swift.contains("\n\n    }"), "blank line before a closing brace");
        assert!(swift.contains("    }\n}\n\n/// A drawing surface bound to an engine.\npublic final class Renderer {"));
        assert!(swift.contains("        self.handle = handle\n    }\n\n    deinit {"));
        assert!(swift.trim_end().ends_with("    }\n}"));
    }

    #[test]
    fn scoped_accessors_nest_with_return_on_the_outermost() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let swift = content(&arts, "ExampleApp.swift");
        assert!(swift.contains(
            "    public func setTitle(title: String) {\n        title.withCString { titlePtr in\n            example_app_renderer_set_title(handle, titlePtr)\n        }\n    }\n"
        ));
        assert!(swift.contains("    public func readDepth(dest: inout [Float]) throws -> Int32 {\n        return try dest.withUnsafeMutableBufferPointer { destPtr in\n            var result: Int32 = 0\n"));
        assert!(swift.contains("example_app_renderer_read_depth(handle, destPtr.baseAddress, UInt32(destPtr.count), &result)"));
        assert!(swift.contains("    public func uploadPixels(pixels: [UInt8], format: Rendering_TextureFormat) throws {\n        try pixels.withUnsafeBufferPointer { pixelsPtr in\n"));
        assert!(swift.contains("        return try withUnsafePointer(to: config) { configPtr in\n"));
    }

    #[test]
    fn free_methods_go_in_the_namespace_enum() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let swift = content(&arts, "ExampleApp.swift");
        let ns = &swift[swift.find("public enum ExampleApp {").expect("namespace")..];
        assert!(ns.contains("    public static func getGreeting(name: String) -> Hello_Greeting {\n        return name.withCString { namePtr in\n            return example_app_info_get_greeting(namePtr)\n        }\n"));
        assert!(ns.contains("    public static func scale(value: Double, enabled: Bool) -> Double {\n        return example_app_info_scale(value, enabled)\n"));
    }

    #[test]
    fn record_returns_start_from_a_zeroed_struct() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let swift = content(&arts, "ExampleApp.swift");
        assert!(swift.contains("    public func getConfig() throws -> Rendering_RendererConfig {\n        var result: Rendering_RendererConfig = Rendering_RendererConfig()\n"));
    }

    #[test]
    fn case_names_follow_swift_conventions() {
        assert_eq!(case_name("InvalidArgument"), "invalidArgument");
        assert_eq!(case_name("RGBA8"), "rgba8");
        assert_eq!(case_name("URLError"), "urlError");
        assert_eq!(case_name("NOT_FOUND"), "notFound");
        assert_eq!(case_name("Default"), "`default`");
    }
}
