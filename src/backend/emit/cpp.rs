//! C++ implementation emitter.
//!
//! Produces an abstract interface class, an `extern "C"` shim that forwards every ABI symbol to it,
//! and scaffold `Impl` files plus a `CMakeLists.txt`. Lifecycle symbols never reach the interface:
//! constructors call the `create_<api>_instance()` factory and destructors `delete` the instance.
//! Operations without a leading handle dispatch to a lazily created default instance.

use xplatter_core::lang::primitives;
use xplatter_core::naming;
use xplatter_core::{Transfer, TypeRef};

use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::ctypes::{self, CSignature, OUT_RESULT};
use crate::backend::errors::EmitError;
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;
use crate::frontend::model::{InterfaceDef, MethodDef, MethodShape, Operation, OperationKind, ParameterDef};

pub const NAME: &str = "impl_cpp";

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    let api = ctx.api_name();
    let cpp = Cpp::new(ctx);
    Ok(vec![
        Artifact::generated(format!("{api}_interface.h"), cpp.interface_header()?),
        Artifact::generated(format!("{api}_shim.cpp"), cpp.shim()?),
        Artifact::scaffold(format!("{api}_impl.h"), cpp.impl_header()?),
        Artifact::scaffold(format!("{api}_impl.cpp"), cpp.impl_source()?),
        Artifact::scaffold("CMakeLists.txt", cpp.cmake()),
    ])
}

struct Cpp<'a> {
    ctx: &'a EmitContext<'a>,
    interface_class: String,
    impl_class: String,
    factory: String,
}

impl<'a> Cpp<'a> {
    fn new(ctx: &'a EmitContext<'a>) -> Self {
        let pascal = ctx.pascal_api();
        Self {
            ctx,
            interface_class: format!("{pascal}Interface"),
            impl_class: format!("{pascal}Impl"),
            factory: format!("create_{}_instance", ctx.api_name()),
        }
    }

    /// Virtual method name; prefixed with the interface when another interface reuses the name.
    fn method_name(&self, iface: &InterfaceDef, method: &MethodDef) -> String {
        let clashes = self
            .ctx
            .api
            .interfaces
            .iter()
            .filter(|other| other.name != iface.name)
            .any(|other| other.methods.iter().any(|m| m.name == method.name));
        if clashes {
            format!("{}_{}", iface.name, method.name)
        } else {
            method.name.clone()
        }
    }

    fn return_type(&self, method: &MethodDef) -> Result<String, EmitError> {
        match (method.shape(), method.return_type()) {
            (MethodShape::FallibleVoid | MethodShape::FallibleValue, _) => Ok("int32_t".to_string()),
            (MethodShape::InfallibleValue, Some(ty)) => ctypes::c_value_type(NAME, ty),
            _ => Ok("void".to_string()),
        }
    }

    fn params(&self, method: &MethodDef) -> Result<Vec<String>, EmitError> {
        let mut out = Vec::with_capacity(method.parameters.len() + 1);
        for p in &method.parameters {
            out.push(self.param(p)?);
        }
        if let (MethodShape::FallibleValue, Some(ty)) = (method.shape(), method.return_type()) {
            out.push(format!("{}* {OUT_RESULT}", ctypes::c_value_type(NAME, ty)?));
        }
        Ok(out)
    }

    fn param(&self, p: &ParameterDef) -> Result<String, EmitError> {
        let transfer = p.effective_transfer();
        let ty = match self.ctx.classify(NAME, &p.ty)? {
            TypeRef::String => "std::string_view".to_string(),
            TypeRef::Buffer(elem) => {
                let c = primitives::info_for(elem).c;
                if transfer.is_mut() { format!("std::span<{c}>") } else { format!("std::span<const {c}>") }
            }
            TypeRef::Handle(h) => naming::handle_typedef(h),
            TypeRef::Primitive(prim) => primitives::info_for(prim).c.to_string(),
            TypeRef::Qualified(q) => {
                let c = naming::c_type_name(q);
                match transfer {
                    Transfer::Value if self.ctx.is_enum(q) => c,
                    Transfer::Value => format!("const {c}&"),
                    Transfer::Ref => format!("const {c}*"),
                    Transfer::RefMut => format!("{c}*"),
                }
            }
        };
        Ok(format!("{ty} {}", p.name))
    }

    fn call_args(&self, method: &MethodDef) -> Result<Vec<String>, EmitError> {
        let mut args = Vec::new();
        for p in &method.parameters {
            let arg = match self.ctx.classify(NAME, &p.ty)? {
                TypeRef::String => format!("std::string_view({})", p.name),
                TypeRef::Buffer(elem) => {
                    let c = primitives::info_for(elem).c;
                    let inner = if p.effective_transfer().is_mut() { c.to_string() } else { format!("const {c}") };
                    format!("std::span<{inner}>({name}, {name}_len)", name = p.name)
                }
                _ => p.name.clone(),
            };
            args.push(arg);
        }
        if method.shape() == MethodShape::FallibleValue {
            args.push(OUT_RESULT.to_string());
        }
        Ok(args)
    }

    fn interface_header(&self) -> Result<String, EmitError> {
        let api = self.ctx.api_name();
        let guard = format!("{}_INTERFACE_H", naming::upper_snake(api));
        let mut w = CodeWriter::new();
        w.write(&banner::generated(CommentStyle::Slash, &self.ctx.source_name()));
        w.line(&format!("#ifndef {guard}"));
        w.line(&format!("#define {guard}"));
        w.blank_line();
        w.lines(["#include <cstddef>", "#include <cstdint>", "#include <span>", "#include <string_view>"]);
        w.line(&format!("#include \"{api}.h\""));
        w.blank_line();

        let class = &self.interface_class;
        w.line(&format!("class {class} {{"));
        w.line("public:");
        w.indent();
        w.line(&format!("virtual ~{class}() = default;"));
        self.write_virtuals(&mut w, "virtual ", " = 0;")?;
        w.dedent();
        w.line("};");
        w.blank_line();
        w.line("// Implement this to return your concrete instance.");
        w.line(&format!("{class}* {}();", self.factory));
        w.blank_line();
        w.line(&format!("#endif /* {guard} */"));
        Ok(w.finish())
    }

    fn write_virtuals(&self, w: &mut CodeWriter, prefix: &str, suffix: &str) -> Result<(), EmitError> {
        for iface in &self.ctx.api.interfaces {
            if iface.methods.is_empty() {
                continue;
            }
            w.blank_line();
            w.line(&format!("/* {} */", iface.name));
            for m in &iface.methods {
                w.line(&format!(
                    "{prefix}{} {}({}){suffix}",
                    self.return_type(m)?,
                    self.method_name(iface, m),
                    self.params(m)?.join(", ")
                ));
            }
        }
        Ok(())
    }

    fn shim(&self) -> Result<String, EmitError> {
        let api = self.ctx.api_name();
        let class = &self.interface_class;
        let export = naming::export_macro(api);
        let mut w = CodeWriter::new();
        w.write(&banner::generated(CommentStyle::Slash, &self.ctx.source_name()));
        w.line(&format!("#include \"{api}_interface.h\""));
        w.line(&format!("#include \"{api}.h\""));
        w.blank_line();

        let needs_default = self
            .ctx
            .api
            .interfaces
            .iter()
            .flat_map(|i| i.methods.iter())
            .any(|m| m.leading_handle().is_none());
        if needs_default {
            w.line("namespace {");
            w.blank_line();
            w.block(&format!("{class}* default_instance()"), |w| {
                w.line(&format!("static {class}* instance = {}();", self.factory));
                w.line("return instance;");
            });
            w.blank_line();
            w.line("} // namespace");
            w.blank_line();
        }

        w.line("extern \"C\" {");
        w.blank_line();
        for iface in &self.ctx.api.interfaces {
            w.line(&format!("/* {} */", iface.name));
            for op in iface.operations() {
                let sig = CSignature::for_operation(self.ctx, NAME, &op)?;
                sig.write(&mut w, Some(&export), " {");
                w.indent();
                self.shim_body(&mut w, iface, &op)?;
                w.dedent();
                w.line("}");
                w.blank_line();
            }
        }
        w.line("} // extern \"C\"");
        Ok(w.finish())
    }

    fn shim_body(&self, w: &mut CodeWriter, iface: &InterfaceDef, op: &Operation<'_>) -> Result<(), EmitError> {
        let class = &self.interface_class;
        match op.kind {
            OperationKind::Constructor => {
                let handle = op
                    .return_type()
                    .and_then(TypeRef::parse)
                    .and_then(|t| t.handle_name())
                    .ok_or_else(|| EmitError::internal(NAME, format!("constructor {} does not return a handle", op.name)))?;
                for p in &op.parameters {
                    w.line(&format!("(void){};", p.name));
                }
                let failure = match op.error.as_deref() {
                    Some(err) => self.ctx.failure_constant(NAME, err)?,
                    None => "1".to_string(),
                };
                w.line(&format!("{class}* instance = {}();", self.factory));
                w.block("if (!instance)", |w| w.line(&format!("return {failure};")));
                w.line(&format!("*{OUT_RESULT} = reinterpret_cast<{}>(instance);", naming::handle_typedef(handle)));
                w.line("return 0;");
            }
            OperationKind::Destructor => {
                let param = op
                    .parameters
                    .first()
                    .ok_or_else(|| EmitError::internal(NAME, format!("destructor {} has no parameter", op.name)))?;
                w.line(&format!("delete reinterpret_cast<{class}*>({});", param.name));
            }
            OperationKind::Method => {
                let target = match op.parameters.first() {
                    Some(p) if op.leading_handle().is_some() => format!("reinterpret_cast<{class}*>({})", p.name),
                    _ => "default_instance()".to_string(),
                };
                w.line(&format!("{class}* self = {target};"));
                let call = format!(
                    "self->{}({})",
                    self.method_name(iface, op),
                    self.call_args(op)?.join(", ")
                );
                if op.shape() == MethodShape::InfallibleVoid {
                    w.line(&format!("{call};"));
                } else {
                    w.line(&format!("return {call};"));
                }
            }
        }
        Ok(())
    }

    fn impl_header(&self) -> Result<String, EmitError> {
        let api = self.ctx.api_name();
        let guard = format!("{}_IMPL_H", naming::upper_snake(api));
        let mut w = CodeWriter::new();
        w.write(&banner::scaffold(CommentStyle::Slash, &self.ctx.source_name()));
        w.line(&format!("#ifndef {guard}"));
        w.line(&format!("#define {guard}"));
        w.blank_line();
        w.line(&format!("#include \"{api}_interface.h\""));
        w.blank_line();
        let mut body = CodeWriter::new();
        body.indent();
        body.line(&format!("{}();", self.impl_class));
        body.line(&format!("~{}() override;", self.impl_class));
        self.write_virtuals(&mut body, "", " override;")?;
        w.line(&format!("class {} : public {} {{", self.impl_class, self.interface_class));
        w.line("public:");
        w.write(&body.finish());
        w.line("};");
        w.blank_line();
        w.line(&format!("#endif /* {guard} */"));
        Ok(w.finish())
    }

    fn impl_source(&self) -> Result<String, EmitError> {
        let api = self.ctx.api_name();
        let class = &self.impl_class;
        let mut w = CodeWriter::new();
        w.write(&banner::scaffold(CommentStyle::Slash, &self.ctx.source_name()));
        w.line(&format!("#include \"{api}_impl.h\""));
        w.blank_line();
        w.block(&format!("{class}::{class}()"), |w| w.line("// TODO: initialise state"));
        w.blank_line();
        w.block(&format!("{class}::~{class}()"), |w| w.line("// TODO: release state"));
        w.blank_line();
        for iface in &self.ctx.api.interfaces {
            for m in &iface.methods {
                let header = format!(
                    "{} {class}::{}({})",
                    self.return_type(m)?,
                    self.method_name(iface, m),
                    self.params(m)?.join(", ")
                );
                let shape = m.shape();
                w.block(&header, |w| {
                    w.line("// TODO: implement");
                    match shape {
                        MethodShape::FallibleVoid | MethodShape::FallibleValue => w.line("return 0;"),
                        MethodShape::InfallibleValue => w.line("return {};"),
                        MethodShape::InfallibleVoid => {}
                    }
                });
                w.blank_line();
            }
        }
        w.block(&format!("{}* {}()", self.interface_class, self.factory), |w| {
            w.line(&format!("return new {class}();"));
        });
        Ok(w.finish())
    }

    fn cmake(&self) -> String {
        let api = self.ctx.api_name();
        let project = api.replace('_', "-");
        let mut w = CodeWriter::new();
        w.write(&banner::scaffold(CommentStyle::Hash, &self.ctx.source_name()));
        w.line("cmake_minimum_required(VERSION 3.15)");
        w.line(&format!("project({project} VERSION {} LANGUAGES C CXX)", self.ctx.api.api.version));
        w.blank_line();
        w.line("set(CMAKE_CXX_STANDARD 20)");
        w.line("set(CMAKE_CXX_STANDARD_REQUIRED ON)");
        w.blank_line();
        w.line(&format!("add_library({project} SHARED"));
        w.indented(|w| {
            w.line(&format!("{api}_shim.cpp"));
            w.line(&format!("{api}_impl.cpp"));
        });
        w.line(")");
        w.blank_line();
        w.line(&format!("target_compile_definitions({project} PRIVATE {})", naming::build_macro(api)));
        w.line(&format!("target_include_directories({project} PRIVATE ${{CMAKE_CURRENT_SOURCE_DIR}})"));
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emit::test_support::{content, fixture, minimal, run};

    #[test]
    fn interface_omits_lifecycle_operations() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let iface = content(&arts, "test_api_interface.h");
        assert!(iface.contains("class TestApiInterface {"));
        assert!(!iface.contains("create_engine"));
        assert!(!iface.contains("destroy_engine"));
        assert!(iface.contains("TestApiInterface* create_test_api_instance();"));
    }

    #[test]
    fn shim_routes_lifecycle_through_the_factory() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let shim = content(&arts, "test_api_shim.cpp");
        assert!(shim.contains(
            "TEST_API_EXPORT int32_t test_api_lifecycle_create_engine(engine_handle* out_result) {\n    TestApiInterface* instance = create_test_api_instance();\n    if (!instance) {\n        return Common_ErrorCode_InternalError;\n    }\n    *out_result = reinterpret_cast<engine_handle>(instance);\n    return 0;\n}"
        ));
        assert!(shim.contains(
            "TEST_API_EXPORT void test_api_lifecycle_destroy_engine(engine_handle engine) {\n    delete reinterpret_cast<TestApiInterface*>(engine);\n}"
        ));
        assert!(!shim.contains("default_instance"));
    }

    #[test]
    fn methods_forward_with_views_and_spans() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let iface = content(&arts, "example_app_interface.h");
        assert!(iface.contains(
            "virtual int32_t upload_pixels(renderer_handle renderer, std::span<const uint8_t> pixels, Rendering_TextureFormat format) = 0;"
        ));
        assert!(iface.contains("virtual void set_title(renderer_handle renderer, std::string_view title) = 0;"));
        assert!(iface.contains(
            "virtual int32_t get_config(renderer_handle renderer, Rendering_RendererConfig* out_result) = 0;"
        ));
        assert!(iface.contains("virtual Hello_Greeting get_greeting(std::string_view name) = 0;"));

        let shim = content(&arts, "example_app_shim.cpp");
        assert!(shim.contains("return self->upload_pixels(renderer, std::span<const uint8_t>(pixels, pixels_len), format);"));
        assert!(shim.contains("return self->read_depth(renderer, std::span<float>(dest, dest_len), out_result);"));
        assert!(!shim.contains("TestApiInterface"));
        assert!(shim.contains("ExampleAppInterface* self = default_instance();"));
        assert!(shim.contains("(void)config;"));
    }

    #[test]
    fn scaffolds_are_marked() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let flags: Vec<(String, bool)> = arts.iter().map(|a| (a.path.display().to_string(), a.is_scaffold)).collect();
        assert_eq!(
            flags,
            [
                ("test_api_interface.h".to_string(), false),
                ("test_api_shim.cpp".to_string(), false),
                ("test_api_impl.h".to_string(), true),
                ("test_api_impl.cpp".to_string(), true),
                ("CMakeLists.txt".to_string(), true),
            ]
        );
        assert!(content(&arts, "CMakeLists.txt").contains("add_library(test-api SHARED"));
    }
}
