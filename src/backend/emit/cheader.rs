//! C header emitter: `<api>.h`, the ABI every other emitter binds to.

use xplatter_core::naming;

use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::ctypes::{self, CSignature, PLATFORM_SERVICES};
use crate::backend::errors::EmitError;
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;

pub const NAME: &str = "cheader";

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    let content = render(ctx)?;
    Ok(vec![Artifact::generated(format!("{}.h", ctx.api_name()), content)])
}

/// Full header text, banner included.
pub fn render(ctx: &EmitContext<'_>) -> Result<String, EmitError> {
    let api = ctx.api_name();
    let guard = naming::include_guard(api);
    let mut w = CodeWriter::new();
    w.write(&banner::generated(CommentStyle::Slash, &ctx.source_name()));

    w.line(&format!("#ifndef {guard}"));
    w.line(&format!("#define {guard}"));
    w.blank_line();
    w.line("#include <stdint.h>");
    w.line("#include <stdbool.h>");
    w.blank_line();

    write_export_macro(&mut w, api);

    w.line("#ifdef __cplusplus");
    w.line("extern \"C\" {");
    w.line("#endif");
    w.blank_line();

    ctypes::write_handle_typedefs(ctx, &mut w);
    ctypes::write_fbs_typedefs(ctx, &mut w);

    w.line("/* Platform services: implement these per platform */");
    for service in &PLATFORM_SERVICES {
        w.line(&service.prototype(api));
    }
    w.blank_line();

    let export = naming::export_macro(api);
    for iface in &ctx.api.interfaces {
        w.line(&format!("/* {} */", iface.name));
        for op in iface.operations() {
            CSignature::for_operation(ctx, NAME, &op)?.write(&mut w, Some(&export), ";");
        }
        w.blank_line();
    }

    w.line("#ifdef __cplusplus");
    w.line("}");
    w.line("#endif");
    w.blank_line();
    w.line(&format!("#endif /* {guard} */"));
    Ok(w.finish())
}

fn write_export_macro(w: &mut CodeWriter, api: &str) {
    let export = naming::export_macro(api);
    let build = naming::build_macro(api);
    w.lines([
        "/* Symbol visibility */".to_string(),
        "#if defined(_WIN32) || defined(_WIN64)".to_string(),
        format!("  #ifdef {build}"),
        format!("    #define {export} __declspec(dllexport)"),
        "  #else".to_string(),
        format!("    #define {export} __declspec(dllimport)"),
        "  #endif".to_string(),
        "#elif defined(__GNUC__) || defined(__clang__)".to_string(),
        format!("  #define {export} __attribute__((visibility(\"default\")))"),
        "#else".to_string(),
        format!("  #define {export}"),
        "#endif".to_string(),
        String::new(),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emit::test_support::{fixture, minimal};

    #[test]
    fn minimal_header_matches_the_abi() {
        let (api, types) = minimal();
        let header = render(&EmitContext::new(&api, &types)).unwrap();
        assert!(header.contains("typedef struct engine_s* engine_handle;"));
        assert!(header.contains("TEST_API_EXPORT int32_t test_api_lifecycle_create_engine(engine_handle* out_result);"));
        assert!(header.contains("TEST_API_EXPORT void test_api_lifecycle_destroy_engine(engine_handle engine);"));
        for service in &PLATFORM_SERVICES {
            assert!(header.contains(&service.prototype("test_api")), "missing {}", service.name);
        }
        assert!(header.contains("#ifndef TEST_API_H"));
        assert!(header.contains("    Common_ErrorCode_InternalError = 4\n} Common_ErrorCode;"));
    }

    #[test]
    fn every_symbol_is_declared_exactly_once() {
        let (api, types) = fixture();
        let header = render(&EmitContext::new(&api, &types)).unwrap();
        for iface in &api.interfaces {
            for op in iface.operations() {
                let sym = format!(" {}(", op.symbol(&api.api.name));
                assert_eq!(header.matches(&sym).count(), 1, "{sym}");
            }
        }
    }

    #[test]
    fn header_starts_with_a_banner() {
        let (api, types) = minimal();
        let header = render(&EmitContext::new(&api, &types)).unwrap();
        assert!(header.starts_with("// Code generated by xplatter"));
        assert!(header.trim_end().ends_with("#endif /* TEST_API_H */"));
    }
}
