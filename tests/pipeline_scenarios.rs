//! End-to-end scenarios: a description goes in, exact artifact text comes out.

mod support;

use xplatter::backend::ctypes::PLATFORM_SERVICES;
use xplatter::backend::{layout, planner, registry};
use xplatter_core::{ImplLangId, TargetId};

use support::{content, emit, full, minimal};

#[test]
fn minimal_header_declares_handle_lifecycle_and_services() {
    let (api, types) = minimal();
    let arts = emit("cheader", &api, &types);
    let header = content(&arts, "test_api.h");

    assert!(header.contains("typedef struct engine_s* engine_handle;"));
    assert!(header.contains("int32_t test_api_lifecycle_create_engine(engine_handle* out_result);"));
    assert!(header.contains("void test_api_lifecycle_destroy_engine(engine_handle engine);"));
    for service in PLATFORM_SERVICES {
        assert!(header.contains(&service.prototype("test_api")), "missing {}", service.name);
    }
}

#[test]
fn cpp_interface_leaves_lifecycle_to_the_shim() {
    let (api, types) = minimal();
    let arts = emit("impl_cpp", &api, &types);

    let iface = content(&arts, "test_api_interface.h");
    assert!(!iface.contains("virtual int32_t create_engine"));
    assert!(!iface.contains("destroy_engine"));

    let shim = content(&arts, "test_api_shim.cpp");
    assert!(shim.contains("TestApiInterface* instance = create_test_api_instance();"));
    assert!(shim.contains("*out_result = reinterpret_cast<engine_handle>(instance);\n    return 0;"));
    assert!(shim.contains("delete reinterpret_cast<TestApiInterface*>(engine);"));
}

#[test]
fn string_pair_record_has_wasm32_pointer_layout() {
    let (_, types) = full();
    let greeting = layout::struct_layout(&types, "Hello.Greeting").expect("layout");
    assert_eq!(greeting.size, 8);
    assert_eq!(greeting.field("message").expect("message").offset, 0);
    assert_eq!(greeting.field("api_impl").expect("api_impl").offset, 4);
}

#[test]
fn js_fallible_constructor_throws_and_frees() {
    let (api, types) = minimal();
    let arts = emit("jswasm", &api, &types);
    let js = content(&arts, "test_api.js");

    let start = js.find("    createEngine() {").expect("createEngine wrapper");
    let body = &js[start..];
    let body = &body[..body.find("\n    },\n").expect("wrapper end")];

    let steps = [
        "const _outPtr = _malloc(4);",
        "const _rc = _wasm.exports.test_api_lifecycle_create_engine(_outPtr);",
        "throw new Error(`createEngine failed with error code ${_rc}`);",
        "return new Engine(_view().getUint32(_outPtr, true));",
        "} finally {",
        "_free(_outPtr);",
    ];
    let mut cursor = 0;
    for step in steps {
        let at = body[cursor..].find(step).unwrap_or_else(|| panic!("{step:?} missing or out of order in:\n{body}"));
        cursor += at + step.len();
    }
}

#[test]
fn planner_collapses_apple_targets_into_one_swift_emitter() {
    let plan = planner::plan(&[TargetId::Ios, TargetId::Macos], ImplLangId::Rust);
    insta::assert_snapshot!(
        plan.names().join(", "),
        @"cheader, swift, impl_rust, impl_rust_build_system, impl_platform_services"
    );
    assert!(plan.unregistered(registry::global()).is_empty());
}

#[test]
fn kotlin_maps_error_codes_to_a_typed_exception() {
    let (api, types) = minimal();
    let arts = emit("kotlin", &api, &types);
    let kt = content(&arts, "TestApi.kt");

    assert!(kt.contains("class CommonErrorCodeException(val errorCode: Int) : Exception(\"Error code: $errorCode\")"));
    assert!(kt.contains(
        "    fun createEngine(): Engine {\n        val result = nativeLifecycleCreateEngine()\n        if (result[0] != 0L) throw CommonErrorCodeException(result[0].toInt())\n        return Engine(result[1])\n    }"
    ));
}

#[test]
fn full_description_runs_through_every_planned_emitter() {
    let (api, types) = full();
    let plan = planner::plan(&api.effective_targets(), api.api.impl_lang);
    let mut paths = Vec::new();
    for name in plan {
        for artifact in emit(name, &api, &types) {
            assert!(!artifact.content.is_empty(), "{name} produced an empty {}", artifact.path.display());
            paths.push(artifact.destination(std::path::Path::new("out/generated")));
        }
    }
    let mut unique = paths.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), paths.len(), "two emitters wrote the same file: {paths:?}");
}
