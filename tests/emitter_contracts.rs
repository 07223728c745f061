//! Cross-emitter agreement on the C ABI: every binding is a client of the header, so symbol names,
//! out-parameter pointees, record return conventions and handle teardown must line up.

mod support;

use xplatter::backend::layout;
use xplatter::frontend::{MethodShape, OperationKind};
use xplatter::{ApiDescription, ResolvedTypeMap};
use xplatter_core::{TypeRef, naming};

use support::{content, emit, full, greeter, minimal};

/// Parameters of the prototype of `symbol`, tolerant of one-parameter-per-line wrapping.
fn header_params(header: &str, symbol: &str) -> Vec<String> {
    let open = format!("{symbol}(");
    let start = header.find(&open).unwrap_or_else(|| panic!("{symbol} not declared")) + open.len();
    let end = start + header[start..].find(");").expect("prototype end");
    header[start..end]
        .split(',')
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

fn symbols(api: &ApiDescription) -> Vec<String> {
    api.interfaces
        .iter()
        .flat_map(|iface| iface.operations().into_iter().map(|op| op.symbol(&api.api.name)))
        .collect()
}

fn header(api: &ApiDescription, types: &ResolvedTypeMap) -> String {
    let arts = emit("cheader", api, types);
    content(&arts, &format!("{}.h", api.api.name)).to_string()
}

#[test]
fn every_symbol_is_declared_exactly_once() {
    for (api, types) in [minimal(), full()] {
        let header = header(&api, &types);
        for symbol in symbols(&api) {
            assert_eq!(header.matches(&format!("{symbol}(")).count(), 1, "{symbol} in header");
        }
    }
}

#[test]
fn implementation_shims_define_each_symbol_once() {
    let (api, types) = full();
    let cpp = emit("impl_cpp", &api, &types);
    let go = emit("impl_go", &api, &types);
    let wasm = emit("impl_go_wasm", &api, &types);
    let rust = emit("impl_rust", &api, &types);
    let files = [
        content(&cpp, "example_app_shim.cpp"),
        content(&go, "example_app_cgo.go"),
        content(&wasm, "example_app_wasm.go"),
        content(&rust, "example_app_ffi.rs"),
    ];
    for symbol in symbols(&api) {
        for file in files {
            assert_eq!(file.matches(&format!("{symbol}(")).count(), 1, "{symbol} defined once");
        }
    }
}

#[test]
fn bindings_reach_every_symbol() {
    let (api, types) = full();
    let kotlin = emit("kotlin", &api, &types);
    let swift = emit("swift", &api, &types);
    let js = emit("jswasm", &api, &types);
    let jni = content(&kotlin, "example_app_jni.c");
    let swift = content(&swift, "ExampleApp.swift");
    let js = content(&js, "example_app.js");
    for symbol in symbols(&api) {
        assert!(jni.contains(&format!("{symbol}(")), "JNI misses {symbol}");
        assert!(swift.contains(&format!("{symbol}(")), "Swift misses {symbol}");
        assert!(js.contains(&format!("_wasm.exports.{symbol}(")), "JS misses {symbol}");
    }
}

#[test]
fn out_parameter_pointees_agree_with_the_header() {
    let (api, types) = full();
    let header = header(&api, &types);
    let kotlin = emit("kotlin", &api, &types);
    let jni = content(&kotlin, "example_app_jni.c");
    let go = emit("impl_go", &api, &types);
    let cgo = content(&go, "example_app_cgo.go");

    let mut checked = 0;
    for iface in &api.interfaces {
        for op in iface.operations() {
            if op.shape() != MethodShape::FallibleValue {
                continue;
            }
            let symbol = op.symbol(&api.api.name);
            let params = header_params(&header, &symbol);
            let last = params.last().expect("out-parameter");
            let pointee = last
                .strip_suffix("* out_result")
                .unwrap_or_else(|| panic!("{symbol}: last parameter is {last:?}"));

            assert!(jni.contains(&format!("    {pointee} out_result;\n")), "JNI pointee for {symbol}");
            assert!(cgo.contains(&format!("out_result *C.{pointee})")), "cgo pointee for {symbol}");
            checked += 1;
        }
    }
    assert_eq!(checked, 4, "create_engine, create_renderer, get_config, read_depth");
}

#[test]
fn constructors_return_their_handle_through_out_result() {
    let (api, types) = full();
    let header = header(&api, &types);
    for iface in &api.interfaces {
        let Some(handle) = iface.constructed_handle() else {
            continue;
        };
        for op in iface.operations().into_iter().filter(|op| op.kind == OperationKind::Constructor) {
            let symbol = op.symbol(&api.api.name);
            assert!(header.contains(&format!("int32_t {symbol}(")));
            let params = header_params(&header, &symbol);
            assert_eq!(params.last().map(String::as_str), Some(format!("{}* out_result", naming::handle_typedef(handle)).as_str()));
        }
    }
}

#[test]
fn record_returns_use_the_same_convention_in_js_and_go_wasm() {
    let (api, types) = full();
    let js = emit("jswasm", &api, &types);
    let js = content(&js, "example_app.js");
    let wasm = emit("impl_go_wasm", &api, &types);
    let go = content(&wasm, "example_app_wasm.go");

    // Infallible record return: result pointer first.
    assert!(js.contains("_wasm.exports.example_app_info_get_greeting(_outPtr, _namePtr);"));
    assert!(go.contains("func example_app_info_get_greeting(sret uintptr, name uintptr) {"));

    // Fallible record return: out-parameter last, status returned.
    assert!(js.contains("_wasm.exports.example_app_renderer_get_config(renderer._ptr, _outPtr);"));
    assert!(go.contains("func example_app_renderer_get_config(renderer uintptr, out_result uintptr) int32 {"));

    let greeting = layout::struct_layout(&types, "Hello.Greeting").expect("layout");
    assert!(js.contains(&format!("const _outPtr = _malloc({});", greeting.size)));
}

#[test]
fn every_handle_has_one_destructor_and_every_wrapper_uses_it() {
    let (api, types) = full();
    let header = header(&api, &types);
    let kotlin = emit("kotlin", &api, &types);
    let kt = content(&kotlin, "ExampleApp.kt");
    let swift = emit("swift", &api, &types);
    let swift = content(&swift, "ExampleApp.swift");
    let js = emit("jswasm", &api, &types);
    let js = content(&js, "example_app.js");

    for handle in &api.handles {
        let owner = api.handle_owner(&handle.name).expect("constructed somewhere");
        let snake = naming::handle_to_snake(&handle.name);
        let symbol = naming::c_symbol(&api.api.name, &owner.name, &format!("destroy_{snake}"));
        assert_eq!(api.destructor_symbol(&handle.name).as_deref(), Some(symbol.as_str()));

        let destructors = header.matches(&format!("_destroy_{snake}(")).count();
        assert_eq!(destructors, 1, "{} destructors", handle.name);
        assert!(header.contains(&format!("void {symbol}({} {snake});", naming::handle_typedef(&handle.name))));

        let native = format!(
            "ExampleApp.native{}Destroy{}(handle)",
            naming::pascal_case(&owner.name),
            handle.name
        );
        assert!(kt.contains(&native), "Kotlin close for {}", handle.name);
        assert!(swift.contains(&format!("    deinit {{\n        {symbol}(handle)\n    }}\n")), "Swift deinit");
        assert!(js.contains(&format!("_wasm.exports.{symbol}(this.#ptr);")), "JS dispose");
    }
}

#[test]
fn enum_slots_are_as_wide_as_the_c_enum() {
    let (api, types) = greeter();
    let header = header(&api, &types);
    assert!(header.contains("typedef enum {"));
    assert!(header.contains("} Hello_Format;"));
    let params = header_params(&header, "hello_greeter_preferred_format");
    assert_eq!(params.last().map(String::as_str), Some("Hello_Format* out_result"));

    // `Format` is a ubyte enum in the schema but an int-sized C enum in the header.
    assert_eq!(layout::value_size(&types, "Hello.Format"), Ok(4));
    let style = layout::struct_layout(&types, "Hello.Style").expect("layout");
    let format = style.field("format").expect("format slot");
    assert_eq!((format.offset, format.size), (0, 4));
    assert_eq!(style.field("weight").map(|f| f.offset), Some(4));
    assert_eq!(style.size, 8);

    let js = emit("jswasm", &api, &types);
    let js = content(&js, "hello.js");
    assert!(js.contains("const _outPtr = _malloc(4);"));
    assert!(js.contains("return _view().getInt32(_outPtr, true);"));

    let wasm = emit("impl_go_wasm", &api, &types);
    let go = content(&wasm, "hello_wasm.go");
    assert!(go.contains("\t*(*int32)(unsafe.Pointer(out_result)) = int32(result)\n"));

    let rust = emit("impl_rust", &api, &types);
    let rs = content(&rust, "hello_types.rs");
    assert!(rs.contains("#[repr(i32)]"));
    assert!(!rs.contains("#[repr(u8)]"));
}

#[test]
fn handle_values_satisfy_every_interface_dispatching_on_them() {
    for (api, types) in [full(), greeter()] {
        let name = &api.api.name;
        let go = emit("impl_go", &api, &types);
        let cgo = content(&go, &format!("{name}_cgo.go"));
        let scaffold = content(&go, &format!("{name}_impl.go"));
        let wasm = emit("impl_go_wasm", &api, &types);
        let wasm = content(&wasm, &format!("{name}_wasm.go"));

        for iface in &api.interfaces {
            for op in iface.operations() {
                match op.kind {
                    OperationKind::Constructor => {
                        let handle = op
                            .return_type()
                            .and_then(TypeRef::parse)
                            .and_then(|t| t.handle_name())
                            .expect("constructors return handles");
                        let stored = format!("_allocHandle(&{handle}Impl{{}})");
                        assert!(cgo.contains(&stored), "cgo {} stores {handle}Impl", op.name);
                        assert!(wasm.contains(&stored), "wasm {} stores {handle}Impl", op.name);
                    }
                    OperationKind::Method => {
                        let Some(handle) = op.leading_handle() else {
                            continue;
                        };
                        let check = format!("var _ {} = (*{handle}Impl)(nil)", naming::pascal_case(&iface.name));
                        assert!(scaffold.contains(&check), "{name}: {check}");
                    }
                    OperationKind::Destructor => {}
                }
            }
        }
    }
}
