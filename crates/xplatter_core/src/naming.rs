//! Identifier naming transforms shared by every emitter.
//!
//! For an API `N`, interface `I` and method `M` the C ABI symbol is `N_I_M`. Handle `H` gets the
//! typedef `<snake(H)>_handle` and the opaque struct tag `<snake(H)>_s`. Everything an emitter prints
//! that another emitter must match is derived here.
//!
//! ## Examples
//! ```rust
//! use xplatter_core::naming;
//!
//! assert_eq!(naming::c_symbol("test_api", "lifecycle", "create_engine"), "test_api_lifecycle_create_engine");
//! assert_eq!(naming::handle_typedef("RenderTarget"), "render_target_handle");
//! assert_eq!(naming::pascal_case("hello_xplatter"), "HelloXplatter");
//! assert_eq!(naming::camel_case("create_engine"), "createEngine");
//! ```

/// Convert a snake_case identifier to PascalCase by splitting on underscores.
pub fn pascal_case(s: &str) -> String {
    s.split('_').filter(|part| !part.is_empty()).map(upper_first).collect()
}

/// PascalCase with the first letter lowered.
pub fn camel_case(s: &str) -> String {
    lower_first(&pascal_case(s))
}

pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Convert a PascalCase handle name to snake_case.
///
/// An underscore is inserted before every uppercase letter after the first, so acronyms split
/// per letter (`GPUBuffer` → `g_p_u_buffer`).
pub fn handle_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

pub fn upper_snake(s: &str) -> String {
    s.to_ascii_uppercase()
}

/// Exported C ABI symbol: `<api>_<interface>_<method>`.
pub fn c_symbol(api: &str, interface: &str, method: &str) -> String {
    format!("{api}_{interface}_{method}")
}

/// Platform-service symbol: `<api>_<service>`.
pub fn service_symbol(api: &str, service: &str) -> String {
    format!("{api}_{service}")
}

pub fn handle_typedef(handle: &str) -> String {
    format!("{}_handle", handle_to_snake(handle))
}

pub fn handle_struct_tag(handle: &str) -> String {
    format!("{}_s", handle_to_snake(handle))
}

/// Name of the synthetic destructor for a handle: `destroy_<snake(H)>`.
pub fn destructor_name(handle: &str) -> String {
    format!("destroy_{}", handle_to_snake(handle))
}

/// Whether a method name has constructor form: `create` or `create_<suffix>`.
pub fn is_constructor_name(name: &str) -> bool {
    name == "create" || name.strip_prefix("create_").is_some_and(|suffix| !suffix.is_empty())
}

pub fn export_macro(api: &str) -> String {
    format!("{}_EXPORT", upper_snake(api))
}

pub fn build_macro(api: &str) -> String {
    format!("{}_BUILD", upper_snake(api))
}

pub fn include_guard(api: &str) -> String {
    format!("{}_H", upper_snake(api))
}

/// C spelling of a qualified FlatBuffers type: dots become underscores (`Common.ErrorCode` → `Common_ErrorCode`).
pub fn c_type_name(qualified: &str) -> String {
    qualified.replace('.', "_")
}

/// Flattened spelling used by Rust, Kotlin, Swift and Go: dots removed (`Common.ErrorCode` → `CommonErrorCode`).
pub fn flat_type_name(qualified: &str) -> String {
    qualified.replace('.', "")
}

/// JVM package for an API: underscores become dots.
pub fn kotlin_package(api: &str) -> String {
    api.replace('_', ".")
}

/// Escape one segment of a JNI native symbol (`_` → `_1`).
pub fn jni_escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c => out.push_str(&format!("_0{:04x}", c as u32)),
        }
    }
    out
}

/// JNI symbol for a native method: `Java_<pkg segments>_<Class>_<method>`.
pub fn jni_symbol(package: &str, class: &str, method: &str) -> String {
    let mut out = String::from("Java");
    for segment in package.split('.').filter(|s| !s.is_empty()) {
        out.push('_');
        out.push_str(&jni_escape(segment));
    }
    out.push('_');
    out.push_str(&jni_escape(class));
    out.push('_');
    out.push_str(&jni_escape(method));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_and_camel() {
        assert_eq!(pascal_case("test_api"), "TestApi");
        assert_eq!(pascal_case("a__b_"), "AB");
        assert_eq!(camel_case("load_test_api"), "loadTestApi");
        assert_eq!(camel_case(""), "");
        assert_eq!(camel_case("InvalidArgument"), "invalidArgument");
    }

    #[test]
    fn handle_names() {
        assert_eq!(handle_to_snake("Engine"), "engine");
        assert_eq!(handle_to_snake("RenderTarget"), "render_target");
        assert_eq!(handle_struct_tag("Engine"), "engine_s");
        assert_eq!(destructor_name("RenderTarget"), "destroy_render_target");
    }

    #[test]
    fn constructor_names() {
        assert!(is_constructor_name("create"));
        assert!(is_constructor_name("create_engine"));
        assert!(!is_constructor_name("create_"));
        assert!(!is_constructor_name("created"));
        assert!(!is_constructor_name("make_engine"));
    }

    #[test]
    fn macros_and_type_names() {
        assert_eq!(export_macro("test_api"), "TEST_API_EXPORT");
        assert_eq!(build_macro("test_api"), "TEST_API_BUILD");
        assert_eq!(include_guard("test_api"), "TEST_API_H");
        assert_eq!(c_type_name("Common.ErrorCode"), "Common_ErrorCode");
        assert_eq!(flat_type_name("Common.ErrorCode"), "CommonErrorCode");
        assert_eq!(kotlin_package("hello_xplatter"), "hello.xplatter");
    }

    #[test]
    fn jni_symbols_escape_underscores() {
        assert_eq!(
            jni_symbol("hello.xplatter", "HelloXplatter", "nativeLifecycleCreateEngine"),
            "Java_hello_xplatter_HelloXplatter_nativeLifecycleCreateEngine"
        );
        assert_eq!(jni_escape("a_b"), "a_1b");
    }
}
