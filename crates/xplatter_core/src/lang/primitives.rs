//! Primitive type vocabulary.
//!
//! One row per primitive accepted in an API description (`int8` … `float64`, `bool`), carrying every
//! per-language spelling the emitters need. Adding a column here is the only way an emitter learns
//! a new spelling.
//!
//! ## Notes
//! - Lookup via [`from_str`] accepts the canonical spelling only; [`from_fbs`] also accepts the
//!   FlatBuffers schema aliases (`ubyte`, `int`, `double`, …).
//! - WebAssembly-32 size equals natural alignment for every primitive.
//!
//! ## Examples
//! ```rust
//! use xplatter_core::lang::primitives::{self, PrimitiveId};
//!
//! assert_eq!(primitives::from_fbs("ubyte"), Some(PrimitiveId::UInt8));
//! assert_eq!(primitives::info_for(PrimitiveId::Float64).swift, "Double");
//! assert_eq!(primitives::info_for(PrimitiveId::Int64).wasm_size, 8);
//! ```

/// Stable identifier for primitive types.
///
/// The discriminant doubles as the row index into [`PRIMITIVES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveId {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
}

/// Metadata for a primitive type.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveInfo {
    pub id: PrimitiveId,
    /// Spelling used in API descriptions.
    pub canonical: &'static str,
    /// Alternative spellings accepted inside FlatBuffers schemas.
    pub fbs_aliases: &'static [&'static str],
    pub c: &'static str,
    pub rust: &'static str,
    pub go: &'static str,
    /// cgo spelling of the C type (`C.int32_t`).
    pub cgo: &'static str,
    pub kotlin: &'static str,
    /// Kotlin primitive array used for `buffer<P>` parameters.
    pub kotlin_array: &'static str,
    pub jni: &'static str,
    pub jni_array: &'static str,
    /// JNI type descriptor (`I`, `J`, …).
    pub jni_signature: &'static str,
    /// Infix of the JNI `Get<X>ArrayElements` accessor family.
    pub jni_array_accessor: &'static str,
    pub swift: &'static str,
    /// Size and alignment in bytes on WebAssembly 32-bit.
    pub wasm_size: u32,
    /// Suffix of the JavaScript `DataView` accessor (`getInt32`, `getBigUint64`, …).
    pub data_view: &'static str,
    pub js_typed_array: &'static str,
}

impl PrimitiveInfo {
    /// Whether the JavaScript side sees this primitive as a `BigInt`.
    pub fn is_bigint(&self) -> bool {
        self.data_view.starts_with("Big")
    }

    /// Whether this primitive may be a `buffer<P>` element.
    pub fn is_buffer_element(&self) -> bool {
        self.id != PrimitiveId::Bool
    }
}

/// Registry of primitive types, in [`PrimitiveId`] order.
pub const PRIMITIVES: &[PrimitiveInfo] = &[
    row(PrimitiveId::Int8, "int8", &["byte"], "int8_t", "i8", "int8", "C.int8_t")
        .kotlin("Byte", "ByteArray")
        .jni("jbyte", "jbyteArray", "B", "Byte")
        .swift("Int8")
        .wasm(1, "Int8", "Int8Array"),
    row(PrimitiveId::Int16, "int16", &["short"], "int16_t", "i16", "int16", "C.int16_t")
        .kotlin("Short", "ShortArray")
        .jni("jshort", "jshortArray", "S", "Short")
        .swift("Int16")
        .wasm(2, "Int16", "Int16Array"),
    row(PrimitiveId::Int32, "int32", &["int"], "int32_t", "i32", "int32", "C.int32_t")
        .kotlin("Int", "IntArray")
        .jni("jint", "jintArray", "I", "Int")
        .swift("Int32")
        .wasm(4, "Int32", "Int32Array"),
    row(PrimitiveId::Int64, "int64", &["long"], "int64_t", "i64", "int64", "C.int64_t")
        .kotlin("Long", "LongArray")
        .jni("jlong", "jlongArray", "J", "Long")
        .swift("Int64")
        .wasm(8, "BigInt64", "BigInt64Array"),
    row(PrimitiveId::UInt8, "uint8", &["ubyte"], "uint8_t", "u8", "uint8", "C.uint8_t")
        .kotlin("Byte", "ByteArray")
        .jni("jbyte", "jbyteArray", "B", "Byte")
        .swift("UInt8")
        .wasm(1, "Uint8", "Uint8Array"),
    row(PrimitiveId::UInt16, "uint16", &["ushort"], "uint16_t", "u16", "uint16", "C.uint16_t")
        .kotlin("Short", "ShortArray")
        .jni("jshort", "jshortArray", "S", "Short")
        .swift("UInt16")
        .wasm(2, "Uint16", "Uint16Array"),
    row(PrimitiveId::UInt32, "uint32", &["uint"], "uint32_t", "u32", "uint32", "C.uint32_t")
        .kotlin("Int", "IntArray")
        .jni("jint", "jintArray", "I", "Int")
        .swift("UInt32")
        .wasm(4, "Uint32", "Uint32Array"),
    row(PrimitiveId::UInt64, "uint64", &["ulong"], "uint64_t", "u64", "uint64", "C.uint64_t")
        .kotlin("Long", "LongArray")
        .jni("jlong", "jlongArray", "J", "Long")
        .swift("UInt64")
        .wasm(8, "BigUint64", "BigUint64Array"),
    row(PrimitiveId::Float32, "float32", &["float"], "float", "f32", "float32", "C.float")
        .kotlin("Float", "FloatArray")
        .jni("jfloat", "jfloatArray", "F", "Float")
        .swift("Float")
        .wasm(4, "Float32", "Float32Array"),
    row(PrimitiveId::Float64, "float64", &["double"], "double", "f64", "float64", "C.double")
        .kotlin("Double", "DoubleArray")
        .jni("jdouble", "jdoubleArray", "D", "Double")
        .swift("Double")
        .wasm(8, "Float64", "Float64Array"),
    row(PrimitiveId::Bool, "bool", &[], "bool", "bool", "bool", "C.bool")
        .kotlin("Boolean", "BooleanArray")
        .jni("jboolean", "jbooleanArray", "Z", "Boolean")
        .swift("Bool")
        .wasm(1, "Uint8", "Uint8Array"),
];

/// Resolve a canonical primitive spelling.
///
/// ## Parameters
/// - `name`: Candidate spelling from an API description (`"uint32"`).
///
/// ## Returns
/// - `Some(PrimitiveId)` if `name` is a canonical primitive spelling, `None` otherwise.
pub fn from_str(name: &str) -> Option<PrimitiveId> {
    PRIMITIVES.iter().find(|p| p.canonical == name).map(|p| p.id)
}

/// Resolve a primitive spelling as written in a FlatBuffers schema.
///
/// ## Notes
/// - Accepts canonical spellings and FlatBuffers aliases (`ubyte` → `uint8`, `double` → `float64`).
pub fn from_fbs(name: &str) -> Option<PrimitiveId> {
    from_str(name).or_else(|| {
        PRIMITIVES
            .iter()
            .find(|p| p.fbs_aliases.contains(&name))
            .map(|p| p.id)
    })
}

/// Normalise a FlatBuffers scalar spelling to its canonical form, leaving other names untouched.
pub fn normalize_fbs(name: &str) -> &str {
    match from_fbs(name) {
        Some(id) => as_str(id),
        None => name,
    }
}

/// Return the canonical spelling for a primitive.
pub fn as_str(id: PrimitiveId) -> &'static str {
    info_for(id).canonical
}

/// Return the full metadata row for a primitive.
pub fn info_for(id: PrimitiveId) -> &'static PrimitiveInfo {
    &PRIMITIVES[id as usize]
}

// Builder-style constructors keep each table row on a few readable lines.
const fn row(
    id: PrimitiveId,
    canonical: &'static str,
    fbs_aliases: &'static [&'static str],
    c: &'static str,
    rust: &'static str,
    go: &'static str,
    cgo: &'static str,
) -> PrimitiveInfo {
    PrimitiveInfo {
        id,
        canonical,
        fbs_aliases,
        c,
        rust,
        go,
        cgo,
        kotlin: "",
        kotlin_array: "",
        jni: "",
        jni_array: "",
        jni_signature: "",
        jni_array_accessor: "",
        swift: "",
        wasm_size: 0,
        data_view: "",
        js_typed_array: "",
    }
}

impl PrimitiveInfo {
    const fn kotlin(mut self, kotlin: &'static str, kotlin_array: &'static str) -> Self {
        self.kotlin = kotlin;
        self.kotlin_array = kotlin_array;
        self
    }

    const fn jni(
        mut self,
        jni: &'static str,
        jni_array: &'static str,
        jni_signature: &'static str,
        jni_array_accessor: &'static str,
    ) -> Self {
        self.jni = jni;
        self.jni_array = jni_array;
        self.jni_signature = jni_signature;
        self.jni_array_accessor = jni_array_accessor;
        self
    }

    const fn swift(mut self, swift: &'static str) -> Self {
        self.swift = swift;
        self
    }

    const fn wasm(mut self, wasm_size: u32, data_view: &'static str, js_typed_array: &'static str) -> Self {
        self.wasm_size = wasm_size;
        self.data_view = data_view;
        self.js_typed_array = js_typed_array;
        self
    }
}
