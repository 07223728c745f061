//! WebAssembly 32-bit struct layout.
//!
//! The JavaScript binding and the Go wasm exports both read and write records in linear memory by
//! offset, so both take their offsets from here.
//!
//! Rules: primitives use their natural size and alignment; strings and vector data are 4-byte
//! pointers; a vector also contributes a `uint32_t <name>_count` slot; enums are C `enum`s in the
//! header and take 4 bytes whatever their schema base type; nested records are laid out
//! recursively. Each field starts at the next offset satisfying its alignment, the total is
//! rounded up to the largest alignment, and an empty record is 4 bytes.

use xplatter_core::TypeRef;
use xplatter_core::lang::primitives::{self, PrimitiveId};

use crate::frontend::resolver::{FieldType, ResolvedTypeMap, TypeInfo, TypeKind};

/// Pointer size on wasm32.
pub const POINTER_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("type {0} not found in resolved schemas")]
    MissingType(String),
    #[error("type {0} contains itself by value")]
    Cycle(String),
    #[error("type {0} is a {1}, not a struct or table")]
    NotARecord(String, TypeKind),
}

/// What occupies a slot, which decides how it is read or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    Primitive(PrimitiveId),
    /// `const char*`
    String,
    /// Vector data pointer, or a reference the layout does not look through.
    Pointer,
    /// The `uint32_t` element count following a vector pointer.
    Count,
    /// Enum stored as its ABI scalar.
    Enum(PrimitiveId),
    /// A nested record stored inline.
    Record(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    /// Field name as declared; vector counts are `<field>_count`.
    pub name: String,
    pub kind: SlotKind,
    pub offset: u32,
    pub size: u32,
    pub align: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub name: String,
    pub size: u32,
    pub align: u32,
    pub fields: Vec<FieldSlot>,
}

impl StructLayout {
    pub fn field(&self, name: &str) -> Option<&FieldSlot> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn align_up(offset: u32, align: u32) -> u32 {
    offset.div_ceil(align) * align
}

/// Lay out a struct or table.
pub fn struct_layout(types: &ResolvedTypeMap, name: &str) -> Result<StructLayout, LayoutError> {
    let mut visiting = Vec::new();
    layout_inner(types, name, &mut visiting)
}

fn layout_inner(types: &ResolvedTypeMap, name: &str, visiting: &mut Vec<String>) -> Result<StructLayout, LayoutError> {
    let info = types.get(name).ok_or_else(|| LayoutError::MissingType(name.to_string()))?;
    if !info.is_record() {
        return Err(LayoutError::NotARecord(name.to_string(), info.kind));
    }
    if visiting.iter().any(|v| v == name) {
        return Err(LayoutError::Cycle(name.to_string()));
    }
    visiting.push(name.to_string());

    let mut slots: Vec<(String, SlotKind, u32, u32)> = Vec::new();
    for field in &info.fields {
        match &field.ty {
            FieldType::Vector(_) => {
                slots.push((field.name.clone(), SlotKind::Pointer, POINTER_SIZE, POINTER_SIZE));
                slots.push((format!("{}_count", field.name), SlotKind::Count, 4, 4));
            }
            other => {
                let (kind, size, align) = field_slot(types, other, visiting)?;
                slots.push((field.name.clone(), kind, size, align));
            }
        }
    }
    visiting.pop();

    let mut offset = 0;
    let mut max_align = 1;
    let mut fields = Vec::with_capacity(slots.len());
    for (name, kind, size, align) in slots {
        max_align = max_align.max(align);
        offset = align_up(offset, align);
        fields.push(FieldSlot {
            name,
            kind,
            offset,
            size,
            align,
        });
        offset += size;
    }
    let size = if offset == 0 { POINTER_SIZE } else { align_up(offset, max_align) };
    Ok(StructLayout {
        name: name.to_string(),
        size,
        align: if fields.is_empty() { POINTER_SIZE } else { max_align },
        fields,
    })
}

fn field_slot(
    types: &ResolvedTypeMap,
    ty: &FieldType,
    visiting: &mut Vec<String>,
) -> Result<(SlotKind, u32, u32), LayoutError> {
    Ok(match ty {
        FieldType::Primitive(p) => {
            let size = primitives::info_for(*p).wasm_size;
            (SlotKind::Primitive(*p), size, size)
        }
        FieldType::String => (SlotKind::String, POINTER_SIZE, POINTER_SIZE),
        FieldType::Vector(_) => (SlotKind::Pointer, POINTER_SIZE, POINTER_SIZE),
        FieldType::Named(name) => match types.get(name) {
            Some(info) if info.is_enum() => {
                let scalar = info.abi_scalar();
                let size = primitives::info_for(scalar).wasm_size;
                (SlotKind::Enum(scalar), size, size)
            }
            Some(info) if info.is_record() => {
                let nested = layout_inner(types, name, visiting)?;
                (SlotKind::Record(name.clone()), nested.size, nested.align)
            }
            _ => (SlotKind::Pointer, POINTER_SIZE, POINTER_SIZE),
        },
    })
}

/// Size and alignment of an enum's storage.
pub fn enum_size(info: &TypeInfo) -> u32 {
    primitives::info_for(info.abi_scalar()).wasm_size
}

/// Bytes to allocate for an out-parameter or sret slot of type `ty`.
pub fn value_size(types: &ResolvedTypeMap, ty: &str) -> Result<u32, LayoutError> {
    match TypeRef::parse(ty) {
        Some(TypeRef::Handle(_)) | Some(TypeRef::String) | Some(TypeRef::Buffer(_)) | None => Ok(POINTER_SIZE),
        Some(TypeRef::Primitive(p)) => Ok(primitives::info_for(p).wasm_size),
        Some(TypeRef::Qualified(name)) => {
            let info = types.get(name).ok_or_else(|| LayoutError::MissingType(name.to_string()))?;
            if info.is_enum() {
                Ok(enum_size(info))
            } else {
                struct_layout(types, name).map(|l| l.size)
            }
        }
    }
}

/// Whether a return type travels by hidden pointer on wasm32 (struct/table returns).
pub fn is_record_type(types: &ResolvedTypeMap, ty: &str) -> bool {
    matches!(TypeRef::parse(ty), Some(TypeRef::Qualified(name)) if types.get(name).is_some_and(TypeInfo::is_record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::resolver::parse_str;

    const SCHEMA: &str = r#"
namespace Hello;

struct Greeting {
  message: string;
  apiImpl: string;
}

enum Level : ubyte { Low, High }

table Mixed {
  flag: bool;
  count: int64;
  level: Level;
  tag: short;
}

table Batch {
  items: [int32];
  scale: float;
}

table Outer {
  a: ubyte;
  inner: Mixed;
}

table Empty {}
"#;

    fn types() -> ResolvedTypeMap {
        parse_str(SCHEMA).unwrap_or_default()
    }

    #[test]
    fn two_strings_pack_at_four_bytes() {
        let layout = struct_layout(&types(), "Hello.Greeting");
        let layout = layout.as_ref().ok();
        assert_eq!(layout.map(|l| l.size), Some(8));
        let offsets: Vec<u32> = layout.map(|l| l.fields.iter().map(|f| f.offset).collect()).unwrap_or_default();
        assert_eq!(offsets, [0, 4]);
    }

    #[test]
    fn fields_align_naturally_and_size_rounds_up() {
        let layout = struct_layout(&types(), "Hello.Mixed").ok();
        let offsets: Vec<(String, u32)> = layout
            .as_ref()
            .map(|l| l.fields.iter().map(|f| (f.name.clone(), f.offset)).collect())
            .unwrap_or_default();
        assert_eq!(
            offsets,
            [
                ("flag".to_string(), 0),
                ("count".to_string(), 8),
                ("level".to_string(), 16),
                ("tag".to_string(), 20)
            ]
        );
        assert_eq!(layout.map(|l| (l.size, l.align)), Some((24, 8)));
    }

    #[test]
    fn vectors_take_pointer_and_count() {
        let layout = struct_layout(&types(), "Hello.Batch").ok();
        let names: Vec<String> = layout
            .as_ref()
            .map(|l| l.fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default();
        assert_eq!(names, ["items", "items_count", "scale"]);
        assert_eq!(layout.map(|l| l.size), Some(12));
    }

    #[test]
    fn nested_records_inline_with_their_alignment() {
        let layout = struct_layout(&types(), "Hello.Outer").ok();
        let inner = layout.as_ref().and_then(|l| l.field("inner")).map(|f| (f.offset, f.size));
        assert_eq!(inner, Some((8, 24)));
        assert_eq!(layout.map(|l| l.size), Some(32));
    }

    #[test]
    fn byte_based_enums_take_a_c_enum_slot() {
        let types = parse_str("namespace P;\n\nenum Fmt : ubyte { A, B }\n\nstruct S {\n  fmt: Fmt;\n  tail: ubyte;\n}\n")
            .unwrap_or_default();
        let layout = struct_layout(&types, "P.S").ok();
        let slots: Vec<(String, u32, u32)> = layout
            .as_ref()
            .map(|l| l.fields.iter().map(|f| (f.name.clone(), f.offset, f.size)).collect())
            .unwrap_or_default();
        assert_eq!(slots, [("fmt".to_string(), 0, 4), ("tail".to_string(), 4, 1)]);
        assert_eq!(layout.map(|l| (l.size, l.align)), Some((8, 4)));
    }

    #[test]
    fn empty_records_are_pointer_sized() {
        assert_eq!(struct_layout(&types(), "Hello.Empty").map(|l| l.size), Ok(4));
    }

    #[test]
    fn missing_and_non_record_types_are_errors() {
        let types = types();
        assert_eq!(
            struct_layout(&types, "Hello.Nope"),
            Err(LayoutError::MissingType("Hello.Nope".to_string()))
        );
        assert!(matches!(struct_layout(&types, "Hello.Level"), Err(LayoutError::NotARecord(..))));
    }

    #[test]
    fn value_sizes_for_out_parameters() {
        let types = types();
        assert_eq!(value_size(&types, "handle:Engine"), Ok(4));
        assert_eq!(value_size(&types, "float64"), Ok(8));
        assert_eq!(value_size(&types, "Hello.Level"), Ok(4));
        assert_eq!(value_size(&types, "Hello.Greeting"), Ok(8));
        assert!(is_record_type(&types, "Hello.Greeting"));
        assert!(!is_record_type(&types, "Hello.Level"));
    }
}
