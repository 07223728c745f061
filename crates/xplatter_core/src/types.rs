//! Classification of the single-string type encoding used by API descriptions.
//!
//! Every parameter and return type is one string. [`TypeRef::parse`] classifies it with fixed
//! tie-breaks, in this order:
//!
//! 1. `string`
//! 2. `buffer<P>` with a primitive element
//! 3. `handle:<Name>`
//! 4. a primitive (`int8` … `float64`, `bool`)
//! 5. a qualified FlatBuffers name `A(.B)*` with PascalCase segments
//!
//! ## Examples
//! ```rust
//! use xplatter_core::types::TypeRef;
//! use xplatter_core::lang::primitives::PrimitiveId;
//!
//! assert_eq!(TypeRef::parse("buffer<uint8>"), Some(TypeRef::Buffer(PrimitiveId::UInt8)));
//! assert_eq!(TypeRef::parse("handle:Engine"), Some(TypeRef::Handle("Engine")));
//! assert_eq!(TypeRef::parse("Common.ErrorCode"), Some(TypeRef::Qualified("Common.ErrorCode")));
//! assert_eq!(TypeRef::parse("common.errorCode"), None);
//! ```

use crate::lang::primitives::{self, PrimitiveId};

/// A classified type string, borrowing names from the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef<'a> {
    String,
    Buffer(PrimitiveId),
    Handle(&'a str),
    Primitive(PrimitiveId),
    Qualified(&'a str),
}

impl<'a> TypeRef<'a> {
    /// Classify a type string, returning `None` for anything outside the five forms.
    pub fn parse(ty: &'a str) -> Option<Self> {
        if ty == "string" {
            return Some(TypeRef::String);
        }
        if let Some(elem) = buffer_element(ty) {
            return primitives::from_str(elem)
                .filter(|p| primitives::info_for(*p).is_buffer_element())
                .map(TypeRef::Buffer);
        }
        if let Some(name) = ty.strip_prefix("handle:") {
            return is_pascal_identifier(name).then_some(TypeRef::Handle(name));
        }
        if let Some(p) = primitives::from_str(ty) {
            return Some(TypeRef::Primitive(p));
        }
        is_qualified_name(ty).then_some(TypeRef::Qualified(ty))
    }

    pub fn handle_name(&self) -> Option<&'a str> {
        match self {
            TypeRef::Handle(name) => Some(name),
            _ => None,
        }
    }

    pub fn qualified_name(&self) -> Option<&'a str> {
        match self {
            TypeRef::Qualified(name) => Some(name),
            _ => None,
        }
    }
}

/// Extract the raw element spelling of a `buffer<...>` type without validating it.
pub fn buffer_element(ty: &str) -> Option<&str> {
    ty.strip_prefix("buffer<")?.strip_suffix('>')
}

/// `[A-Z][a-zA-Z0-9]*`
pub fn is_pascal_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// `[a-z][a-z0-9_]*`
pub fn is_snake_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
        _ => false,
    }
}

/// `[A-Z][a-zA-Z0-9]*(\.[A-Z][a-zA-Z0-9]*)*`
pub fn is_qualified_name(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_pascal_identifier)
}

/// Parameter transfer annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transfer {
    #[default]
    Value,
    Ref,
    RefMut,
}

impl Transfer {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "value" => Some(Transfer::Value),
            "ref" => Some(Transfer::Ref),
            "ref_mut" => Some(Transfer::RefMut),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transfer::Value => "value",
            Transfer::Ref => "ref",
            Transfer::RefMut => "ref_mut",
        }
    }

    pub fn is_mut(self) -> bool {
        self == Transfer::RefMut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_tie_breaks() {
        assert_eq!(TypeRef::parse("string"), Some(TypeRef::String));
        assert_eq!(TypeRef::parse("bool"), Some(TypeRef::Primitive(PrimitiveId::Bool)));
        assert_eq!(TypeRef::parse("float32"), Some(TypeRef::Primitive(PrimitiveId::Float32)));
        assert_eq!(TypeRef::parse("Hello.Greeting"), Some(TypeRef::Qualified("Hello.Greeting")));
        assert_eq!(TypeRef::parse("Greeting"), Some(TypeRef::Qualified("Greeting")));
    }

    #[test]
    fn rejects_malformed_buffers_and_handles() {
        assert_eq!(TypeRef::parse("buffer<bool>"), None);
        assert_eq!(TypeRef::parse("buffer<Foo>"), None);
        assert_eq!(TypeRef::parse("buffer<uint8"), None);
        assert_eq!(TypeRef::parse("handle:engine"), None);
        assert_eq!(TypeRef::parse("handle:"), None);
        assert_eq!(buffer_element("buffer<Foo>"), Some("Foo"));
    }

    #[test]
    fn qualified_names_need_pascal_segments() {
        assert!(is_qualified_name("A.B.C"));
        assert!(!is_qualified_name("A..B"));
        assert!(!is_qualified_name("A.b"));
        assert!(!is_qualified_name(""));
    }

    #[test]
    fn transfer_spellings() {
        for t in [Transfer::Value, Transfer::Ref, Transfer::RefMut] {
            assert_eq!(Transfer::from_str(t.as_str()), Some(t));
        }
        assert_eq!(Transfer::from_str("move"), None);
        assert_eq!(Transfer::default(), Transfer::Value);
    }
}
