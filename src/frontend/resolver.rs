//! FlatBuffers schema resolver.
//!
//! Scans the schema files an API description references and records every named type (enum,
//! struct, table, union) under its fully-qualified name, with enum values and fields in
//! declaration order.
//!
//! This is a line-oriented scanner over the subset of the FlatBuffers grammar xplatter needs, not a
//! full parser:
//! - `//` comments are stripped before anything else;
//! - `namespace A.B;` sets the active namespace until the next declaration;
//! - type headers are recognised by their leading keyword;
//! - enum values may omit their assignment (previous + 1, starting at 0);
//! - field lines are `name : type [= default] [(attributes)] ;`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use xplatter_core::lang::primitives::{self, PrimitiveId};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("schema file {path} not found in search directories: {}", format_dirs(.searched))]
    NotFound { path: String, searched: Vec<PathBuf> },
    #[error("reading schema file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("duplicate type {name} (defined as {first} and {second})")]
    Duplicate {
        name: String,
        first: TypeKind,
        second: TypeKind,
    },
    #[error("invalid scanner pattern: {0}")]
    Pattern(#[from] regex::Error),
}

fn format_dirs(dirs: &[PathBuf]) -> String {
    let shown: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
    format!("[{}]", shown.join(", "))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Enum,
    Struct,
    Table,
    Union,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Enum => write!(f, "enum"),
            TypeKind::Struct => write!(f, "struct"),
            TypeKind::Table => write!(f, "table"),
            TypeKind::Union => write!(f, "union"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

/// Type of a struct/table field, with scalar aliases already normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(PrimitiveId),
    String,
    Vector(Box<FieldType>),
    /// Another schema type, qualified once resolution has finished.
    Named(String),
}

impl FieldType {
    fn parse(raw: &str) -> Self {
        if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return FieldType::Vector(Box::new(FieldType::parse(inner.trim())));
        }
        if raw == "string" {
            return FieldType::String;
        }
        match primitives::from_fbs(raw) {
            Some(p) => FieldType::Primitive(p),
            None => FieldType::Named(raw.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(p) => write!(f, "{}", primitives::as_str(*p)),
            FieldType::String => write!(f, "string"),
            FieldType::Vector(inner) => write!(f, "[{inner}]"),
            FieldType::Named(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub kind: TypeKind,
    /// Namespace the type was declared in (empty for none).
    pub namespace: String,
    /// Enums only: the underlying scalar.
    pub base_type: Option<PrimitiveId>,
    pub enum_values: Vec<EnumValue>,
    pub fields: Vec<FieldDef>,
}

impl TypeInfo {
    fn new(kind: TypeKind, namespace: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            base_type: None,
            enum_values: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Underlying scalar of an enum; `int32` when the schema named something unrecognised.
    pub fn enum_base(&self) -> PrimitiveId {
        self.base_type.unwrap_or(PrimitiveId::Int32)
    }

    /// Scalar an enum occupies at the C ABI. The header declares enums as C `enum`s, which are
    /// `int`-sized whatever the schema's base type.
    pub fn abi_scalar(&self) -> PrimitiveId {
        PrimitiveId::Int32
    }

    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    /// Struct or table: something with fields.
    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Table)
    }
}

/// Fully-qualified name → type information, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTypeMap {
    types: BTreeMap<String, TypeInfo>,
}

impl ResolvedTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeInfo)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Types of one kind, sorted by qualified name.
    pub fn of_kind(&self, kind: TypeKind) -> impl Iterator<Item = (&str, &TypeInfo)> {
        self.iter().filter(move |(_, info)| info.kind == kind)
    }

    /// Insert a type, refusing to redefine a qualified name.
    pub fn insert(&mut self, name: String, info: TypeInfo) -> Result<(), ResolveError> {
        if let Some(existing) = self.types.get(&name) {
            return Err(ResolveError::Duplicate {
                name,
                first: existing.kind,
                second: info.kind,
            });
        }
        self.types.insert(name, info);
        Ok(())
    }

    /// Qualify unqualified field references against the declaring type's namespace.
    fn qualify_field_references(&mut self) {
        let known: Vec<String> = self.types.keys().cloned().collect();
        for info in self.types.values_mut() {
            let namespace = info.namespace.clone();
            for field in &mut info.fields {
                qualify(&mut field.ty, &namespace, &known);
            }
        }
    }
}

fn qualify(ty: &mut FieldType, namespace: &str, known: &[String]) {
    match ty {
        FieldType::Vector(inner) => qualify(inner, namespace, known),
        FieldType::Named(name) if !namespace.is_empty() && !known.contains(name) => {
            let candidate = format!("{namespace}.{name}");
            if known.contains(&candidate) {
                *name = candidate;
            }
        }
        _ => {}
    }
}

/// Find a schema file: absolute paths are taken as-is, relative ones are searched in order.
pub fn resolve_schema_path(rel: &str, search_dirs: &[PathBuf]) -> Result<PathBuf, ResolveError> {
    let path = Path::new(rel);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    search_dirs
        .iter()
        .map(|dir| dir.join(rel))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ResolveError::NotFound {
            path: rel.to_string(),
            searched: search_dirs.to_vec(),
        })
}

/// Parse every referenced schema file into one map.
#[tracing::instrument(skip_all, fields(files = schema_paths.len()))]
pub fn parse_files(search_dirs: &[PathBuf], schema_paths: &[String]) -> Result<ResolvedTypeMap, ResolveError> {
    let patterns = Patterns::new()?;
    let mut map = ResolvedTypeMap::new();
    for rel in schema_paths {
        let full = resolve_schema_path(rel, search_dirs)?;
        let text = std::fs::read_to_string(&full).map_err(|source| ResolveError::Io {
            path: full.clone(),
            source,
        })?;
        for (name, info) in patterns.scan(&text) {
            map.insert(name, info)?;
        }
        tracing::debug!(file = %full.display(), "scanned schema file");
    }
    map.qualify_field_references();
    Ok(map)
}

/// Parse schema text directly (a single file's contents).
pub fn parse_str(text: &str) -> Result<ResolvedTypeMap, ResolveError> {
    let patterns = Patterns::new()?;
    let mut map = ResolvedTypeMap::new();
    for (name, info) in patterns.scan(text) {
        map.insert(name, info)?;
    }
    map.qualify_field_references();
    Ok(map)
}

struct Patterns {
    namespace: Regex,
    header: Regex,
    enum_value: Regex,
    field: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            namespace: Regex::new(r"^\s*namespace\s+([A-Za-z][A-Za-z0-9_.]*)\s*;")?,
            header: Regex::new(r"^\s*(enum|struct|table|union)\s+([A-Z][A-Za-z0-9]*)\s*(?::\s*(\w+))?")?,
            enum_value: Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(?:=\s*(-?\d+))?\s*$")?,
            field: Regex::new(r"([a-z_][A-Za-z0-9_]*)\s*:\s*(\[[^\]]+\]|[A-Za-z_][A-Za-z0-9_.]*)[^;]*;")?,
        })
    }

    /// Scan one file, returning its types in declaration order. Duplicates within the file are
    /// kept so the caller reports them.
    fn scan(&self, text: &str) -> Vec<(String, TypeInfo)> {
        let mut out: Vec<(String, TypeInfo)> = Vec::new();
        let mut namespace = String::new();
        let mut current: Option<(String, TypeInfo)> = None;
        let mut depth: i32 = 0;
        let mut entered = false;
        let mut next_value: i64 = 0;

        for raw in text.lines() {
            let line = match raw.find("//") {
                Some(idx) => &raw[..idx],
                None => raw,
            };
            let opens = line.matches('{').count() as i32;
            let closes = line.matches('}').count() as i32;

            if let Some((_, info)) = current.as_mut() {
                depth += opens - closes;
                entered |= opens > 0;
                // Text before a closing brace on the same line still belongs to the body.
                let body = line.split('}').next().unwrap_or("");
                self.scan_body_line(body, info, &mut next_value);
                if entered && depth <= 0 {
                    out.extend(current.take());
                }
                continue;
            }

            if let Some(caps) = self.namespace.captures(line) {
                namespace = caps[1].to_string();
                continue;
            }

            if let Some(caps) = self.header.captures(line) {
                let kind = match &caps[1] {
                    "enum" => TypeKind::Enum,
                    "struct" => TypeKind::Struct,
                    "table" => TypeKind::Table,
                    _ => TypeKind::Union,
                };
                let mut info = TypeInfo::new(kind, &namespace);
                if kind == TypeKind::Enum {
                    info.base_type = Some(
                        caps.get(3)
                            .and_then(|m| primitives::from_fbs(m.as_str()))
                            .unwrap_or(PrimitiveId::Int32),
                    );
                }
                let name = qualified_name(&namespace, &caps[2]);
                next_value = 0;
                depth = opens - closes;
                entered = opens > 0;
                if let Some(after) = line.split_once('{').map(|(_, rest)| rest) {
                    let body = after.split('}').next().unwrap_or("");
                    self.scan_body_line(body, &mut info, &mut next_value);
                }
                if depth <= 0 && opens > 0 {
                    out.push((name, info));
                } else {
                    current = Some((name, info));
                }
            }
        }
        out.extend(current);
        out
    }

    fn scan_body_line(&self, body: &str, info: &mut TypeInfo, next_value: &mut i64) {
        match info.kind {
            TypeKind::Enum => {
                for item in body.split(',') {
                    if let Some(caps) = self.enum_value.captures(item) {
                        if let Some(explicit) = caps.get(2).and_then(|m| m.as_str().parse::<i64>().ok()) {
                            *next_value = explicit;
                        }
                        info.enum_values.push(EnumValue {
                            name: caps[1].to_string(),
                            value: *next_value,
                        });
                        *next_value += 1;
                    }
                }
            }
            TypeKind::Struct | TypeKind::Table => {
                for caps in self.field.captures_iter(body) {
                    info.fields.push(FieldDef {
                        name: caps[1].to_string(),
                        ty: FieldType::parse(&caps[2]),
                    });
                }
            }
            TypeKind::Union => {}
        }
    }
}

fn qualified_name(namespace: &str, local: &str) -> String {
    if namespace.is_empty() {
        local.to_string()
    } else {
        format!("{namespace}.{local}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMON: &str = r#"
// Shared types
namespace Common;

enum ErrorCode : int {
    Ok = 0,
    InvalidArgument = 1,
    NotFound,          // implicit 2
    InternalError = 10
}

namespace Hello;

struct Vec2 { x: float; y: float; }

table Greeting {
    message: string;
    api_impl: string;
    origin: Vec2;
    tags: [ubyte];
    count: uint = 3 (deprecated);
}

union Payload { Greeting, Vec2 }
"#;

    #[test]
    fn namespaces_qualify_types() {
        let map = parse_str(COMMON).unwrap();
        assert_eq!(map.get("Common.ErrorCode").map(|t| t.kind), Some(TypeKind::Enum));
        assert_eq!(map.get("Hello.Greeting").map(|t| t.kind), Some(TypeKind::Table));
        assert_eq!(map.get("Hello.Vec2").map(|t| t.kind), Some(TypeKind::Struct));
        assert_eq!(map.get("Hello.Payload").map(|t| t.kind), Some(TypeKind::Union));
        assert!(!map.contains("ErrorCode"));
    }

    #[test]
    fn enum_values_follow_assignments() {
        let map = parse_str(COMMON).unwrap();
        let info = map.get("Common.ErrorCode").unwrap();
        assert_eq!(info.enum_base(), PrimitiveId::Int32);
        let values: Vec<(&str, i64)> = info.enum_values.iter().map(|v| (v.name.as_str(), v.value)).collect();
        assert_eq!(
            values,
            [("Ok", 0), ("InvalidArgument", 1), ("NotFound", 2), ("InternalError", 10)]
        );
    }

    #[test]
    fn fields_keep_order_and_normalise_types() {
        let map = parse_str(COMMON).unwrap();
        let greeting = map.get("Hello.Greeting").unwrap();
        let fields: Vec<String> = greeting.fields.iter().map(|f| format!("{}:{}", f.name, f.ty)).collect();
        assert_eq!(
            fields,
            ["message:string", "api_impl:string", "origin:Hello.Vec2", "tags:[uint8]", "count:uint32"]
        );
        let vec2 = map.get("Hello.Vec2").unwrap();
        assert_eq!(vec2.fields.len(), 2);
        assert_eq!(vec2.fields[0].ty, FieldType::Primitive(PrimitiveId::Float32));
    }

    #[test]
    fn duplicate_types_are_fatal() {
        let text = "namespace A;\nenum E : byte { X }\nenum E : byte { Y }\n";
        assert!(matches!(parse_str(text), Err(ResolveError::Duplicate { .. })));
    }

    #[test]
    fn missing_files_list_the_search_dirs() {
        let err = parse_files(&[PathBuf::from("nowhere")], &["types.fbs".to_string()]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("types.fbs"));
        assert!(message.contains("nowhere"));
    }
}
