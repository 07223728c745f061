//! xplatter frontend
//!
//! Everything that happens before emission:
//! - `model`: the typed IR of an API description
//! - `schema`: the embedded structural schema and its interpreter
//! - `loader`: reading a description and materialising the IR
//! - `resolver`: FlatBuffers schema scanning into a `ResolvedTypeMap`
//! - `validator`: accumulated semantic checks
//! - `diagnostics`: terminal rendering of shape and semantic errors

pub mod diagnostics;
pub mod loader;
pub mod model;
pub mod resolver;
pub mod schema;
pub mod validator;

pub use loader::{LoadError, load_path, load_str};
pub use model::{ApiDescription, InterfaceDef, MethodDef, MethodShape, Operation, OperationKind, ParameterDef};
pub use resolver::{ResolveError, ResolvedTypeMap, TypeInfo, TypeKind};
pub use validator::{ValidationError, ValidationReport, validate};
