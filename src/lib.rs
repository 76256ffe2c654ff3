//! Generate structural TypeScript declarations from a registry of named
//! validation schemas.
//!
//! ```text
//! SchemaMap ──resolve──> TypeExpr ──codegen──> `export interface ...`
//!     ^                      ^
//!  document.rs        resolve/reference.rs (identity lookup)
//! ```
pub mod cli;
pub mod codegen;
pub mod document;
pub mod error;
pub mod generate;
pub mod ir;
pub mod model;
pub mod options;
pub mod path_de;
pub mod resolve;

pub use codegen::{Codegen, render};
pub use error::{DocumentError, GenerateError, RegistryError, ResolveError};
pub use generate::{Declaration, Diagnostic, Generated, generate};
pub use ir::{Field, TypeExpr};
pub use model::{
    EnumValue, FieldRule, Instance, InstanceId, LiteralValue, Optionality, RuleMetadata, ScalarKind,
    SchemaDefinition, SchemaMap, TypeCandidate,
};
pub use options::{GenerateOptions, MissingFieldPolicy, ReferencePolicy, ScalarNames};
pub use resolve::{Resolver, find_reference};
