//! Canonical schema model shared by every polyschema crate.
//!
//! ```text
//! Importer ─> Schema ─> resolver passes ─> ResolvedSchema ─> Exporter / Backend
//! ```
//!
//! - [`ir`]: the type-node tree and named-type table
//! - [`validate`]: local structural rules
//! - [`recognizer`]: predicates that dispatch union variants
//! - [`context`]: state owned by a single conversion
//! - [`resolved`]: the frozen schema consumers read

pub mod context;
pub mod error;
pub mod ir;
pub mod literal;
pub mod name;
pub mod recognizer;
pub mod resolved;
pub mod validate;

pub use context::{ConversionContext, Dialect, PatternCache};
pub use error::{Error, Result, SchemaPath};
pub use ir::{
    ChoiceType, Collection, Constraints, EnumType, ExtensionBag, Field, MapType, NamedType,
    OptionalLayout, Primitive, RecordType, Scalar, Schema, TimePrecision, TypeNode, Variant,
};
pub use literal::Literal;
pub use name::{NameAllocator, Namespace, QualifiedName, camel_case, pascal_case, snake_case};
pub use recognizer::{Check, Discriminator, JsonKind, Recognizer, UnionResolution};
pub use resolved::ResolvedSchema;
pub use validate::validate;
