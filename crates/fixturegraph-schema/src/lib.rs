//! fixturegraph schema model
//!
//! Plain-data description of the record types a fixture graph is built from:
//! - [`TypeRef`]: declared types with explicit generic witnesses
//! - [`TypeDescriptor`] / [`MemberDef`]: members classified once as scalar,
//!   required/optional reference, to-many collection or to-many map
//! - [`Schema`]: validated registry of descriptors (code or JSON)
//! - [`Settable`]: property / constructor-parameter handle
//! - [`Value`] / [`Bean`]: synthesized values and identity-bearing instances

pub mod descriptor;
pub mod schema;
pub mod settable;
pub mod type_ref;
pub mod value;

pub use descriptor::{
    Annotation, ConstructorParam, MemberDef, Relationship, TypeDescriptor, TypeKind,
};
pub use schema::{Schema, SchemaBuilder, SchemaError};
pub use settable::Settable;
pub use type_ref::{
    parse_type_ref, CollectionKind, ScalarKind, TypeName, TypeRef, TypeRefParseError,
};
pub use value::{Bean, Value};
