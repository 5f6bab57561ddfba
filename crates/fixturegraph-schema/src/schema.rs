//! Schema registry: every type the engine may be asked to synthesize.
//!
//! Schemas are built in code through [`SchemaBuilder`] or read from a JSON
//! document of the shape:
//!
//! ```text
//! {
//!   "types": [
//!     { "name": "Parent", "kind": "entity",
//!       "members": [
//!         { "name": "id", "type": "Long", "annotations": ["id"] },
//!         { "name": "children", "type": "List<Child>",
//!           "relationship": "to_many_collection", "starts_empty": true }
//!       ] },
//!     { "name": "Child", "kind": "entity",
//!       "members": [
//!         { "name": "id", "type": "Long", "annotations": ["id"] },
//!         { "name": "parent", "type": "Parent", "relationship": "required_reference" }
//!       ] }
//!   ]
//! }
//! ```
//!
//! Both paths validate, so a `Schema` value always references known types.

use crate::descriptor::{MemberDef, Relationship, TypeDescriptor, TypeKind};
use crate::type_ref::{TypeName, TypeRef};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("type `{0}` is declared more than once")]
    DuplicateType(TypeName),

    #[error("{owner}#{member} refers to undeclared type `{name}`")]
    UnknownType {
        owner: TypeName,
        member: String,
        name: TypeName,
    },

    #[error("entity `{0}` declares no id member")]
    MissingId(TypeName),

    #[error("entity `{0}` declares more than one id member")]
    MultipleIds(TypeName),

    #[error("enum `{0}` declares no constants")]
    EmptyEnum(TypeName),

    #[error("constructor parameter {index} of `{owner}` binds unknown member `{binds}`")]
    BadConstructorBinding {
        owner: TypeName,
        index: usize,
        binds: String,
    },

    #[error("{owner}#{member} is classified {relationship:?} but declared as `{ty}`")]
    RelationshipMismatch {
        owner: TypeName,
        member: String,
        relationship: Relationship,
        ty: TypeRef,
    },

    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchemaDocument {
    types: Vec<TypeDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<TypeName, TypeDescriptor>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_json::from_str(json)?;
        Self::from_descriptors(document.types)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("failed to load schema {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String, SchemaError> {
        let document = SchemaDocument {
            types: self.types.values().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    fn from_descriptors(descriptors: Vec<TypeDescriptor>) -> Result<Self, SchemaError> {
        let mut types = BTreeMap::new();
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            if types.insert(name.clone(), descriptor).is_some() {
                return Err(SchemaError::DuplicateType(name));
            }
        }
        let mut schema = Schema { types };
        schema.classify_entity_members();
        schema.validate()?;
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// `(member, target)` pairs of `name`'s required references; empty for
    /// unknown types.
    pub fn required_references(&self, name: &str) -> Vec<(&MemberDef, &str)> {
        self.get(name)
            .map(|d| d.required_references().collect())
            .unwrap_or_default()
    }

    /// Does `from` hold a required reference to `to`?
    pub fn references_back(&self, from: &str, to: &str) -> bool {
        self.get(from)
            .map(|d| d.required_references().any(|(_, target)| target == to))
            .unwrap_or(false)
    }

    /// An unclassified member naming an entity is a required reference; only
    /// an explicit `optional_reference` leaves it unset.
    fn classify_entity_members(&mut self) {
        let entities: HashSet<TypeName> = self
            .types
            .values()
            .filter(|d| d.is_entity())
            .map(|d| d.name.clone())
            .collect();
        for descriptor in self.types.values_mut() {
            for member in &mut descriptor.members {
                let names_entity = member
                    .ty
                    .named_type()
                    .is_some_and(|name| entities.contains(name));
                if names_entity
                    && member.relationship == Relationship::Scalar
                    && !member.is_managed()
                {
                    member.relationship = Relationship::RequiredReference;
                }
            }
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for descriptor in self.types.values() {
            self.validate_descriptor(descriptor)?;
        }
        Ok(())
    }

    fn validate_descriptor(&self, descriptor: &TypeDescriptor) -> Result<(), SchemaError> {
        let owner = &descriptor.name;

        match descriptor.kind {
            TypeKind::Entity => match descriptor.members.iter().filter(|m| m.is_id()).count() {
                0 => return Err(SchemaError::MissingId(owner.clone())),
                1 => {}
                _ => return Err(SchemaError::MultipleIds(owner.clone())),
            },
            TypeKind::Enum if descriptor.constants.is_empty() => {
                return Err(SchemaError::EmptyEnum(owner.clone()));
            }
            _ => {}
        }

        for member in &descriptor.members {
            self.check_known(owner, &member.name, &member.ty)?;

            let shape_ok = match member.relationship {
                Relationship::Scalar => true,
                Relationship::RequiredReference | Relationship::OptionalReference => {
                    member.ty.named_type().is_some()
                }
                Relationship::ToManyCollection => member.ty.is_collection(),
                Relationship::ToManyMap => member.ty.is_map(),
            };
            if !shape_ok {
                return Err(SchemaError::RelationshipMismatch {
                    owner: owner.clone(),
                    member: member.name.clone(),
                    relationship: member.relationship,
                    ty: member.ty.clone(),
                });
            }
        }

        for param in &descriptor.constructor {
            self.check_known(owner, &format!("(arg{})", param.index), &param.ty)?;
            if descriptor.member_named(&param.binds).is_none() {
                return Err(SchemaError::BadConstructorBinding {
                    owner: owner.clone(),
                    index: param.index,
                    binds: param.binds.clone(),
                });
            }
        }

        Ok(())
    }

    fn check_known(&self, owner: &str, member: &str, ty: &TypeRef) -> Result<(), SchemaError> {
        let unknown = |name: &str| SchemaError::UnknownType {
            owner: owner.to_string(),
            member: member.to_string(),
            name: name.to_string(),
        };
        match ty {
            TypeRef::Scalar(_) => Ok(()),
            TypeRef::Named(name) if self.contains(name) => Ok(()),
            TypeRef::Named(name) => Err(unknown(name)),
            TypeRef::Array(element) | TypeRef::Collection { element, .. } => {
                self.check_known(owner, member, element)
            }
            TypeRef::Map { key, value } => {
                self.check_known(owner, member, key)?;
                self.check_known(owner, member, value)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    descriptors: Vec<TypeDescriptor>,
}

impl SchemaBuilder {
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        Schema::from_descriptors(self.descriptors)
    }
}
