//! Per-type relationship metadata.
//!
//! Every member carries a [`Relationship`] classification computed up front,
//! so the engine consumes plain data instead of interpreting annotations.

use crate::type_ref::{TypeName, TypeRef};
use serde::{Deserialize, Serialize};

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Plain value, enum or embedded record. Entity-typed members left
    /// `Scalar` are read as required references.
    #[default]
    Scalar,
    /// Single-valued dependency that must exist before the owner.
    RequiredReference,
    /// Single-valued dependency that may stay unset.
    OptionalReference,
    /// Collection-valued inverse side (one-to-many / many-to-many).
    ToManyCollection,
    /// Map-valued inverse side.
    ToManyMap,
}

impl Relationship {
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            Relationship::RequiredReference | Relationship::OptionalReference
        )
    }

    pub fn is_to_many(self) -> bool {
        matches!(
            self,
            Relationship::ToManyCollection | Relationship::ToManyMap
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    /// Surrogate identifier; assigned by the persistence layer.
    Id,
    /// Optimistic-lock counter; assigned by the persistence layer.
    Version,
    /// Not persisted and never synthesized.
    Transient,
    /// Length bounds for text members.
    Size { min: usize, max: usize },
}

// ============================================================================
// Members
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub relationship: Relationship,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    /// Container members start as an empty collection/map instead of absent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub starts_empty: bool,
}

impl MemberDef {
    fn new(name: impl Into<String>, ty: TypeRef, relationship: Relationship) -> Self {
        Self {
            name: name.into(),
            ty,
            relationship,
            annotations: Vec::new(),
            starts_empty: false,
        }
    }

    pub fn scalar(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ty, Relationship::Scalar)
    }

    /// A nested value record (or enum) that is not an independent entity.
    pub fn embedded(name: impl Into<String>, ty: impl Into<TypeName>) -> Self {
        Self::new(name, TypeRef::named(ty), Relationship::Scalar)
    }

    pub fn required(name: impl Into<String>, target: impl Into<TypeName>) -> Self {
        Self::new(name, TypeRef::named(target), Relationship::RequiredReference)
    }

    pub fn optional(name: impl Into<String>, target: impl Into<TypeName>) -> Self {
        Self::new(name, TypeRef::named(target), Relationship::OptionalReference)
    }

    /// Collection- or map-valued inverse side; the classification follows `ty`.
    pub fn to_many(name: impl Into<String>, ty: TypeRef) -> Self {
        let relationship = if ty.is_map() {
            Relationship::ToManyMap
        } else {
            Relationship::ToManyCollection
        };
        Self::new(name, ty, relationship)
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn starting_empty(mut self) -> Self {
        self.starts_empty = true;
        self
    }

    pub fn has_annotation(&self, annotation: &Annotation) -> bool {
        self.annotations.contains(annotation)
    }

    pub fn is_id(&self) -> bool {
        self.has_annotation(&Annotation::Id)
    }

    /// Members the persistence layer owns or that are never stored.
    pub fn is_managed(&self) -> bool {
        self.annotations.iter().any(|a| {
            matches!(
                a,
                Annotation::Id | Annotation::Version | Annotation::Transient
            )
        })
    }
}

/// One constructor parameter; its synthesized value populates member `binds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorParam {
    pub index: usize,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub binds: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Independently persisted record with a surrogate identifier.
    Entity,
    /// Value record nested inside its owner.
    Embeddable,
    /// Interface or abstract record; cannot be instantiated.
    Abstract,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: TypeName,
    pub kind: TypeKind,
    #[serde(default)]
    pub members: Vec<MemberDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructor: Vec<ConstructorParam>,
    /// Enum constants, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<String>,
    /// Never reuse a cached instance of this type.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_new_instance: bool,
}

impl TypeDescriptor {
    fn new(name: impl Into<TypeName>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            members: Vec::new(),
            constructor: Vec::new(),
            constants: Vec::new(),
            require_new_instance: false,
        }
    }

    pub fn entity(name: impl Into<TypeName>) -> Self {
        Self::new(name, TypeKind::Entity)
    }

    pub fn embeddable(name: impl Into<TypeName>) -> Self {
        Self::new(name, TypeKind::Embeddable)
    }

    pub fn abstract_type(name: impl Into<TypeName>) -> Self {
        Self::new(name, TypeKind::Abstract)
    }

    pub fn enumeration<I, S>(name: impl Into<TypeName>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut descriptor = Self::new(name, TypeKind::Enum);
        descriptor.constants = constants.into_iter().map(Into::into).collect();
        descriptor
    }

    /// Adds a `Long` surrogate identifier member.
    pub fn id(self, name: impl Into<String>) -> Self {
        self.member(MemberDef::scalar(name, TypeRef::long()).annotated(Annotation::Id))
    }

    pub fn member(mut self, member: MemberDef) -> Self {
        self.members.push(member);
        self
    }

    pub fn constructor_param(mut self, ty: TypeRef, binds: impl Into<String>) -> Self {
        let index = self.constructor.len();
        self.constructor.push(ConstructorParam {
            index,
            ty,
            binds: binds.into(),
            annotations: Vec::new(),
        });
        self
    }

    pub fn require_new_instance(mut self) -> Self {
        self.require_new_instance = true;
        self
    }

    pub fn is_entity(&self) -> bool {
        self.kind == TypeKind::Entity
    }

    pub fn is_instantiable(&self) -> bool {
        matches!(self.kind, TypeKind::Entity | TypeKind::Embeddable)
    }

    pub fn member_named(&self, name: &str) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn id_member(&self) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.is_id())
    }

    /// Required references in declaration order, duplicates kept.
    pub fn required_references(&self) -> impl Iterator<Item = (&MemberDef, &str)> {
        self.members.iter().filter_map(|m| {
            if m.relationship != Relationship::RequiredReference {
                return None;
            }
            m.ty.named_type().map(|target| (m, target))
        })
    }

    pub fn to_many_members(&self) -> impl Iterator<Item = &MemberDef> {
        self.members.iter().filter(|m| m.relationship.is_to_many())
    }
}
