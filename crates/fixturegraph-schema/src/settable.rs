//! Uniform handle over the two places a value can be injected into a record:
//! a property or a constructor parameter.

use crate::descriptor::{Annotation, ConstructorParam, MemberDef, Relationship};
use crate::type_ref::{TypeName, TypeRef};
use crate::value::{Bean, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Settable {
    Property { owner: TypeName, member: MemberDef },
    Parameter { owner: TypeName, param: ConstructorParam },
}

impl Settable {
    pub fn property(owner: impl Into<TypeName>, member: &MemberDef) -> Self {
        Settable::Property {
            owner: owner.into(),
            member: member.clone(),
        }
    }

    pub fn parameter(owner: impl Into<TypeName>, param: &ConstructorParam) -> Self {
        Settable::Parameter {
            owner: owner.into(),
            param: param.clone(),
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            Settable::Property { owner, .. } | Settable::Parameter { owner, .. } => owner,
        }
    }

    pub fn ty(&self) -> &TypeRef {
        match self {
            Settable::Property { member, .. } => &member.ty,
            Settable::Parameter { param, .. } => &param.ty,
        }
    }

    pub fn simple_name(&self) -> String {
        match self {
            Settable::Property { member, .. } => member.name.clone(),
            Settable::Parameter { param, .. } => format!("arg{}", param.index),
        }
    }

    /// `Owner#member` for properties, `Owner(argN)` for constructor parameters.
    pub fn fully_qualified_name(&self) -> String {
        match self {
            Settable::Property { owner, member } => format!("{owner}#{}", member.name),
            Settable::Parameter { owner, param } => format!("{owner}(arg{})", param.index),
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        match self {
            Settable::Property { member, .. } => &member.annotations,
            Settable::Parameter { param, .. } => &param.annotations,
        }
    }

    pub fn is_annotation_present(&self, annotation: &Annotation) -> bool {
        self.annotations().contains(annotation)
    }

    /// `(min, max)` from a `Size` annotation.
    pub fn size_bounds(&self) -> Option<(usize, usize)> {
        self.annotations().iter().find_map(|a| match a {
            Annotation::Size { min, max } => Some((*min, *max)),
            _ => None,
        })
    }

    /// Parameters inherit no classification; they are plain values.
    pub fn relationship(&self) -> Relationship {
        match self {
            Settable::Property { member, .. } => member.relationship,
            Settable::Parameter { .. } => Relationship::Scalar,
        }
    }

    /// The member this handle writes to on an instance.
    pub fn target_member(&self) -> &str {
        match self {
            Settable::Property { member, .. } => &member.name,
            Settable::Parameter { param, .. } => &param.binds,
        }
    }

    pub fn value_in(&self, instance: &Bean) -> Value {
        instance.get(self.target_member())
    }
}

impl fmt::Display for Settable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified_name())
    }
}
