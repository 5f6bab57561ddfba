//! Required-reference discovery.
//!
//! `scan(root)` walks required references depth-first and returns one
//! [`EntityClass`] per type the root transitively depends on, dependencies
//! before dependents, the root itself excluded. Each type is visited once;
//! self references never traverse. A required-reference cycle between
//! distinct types is reported as [`ResolutionError::CyclicRequirement`]
//! because no persistence order can satisfy it. A reference to a
//! non-entity target is only accepted when a preferred maker covers it.

use crate::context::MakeContext;
use crate::error::{MakeResult, ResolutionError};
use fixturegraph_schema::{CollectionKind, Settable, TypeDescriptor, TypeKind, TypeName, TypeRef};
use std::collections::HashSet;

/// Type witnesses of a containing member, resolved at scan time.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainingShape {
    Collection {
        kind: CollectionKind,
        element: TypeRef,
    },
    Map {
        key: TypeRef,
        value: TypeRef,
    },
}

/// The inverse (to-many) side of some other type's required reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainingAccessor {
    pub settable: Settable,
    pub shape: ContainingShape,
}

impl ContainingAccessor {
    pub fn member(&self) -> &str {
        self.settable.target_member()
    }
}

/// Relationship summary of one type, immutable once scanned.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityClass {
    type_name: TypeName,
    depending_types: Vec<TypeName>,
    containing: Vec<ContainingAccessor>,
    elements: Vec<Settable>,
    require_new_instance: bool,
}

impl EntityClass {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::named(self.type_name.clone())
    }

    /// Required-reference targets in discovery order, duplicates kept.
    pub fn depending_types(&self) -> &[TypeName] {
        &self.depending_types
    }

    pub fn containing_accessors(&self) -> &[ContainingAccessor] {
        &self.containing
    }

    /// Every injectable slot: constructor parameters, then the properties
    /// they do not bind.
    pub fn elements(&self) -> &[Settable] {
        &self.elements
    }

    pub fn is_require_new_instance(&self) -> bool {
        self.require_new_instance
    }
}

#[derive(Debug, Clone)]
pub struct EntityClassScanner {
    context: MakeContext,
}

struct ScanState {
    visited: HashSet<TypeName>,
    path: Vec<TypeName>,
    out: Vec<EntityClass>,
}

impl EntityClassScanner {
    pub fn new(context: MakeContext) -> Self {
        Self { context }
    }

    pub fn scan(&self, root: &str) -> MakeResult<Vec<EntityClass>> {
        let descriptor = self.descriptor(root)?;
        if descriptor.kind != TypeKind::Entity {
            return Err(ResolutionError::NotInstantiable {
                name: root.to_string(),
                reason: format!("only entities can be resolved, found {:?}", descriptor.kind),
            }
            .into());
        }

        let mut state = ScanState {
            visited: HashSet::new(),
            path: Vec::new(),
            out: Vec::new(),
        };
        self.visit(descriptor, &mut state)?;
        // the root is always the last type finished
        state.out.pop();
        Ok(state.out)
    }

    pub fn entity_class(&self, type_name: &str) -> MakeResult<EntityClass> {
        Ok(self.entity_class_of(self.descriptor(type_name)?))
    }

    fn descriptor(&self, type_name: &str) -> MakeResult<&TypeDescriptor> {
        self.context
            .schema()
            .get(type_name)
            .ok_or_else(|| ResolutionError::UnknownType(type_name.to_string()).into())
    }

    fn visit(&self, descriptor: &TypeDescriptor, state: &mut ScanState) -> MakeResult<()> {
        let name = &descriptor.name;
        state.visited.insert(name.clone());
        state.path.push(name.clone());

        for (member, target) in descriptor.required_references() {
            if target == name {
                continue;
            }
            if let Some(pos) = state.path.iter().position(|p| p == target) {
                let mut path = state.path[pos..].to_vec();
                path.push(target.to_string());
                return Err(ResolutionError::CyclicRequirement { path }.into());
            }

            let target_descriptor = match self.context.schema().get(target) {
                Some(d) if d.kind == TypeKind::Entity => d,
                _ if self.has_preferred_maker(&Settable::property(name, member)) => continue,
                _ => {
                    return Err(ResolutionError::UnresolvableReference {
                        owner: name.clone(),
                        member: member.name.clone(),
                        target: target.to_string(),
                    }
                    .into())
                }
            };
            if !state.visited.contains(target) {
                self.visit(target_descriptor, state)?;
            }
        }

        state.path.pop();
        state.out.push(self.entity_class_of(descriptor));
        Ok(())
    }

    fn has_preferred_maker(&self, settable: &Settable) -> bool {
        self.context
            .preferred_value_makers()
            .find(&settable.fully_qualified_name())
            .is_some()
    }

    fn entity_class_of(&self, descriptor: &TypeDescriptor) -> EntityClass {
        EntityClass {
            type_name: descriptor.name.clone(),
            depending_types: descriptor
                .required_references()
                .map(|(_, target)| target.to_string())
                .collect(),
            containing: self.containing_accessors(descriptor),
            elements: elements_of(descriptor),
            require_new_instance: self.context.requires_new_instance(&descriptor.name),
        }
    }

    /// To-many members whose element (or map key/value) type is another type
    /// holding a required reference back to `descriptor`.
    fn containing_accessors(&self, descriptor: &TypeDescriptor) -> Vec<ContainingAccessor> {
        let owner = descriptor.name.as_str();
        let schema = self.context.schema();
        let refers_back = |ty: &TypeRef| {
            ty.named_type()
                .is_some_and(|n| n != owner && schema.references_back(n, owner))
        };

        descriptor
            .to_many_members()
            .filter_map(|member| {
                let shape = match &member.ty {
                    TypeRef::Collection { kind, element } if refers_back(&**element) => {
                        ContainingShape::Collection {
                            kind: *kind,
                            element: (**element).clone(),
                        }
                    }
                    TypeRef::Map { key, value } if refers_back(&**key) || refers_back(&**value) => {
                        ContainingShape::Map {
                            key: (**key).clone(),
                            value: (**value).clone(),
                        }
                    }
                    _ => return None,
                };
                Some(ContainingAccessor {
                    settable: Settable::property(owner, member),
                    shape,
                })
            })
            .collect()
    }
}

fn elements_of(descriptor: &TypeDescriptor) -> Vec<Settable> {
    let params = descriptor
        .constructor
        .iter()
        .map(|param| Settable::parameter(&descriptor.name, param));
    let properties = descriptor
        .members
        .iter()
        .filter(|m| !descriptor.constructor.iter().any(|p| p.binds == m.name))
        .map(|member| Settable::property(&descriptor.name, member));
    params.chain(properties).collect()
}
