//! Hooks around the persistence step.

use crate::entity_maker::find_entity;
use crate::persistence::PersistenceContext;
use fixturegraph_schema::{Bean, TypeName, Value};

/// Both hooks default to passing the sequence through unchanged.
pub trait Callback {
    fn before_persist(
        &mut self,
        _context: &mut dyn PersistenceContext,
        to_be_persisted: Vec<Bean>,
    ) -> Vec<Bean> {
        to_be_persisted
    }

    fn after_persist(
        &mut self,
        _context: &mut dyn PersistenceContext,
        persisted: Vec<Bean>,
    ) -> Vec<Bean> {
        persisted
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl Callback for NoOpCallback {}

/// Keeps a copy of the sequence as it was handed to persistence.
#[derive(Debug, Clone, Default)]
pub struct TakeCopyCallback {
    copy: Vec<Bean>,
}

impl TakeCopyCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy(&self) -> &[Bean] {
        &self.copy
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Bean> {
        self.copy.get(index)
    }

    pub fn get_by_type(&self, type_name: &str) -> Option<Bean> {
        find_entity(&self.copy, type_name)
    }
}

impl Callback for TakeCopyCallback {
    fn before_persist(
        &mut self,
        _context: &mut dyn PersistenceContext,
        to_be_persisted: Vec<Bean>,
    ) -> Vec<Bean> {
        self.copy = to_be_persisted.clone();
        to_be_persisted
    }
}

/// Adds `target` to the many-to-many collection `member` of the `owner`
/// instance in the sequence before it is persisted.
#[derive(Debug, Clone)]
pub struct WireManyToManyCallback {
    owner: TypeName,
    member: String,
    target: Bean,
}

impl WireManyToManyCallback {
    pub fn new(owner: impl Into<TypeName>, member: impl Into<String>, target: Bean) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
            target,
        }
    }
}

impl Callback for WireManyToManyCallback {
    fn before_persist(
        &mut self,
        _context: &mut dyn PersistenceContext,
        to_be_persisted: Vec<Bean>,
    ) -> Vec<Bean> {
        let Some(owner) = find_entity(&to_be_persisted, &self.owner) else {
            tracing::warn!(owner = %self.owner, "no instance to wire many-to-many into");
            return to_be_persisted;
        };

        let target = Value::Bean(self.target.clone());
        let wired = owner.with_list_mut(&self.member, |items| {
            if !items.contains(&target) {
                items.push(target.clone());
            }
        });
        if wired.is_none() {
            tracing::warn!(
                owner = %self.owner,
                member = %self.member,
                "many-to-many collection is null, wire it manually"
            );
        }
        to_be_persisted
    }
}
