//! Graph resolution and the persistence driver.
//!
//! `required_entities_for(root)`:
//! 1. scan the root's required-reference closure (root excluded)
//! 2. per type, in order: reuse the cached instance, or synthesize, cache and
//!    enqueue a new one when the type is always-new or not cached yet
//! 3. synthesize a brand-new root, cache it, enqueue it last
//! 4. back-fill every containing accessor from the cache
//!
//! The first instance cached for a type stays canonical for the rest of the
//! run. Back-fill gaps are logged and left for the caller.

use crate::callback::{Callback, NoOpCallback};
use crate::context::MakeContext;
use crate::error::{MakeError, MakeResult};
use crate::holder::BeanValueHolder;
use crate::maker::BeanMaker;
use crate::persistence::PersistenceContext;
use crate::scanner::{ContainingAccessor, ContainingShape, EntityClass, EntityClassScanner};
use fixturegraph_schema::{Bean, TypeRef, Value};
use std::fmt;

#[derive(Debug, Clone)]
pub struct EntityMaker {
    scanner: EntityClassScanner,
    context: MakeContext,
}

impl EntityMaker {
    pub fn new(context: MakeContext) -> Self {
        Self {
            scanner: EntityClassScanner::new(context.clone()),
            context,
        }
    }

    pub fn context(&self) -> &MakeContext {
        &self.context
    }

    pub fn required_entities_for(&self, root: &str) -> MakeResult<Vec<Bean>> {
        let classes = self.scanner.scan(root)?;
        let holder = self.context.bean_value_holder();
        let mut sequence = Vec::with_capacity(classes.len() + 1);

        for class in &classes {
            let ty = class.type_ref();
            let cached = if class.is_require_new_instance() {
                None
            } else {
                holder.try_get(&ty)
            };
            let bean = match cached {
                Some(bean) => bean,
                None => {
                    let bean = BeanMaker::new(class.type_name(), self.context.clone()).make()?;
                    holder.put(ty, bean.clone());
                    bean
                }
            };
            sequence.push(bean);
        }

        let root_bean = BeanMaker::new(root, self.context.clone()).make()?;
        holder.put(TypeRef::named(root), root_bean.clone());
        sequence.push(root_bean);

        for class in &classes {
            self.back_fill(class);
        }

        tracing::debug!(root = %root, "resolved sequence:\n{}", SequencePrinter(&sequence));
        Ok(sequence)
    }

    pub fn make_and_persist(
        &self,
        context: &mut dyn PersistenceContext,
        root: &str,
    ) -> MakeResult<Bean> {
        self.make_and_persist_with(context, root, &mut NoOpCallback)
    }

    /// Resolves `root`, then persists the sequence inside one transaction.
    /// Instances the context already considers saved are skipped. Any error
    /// leaves the transaction uncommitted.
    pub fn make_and_persist_with(
        &self,
        context: &mut dyn PersistenceContext,
        root: &str,
        callback: &mut dyn Callback,
    ) -> MakeResult<Bean> {
        let sequence = self.required_entities_for(root)?;

        context.begin_transaction()?;
        let to_be_persisted = callback.before_persist(context, sequence);
        persist_in_order(context, &to_be_persisted)?;
        let persisted = callback.after_persist(context, to_be_persisted);
        context.commit_transaction()?;

        find_entity(&persisted, root).ok_or_else(|| MakeError::RootMissing(root.to_string()))
    }

    /// Independent snapshot of the instance cache.
    pub fn export_copy_of_beans(&self) -> BeanValueHolder {
        self.context.bean_value_holder().get_copy()
    }

    fn back_fill(&self, class: &EntityClass) {
        let holder = self.context.bean_value_holder();
        let Some(owner) = holder.try_get(&class.type_ref()) else {
            return;
        };
        for accessor in class.containing_accessors() {
            match &accessor.shape {
                ContainingShape::Collection { element, .. } => {
                    add_many_side_entity_if_exists(holder, &owner, accessor, element)
                }
                ContainingShape::Map { key, value } => {
                    put_many_side_entity_if_exists(holder, &owner, accessor, key, value)
                }
            }
        }
    }
}

/// Last instance of `type_name` in `sequence`.
pub fn find_entity(sequence: &[Bean], type_name: &str) -> Option<Bean> {
    sequence.iter().rev().find(|b| b.is_of(type_name)).cloned()
}

fn persist_in_order(context: &mut dyn PersistenceContext, sequence: &[Bean]) -> MakeResult<()> {
    for bean in sequence {
        if context.is_saved(bean) {
            tracing::info!(
                type_name = %bean.type_name(),
                id = %bean.id(),
                "reusing persisted entity"
            );
            continue;
        }
        context.persist(bean)?;
    }
    Ok(())
}

fn add_many_side_entity_if_exists(
    holder: &BeanValueHolder,
    owner: &Bean,
    accessor: &ContainingAccessor,
    element: &TypeRef,
) {
    let Some(many_side) = holder.try_get(element) else {
        return;
    };
    let item = Value::Bean(many_side);
    let added = owner.with_list_mut(accessor.member(), |items| {
        if !items.contains(&item) {
            items.push(item.clone());
        }
    });
    if added.is_none() {
        tracing::warn!(
            member = %accessor.settable,
            "collection is null, resolve the relationship manually"
        );
    }
}

fn put_many_side_entity_if_exists(
    holder: &BeanValueHolder,
    owner: &Bean,
    accessor: &ContainingAccessor,
    key: &TypeRef,
    value: &TypeRef,
) {
    let Some(key_bean) = holder.try_get(key) else {
        tracing::warn!(
            member = %accessor.settable,
            key = %key,
            "no cached map key, resolve the relationship manually"
        );
        return;
    };
    let Some(value_bean) = holder.try_get(value) else {
        return;
    };

    let key = Value::Bean(key_bean);
    let value = Value::Bean(value_bean);
    let put = owner.with_map_mut(accessor.member(), |entries| {
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => entries.push((key.clone(), value.clone())),
        }
    });
    if put.is_none() {
        tracing::warn!(
            member = %accessor.settable,
            "map is null, resolve the relationship manually"
        );
    }
}

struct SequencePrinter<'a>(&'a [Bean]);

impl fmt::Display for SequencePrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bean) in self.0.iter().enumerate() {
            writeln!(f, "  [{i}] {bean}")?;
        }
        Ok(())
    }
}
