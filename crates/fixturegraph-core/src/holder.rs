//! Instance cache: at most one canonical bean per type.

use fixturegraph_schema::{Bean, TypeRef, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Cloning shares the backing store; use [`BeanValueHolder::get_copy`] for an
/// independent snapshot.
#[derive(Debug, Clone, Default)]
pub struct BeanValueHolder {
    beans: Arc<RwLock<HashMap<TypeRef, Bean>>>,
}

impl BeanValueHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_get(&self, ty: &TypeRef) -> Option<Bean> {
        self.beans.read().get(ty).cloned()
    }

    pub fn try_get_named(&self, type_name: &str) -> Option<Bean> {
        self.try_get(&TypeRef::named(type_name))
    }

    /// Caches `value` when it is a bean; absence is never cached.
    pub fn put_if_not_null(&self, ty: TypeRef, value: &Value) {
        if let Value::Bean(bean) = value {
            self.put(ty, bean.clone());
        }
    }

    pub fn put(&self, ty: TypeRef, bean: Bean) -> Option<Bean> {
        self.beans.write().insert(ty, bean)
    }

    /// Snapshot with its own map; the beans themselves are shared.
    pub fn get_copy(&self) -> BeanValueHolder {
        BeanValueHolder {
            beans: Arc::new(RwLock::new(self.beans.read().clone())),
        }
    }

    pub fn entries(&self) -> Vec<(TypeRef, Bean)> {
        let mut entries: Vec<(TypeRef, Bean)> = self
            .beans
            .read()
            .iter()
            .map(|(ty, bean)| (ty.clone(), bean.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn types(&self) -> Vec<TypeRef> {
        self.entries().into_iter().map(|(ty, _)| ty).collect()
    }

    pub fn clear(&self) {
        self.beans.write().clear();
    }

    pub fn len(&self) -> usize {
        self.beans.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.read().is_empty()
    }
}
