//! In-memory persistence context for fixturegraph
//!
//! A small transactional store that behaves like a relational backend as far
//! as the engine can observe:
//!
//! - one transaction at a time; `persist` outside a transaction fails
//! - sequential surrogate ids written to each entity's id member
//! - an entity whose required references are not saved yet is rejected
//! - committed rows are kept as JSON snapshots for assertions
//!
//! ```ignore
//! let mut store = InMemoryStore::new(schema.clone());
//! let child = maker.make_and_persist(&mut store, "Child")?;
//! assert_eq!(store.persist_log(), ["Parent", "Child"]);
//! ```


use fixturegraph_core::{PersistenceContext, PersistenceError};
use fixturegraph_schema::{Bean, Schema, TypeName, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Rows
// ============================================================================

/// One persisted entity as it looked when `persist` was called.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow {
    pub type_name: TypeName,
    pub id: i64,
    pub fields: serde_json::Value,
}

impl StoredRow {
    fn capture(bean: &Bean, id: i64) -> Self {
        let fields = bean
            .to_json()
            .get("fields")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        Self {
            type_name: bean.type_name(),
            id,
            fields,
        }
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug)]
pub struct InMemoryStore {
    schema: Arc<Schema>,
    next_id: i64,
    active: bool,
    pending: Vec<StoredRow>,
    committed: Vec<StoredRow>,
    persist_log: Vec<TypeName>,
    rejections: BTreeMap<TypeName, String>,
}

impl InMemoryStore {
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        Self {
            schema: schema.into(),
            next_id: 1,
            active: false,
            pending: Vec::new(),
            committed: Vec::new(),
            persist_log: Vec::new(),
            rejections: BTreeMap::new(),
        }
    }

    /// Every future `persist` of `type_name` fails with `reason`.
    pub fn reject(&mut self, type_name: impl Into<TypeName>, reason: impl Into<String>) {
        self.rejections.insert(type_name.into(), reason.into());
    }

    /// Type names in `persist` call order, including calls that failed.
    pub fn persist_log(&self) -> &[TypeName] {
        &self.persist_log
    }

    pub fn rows(&self) -> &[StoredRow] {
        &self.committed
    }

    pub fn rows_of(&self, type_name: &str) -> impl Iterator<Item = &StoredRow> + '_ {
        let type_name = type_name.to_string();
        self.committed
            .iter()
            .filter(move |row| row.type_name == type_name)
    }

    pub fn has_uncommitted(&self) -> bool {
        self.active || !self.pending.is_empty()
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.committed)
    }

    fn rejected(bean: &Bean, reason: impl Into<String>) -> PersistenceError {
        PersistenceError::Rejected {
            entity: bean.to_string(),
            reason: reason.into(),
        }
    }

    fn check_insertable(&self, bean: &Bean) -> Result<(), PersistenceError> {
        let type_name = bean.type_name();
        if let Some(reason) = self.rejections.get(&type_name) {
            return Err(Self::rejected(bean, reason.clone()));
        }

        let descriptor = self
            .schema
            .get(&type_name)
            .filter(|d| d.is_entity())
            .ok_or_else(|| Self::rejected(bean, "not a persistable entity"))?;
        if !bean.is_unsaved() {
            return Err(Self::rejected(bean, "already saved"));
        }

        for (member, target) in descriptor.required_references() {
            match bean.get(&member.name) {
                Value::Bean(referenced) if !referenced.is_unsaved() => {}
                Value::Bean(_) => {
                    return Err(Self::rejected(
                        bean,
                        format!("{}#{} refers to an unsaved {target}", type_name, member.name),
                    ))
                }
                _ if target == type_name => {}
                _ => {
                    return Err(Self::rejected(
                        bean,
                        format!("{}#{} is required but null", type_name, member.name),
                    ))
                }
            }
        }
        Ok(())
    }
}

impl PersistenceContext for InMemoryStore {
    fn begin_transaction(&mut self) -> Result<(), PersistenceError> {
        if self.active {
            return Err(PersistenceError::Transaction(
                "a transaction is already active".to_string(),
            ));
        }
        self.active = true;
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), PersistenceError> {
        if !self.active {
            return Err(PersistenceError::Transaction(
                "commit without an active transaction".to_string(),
            ));
        }
        let rows = self.pending.len();
        self.committed.append(&mut self.pending);
        self.active = false;
        tracing::debug!(rows, total = self.committed.len(), "committed");
        Ok(())
    }

    fn persist(&mut self, bean: &Bean) -> Result<(), PersistenceError> {
        self.persist_log.push(bean.type_name());
        if !self.active {
            return Err(PersistenceError::Transaction(format!(
                "persist of {bean} outside a transaction"
            )));
        }
        self.check_insertable(bean)?;

        let id = self.next_id;
        self.next_id += 1;
        bean.assign_id(Value::Int(id));
        tracing::debug!(type_name = %bean.type_name(), id, "persisted");
        self.pending.push(StoredRow::capture(bean, id));
        Ok(())
    }
}
