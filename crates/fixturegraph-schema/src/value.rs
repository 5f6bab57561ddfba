//! Synthesized values and identity-bearing record instances.

use crate::type_ref::TypeName;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
    Enum { ty: TypeName, constant: String },
    Bean(Bean),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bean(&self) -> Option<&Bean> {
        match self {
            Value::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// JSON rendering; nested beans become `{"ref": type, "id": id}`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(n) => json!(n),
            Value::Float(x) => json!(x),
            Value::Text(s) => json!(s),
            Value::Date(d) => json!(d.to_rfc3339()),
            Value::Enum { constant, .. } => json!(constant),
            Value::Bean(bean) => json!({
                "ref": bean.type_name(),
                "id": bean.id().to_json(),
            }),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Array(
                entries
                    .iter()
                    .map(|(k, v)| json!({ "key": k.to_json(), "value": v.to_json() }))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (
                Value::Enum { ty: t1, constant: c1 },
                Value::Enum { ty: t2, constant: c2 },
            ) => t1 == t2 && c1 == c2,
            (Value::Bean(a), Value::Bean(b)) => a.same(b),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Enum { constant, .. } => f.write_str(constant),
            // nested beans print by reference so cyclic graphs terminate
            Value::Bean(bean) => write!(f, "{}#{}", bean.type_name(), bean.id()),
            Value::List(items) => write!(f, "[{} item(s)]", items.len()),
            Value::Map(entries) => write!(f, "{{{} entry(ies)}}", entries.len()),
        }
    }
}

// ============================================================================
// Bean
// ============================================================================

#[derive(Debug)]
struct BeanState {
    type_name: TypeName,
    id_member: Option<String>,
    fields: BTreeMap<String, Value>,
}

/// Shared handle to one synthesized record. Clones alias the same instance;
/// equality is identity.
#[derive(Clone)]
pub struct Bean(Arc<RwLock<BeanState>>);

impl Bean {
    pub fn new(type_name: impl Into<TypeName>, id_member: Option<String>) -> Self {
        Bean(Arc::new(RwLock::new(BeanState {
            type_name: type_name.into(),
            id_member,
            fields: BTreeMap::new(),
        })))
    }

    pub fn type_name(&self) -> TypeName {
        self.0.read().type_name.clone()
    }

    pub fn is_of(&self, type_name: &str) -> bool {
        self.0.read().type_name == type_name
    }

    /// Identity comparison.
    pub fn same(&self, other: &Bean) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Current value of `member`; absent members read as `Value::Null`.
    pub fn get(&self, member: &str) -> Value {
        self.0
            .read()
            .fields
            .get(member)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set(&self, member: impl Into<String>, value: Value) {
        self.0.write().fields.insert(member.into(), value);
    }

    pub fn members(&self) -> Vec<String> {
        self.0.read().fields.keys().cloned().collect()
    }

    pub fn id_member(&self) -> Option<String> {
        self.0.read().id_member.clone()
    }

    pub fn id(&self) -> Value {
        let state = self.0.read();
        state
            .id_member
            .as_ref()
            .and_then(|m| state.fields.get(m).cloned())
            .unwrap_or(Value::Null)
    }

    /// Assigns the surrogate identifier; a no-op for types without one.
    pub fn assign_id(&self, id: Value) {
        let mut state = self.0.write();
        if let Some(member) = state.id_member.clone() {
            state.fields.insert(member, id);
        }
    }

    pub fn is_unsaved(&self) -> bool {
        self.id().is_null()
    }

    /// Runs `f` on the live list value of `member`; `None` if the list is null.
    pub fn with_list_mut<R>(&self, member: &str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
        let mut state = self.0.write();
        match state.fields.get_mut(member) {
            Some(Value::List(items)) => Some(f(items)),
            _ => None,
        }
    }

    /// Runs `f` on the live map value of `member`; `None` if the map is null.
    pub fn with_map_mut<R>(
        &self,
        member: &str,
        f: impl FnOnce(&mut Vec<(Value, Value)>) -> R,
    ) -> Option<R> {
        let mut state = self.0.write();
        match state.fields.get_mut(member) {
            Some(Value::Map(entries)) => Some(f(entries)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let state = self.0.read();
        let fields: serde_json::Map<String, serde_json::Value> = state
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::json!({
            "type": state.type_name,
            "fields": fields,
        })
    }
}

impl PartialEq for Bean {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Bean {}

impl fmt::Display for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.read();
        write!(f, "{}(", state.type_name)?;
        for (i, (name, value)) in state.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
