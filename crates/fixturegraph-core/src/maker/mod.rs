//! Value producers.
//!
//! [`Maker`] is the open extension point (custom overrides, closures);
//! [`ValueMaker`] is the closed set the factory dispatches to.

mod bean;
mod scalar;

pub use bean::BeanMaker;
pub use scalar::{BooleanMaker, DateMaker, EnumMaker, NumberMaker, StringMaker};

use crate::error::MakeResult;
use crate::holder::BeanValueHolder;
use fixturegraph_schema::{TypeRef, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Zero-argument value producer.
pub trait Maker: Send + Sync {
    fn value(&self) -> MakeResult<Value>;
}

impl<F> Maker for F
where
    F: Fn() -> MakeResult<Value> + Send + Sync,
{
    fn value(&self) -> MakeResult<Value> {
        self()
    }
}

#[derive(Debug)]
pub enum ValueMaker {
    Number(NumberMaker),
    Text(StringMaker),
    Bool(BooleanMaker),
    Date(DateMaker),
    Enum(EnumMaker),
    Bean(BeanMaker),
    ReuseOrNull(ReuseOrNullMaker),
    Preferred(PreferredMaker),
    Null(NullMaker),
}

impl Maker for ValueMaker {
    fn value(&self) -> MakeResult<Value> {
        match self {
            ValueMaker::Number(m) => m.value(),
            ValueMaker::Text(m) => m.value(),
            ValueMaker::Bool(m) => m.value(),
            ValueMaker::Date(m) => m.value(),
            ValueMaker::Enum(m) => m.value(),
            ValueMaker::Bean(m) => m.value(),
            ValueMaker::ReuseOrNull(m) => m.value(),
            ValueMaker::Preferred(m) => m.value(),
            ValueMaker::Null(m) => m.value(),
        }
    }
}

/// Always yields the same value.
#[derive(Debug, Clone)]
pub struct FixedValueMaker(Value);

impl FixedValueMaker {
    pub fn new(value: Value) -> Self {
        FixedValueMaker(value)
    }

    pub fn text(text: impl Into<String>) -> Self {
        FixedValueMaker(Value::Text(text.into()))
    }
}

impl Maker for FixedValueMaker {
    fn value(&self) -> MakeResult<Value> {
        Ok(self.0.clone())
    }
}

/// `prefix1`, `prefix2`, ... for members that need distinct readable values.
#[derive(Debug)]
pub struct SequenceMaker {
    prefix: String,
    next: AtomicU64,
}

impl SequenceMaker {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Maker for SequenceMaker {
    fn value(&self) -> MakeResult<Value> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(Value::Text(format!("{}{n}", self.prefix)))
    }
}

/// Leaves the member untouched (absent, or its initial empty container).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMaker;

impl Maker for NullMaker {
    fn value(&self) -> MakeResult<Value> {
        Ok(Value::Null)
    }
}

/// References to other entities are never synthesized here: they resolve to
/// the cached instance of the type, or stay null.
#[derive(Debug, Clone)]
pub struct ReuseOrNullMaker {
    ty: TypeRef,
    holder: BeanValueHolder,
}

impl ReuseOrNullMaker {
    pub fn new(ty: TypeRef, holder: BeanValueHolder) -> Self {
        Self { ty, holder }
    }
}

impl Maker for ReuseOrNullMaker {
    fn value(&self) -> MakeResult<Value> {
        Ok(self
            .holder
            .try_get(&self.ty)
            .map(Value::Bean)
            .unwrap_or(Value::Null))
    }
}

/// A registry override, tagged with the pattern that selected it.
#[derive(Clone)]
pub struct PreferredMaker {
    pattern: String,
    maker: Arc<dyn Maker>,
}

impl PreferredMaker {
    pub(crate) fn new(pattern: String, maker: Arc<dyn Maker>) -> Self {
        Self { pattern, maker }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Maker for PreferredMaker {
    fn value(&self) -> MakeResult<Value> {
        self.maker.value()
    }
}

impl fmt::Debug for PreferredMaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferredMaker")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}
