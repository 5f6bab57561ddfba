use super::Maker;
use crate::context::ValueSequence;
use crate::error::{MakeResult, SynthesisError};
use chrono::{TimeZone, Utc};
use fixturegraph_schema::{ScalarKind, TypeName, Value};
use std::sync::Arc;

const NUMBER_SEQUENCE: &str = "number";
const TEXT_SEQUENCE: &str = "text";
const BOOL_SEQUENCE: &str = "bool";
const DATE_SEQUENCE: &str = "date";

/// 2000-01-01T00:00:00Z; dates advance one day per value.
const DATE_BASE_SECS: i64 = 946_684_800;
const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct NumberMaker {
    kind: ScalarKind,
    start: i64,
    sequence: Arc<ValueSequence>,
}

impl NumberMaker {
    pub fn new(kind: ScalarKind, start: i64, sequence: Arc<ValueSequence>) -> Self {
        Self {
            kind,
            start,
            sequence,
        }
    }
}

impl Maker for NumberMaker {
    fn value(&self) -> MakeResult<Value> {
        let n = self
            .start
            .saturating_add(self.sequence.next(NUMBER_SEQUENCE) as i64);
        Ok(match self.kind {
            ScalarKind::Short => Value::Int(n.rem_euclid(i64::from(i16::MAX)) + 1),
            ScalarKind::Float | ScalarKind::Double => Value::Float(n as f64),
            _ => Value::Int(n),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StringMaker {
    member: String,
    seed: String,
    min: usize,
    max: usize,
    sequence: Arc<ValueSequence>,
}

impl StringMaker {
    pub fn new(
        member: impl Into<String>,
        seed: impl Into<String>,
        (min, max): (usize, usize),
        sequence: Arc<ValueSequence>,
    ) -> Self {
        Self {
            member: member.into(),
            seed: seed.into(),
            min,
            max,
            sequence,
        }
    }
}

impl Maker for StringMaker {
    fn value(&self) -> MakeResult<Value> {
        if self.max == 0 || self.min > self.max {
            return Err(SynthesisError::Constraint {
                member: self.member.clone(),
                message: format!("no text length fits [{}, {}]", self.min, self.max),
            }
            .into());
        }

        let n = self.sequence.next(TEXT_SEQUENCE) + 1;
        let candidate: Vec<char> = format!("{}{n}", self.seed).chars().collect();
        // keep the tail so the counter survives truncation
        let skip = candidate.len().saturating_sub(self.max);
        let mut text: String = candidate[skip..].iter().collect();
        while text.chars().count() < self.min {
            text.push('x');
        }
        Ok(Value::Text(text))
    }
}

#[derive(Debug, Clone)]
pub struct BooleanMaker {
    sequence: Arc<ValueSequence>,
}

impl BooleanMaker {
    pub fn new(sequence: Arc<ValueSequence>) -> Self {
        Self { sequence }
    }
}

impl Maker for BooleanMaker {
    fn value(&self) -> MakeResult<Value> {
        Ok(Value::Bool(self.sequence.next(BOOL_SEQUENCE) % 2 == 1))
    }
}

#[derive(Debug, Clone)]
pub struct DateMaker {
    sequence: Arc<ValueSequence>,
}

impl DateMaker {
    pub fn new(sequence: Arc<ValueSequence>) -> Self {
        Self { sequence }
    }
}

impl Maker for DateMaker {
    fn value(&self) -> MakeResult<Value> {
        let days = self.sequence.next(DATE_SEQUENCE) as i64;
        let secs = DATE_BASE_SECS.saturating_add(days.saturating_mul(SECS_PER_DAY));
        Utc.timestamp_opt(secs, 0)
            .single()
            .map(Value::Date)
            .ok_or_else(|| SynthesisError::Custom(format!("date out of range: {secs}")).into())
    }
}

/// Cycles through the declared constants, one step per value.
#[derive(Debug, Clone)]
pub struct EnumMaker {
    ty: TypeName,
    constants: Vec<String>,
    sequence: Arc<ValueSequence>,
}

impl EnumMaker {
    pub fn new(ty: TypeName, constants: Vec<String>, sequence: Arc<ValueSequence>) -> Self {
        Self {
            ty,
            constants,
            sequence,
        }
    }
}

impl Maker for EnumMaker {
    fn value(&self) -> MakeResult<Value> {
        if self.constants.is_empty() {
            return Err(SynthesisError::Custom(format!("enum `{}` has no constants", self.ty)).into());
        }
        let n = self.sequence.next(&format!("enum:{}", self.ty)) as usize;
        Ok(Value::Enum {
            ty: self.ty.clone(),
            constant: self.constants[n % self.constants.len()].clone(),
        })
    }
}
