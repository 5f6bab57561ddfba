//! Chooses the maker for a declared type.
//!
//! Dispatch order:
//! 1. registry override matching the member's fully-qualified name
//! 2. scalar
//! 3. enum
//! 4. array, collection or map: left to the back-fill pass
//! 5. entity reference: reuse the cached instance or stay null
//! 6. embeddable record: synthesize a nested instance

use crate::context::MakeContext;
use crate::error::{MakeResult, ResolutionError};
use crate::maker::{
    BeanMaker, BooleanMaker, DateMaker, EnumMaker, NullMaker, NumberMaker, ReuseOrNullMaker,
    StringMaker, ValueMaker,
};
use fixturegraph_schema::{ScalarKind, Settable, TypeKind, TypeName, TypeRef};

#[derive(Debug, Clone)]
pub struct ValueMakerFactory {
    context: MakeContext,
    /// Embeddables currently being synthesized, outermost first.
    enclosing: Vec<TypeName>,
}

impl ValueMakerFactory {
    pub fn new(context: MakeContext) -> Self {
        Self {
            context,
            enclosing: Vec::new(),
        }
    }

    pub(crate) fn within(mut self, enclosing: Vec<TypeName>) -> Self {
        self.enclosing = enclosing;
        self
    }

    pub fn from_settable(&self, settable: &Settable) -> MakeResult<ValueMaker> {
        self.from(settable.ty(), Some(settable))
    }

    pub fn from(&self, ty: &TypeRef, settable: Option<&Settable>) -> MakeResult<ValueMaker> {
        if let Some(settable) = settable {
            let name = settable.fully_qualified_name();
            if let Some(preferred) = self.context.preferred_value_makers().find(&name) {
                tracing::trace!(member = %name, pattern = preferred.pattern(), "preferred maker");
                return Ok(ValueMaker::Preferred(preferred));
            }
        }

        let sequence = self.context.sequence().clone();
        match ty {
            TypeRef::Scalar(kind) => Ok(self.scalar_maker(*kind, settable)),
            TypeRef::Array(_) | TypeRef::Collection { .. } | TypeRef::Map { .. } => {
                Ok(ValueMaker::Null(NullMaker))
            }
            TypeRef::Named(name) => {
                let descriptor = self
                    .context
                    .schema()
                    .get(name)
                    .ok_or_else(|| ResolutionError::UnknownType(name.clone()))?;
                match descriptor.kind {
                    TypeKind::Enum => Ok(ValueMaker::Enum(EnumMaker::new(
                        name.clone(),
                        descriptor.constants.clone(),
                        sequence,
                    ))),
                    TypeKind::Entity => Ok(ValueMaker::ReuseOrNull(ReuseOrNullMaker::new(
                        ty.clone(),
                        self.context.bean_value_holder().clone(),
                    ))),
                    TypeKind::Embeddable => Ok(ValueMaker::Bean(BeanMaker::nested(
                        name.clone(),
                        self.context.clone(),
                        self.enclosing.clone(),
                    ))),
                    TypeKind::Abstract => Err(ResolutionError::NotInstantiable {
                        name: name.clone(),
                        reason: match settable {
                            Some(s) => format!("abstract type with no preferred maker for {s}"),
                            None => "abstract type with no preferred maker".to_string(),
                        },
                    }
                    .into()),
                }
            }
        }
    }

    fn scalar_maker(&self, kind: ScalarKind, settable: Option<&Settable>) -> ValueMaker {
        let sequence = self.context.sequence().clone();
        match kind {
            ScalarKind::Text => {
                let config = self.context.config();
                let bounds = settable
                    .and_then(Settable::size_bounds)
                    .unwrap_or((1, config.default_text_length));
                let (member, seed) = match settable {
                    Some(s) => (s.fully_qualified_name(), s.simple_name()),
                    None => ("text".to_string(), "text".to_string()),
                };
                ValueMaker::Text(StringMaker::new(member, seed, bounds, sequence))
            }
            ScalarKind::Bool => ValueMaker::Bool(BooleanMaker::new(sequence)),
            ScalarKind::Date => ValueMaker::Date(DateMaker::new(sequence)),
            numeric => ValueMaker::Number(NumberMaker::new(
                numeric,
                self.context.config().number_start,
                sequence,
            )),
        }
    }
}
