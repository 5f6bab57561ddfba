use super::Maker;
use crate::context::MakeContext;
use crate::error::{MakeResult, ResolutionError, SynthesisError};
use crate::factory::ValueMakerFactory;
use fixturegraph_schema::{Bean, Settable, TypeName, TypeRef, Value};
use std::collections::HashSet;

/// Synthesizes a fresh record: constructor parameters first, then every
/// remaining property. Null values never overwrite a member.
#[derive(Debug, Clone)]
pub struct BeanMaker {
    ty: TypeName,
    context: MakeContext,
    enclosing: Vec<TypeName>,
}

impl BeanMaker {
    pub fn new(ty: impl Into<TypeName>, context: MakeContext) -> Self {
        Self::nested(ty.into(), context, Vec::new())
    }

    pub(crate) fn nested(ty: TypeName, context: MakeContext, enclosing: Vec<TypeName>) -> Self {
        Self {
            ty,
            context,
            enclosing,
        }
    }

    pub fn make(&self) -> MakeResult<Bean> {
        let schema = self.context.schema().clone();
        let descriptor = schema
            .get(&self.ty)
            .ok_or_else(|| ResolutionError::UnknownType(self.ty.clone()))?;
        if !descriptor.is_instantiable() {
            return Err(ResolutionError::NotInstantiable {
                name: self.ty.clone(),
                reason: format!("{:?} types have no usable constructor", descriptor.kind),
            }
            .into());
        }

        let mut path = self.enclosing.clone();
        path.push(self.ty.clone());
        // top-level records have no enclosing path; embeddables nest below them
        if self.enclosing.contains(&self.ty)
            || self.enclosing.len() > self.context.config().max_embedding_depth
        {
            return Err(SynthesisError::RecursiveEmbedding { path }.into());
        }
        let factory = ValueMakerFactory::new(self.context.clone()).within(path);

        let bean = Bean::new(
            descriptor.name.clone(),
            descriptor.id_member().map(|m| m.name.clone()),
        );

        let mut bound: HashSet<&str> = HashSet::new();
        for param in &descriptor.constructor {
            let settable = Settable::parameter(&descriptor.name, param);
            let value = factory.from_settable(&settable)?.value()?;
            bound.insert(param.binds.as_str());
            if !value.is_null() {
                bean.set(param.binds.clone(), value);
            }
        }

        for member in &descriptor.members {
            if bound.contains(member.name.as_str()) {
                continue;
            }
            if member.starts_empty {
                let empty = match member.ty {
                    TypeRef::Map { .. } => Value::Map(Vec::new()),
                    _ => Value::List(Vec::new()),
                };
                bean.set(member.name.clone(), empty);
            }
            if member.is_managed() {
                continue;
            }

            let settable = Settable::property(&descriptor.name, member);
            let value = factory.from_settable(&settable)?.value()?;
            if !value.is_null() {
                bean.set(member.name.clone(), value);
            }
        }

        tracing::trace!(type_name = %self.ty, "synthesized bean");
        Ok(bean)
    }
}

impl Maker for BeanMaker {
    fn value(&self) -> MakeResult<Value> {
        self.make().map(Value::Bean)
    }
}
