use crate::config::MakerConfig;
use crate::context::MakeContext;
use crate::entity_maker::EntityMaker;
use crate::holder::BeanValueHolder;
use crate::maker::Maker;
use crate::registry::{NamePattern, PreferredValueMakers};
use fixturegraph_schema::{Bean, Schema, TypeName, TypeRef};
use std::sync::Arc;

/// Programmatic configuration of an [`EntityMaker`].
///
/// ```ignore
/// let maker = EntityMakerBuilder::new(schema)
///     .always_new("Child")
///     .add_field_or_property_maker("Parent", "name", FixedValueMaker::text("Ada"))
///     .build();
/// ```
#[derive(Debug)]
pub struct EntityMakerBuilder {
    schema: Arc<Schema>,
    config: MakerConfig,
    holder: BeanValueHolder,
    preferred: PreferredValueMakers,
}

impl EntityMakerBuilder {
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        Self {
            schema: schema.into(),
            config: MakerConfig::default(),
            holder: BeanValueHolder::new(),
            preferred: PreferredValueMakers::new(),
        }
    }

    pub fn config(mut self, config: MakerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn always_new(mut self, type_name: impl Into<TypeName>) -> Self {
        self.config.always_new_types.insert(type_name.into());
        self
    }

    /// Seeds the cache so `bean` is reused instead of synthesized.
    pub fn reuse_entity(self, bean: &Bean) -> Self {
        self.holder
            .put(TypeRef::named(bean.type_name()), bean.clone());
        self
    }

    pub fn reuse_entities<'a>(mut self, beans: impl IntoIterator<Item = &'a Bean>) -> Self {
        for bean in beans {
            self = self.reuse_entity(bean);
        }
        self
    }

    pub fn reuse_entities_from(self, holder: &BeanValueHolder) -> Self {
        for (ty, bean) in holder.entries() {
            self.holder.put(ty, bean);
        }
        self
    }

    /// Shares `holder` as the live cache, so several makers see one canonical
    /// instance per type.
    pub fn with_bean_value_holder(mut self, holder: BeanValueHolder) -> Self {
        self.holder = holder;
        self
    }

    pub fn with_preferred_value_makers(mut self, preferred: PreferredValueMakers) -> Self {
        self.preferred = preferred;
        self
    }

    pub fn add_field_or_property_maker(
        self,
        owner: &str,
        member: &str,
        maker: impl Maker + 'static,
    ) -> Self {
        self.preferred
            .add_field_or_property_maker(owner, member, maker);
        self
    }

    pub fn add_constructor_parameter_maker(
        self,
        owner: &str,
        index: usize,
        maker: impl Maker + 'static,
    ) -> Self {
        self.preferred
            .add_constructor_parameter_maker(owner, index, maker);
        self
    }

    pub fn add_preferred_maker(self, pattern: NamePattern, maker: impl Maker + 'static) -> Self {
        self.preferred.add(pattern, maker);
        self
    }

    pub fn build(self) -> EntityMaker {
        let context =
            MakeContext::new(self.schema, self.holder, self.preferred).with_config(self.config);
        EntityMaker::new(context)
    }
}
