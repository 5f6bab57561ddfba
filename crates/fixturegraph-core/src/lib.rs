//! fixturegraph core engine
//!
//! Builds persistable fixture graphs for a requested root type:
//! - [`EntityClassScanner`]: required-reference closure, dependencies first
//! - [`ValueMakerFactory`] / [`Maker`]: per-member value synthesis
//! - [`BeanValueHolder`]: one canonical instance per type
//! - [`EntityMaker`]: reuse policy, inverse back-fill, ordered persistence
//!
//! ```ignore
//! let schema = Schema::load(Path::new("schema.json"))?;
//! let maker = EntityMakerBuilder::new(schema).build();
//! let child = maker.make_and_persist(&mut store, "Child")?;
//! ```

pub mod builder;
pub mod callback;
pub mod config;
pub mod context;
pub mod entity_maker;
pub mod error;
pub mod factory;
pub mod holder;
pub mod maker;
pub mod persistence;
pub mod registry;
pub mod scanner;

pub use builder::EntityMakerBuilder;
pub use callback::{Callback, NoOpCallback, TakeCopyCallback, WireManyToManyCallback};
pub use config::MakerConfig;
pub use context::{MakeContext, ValueSequence};
pub use entity_maker::{find_entity, EntityMaker};
pub use error::{MakeError, MakeResult, PersistenceError, ResolutionError, SynthesisError};
pub use factory::ValueMakerFactory;
pub use holder::BeanValueHolder;
pub use maker::{
    BeanMaker, FixedValueMaker, Maker, NullMaker, PreferredMaker, ReuseOrNullMaker,
    SequenceMaker, ValueMaker,
};
pub use persistence::PersistenceContext;
pub use registry::{NamePattern, PreferredValueMakers};
pub use scanner::{ContainingAccessor, ContainingShape, EntityClass, EntityClassScanner};

#[cfg(test)]
mod tests;
