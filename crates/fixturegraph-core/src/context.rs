use crate::config::MakerConfig;
use crate::holder::BeanValueHolder;
use crate::registry::PreferredValueMakers;
use fixturegraph_schema::Schema;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Named counters backing the deterministic scalar makers.
#[derive(Debug, Default)]
pub struct ValueSequence {
    counters: Mutex<HashMap<String, u64>>,
}

impl ValueSequence {
    /// Returns the current value of `key` and advances it (starts at 0).
    pub fn next(&self, key: &str) -> u64 {
        let mut counters = self.counters.lock();
        let counter = counters.entry(key.to_string()).or_insert(0);
        let current = *counter;
        *counter += 1;
        current
    }
}

/// Everything one resolution run reads or writes besides its arguments.
///
/// Cloning is cheap and shares the cache, registry and sequence.
#[derive(Debug, Clone)]
pub struct MakeContext {
    schema: Arc<Schema>,
    holder: BeanValueHolder,
    preferred: PreferredValueMakers,
    config: Arc<MakerConfig>,
    sequence: Arc<ValueSequence>,
}

impl MakeContext {
    pub fn new(
        schema: Arc<Schema>,
        holder: BeanValueHolder,
        preferred: PreferredValueMakers,
    ) -> Self {
        Self {
            schema,
            holder,
            preferred,
            config: Arc::new(MakerConfig::default()),
            sequence: Arc::new(ValueSequence::default()),
        }
    }

    pub fn with_config(mut self, config: MakerConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn bean_value_holder(&self) -> &BeanValueHolder {
        &self.holder
    }

    pub fn preferred_value_makers(&self) -> &PreferredValueMakers {
        &self.preferred
    }

    pub fn config(&self) -> &Arc<MakerConfig> {
        &self.config
    }

    pub fn sequence(&self) -> &Arc<ValueSequence> {
        &self.sequence
    }

    /// Schema flag or config override.
    pub fn requires_new_instance(&self, type_name: &str) -> bool {
        self.config.always_new_types.contains(type_name)
            || self
                .schema
                .get(type_name)
                .map(|d| d.require_new_instance)
                .unwrap_or(false)
    }
}
