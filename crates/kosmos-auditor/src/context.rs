//! [`LawContext`] over a universe's store registry.

use serde_json::Value;

use kosmos_graph::EventMetadata;
use kosmos_law::{LawContext, LawError, LawResult};
use kosmos_store::StoreRegistry;
use kosmos_types::StoreKey;

/// Reactions read and write the live stores of one universe. Each write
/// is a causal event in the target store.
#[derive(Clone, Debug)]
pub struct RegistryContext {
    registry: StoreRegistry<Value>,
}

impl RegistryContext {
    pub fn new(registry: StoreRegistry<Value>) -> Self {
        Self { registry }
    }
}

impl LawContext for RegistryContext {
    fn get_state(&self, key: &str) -> Option<Value> {
        self.registry.get(key).map(|store| store.get())
    }

    fn set_state(&self, key: &str, value: Value, metadata: EventMetadata) -> LawResult<()> {
        let store = self
            .registry
            .get(key)
            .ok_or_else(|| LawError::StoreNotFound(StoreKey::from(key)))?;
        store
            .set_with(value, metadata.into())
            .map(|_| ())
            .map_err(|e| LawError::Store(e.to_string()))
    }

    fn store_keys(&self) -> Vec<StoreKey> {
        self.registry.keys()
    }
}
