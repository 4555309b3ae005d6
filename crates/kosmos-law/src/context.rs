//! The view of sibling stores handed to law reactions.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use kosmos_graph::EventMetadata;
use kosmos_types::StoreKey;

use crate::error::{LawError, LawResult};

/// Read and write access to the stores of one universe.
///
/// Implementations decide how a write is recorded. The auditor's context
/// writes through the universe's store registry, so every reaction becomes
/// a causal event in the target store.
pub trait LawContext: Send + Sync {
    /// Current value of `key`, or `None` if no such store exists.
    fn get_state(&self, key: &str) -> Option<Value>;

    /// Write `value` into `key`, annotated with `metadata`.
    fn set_state(&self, key: &str, value: Value, metadata: EventMetadata) -> LawResult<()>;

    fn store_keys(&self) -> Vec<StoreKey>;
}

/// An in-memory [`LawContext`] over a plain map of values.
///
/// Useful for executing laws outside a universe. Writes are recorded so
/// they can be inspected afterwards.
#[derive(Debug, Default)]
pub struct MapContext {
    states: Mutex<BTreeMap<StoreKey, Value>>,
    writes: Mutex<Vec<(StoreKey, Value, EventMetadata)>>,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a store value.
    pub fn with_state(self, key: impl Into<StoreKey>, value: Value) -> Self {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
        self
    }

    /// Every `set_state` call so far, in order.
    pub fn writes(&self) -> Vec<(StoreKey, Value, EventMetadata)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LawContext for MapContext {
    fn get_state(&self, key: &str) -> Option<Value> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_state(&self, key: &str, value: Value, metadata: EventMetadata) -> LawResult<()> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = states.get_mut(key) else {
            return Err(LawError::StoreNotFound(StoreKey::from(key)));
        };
        *slot = value.clone();
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((StoreKey::from(key), value, metadata));
        Ok(())
    }

    fn store_keys(&self) -> Vec<StoreKey> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
