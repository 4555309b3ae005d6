//! Shared, keyed collection of causal stores.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use kosmos_types::StoreKey;

use crate::store::CausalStore;

/// A cloneable handle to a map of stores.
///
/// Clones share the same map. A universe and its auditor each hold one, so
/// stores created after the auditor started are still visible to it.
pub struct StoreRegistry<T> {
    stores: Arc<RwLock<BTreeMap<StoreKey, Arc<CausalStore<T>>>>>,
}

impl<T> Clone for StoreRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            stores: Arc::clone(&self.stores),
        }
    }
}

impl<T> Default for StoreRegistry<T> {
    fn default() -> Self {
        Self {
            stores: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<T> fmt::Debug for StoreRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl<T> StoreRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under its own key.
    ///
    /// Returns `false` and leaves the registry unchanged if the key is taken.
    pub fn insert(&self, store: Arc<CausalStore<T>>) -> bool {
        let mut stores = self.write();
        if stores.contains_key(store.key()) {
            return false;
        }
        stores.insert(store.key().clone(), store);
        true
    }

    pub fn get(&self, key: &str) -> Option<Arc<CausalStore<T>>> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<CausalStore<T>>> {
        self.write().remove(key)
    }

    /// Store keys in sorted order.
    pub fn keys(&self) -> Vec<StoreKey> {
        self.read().keys().cloned().collect()
    }

    pub fn stores(&self) -> Vec<Arc<CausalStore<T>>> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every store, returning them.
    pub fn clear(&self) -> Vec<Arc<CausalStore<T>>> {
        std::mem::take(&mut *self.write()).into_values().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<StoreKey, Arc<CausalStore<T>>>> {
        self.stores.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<StoreKey, Arc<CausalStore<T>>>> {
        self.stores.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> StoreRegistry<T> {
    /// Current value of every store, keyed by store key.
    pub fn values(&self) -> BTreeMap<String, T> {
        self.read()
            .iter()
            .map(|(key, store)| (key.to_string(), store.get()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(key: &str, value: i32) -> Arc<CausalStore<i32>> {
        Arc::new(CausalStore::new("u", key, value))
    }

    #[test]
    fn insert_rejects_duplicate_keys() {
        let registry = StoreRegistry::new();
        assert!(registry.insert(store("a", 1)));
        assert!(!registry.insert(store("a", 2)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").map(|s| s.get()), Some(1));
    }

    #[test]
    fn clones_share_the_map() {
        let registry = StoreRegistry::new();
        let other = registry.clone();
        registry.insert(store("a", 1));
        assert!(other.contains("a"));
        other.remove("a");
        assert!(registry.is_empty());
    }

    #[test]
    fn keys_are_sorted_and_values_are_current() {
        let registry = StoreRegistry::new();
        registry.insert(store("b", 2));
        registry.insert(store("a", 1));
        registry.get("b").unwrap().set(20).unwrap();
        assert_eq!(
            registry.keys(),
            vec![StoreKey::from("a"), StoreKey::from("b")]
        );
        let values = registry.values();
        assert_eq!(values["a"], 1);
        assert_eq!(values["b"], 20);
    }

    fn open_keys<T>(registry: &StoreRegistry<T>) -> Vec<String> {
        registry
            .stores()
            .iter()
            .filter(|s| !s.is_closed())
            .map(|s| format!("{}/{}", s.universe_id(), s.key()))
            .collect()
    }

    #[test]
    fn accessors_need_no_value_bounds() {
        let registry = StoreRegistry::new();
        registry.insert(store("a", 1));
        registry.insert(store("b", 2));
        registry.get("b").unwrap().close();

        assert_eq!(open_keys(&registry), vec!["u/a".to_string()]);
        let debug = format!("{registry:?}");
        assert!(debug.contains("\"a\"") && debug.contains("\"b\""), "{debug}");
        let store_debug = format!("{:?}", registry.get("b").unwrap());
        assert!(store_debug.contains("closed: true"), "{store_debug}");
    }

    #[test]
    fn clear_returns_all_stores() {
        let registry = StoreRegistry::new();
        registry.insert(store("a", 1));
        registry.insert(store("b", 2));
        assert_eq!(registry.clear().len(), 2);
        assert!(registry.is_empty());
    }
}
