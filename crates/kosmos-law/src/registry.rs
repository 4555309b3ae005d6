//! Index from store key to the laws that govern it.

use std::collections::BTreeMap;
use std::sync::Arc;

use kosmos_types::StoreKey;

use crate::law::UniverseLaw;

/// Deduplicating law index.
///
/// Identity is the `Arc` allocation: registering the same law twice for a
/// key is a no-op, while two separately built laws with the same name are
/// both kept.
#[derive(Clone, Debug, Default)]
pub struct LawRegistry {
    laws: BTreeMap<StoreKey, Vec<Arc<UniverseLaw>>>,
}

impl LawRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if this exact law was already registered for `key`.
    pub fn register(&mut self, key: impl Into<StoreKey>, law: Arc<UniverseLaw>) -> bool {
        let laws = self.laws.entry(key.into()).or_default();
        if laws.iter().any(|l| Arc::ptr_eq(l, &law)) {
            return false;
        }
        laws.push(law);
        true
    }

    /// Returns `true` if the law was registered for `key`.
    pub fn unregister(&mut self, key: &str, law: &Arc<UniverseLaw>) -> bool {
        let Some(laws) = self.laws.get_mut(key) else {
            return false;
        };
        let before = laws.len();
        laws.retain(|l| !Arc::ptr_eq(l, law));
        let removed = laws.len() != before;
        if laws.is_empty() {
            self.laws.remove(key);
        }
        removed
    }

    /// Laws registered for `key`, in registration order.
    pub fn laws_for(&self, key: &str) -> &[Arc<UniverseLaw>] {
        self.laws.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &StoreKey> {
        self.laws.keys()
    }

    /// Total number of registrations across all keys.
    pub fn len(&self) -> usize {
        self.laws.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.laws.is_empty()
    }
}
