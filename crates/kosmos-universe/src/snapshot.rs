use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kosmos_types::{EventId, StoreKey, TemporalAnchor, UniverseId};

use crate::error::UniverseResult;
use crate::lifecycle::LifecycleState;

/// Current value of one store at snapshot time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub value: Value,
    pub head: EventId,
    pub event_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<TemporalAnchor>,
}

/// Point-in-time values of every store in a universe.
///
/// Plain data with no live references; histories are not included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    pub universe_id: UniverseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub taken_at: TemporalAnchor,
    pub state: LifecycleState,
    pub stores: BTreeMap<StoreKey, StoreSnapshot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl UniverseSnapshot {
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Sum of the stores' event counts.
    pub fn event_count(&self) -> usize {
        self.stores.values().map(|s| s.event_count).sum()
    }

    /// Timestamp of the newest event in any store.
    pub fn last_event_at(&self) -> Option<TemporalAnchor> {
        self.stores.values().filter_map(|s| s.last_event_at).max()
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.stores.get(key).map(|s| &s.value)
    }

    pub fn to_json(&self) -> UniverseResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> UniverseResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
