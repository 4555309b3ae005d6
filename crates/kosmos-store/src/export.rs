//! Serializable form of a store's full history.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use kosmos_graph::CausalEvent;
use kosmos_types::{BranchId, StoreKey, UniverseId};

use crate::branch::Branch;
use crate::error::StoreResult;

/// Everything needed to rebuild a [`CausalStore`](crate::CausalStore):
/// the event list in causal (parents-first) order plus the branch table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryExport<T> {
    pub universe_id: UniverseId,
    pub store_key: StoreKey,
    pub active_branch: BranchId,
    pub branches: Vec<Branch>,
    pub events: Vec<CausalEvent<T>>,
}

impl<T: Serialize> HistoryExport<T> {
    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<T: DeserializeOwned> HistoryExport<T> {
    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
