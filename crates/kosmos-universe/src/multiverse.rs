use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use kosmos_types::UniverseId;

use crate::error::{UniverseError, UniverseResult};
use crate::lifecycle::LifecycleState;
use crate::manager::UniverseManager;

/// Result of applying one lifecycle call to every universe.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<UniverseId>,
    pub failed: Vec<(UniverseId, UniverseError)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, id: UniverseId, result: UniverseResult<()>) {
        match result {
            Ok(()) => self.succeeded.push(id),
            Err(err) => {
                warn!(universe = %id, error = %err, "lifecycle call failed");
                self.failed.push((id, err));
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiverseStats {
    pub universe_count: usize,
    pub total_stores: usize,
    pub total_events: usize,
    pub by_state: BTreeMap<LifecycleState, usize>,
}

/// Flat registry of universes keyed by id.
#[derive(Debug, Default)]
pub struct Multiverse {
    universes: RwLock<BTreeMap<UniverseId, Arc<UniverseManager>>>,
}

impl Multiverse {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<UniverseId, Arc<UniverseManager>>> {
        self.universes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<UniverseId, Arc<UniverseManager>>> {
        self.universes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn members(&self) -> Vec<Arc<UniverseManager>> {
        self.read().values().cloned().collect()
    }

    /// Register a universe. Fails if its id is already taken.
    pub fn add(&self, universe: UniverseManager) -> UniverseResult<Arc<UniverseManager>> {
        let mut universes = self.write();
        if universes.contains_key(universe.id()) {
            return Err(UniverseError::DuplicateUniverse(universe.id().clone()));
        }
        let universe = Arc::new(universe);
        universes.insert(universe.id().clone(), Arc::clone(&universe));
        info!(universe = %universe.id(), "universe added to multiverse");
        Ok(universe)
    }

    pub fn get(&self, id: &str) -> Option<Arc<UniverseManager>> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Destroy a universe and drop it from the registry.
    pub fn remove(&self, id: &str) -> UniverseResult<Arc<UniverseManager>> {
        let universe = self
            .write()
            .remove(id)
            .ok_or_else(|| UniverseError::UniverseNotFound(UniverseId::from(id)))?;
        match universe.destroy() {
            Ok(()) | Err(UniverseError::UniverseDestroyed(_)) => {}
            Err(err) => return Err(err),
        }
        Ok(universe)
    }

    pub fn ids(&self) -> Vec<UniverseId> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn pause_all(&self) -> BatchReport {
        let mut report = BatchReport::default();
        for universe in self.members() {
            report.record(universe.id().clone(), universe.pause());
        }
        report
    }

    /// Resume every universe, one after another, each with its catch-up scan.
    pub async fn resume_all(&self) -> BatchReport {
        let mut report = BatchReport::default();
        for universe in self.members() {
            let result = universe.resume().await.map(|_| ());
            report.record(universe.id().clone(), result);
        }
        report
    }

    /// Destroy every universe. Destroyed universes stay registered.
    pub fn destroy_all(&self) -> BatchReport {
        let mut report = BatchReport::default();
        for universe in self.members() {
            report.record(universe.id().clone(), universe.destroy());
        }
        report
    }

    pub fn stats(&self) -> MultiverseStats {
        let mut stats = MultiverseStats::default();
        for universe in self.members() {
            let u = universe.stats();
            stats.universe_count += 1;
            stats.total_stores += u.store_count;
            stats.total_events += u.event_count;
            *stats.by_state.entry(u.state).or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UniverseConfig;
    use kosmos_law::Substrate;
    use serde_json::json;

    fn universe(id: &str) -> UniverseManager {
        UniverseManager::new(UniverseConfig::new(id), Arc::new(Substrate::empty("s"))).unwrap()
    }

    #[test]
    fn add_rejects_duplicate_ids() {
        let m = Multiverse::new();
        m.add(universe("a")).unwrap();
        assert!(matches!(m.add(universe("a")), Err(UniverseError::DuplicateUniverse(_))));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn remove_destroys() {
        let m = Multiverse::new();
        let a = m.add(universe("a")).unwrap();
        let removed = m.remove("a").unwrap();
        assert!(Arc::ptr_eq(&a, &removed));
        assert_eq!(a.state(), LifecycleState::Destroyed);
        assert!(!m.contains("a"));
        assert!(matches!(m.remove("a"), Err(UniverseError::UniverseNotFound(_))));
    }

    #[test]
    fn pause_all_is_independent() {
        let m = Multiverse::new();
        m.add(universe("idle")).unwrap();
        let running = m.add(universe("running")).unwrap();
        running.start().unwrap();

        let report = m.pause_all();
        assert_eq!(report.succeeded, vec![UniverseId::from("running")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.as_str(), "idle");
        assert_eq!(running.state(), LifecycleState::Paused);
    }

    #[tokio::test]
    async fn resume_all_after_pause_all() {
        let m = Multiverse::new();
        for id in ["a", "b"] {
            m.add(universe(id)).unwrap().start().unwrap();
        }
        assert!(m.pause_all().is_complete());
        let report = m.resume_all().await;
        assert!(report.is_complete());
        assert!(m.ids().iter().all(|id| m.get(id.as_str()).unwrap().is_running()));
    }

    #[test]
    fn stats_aggregate_members() {
        let m = Multiverse::new();
        let a = m.add(universe("a")).unwrap();
        a.create_store("x", json!(1)).unwrap().set(json!(2)).unwrap();
        a.start().unwrap();
        let b = m.add(universe("b")).unwrap();
        b.create_store("y", json!(1)).unwrap();

        let stats = m.stats();
        assert_eq!(stats.universe_count, 2);
        assert_eq!(stats.total_stores, 2);
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.by_state[&LifecycleState::Running], 1);
        assert_eq!(stats.by_state[&LifecycleState::Initializing], 1);

        assert!(m.destroy_all().is_complete());
        assert_eq!(m.stats().by_state[&LifecycleState::Destroyed], 2);
        assert!(!m.destroy_all().is_complete());
    }
}
