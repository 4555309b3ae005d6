//! One universe: a set of stores, the substrate that governs them and the
//! auditor that enforces it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use kosmos_auditor::{ConstraintAuditor, ScanReport, TelemetryEntry, TelemetrySink};
use kosmos_graph::EventMetadata;
use kosmos_law::Substrate;
use kosmos_store::{CausalStore, StoreOptions, StoreRegistry};
use kosmos_types::{validate_store_key, validate_universe_id, StoreKey, TemporalAnchor, UniverseId};

use crate::config::{ForkOptions, UniverseConfig, FORKED_FROM_KEY};
use crate::error::{UniverseError, UniverseResult};
use crate::lifecycle::LifecycleState;
use crate::snapshot::{StoreSnapshot, UniverseSnapshot};

/// Metadata source of writes made by [`UniverseManager::restore`].
pub const RESTORE_SOURCE: &str = "snapshot-restore";

/// Summary returned by [`UniverseManager::stats`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseStats {
    pub id: UniverseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub state: LifecycleState,
    pub store_count: usize,
    /// Sum of every store's event count.
    pub event_count: usize,
    pub created_at: TemporalAnchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<TemporalAnchor>,
    /// Milliseconds since the universe was created.
    pub uptime_ms: u64,
}

/// Owns the stores of one universe and drives its lifecycle.
///
/// Stores are writable in every state but `Destroyed`. Mutations are only
/// audited while the universe is running; violations written while paused
/// stay in place until [`resume`](Self::resume) scans them.
pub struct UniverseManager {
    config: UniverseConfig,
    substrate: Arc<Substrate>,
    registry: StoreRegistry<Value>,
    auditor: ConstraintAuditor,
    sink: Option<TelemetrySink>,
    state: Mutex<LifecycleState>,
    created_at: TemporalAnchor,
}

impl std::fmt::Debug for UniverseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniverseManager")
            .field("id", &self.config.id)
            .field("state", &self.state())
            .field("stores", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl UniverseManager {
    pub fn new(config: UniverseConfig, substrate: Arc<Substrate>) -> UniverseResult<Self> {
        validate_universe_id(config.id.as_str())?;
        let registry = StoreRegistry::new();
        let auditor = ConstraintAuditor::new(
            config.id.clone(),
            Arc::clone(&substrate),
            registry.clone(),
            config.auditor.clone(),
        );
        debug!(universe = %config.id, substrate = substrate.id(), "universe created");
        Ok(Self {
            created_at: TemporalAnchor::now(config.node_id),
            config,
            substrate,
            registry,
            auditor,
            sink: None,
            state: Mutex::new(LifecycleState::Initializing),
        })
    }

    /// Forward the auditor's telemetry to `sink`. Forks inherit it.
    pub fn with_telemetry_sink(mut self, sink: TelemetrySink) -> Self {
        self.auditor.set_sink(Some(Arc::clone(&sink)));
        self.sink = Some(sink);
        self
    }

    pub fn id(&self) -> &UniverseId {
        &self.config.id
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    pub fn substrate(&self) -> &Arc<Substrate> {
        &self.substrate
    }

    pub fn auditor(&self) -> &ConstraintAuditor {
        &self.auditor
    }

    pub fn state(&self) -> LifecycleState {
        *self.lock_state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_alive(&self) -> UniverseResult<()> {
        if self.state().is_terminal() {
            return Err(UniverseError::UniverseDestroyed(self.config.id.clone()));
        }
        Ok(())
    }

    /// Move to `next`. Returns `false` if already there.
    fn transition(&self, next: LifecycleState) -> UniverseResult<bool> {
        let mut state = self.lock_state();
        let current = *state;
        if current.is_terminal() {
            return Err(UniverseError::UniverseDestroyed(self.config.id.clone()));
        }
        if current == next {
            return Ok(false);
        }
        if !current.can_transition_to(next) {
            return Err(UniverseError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        *state = next;
        info!(universe = %self.config.id, from = %current, to = %next, "universe lifecycle");
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Stores
    // ---------------------------------------------------------------

    /// Create a store whose genesis value is `initial`.
    ///
    /// The store is audited immediately if the universe is running.
    pub fn create_store(
        &self,
        key: impl Into<StoreKey>,
        initial: Value,
    ) -> UniverseResult<Arc<CausalStore<Value>>> {
        self.create_store_with(key, initial, EventMetadata::empty())
    }

    fn create_store_with(
        &self,
        key: impl Into<StoreKey>,
        initial: Value,
        genesis_metadata: EventMetadata,
    ) -> UniverseResult<Arc<CausalStore<Value>>> {
        self.ensure_alive()?;
        let key = key.into();
        validate_store_key(key.as_str())?;

        let store = Arc::new(CausalStore::with_options(
            self.config.id.clone(),
            key.clone(),
            initial,
            StoreOptions {
                node_id: self.config.node_id,
                genesis_metadata,
                ..StoreOptions::default()
            },
        ));
        if !self.registry.insert(Arc::clone(&store)) {
            return Err(UniverseError::DuplicateStoreKey(key));
        }
        if self.is_running() {
            self.auditor.watch(&store);
        }
        debug!(universe = %self.config.id, store = %key, "store created");
        Ok(store)
    }

    pub fn get_store(&self, key: &str) -> Option<Arc<CausalStore<Value>>> {
        self.registry.get(key)
    }

    /// Like [`get_store`](Self::get_store) but fails with `StoreNotFound`.
    pub fn store(&self, key: &str) -> UniverseResult<Arc<CausalStore<Value>>> {
        self.registry
            .get(key)
            .ok_or_else(|| UniverseError::StoreNotFound(StoreKey::from(key)))
    }

    pub fn has_store(&self, key: &str) -> bool {
        self.registry.contains(key)
    }

    /// Unregister a store. Handles held elsewhere stay usable but are no
    /// longer audited. Returns `true` if the store existed.
    pub fn remove_store(&self, key: &str) -> bool {
        self.auditor.unwatch(key);
        let removed = self.registry.remove(key).is_some();
        if removed {
            debug!(universe = %self.config.id, store = key, "store removed");
        }
        removed
    }

    pub fn store_keys(&self) -> Vec<StoreKey> {
        self.registry.keys()
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Begin auditing. A no-op while already running.
    pub fn start(&self) -> UniverseResult<()> {
        if self.transition(LifecycleState::Running)? {
            self.auditor.start()?;
        }
        Ok(())
    }

    /// Stop auditing. Stores remain writable and unaudited.
    pub fn pause(&self) -> UniverseResult<()> {
        if self.transition(LifecycleState::Paused)? {
            self.auditor.stop();
        }
        Ok(())
    }

    /// Resume auditing and scan once to repair drift left by the pause.
    ///
    /// Returns `None` if the universe was already running. A universe that
    /// was never started must be started with [`start`](Self::start).
    pub async fn resume(&self) -> UniverseResult<Option<ScanReport>> {
        let current = self.state();
        if current == LifecycleState::Initializing {
            return Err(UniverseError::InvalidTransition {
                from: current,
                to: LifecycleState::Running,
            });
        }
        if !self.transition(LifecycleState::Running)? {
            return Ok(None);
        }
        self.auditor.start()?;
        let report = self.auditor.scan().await?;
        Ok(Some(report))
    }

    /// Audit every store once.
    pub async fn scan(&self) -> UniverseResult<ScanReport> {
        self.ensure_alive()?;
        Ok(self.auditor.scan().await?)
    }

    /// Shut the auditor down, close every store and drop them.
    ///
    /// Writes through handles held elsewhere fail afterwards.
    pub fn destroy(&self) -> UniverseResult<()> {
        self.transition(LifecycleState::Destroyed)?;
        self.auditor.shutdown();
        let stores = self.registry.clear();
        for store in &stores {
            store.close();
        }
        info!(universe = %self.config.id, stores = stores.len(), "universe destroyed");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------

    pub fn snapshot(&self) -> UniverseSnapshot {
        self.snapshot_with_metadata(BTreeMap::new())
    }

    pub fn snapshot_with_metadata(&self, metadata: BTreeMap<String, Value>) -> UniverseSnapshot {
        let stores = self
            .registry
            .stores()
            .into_iter()
            .map(|store| {
                (
                    store.key().clone(),
                    StoreSnapshot {
                        value: store.get(),
                        head: store.head(),
                        event_count: store.event_count(),
                        last_event_at: store.last_event_at(),
                    },
                )
            })
            .collect();
        UniverseSnapshot {
            universe_id: self.config.id.clone(),
            name: self.config.name.clone(),
            taken_at: TemporalAnchor::now(self.config.node_id),
            state: self.state(),
            stores,
            metadata,
        }
    }

    /// Write every snapshotted value back into the store of the same key.
    ///
    /// Each restore is a new event; history is not rewound. Keys with no
    /// matching store are skipped. Returns the number of stores written.
    pub fn restore(&self, snapshot: &UniverseSnapshot) -> UniverseResult<usize> {
        self.ensure_alive()?;
        if snapshot.universe_id != self.config.id {
            return Err(UniverseError::UniverseMismatch {
                expected: self.config.id.clone(),
                found: snapshot.universe_id.clone(),
            });
        }
        let mut restored = 0;
        for (key, entry) in &snapshot.stores {
            let Some(store) = self.registry.get(key.as_str()) else {
                warn!(universe = %self.config.id, store = %key, "snapshot store no longer exists");
                continue;
            };
            store.set_with(
                entry.value.clone(),
                EventMetadata::from_source(RESTORE_SOURCE).into(),
            )?;
            restored += 1;
        }
        info!(universe = %self.config.id, restored, "snapshot restored");
        Ok(restored)
    }

    // ---------------------------------------------------------------
    // Forking
    // ---------------------------------------------------------------

    /// A new universe whose stores start from copies of this one's current
    /// values. The fork has fresh histories and is started if this
    /// universe is running.
    pub fn fork(
        &self,
        new_id: impl Into<UniverseId>,
        options: ForkOptions,
    ) -> UniverseResult<UniverseManager> {
        self.ensure_alive()?;
        let new_id = new_id.into();

        let mut config = self.config.clone();
        config.id = new_id.clone();
        if let Some(name) = options.name {
            config.name = Some(name);
        }
        if let Some(auditor) = options.auditor {
            config.auditor = auditor;
        }
        config.metadata.extend(options.metadata);
        config.metadata.insert(
            FORKED_FROM_KEY.to_string(),
            Value::String(self.config.id.to_string()),
        );
        let substrate = options
            .substrate
            .unwrap_or_else(|| Arc::clone(&self.substrate));

        let mut fork = UniverseManager::new(config, substrate)?;
        if let Some(sink) = &self.sink {
            fork = fork.with_telemetry_sink(Arc::clone(sink));
        }
        let genesis = EventMetadata::empty()
            .with_extra(FORKED_FROM_KEY, Value::String(self.config.id.to_string()));
        for (key, value) in self.registry.values() {
            fork.create_store_with(key, value, genesis.clone())?;
        }
        if self.is_running() {
            fork.start()?;
        }
        info!(from = %self.config.id, to = %new_id, stores = fork.registry.len(), "universe forked");
        Ok(fork)
    }

    /// Fork under the id `{id}-{suffix}`, with `clone` as the default suffix.
    pub fn clone_universe(&self, suffix: Option<&str>) -> UniverseResult<UniverseManager> {
        self.fork(
            self.config.id.derived(suffix.unwrap_or("clone")),
            ForkOptions::default(),
        )
    }

    // ---------------------------------------------------------------
    // Info
    // ---------------------------------------------------------------

    pub fn stats(&self) -> UniverseStats {
        let stores = self.registry.stores();
        let now = TemporalAnchor::now(self.config.node_id);
        UniverseStats {
            id: self.config.id.clone(),
            name: self.config.name.clone(),
            state: self.state(),
            store_count: stores.len(),
            event_count: stores.iter().map(|s| s.event_count()).sum(),
            created_at: self.created_at,
            last_event_at: stores.iter().filter_map(|s| s.last_event_at()).max(),
            uptime_ms: now.millis_since(&self.created_at),
        }
    }

    pub fn telemetry(&self) -> Vec<TelemetryEntry> {
        self.auditor.telemetry()
    }
}
