//! The causal store.
//!
//! # Concurrency
//!
//! Each store guards its graph, branch table and cached value with one
//! `RwLock`, so every write is atomic and concurrent writers are serialized
//! in arbitrary order. Subscribers run after the write lock is released and
//! may write back into the store they observe.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use kosmos_diff::three_way;
use kosmos_graph::{CausalEvent, CausalGraph, EventDraft, EventKind, EventMetadata, GraphError};
use kosmos_types::{
    validate_branch_name, BranchId, EventId, HybridLogicalClock, StoreKey, TemporalAnchor,
    UniverseId,
};

use crate::branch::{Branch, MergeOutcome, MergeStrategy};
use crate::error::{StoreError, StoreResult};
use crate::export::HistoryExport;
use crate::query::EventQuery;

/// Callback invoked with every event that moves the active head.
pub type Subscriber<T> = Arc<dyn Fn(&CausalEvent<T>) + Send + Sync>;

/// Handle returned by [`CausalStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Construction options for a store.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    /// Node id stamped into this store's timestamps.
    pub node_id: u16,
    /// Default observer recorded on writes that do not name one.
    pub observer_id: Option<String>,
    /// Metadata attached to the genesis event.
    pub genesis_metadata: EventMetadata,
}

/// Per-write annotations.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    pub observer_id: Option<String>,
    pub metadata: EventMetadata,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer(mut self, observer: impl Into<String>) -> Self {
        self.observer_id = Some(observer.into());
        self
    }

    pub fn metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl From<EventMetadata> for WriteOptions {
    fn from(metadata: EventMetadata) -> Self {
        Self {
            observer_id: None,
            metadata,
        }
    }
}

struct StoreState<T> {
    graph: CausalGraph<T>,
    branches: BTreeMap<BranchId, Branch>,
    active: BranchId,
    head: EventId,
    current: T,
}

impl<T> StoreState<T> {
    fn value_of(&self, id: &EventId) -> StoreResult<&T> {
        self.graph
            .get(id)
            .map(|e| &e.value)
            .ok_or(StoreError::EventNotFound(*id))
    }

    /// Move the active branch to `head`.
    fn advance(&mut self, head: EventId, value: T) {
        self.head = head;
        self.current = value;
        if let Some(branch) = self.branches.get_mut(&self.active) {
            branch.head = head;
        }
    }
}

/// One logical value and its append-only causal history.
///
/// The value returned by [`get`](Self::get) is always the value of the
/// active branch's head event. Every write, branch and merge appends a new
/// event; nothing is ever removed.
pub struct CausalStore<T> {
    key: StoreKey,
    universe_id: UniverseId,
    observer_id: Option<String>,
    clock: HybridLogicalClock,
    state: RwLock<StoreState<T>>,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_subscription: AtomicU64,
    closed: AtomicBool,
}

impl<T> fmt::Debug for CausalStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CausalStore")
            .field("universe_id", &self.universe_id)
            .field("key", &self.key)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T> CausalStore<T> {
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    pub fn universe_id(&self) -> &UniverseId {
        &self.universe_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Closed(self.key.clone()));
        }
        Ok(())
    }
}

impl<T: Clone> CausalStore<T> {
    /// Create a store whose genesis event holds `initial`.
    pub fn new(universe_id: impl Into<UniverseId>, key: impl Into<StoreKey>, initial: T) -> Self {
        Self::with_options(universe_id, key, initial, StoreOptions::default())
    }

    pub fn with_options(
        universe_id: impl Into<UniverseId>,
        key: impl Into<StoreKey>,
        initial: T,
        options: StoreOptions,
    ) -> Self {
        let universe_id = universe_id.into();
        let key = key.into();
        let clock = HybridLogicalClock::new(options.node_id);

        let genesis = EventDraft {
            universe_id: universe_id.clone(),
            store_key: key.clone(),
            seq: 0,
            timestamp: clock.now(),
            kind: EventKind::Create,
            value: initial.clone(),
            caused_by: Vec::new(),
            observer_id: options.observer_id.clone(),
            metadata: options.genesis_metadata,
        }
        .seal();
        let head = genesis.id;
        let main = Branch::main(head, genesis.timestamp);

        let mut graph = CausalGraph::new();
        // A root event cannot be rejected by an empty graph.
        let _ = graph.insert(genesis);

        Self::assemble(
            universe_id,
            key,
            options.observer_id,
            clock,
            StoreState {
                graph,
                branches: BTreeMap::from([(main.id.clone(), main)]),
                active: BranchId::main(),
                head,
                current: initial,
            },
        )
    }

    fn assemble(
        universe_id: UniverseId,
        key: StoreKey,
        observer_id: Option<String>,
        clock: HybridLogicalClock,
        state: StoreState<T>,
    ) -> Self {
        Self {
            key,
            universe_id,
            observer_id,
            clock,
            state: RwLock::new(state),
            subscribers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// The value at the active branch head.
    pub fn get(&self) -> T {
        self.read().current.clone()
    }

    /// The active branch head.
    pub fn head(&self) -> EventId {
        self.read().head
    }

    /// Recompute the current value from the event graph rather than the
    /// cached head value.
    pub fn replay(&self) -> StoreResult<T> {
        let state = self.read();
        state
            .graph
            .ancestors(&state.head, true)
            .last()
            .map(|e| e.value.clone())
            .ok_or(StoreError::EmptyHistory)
    }

    /// Value of the latest event on the active lineage stamped at or before
    /// `at`.
    pub fn at(&self, at: TemporalAnchor) -> Option<T> {
        let state = self.read();
        state
            .graph
            .ancestors(&state.head, true)
            .into_iter()
            .filter(|e| e.timestamp <= at)
            .max_by_key(|e| e.timestamp)
            .map(|e| e.value.clone())
    }

    /// [`at`](Self::at) with millisecond resolution: every event stamped
    /// within `ms` counts.
    pub fn at_millis(&self, ms: u64) -> Option<T> {
        self.at(TemporalAnchor::end_of_millis(ms))
    }

    /// Value recorded by a specific event, on any branch.
    pub fn at_event(&self, id: &EventId) -> Option<T> {
        self.read().graph.get(id).map(|e| e.value.clone())
    }

    /// Events on the active lineage with `start <= timestamp <= end`,
    /// oldest first.
    pub fn between(&self, start: TemporalAnchor, end: TemporalAnchor) -> Vec<CausalEvent<T>> {
        let state = self.read();
        let mut events: Vec<CausalEvent<T>> = state
            .graph
            .ancestors(&state.head, true)
            .into_iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        events
    }

    /// Every event the active head descends from, including the head.
    pub fn lineage(&self) -> Vec<CausalEvent<T>> {
        let state = self.read();
        state
            .graph
            .ancestors(&state.head, true)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Every event in the store, on all branches, parents first.
    pub fn history(&self) -> Vec<CausalEvent<T>> {
        self.read().graph.events().to_vec()
    }

    pub fn event(&self, id: &EventId) -> Option<CausalEvent<T>> {
        self.read().graph.get(id).cloned()
    }

    pub fn event_count(&self) -> usize {
        self.read().graph.len()
    }

    /// Timestamp of the newest event on any branch.
    pub fn last_event_at(&self) -> Option<TemporalAnchor> {
        self.read().graph.events().iter().map(|e| e.timestamp).max()
    }

    /// Events across all branches matching `query`.
    pub fn query(&self, query: &EventQuery) -> Vec<CausalEvent<T>> {
        query.apply(self.read().graph.events())
    }

    /// Every transitive descendant of `id`: what happened because of it.
    pub fn caused_by(&self, id: &EventId) -> Vec<CausalEvent<T>> {
        self.read()
            .graph
            .descendants(id)
            .into_iter()
            .cloned()
            .collect()
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Append `value` on the active branch.
    ///
    /// Writing a value equal to the current one still appends an event.
    pub fn set(&self, value: T) -> StoreResult<EventId> {
        self.set_with(value, WriteOptions::default())
    }

    pub fn set_with(&self, value: T, options: WriteOptions) -> StoreResult<EventId> {
        let event = {
            let mut state = self.write();
            self.ensure_open()?;
            let parent = state.head;
            let event = self.append(
                &mut state,
                EventKind::Update,
                value.clone(),
                vec![parent],
                options,
            )?;
            state.advance(event.id, value);
            event
        };
        debug!(store = %self.key, event = %event.id, seq = event.seq, "store updated");
        self.notify(&event);
        Ok(event.id)
    }

    /// Close the store. Later writes fail with [`StoreError::Closed`] and
    /// all subscriptions are dropped.
    pub fn close(&self) {
        let _state = self.write();
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers_mut().clear();
        debug!(store = %self.key, "store closed");
    }

    // ---------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------

    /// Fork a new branch at the current head. The active branch does not
    /// change.
    pub fn branch(&self, name: &str) -> StoreResult<BranchId> {
        validate_branch_name(name)?;
        let mut state = self.write();
        self.ensure_open()?;
        if state.branches.values().any(|b| b.name == name) {
            return Err(StoreError::DuplicateBranch(name.to_string()));
        }

        let fork_point = state.head;
        let value = state.current.clone();
        let metadata = EventMetadata::empty().with_extra("branch", json!(name));
        let event = self.append(
            &mut state,
            EventKind::Branch,
            value,
            vec![fork_point],
            metadata.into(),
        )?;

        let branch = Branch {
            id: BranchId::generate(),
            name: name.to_string(),
            parent: Some(state.active.clone()),
            fork_point: Some(fork_point),
            head: event.id,
            created_at: event.timestamp,
        };
        let id = branch.id.clone();
        state.branches.insert(id.clone(), branch);
        info!(store = %self.key, branch = %id, name, fork_point = %fork_point, "branch created");
        Ok(id)
    }

    /// Make `id` the branch that `get` reads and `set` extends.
    pub fn switch_branch(&self, id: &BranchId) -> StoreResult<()> {
        let mut state = self.write();
        let head = state
            .branches
            .get(id)
            .map(|b| b.head)
            .ok_or_else(|| StoreError::BranchNotFound(id.clone()))?;
        let value = state.value_of(&head)?.clone();
        state.active = id.clone();
        state.head = head;
        state.current = value;
        debug!(store = %self.key, branch = %id, "switched branch");
        Ok(())
    }

    pub fn active_branch(&self) -> BranchId {
        self.read().active.clone()
    }

    pub fn branches(&self) -> Vec<Branch> {
        self.read().branches.values().cloned().collect()
    }

    pub fn get_branch(&self, id: &BranchId) -> Option<Branch> {
        self.read().branches.get(id).cloned()
    }

    pub fn branch_by_name(&self, name: &str) -> Option<Branch> {
        self.read()
            .branches
            .values()
            .find(|b| b.name == name)
            .cloned()
    }

    // ---------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------

    /// Register a callback for every event that moves the active head
    /// (writes and merges). Callbacks run synchronously on the writing
    /// thread, in registration order.
    pub fn subscribe(
        &self,
        subscriber: impl Fn(&CausalEvent<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers_mut().push((id, Arc::new(subscriber)));
        id
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers_mut();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    // ---------------------------------------------------------------
    // Export / import
    // ---------------------------------------------------------------

    pub fn export_history(&self) -> HistoryExport<T> {
        let state = self.read();
        HistoryExport {
            universe_id: self.universe_id.clone(),
            store_key: self.key.clone(),
            active_branch: state.active.clone(),
            branches: state.branches.values().cloned().collect(),
            events: state.graph.events().to_vec(),
        }
    }

    /// Rebuild a store from an exported history.
    ///
    /// Every event must carry its derived id and name only parents listed
    /// before it. Every branch head must be present.
    pub fn import_history(export: HistoryExport<T>) -> StoreResult<Self> {
        let HistoryExport {
            universe_id,
            store_key,
            active_branch,
            branches,
            events,
        } = export;

        if events.is_empty() {
            return Err(StoreError::EmptyHistory);
        }
        for event in &events {
            if event.store_key != store_key {
                return Err(StoreError::InvalidHistory(format!(
                    "event {} belongs to store {}, not {store_key}",
                    event.id, event.store_key
                )));
            }
            let computed = event.computed_id();
            if computed != event.id {
                return Err(GraphError::IdMismatch {
                    stored: event.id,
                    computed,
                }
                .into());
            }
        }

        let graph = CausalGraph::rebuild(events)?;
        let clock = HybridLogicalClock::new(0);
        if let Some(latest) = graph.events().iter().map(|e| e.timestamp).max() {
            clock.update(&latest);
        }

        let mut table = BTreeMap::new();
        for branch in branches {
            if !graph.contains(&branch.head) {
                return Err(StoreError::InvalidHistory(format!(
                    "branch {} points at unknown event {}",
                    branch.name, branch.head
                )));
            }
            table.insert(branch.id.clone(), branch);
        }
        if table.is_empty() {
            let last = graph.last().ok_or(StoreError::EmptyHistory)?;
            let main = Branch::main(last.id, last.timestamp);
            table.insert(main.id.clone(), main);
        }

        let head = table
            .get(&active_branch)
            .map(|b| b.head)
            .ok_or_else(|| StoreError::BranchNotFound(active_branch.clone()))?;
        let current = graph
            .get(&head)
            .map(|e| e.value.clone())
            .ok_or(StoreError::EventNotFound(head))?;

        info!(store = %store_key, events = graph.len(), branches = table.len(), "imported history");
        Ok(Self::assemble(
            universe_id,
            store_key,
            None,
            clock,
            StoreState {
                graph,
                branches: table,
                active: active_branch,
                head,
                current,
            },
        ))
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    /// Seal and index a new event. The caller holds the write lock, so the
    /// timestamp is never earlier than any indexed parent.
    fn append(
        &self,
        state: &mut StoreState<T>,
        kind: EventKind,
        value: T,
        caused_by: Vec<EventId>,
        options: WriteOptions,
    ) -> StoreResult<CausalEvent<T>> {
        let event = EventDraft {
            universe_id: self.universe_id.clone(),
            store_key: self.key.clone(),
            seq: state.graph.len() as u64,
            timestamp: self.clock.now(),
            kind,
            value,
            caused_by,
            observer_id: options.observer_id.or_else(|| self.observer_id.clone()),
            metadata: options.metadata,
        }
        .seal();
        state.graph.insert(event.clone())?;
        Ok(event)
    }

    fn notify(&self, event: &CausalEvent<T>) {
        let subscribers: Vec<Subscriber<T>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();
        for subscriber in subscribers {
            subscriber(event);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers_mut(&self) -> RwLockWriteGuard<'_, Vec<(SubscriptionId, Subscriber<T>)>> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Serialize + DeserializeOwned> CausalStore<T> {
    /// The current value converted through its JSON form.
    pub fn get_as<U: DeserializeOwned>(&self) -> StoreResult<U> {
        Ok(serde_json::from_value(serde_json::to_value(self.get())?)?)
    }

    /// Join `branch` into the active branch.
    ///
    /// On success a merge event with both heads as parents is appended and
    /// subscribers are notified. A conflicted manual merge appends nothing.
    /// Merging the active branch into itself is a successful no-op.
    pub fn merge(&self, branch: &BranchId, strategy: MergeStrategy) -> StoreResult<MergeOutcome> {
        let event = {
            let mut state = self.write();
            self.ensure_open()?;
            let theirs_head = state
                .branches
                .get(branch)
                .map(|b| b.head)
                .ok_or_else(|| StoreError::BranchNotFound(branch.clone()))?;
            if *branch == state.active {
                return Ok(MergeOutcome::merged(strategy, None));
            }
            let ours_head = state.head;

            let value = match strategy {
                MergeStrategy::Theirs => state.value_of(&theirs_head)?.clone(),
                MergeStrategy::Ours => state.current.clone(),
                MergeStrategy::Manual => {
                    let base = state
                        .graph
                        .common_ancestor(&ours_head, &theirs_head)
                        .map(|e| serde_json::to_value(&e.value))
                        .transpose()?;
                    let ours = serde_json::to_value(&state.current)?;
                    let theirs = serde_json::to_value(state.value_of(&theirs_head)?)?;
                    let result = three_way(base.as_ref(), &ours, &theirs);
                    match result.merged {
                        Some(merged) => serde_json::from_value(merged)?,
                        None => {
                            info!(
                                store = %self.key,
                                branch = %branch,
                                conflicts = result.conflicts.len(),
                                "manual merge conflicted"
                            );
                            return Ok(MergeOutcome::conflicted(result.conflicts));
                        }
                    }
                }
            };

            let metadata = EventMetadata::empty()
                .with_extra("mergedBranch", json!(branch.as_str()))
                .with_extra("strategy", json!(strategy.to_string()));
            let event = self.append(
                &mut state,
                EventKind::Merge,
                value.clone(),
                vec![ours_head, theirs_head],
                metadata.into(),
            )?;
            state.advance(event.id, value);
            event
        };
        info!(store = %self.key, branch = %branch, %strategy, event = %event.id, "branch merged");
        self.notify(&event);
        Ok(MergeOutcome::merged(strategy, Some(event.id)))
    }
}
