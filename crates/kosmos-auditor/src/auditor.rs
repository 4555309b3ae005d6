//! The audit loop.
//!
//! # Re-entrancy
//!
//! Repairs and reactions are themselves store writes, which notify the
//! auditor again from inside the current cycle. A store (or the global
//! pseudo-store) that is already being audited is never audited twice at
//! once. Instead the notification is folded into the running audit:
//!
//! - a notification from another thread marks the store pending, and the
//!   auditing thread runs one more full pass before finishing;
//! - a same-thread write other than the auditor's own repair (a reaction
//!   landing back on a store whose laws are still running) queues a
//!   recheck pass, which validates and repairs the new value but runs no
//!   reactions;
//! - the auditor's own repair writes are skipped.
//!
//! Rechecks never fire reactions, so reaction cycles end after one round,
//! and every value a store settles on has been validated.

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use kosmos_graph::{CausalEvent, EventMetadata};
use kosmos_law::{
    execute_law, ExistenceConstraint, GlobalInvariant, LawExecution, Substrate, UniverseLaw,
};
use kosmos_store::{CausalStore, StoreRegistry, SubscriptionId};
use kosmos_types::{EventId, HybridLogicalClock, StoreKey, UniverseId};

use crate::config::AuditorConfig;
use crate::context::RegistryContext;
use crate::error::{AuditorError, AuditorResult};
use crate::telemetry::{
    Severity, TelemetryEntry, TelemetryKind, TelemetryLog, TelemetrySink, GLOBAL_STORE_KEY,
};

/// Metadata source of repair writes made by the auditor.
pub const AUDITOR_REPAIR_SOURCE: &str = "auditor-repair";

/// Metadata source of writes made by global invariant repairs.
pub const GLOBAL_REPAIR_SOURCE: &str = "global-repair";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditorState {
    Idle,
    Running,
    Stopped,
}

/// Summary of one [`ConstraintAuditor::scan`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub stores_scanned: usize,
    pub violations: usize,
    pub repairs: usize,
    /// The auditor was stopped before every store was visited.
    pub aborted: bool,
}

/// Running totals since the auditor was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorStats {
    pub violations: u64,
    pub repairs: u64,
    pub reactions: u64,
    pub reaction_errors: u64,
    pub errors: u64,
    /// Completed mutation cycles and scans.
    pub cycles: u64,
}

#[derive(Clone, Copy, Default)]
struct Tally {
    violations: usize,
    repairs: usize,
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Self) {
        self.violations += rhs.violations;
        self.repairs += rhs.repairs;
    }
}

struct Lifecycle {
    state: AuditorState,
    terminated: bool,
}

struct Claim {
    owner: ThreadId,
    pending: bool,
    recheck: Option<EventId>,
}

/// Follow-up work found when an audit pass finishes.
enum Pass {
    Full,
    Recheck(EventId),
}

/// Exclusive right to audit one key until dropped.
struct InFlight<'a> {
    shared: &'a Shared,
    key: String,
    released: bool,
}

impl InFlight<'_> {
    /// The pass still owed for writes that arrived during this one, or
    /// `None` after releasing the key.
    fn finish(&mut self) -> Option<Pass> {
        let mut claims = lock(&self.shared.in_flight);
        if let Some(claim) = claims.get_mut(&self.key) {
            if claim.pending {
                claim.pending = false;
                claim.recheck = None;
                return Some(Pass::Full);
            }
            if let Some(id) = claim.recheck.take() {
                return Some(Pass::Recheck(id));
            }
        }
        claims.remove(&self.key);
        self.released = true;
        None
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.released {
            lock(&self.shared.in_flight).remove(&self.key);
        }
    }
}

struct Shared {
    universe_id: UniverseId,
    substrate: Arc<Substrate>,
    registry: StoreRegistry<Value>,
    config: AuditorConfig,
    clock: HybridLogicalClock,
    sink: RwLock<Option<TelemetrySink>>,
    lifecycle: Mutex<Lifecycle>,
    subscriptions: Mutex<BTreeMap<StoreKey, (Arc<CausalStore<Value>>, SubscriptionId)>>,
    in_flight: Mutex<BTreeMap<String, Claim>>,
    telemetry: Mutex<TelemetryLog>,
    stats: Mutex<AuditorStats>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn repair_metadata(source: &str, name: &str) -> EventMetadata {
    EventMetadata::from_source(source).with_tag(name)
}

/// Validates, repairs and reacts to mutations of one universe's stores.
///
/// Cloning yields another handle to the same auditor.
#[derive(Clone)]
pub struct ConstraintAuditor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConstraintAuditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintAuditor")
            .field("universe_id", &self.shared.universe_id)
            .field("substrate", &self.shared.substrate.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConstraintAuditor {
    pub fn new(
        universe_id: UniverseId,
        substrate: Arc<Substrate>,
        registry: StoreRegistry<Value>,
        config: AuditorConfig,
    ) -> Self {
        let capacity = config.telemetry_capacity;
        Self {
            shared: Arc::new(Shared {
                universe_id,
                substrate,
                registry,
                config,
                clock: HybridLogicalClock::new(0),
                sink: RwLock::new(None),
                lifecycle: Mutex::new(Lifecycle {
                    state: AuditorState::Idle,
                    terminated: false,
                }),
                subscriptions: Mutex::new(BTreeMap::new()),
                in_flight: Mutex::new(BTreeMap::new()),
                telemetry: Mutex::new(TelemetryLog::new(capacity)),
                stats: Mutex::new(AuditorStats::default()),
            }),
        }
    }

    /// Forward every telemetry entry to `sink`.
    pub fn with_sink(self, sink: TelemetrySink) -> Self {
        self.set_sink(Some(sink));
        self
    }

    pub fn set_sink(&self, sink: Option<TelemetrySink>) {
        *self
            .shared
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = sink;
    }

    pub fn universe_id(&self) -> &UniverseId {
        &self.shared.universe_id
    }

    pub fn substrate(&self) -> &Arc<Substrate> {
        &self.shared.substrate
    }

    pub fn config(&self) -> &AuditorConfig {
        &self.shared.config
    }

    pub fn state(&self) -> AuditorState {
        lock(&self.shared.lifecycle).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == AuditorState::Running
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Subscribe to every audited store. A no-op while already running.
    pub fn start(&self) -> AuditorResult<()> {
        {
            let mut lifecycle = lock(&self.shared.lifecycle);
            if lifecycle.terminated {
                return Err(AuditorError::Shutdown);
            }
            if lifecycle.state == AuditorState::Running {
                return Ok(());
            }
            lifecycle.state = AuditorState::Running;
        }
        let watched = self
            .shared
            .registry
            .stores()
            .iter()
            .filter(|store| self.watch(store))
            .count();
        info!(universe = %self.shared.universe_id, watched, "auditor started");
        Ok(())
    }

    /// Unsubscribe from every store. Mutations are no longer audited until
    /// the next [`start`](Self::start); a scan in progress stops at the
    /// next store.
    pub fn stop(&self) {
        {
            let mut lifecycle = lock(&self.shared.lifecycle);
            if lifecycle.state == AuditorState::Stopped {
                return;
            }
            lifecycle.state = AuditorState::Stopped;
        }
        let subscriptions = std::mem::take(&mut *lock(&self.shared.subscriptions));
        for (store, id) in subscriptions.into_values() {
            store.unsubscribe(id);
        }
        info!(universe = %self.shared.universe_id, "auditor stopped");
    }

    /// Stop permanently. Later starts and scans fail and no further
    /// telemetry is recorded.
    pub fn shutdown(&self) {
        self.stop();
        lock(&self.shared.lifecycle).terminated = true;
        debug!(universe = %self.shared.universe_id, "auditor shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.shared.lifecycle).terminated
    }

    /// Subscribe to `store` if the auditor is running and the store is
    /// audited. Returns `true` if a new subscription was made.
    pub fn watch(&self, store: &Arc<CausalStore<Value>>) -> bool {
        if !self.is_running() || !self.shared.audits(store.key().as_str()) {
            return false;
        }
        let mut subscriptions = lock(&self.shared.subscriptions);
        if subscriptions.contains_key(store.key()) {
            return false;
        }
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let id = store.subscribe(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_mutation(event);
            }
        });
        subscriptions.insert(store.key().clone(), (Arc::clone(store), id));
        debug!(store = %store.key(), "auditor watching store");
        true
    }

    /// Returns `true` if the store was being watched.
    pub fn unwatch(&self, key: &str) -> bool {
        let removed = lock(&self.shared.subscriptions).remove(key);
        match removed {
            Some((store, id)) => {
                store.unsubscribe(id);
                true
            }
            None => false,
        }
    }

    pub fn watched_keys(&self) -> Vec<StoreKey> {
        lock(&self.shared.subscriptions).keys().cloned().collect()
    }

    // ---------------------------------------------------------------
    // Scan
    // ---------------------------------------------------------------

    /// Audit every audited store once, then the global invariants.
    ///
    /// Allowed while idle for startup consistency checks. Yields between
    /// stores and stops early once the auditor is stopped or shut down.
    pub async fn scan(&self) -> AuditorResult<ScanReport> {
        if self.is_shut_down() {
            return Err(AuditorError::Shutdown);
        }
        let shared = &self.shared;
        let mut report = ScanReport::default();

        for key in shared.audited_keys() {
            if shared.scan_interrupted() {
                report.aborted = true;
                break;
            }
            let tally = shared.audit_exclusive(key.as_str(), None, None);
            if let Some(tally) = tally {
                report.stores_scanned += 1;
                report.violations += tally.violations;
                report.repairs += tally.repairs;
            }
            tokio::task::yield_now().await;
        }

        if !report.aborted {
            let tally = shared.check_globals(None);
            report.violations += tally.violations;
            report.repairs += tally.repairs;
        }
        lock(&shared.stats).cycles += 1;
        info!(
            universe = %shared.universe_id,
            scanned = report.stores_scanned,
            violations = report.violations,
            repairs = report.repairs,
            aborted = report.aborted,
            "scan complete"
        );
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Telemetry
    // ---------------------------------------------------------------

    pub fn telemetry(&self) -> Vec<TelemetryEntry> {
        lock(&self.shared.telemetry).snapshot()
    }

    /// Telemetry recorded for one store key.
    pub fn telemetry_for(&self, key: &str) -> Vec<TelemetryEntry> {
        self.telemetry()
            .into_iter()
            .filter(|e| e.store_key.as_str() == key)
            .collect()
    }

    /// Remove and return the buffered telemetry.
    pub fn drain_telemetry(&self) -> Vec<TelemetryEntry> {
        lock(&self.shared.telemetry).drain()
    }

    pub fn stats(&self) -> AuditorStats {
        *lock(&self.shared.stats)
    }
}

enum Entry<'a> {
    Acquired(InFlight<'a>),
    Busy,
}

impl Shared {
    fn audits(&self, key: &str) -> bool {
        self.has_global_checks() || self.substrate.governs(key)
    }

    fn has_global_checks(&self) -> bool {
        self.config.check_global_invariants && !self.substrate.global_invariants().is_empty()
    }

    fn audited_keys(&self) -> Vec<StoreKey> {
        self.registry
            .keys()
            .into_iter()
            .filter(|k| self.audits(k.as_str()))
            .collect()
    }

    fn scan_interrupted(&self) -> bool {
        let lifecycle = lock(&self.lifecycle);
        lifecycle.terminated || lifecycle.state == AuditorState::Stopped
    }

    /// Claim `key` for auditing. `recheck` is the event to revalidate if
    /// the key is already claimed by this thread.
    fn enter(&self, key: &str, recheck: Option<EventId>) -> Entry<'_> {
        let me = thread::current().id();
        let mut claims = lock(&self.in_flight);
        if let Some(claim) = claims.get_mut(key) {
            if claim.owner != me {
                claim.pending = true;
            } else if recheck.is_some() {
                claim.recheck = recheck;
            }
            return Entry::Busy;
        }
        claims.insert(
            key.to_string(),
            Claim {
                owner: me,
                pending: false,
                recheck: None,
            },
        );
        Entry::Acquired(InFlight {
            shared: self,
            key: key.to_string(),
            released: false,
        })
    }

    /// Audit `key` unless it is already in flight. Returns `None` if it was.
    fn audit_exclusive(
        &self,
        key: &str,
        trigger: Option<EventId>,
        recheck: Option<EventId>,
    ) -> Option<Tally> {
        let Entry::Acquired(mut claim) = self.enter(key, recheck) else {
            return None;
        };
        let mut tally = self.audit_store(key, trigger, true);
        while let Some(pass) = claim.finish() {
            tally += match pass {
                Pass::Full => self.audit_store(key, None, true),
                Pass::Recheck(id) => {
                    debug!(store = key, event = %id, "rechecking re-entrant write");
                    self.audit_store(key, Some(id), false)
                }
            };
        }
        Some(tally)
    }

    fn on_mutation(&self, event: &CausalEvent<Value>) {
        if lock(&self.lifecycle).state != AuditorState::Running {
            return;
        }
        let own_repair = event.metadata.source.as_deref() == Some(AUDITOR_REPAIR_SOURCE);
        let recheck = (!own_repair).then_some(event.id);
        if self
            .audit_exclusive(event.store_key.as_str(), Some(event.id), recheck)
            .is_none()
        {
            return;
        }
        self.check_globals(Some(event.id));
        lock(&self.stats).cycles += 1;
    }

    // ---------------------------------------------------------------
    // Per-store audit
    // ---------------------------------------------------------------

    /// One pass over the constraint and laws of `key`. Without `reactions`
    /// laws only validate and repair.
    fn audit_store(&self, key: &str, trigger: Option<EventId>, reactions: bool) -> Tally {
        let mut tally = Tally::default();
        let Some(store) = self.registry.get(key) else {
            return tally;
        };

        if let Some(constraint) = self.substrate.constraint_for(key) {
            tally += self.enforce_constraint(&store, constraint, trigger);
        }
        let laws: Vec<Arc<UniverseLaw>> = self.substrate.laws_for(key).to_vec();
        for law in &laws {
            tally += self.enforce_law(&store, law, trigger, reactions);
        }
        tally
    }

    fn enforce_constraint(
        &self,
        store: &CausalStore<Value>,
        constraint: &ExistenceConstraint,
        trigger: Option<EventId>,
    ) -> Tally {
        let mut tally = Tally::default();
        let key = store.key().as_str();
        let name = constraint.name();
        let value = store.get();

        let evaluation = match constraint.evaluate(&value) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                self.audit_error(name, key, trigger, &err);
                return tally;
            }
        };
        if evaluation.valid {
            return tally;
        }

        tally.violations += 1;
        let repairable = self.config.auto_repair && constraint.has_repair();
        self.emit(
            self.entry(
                TelemetryKind::Violation,
                if repairable { Severity::Warning } else { Severity::Error },
                name,
                key,
            )
            .message(evaluation.message())
            .event(trigger)
            .details(json!({
                "failures": evaluation.failures,
                "state": value,
                "repairable": constraint.has_repair(),
            })),
        );
        if !repairable {
            return tally;
        }

        let repaired = match constraint.repair(&value) {
            Ok(repaired) => repaired,
            Err(err) => {
                self.audit_error(name, key, trigger, &err);
                return tally;
            }
        };
        if self.write_repair(store, name, value, repaired, trigger) {
            tally.repairs += 1;
        }
        tally
    }

    fn enforce_law(
        &self,
        store: &CausalStore<Value>,
        law: &UniverseLaw,
        trigger: Option<EventId>,
        reactions: bool,
    ) -> Tally {
        let mut tally = Tally::default();
        let key = store.key().as_str();
        let name = law.name();
        let value = store.get();
        let context = RegistryContext::new(self.registry.clone());

        // Reported up front: a failing repair must still leave a violation.
        let evaluation = match law.constraint().evaluate(&value) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                self.audit_error(name, key, trigger, &err);
                return tally;
            }
        };
        if !evaluation.valid {
            tally.violations += 1;
            let repairable = self.config.auto_repair && law.constraint().has_repair();
            self.emit(
                self.entry(
                    TelemetryKind::Violation,
                    if repairable { Severity::Warning } else { Severity::Error },
                    name,
                    key,
                )
                .message(evaluation.message())
                .event(trigger)
                .details(json!({
                    "failures": evaluation.failures,
                    "state": value,
                    "repairable": law.constraint().has_repair(),
                })),
            );
        }

        let execution = LawExecution::new(&value, key)
            .with_context(&context)
            .with_evaluation(&evaluation)
            .attempt_repair(self.config.auto_repair)
            .apply_reactions(self.config.apply_reactions && reactions);
        let outcome = match execute_law(law, execution) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.audit_error(name, key, trigger, &err);
                return tally;
            }
        };

        if let Some(repaired) = outcome.repaired_value.clone() {
            if self.write_repair(store, name, value, repaired, trigger) {
                tally.repairs += 1;
            }
        }
        for effect in &outcome.reaction_effects {
            self.emit(
                self.entry(TelemetryKind::Reaction, Severity::Info, name, key)
                    .message(format!("{name} updated {}", effect.target))
                    .event(trigger)
                    .details(json!({
                        "target": effect.target,
                        "value": effect.value,
                        "applied": effect.applied,
                    })),
            );
        }
        for failure in &outcome.reaction_failures {
            self.emit(
                self.entry(TelemetryKind::ReactionError, Severity::Error, name, key)
                    .message(failure.error.to_string())
                    .event(trigger)
                    .details(json!({ "target": failure.target })),
            );
        }
        tally
    }

    /// Write a repaired value back and record it. Returns `true` on success.
    fn write_repair(
        &self,
        store: &CausalStore<Value>,
        name: &str,
        before: Value,
        after: Value,
        trigger: Option<EventId>,
    ) -> bool {
        let key = store.key().as_str();
        let metadata = repair_metadata(AUDITOR_REPAIR_SOURCE, name);
        match store.set_with(after.clone(), metadata.into()) {
            Ok(id) => {
                self.emit(
                    self.entry(TelemetryKind::Repair, Severity::Info, name, key)
                        .message(format!("{name} repaired {key}"))
                        .event(Some(id))
                        .details(json!({ "before": before, "after": after, "trigger": trigger })),
                );
                true
            }
            Err(err) => {
                self.audit_error(name, key, trigger, &err);
                false
            }
        }
    }

    // ---------------------------------------------------------------
    // Global invariants
    // ---------------------------------------------------------------

    fn check_globals(&self, trigger: Option<EventId>) -> Tally {
        if !self.has_global_checks() {
            return Tally::default();
        }
        let Entry::Acquired(mut claim) = self.enter(GLOBAL_STORE_KEY, None) else {
            return Tally::default();
        };
        let mut tally = Tally::default();
        loop {
            for invariant in self.substrate.global_invariants() {
                tally += self.enforce_global(invariant, trigger);
            }
            if claim.finish().is_none() {
                break;
            }
        }
        tally
    }

    fn enforce_global(&self, invariant: &GlobalInvariant, trigger: Option<EventId>) -> Tally {
        let mut tally = Tally::default();
        let name = invariant.name();
        let states = self.registry.values();

        match invariant.holds(&states) {
            Ok(true) => return tally,
            Ok(false) => {}
            Err(err) => {
                self.audit_error(name, GLOBAL_STORE_KEY, trigger, &err);
                return tally;
            }
        }

        tally.violations += 1;
        let repairable = self.config.auto_repair && invariant.has_repair();
        self.emit(
            self.entry(
                TelemetryKind::Violation,
                if repairable { Severity::Warning } else { Severity::Error },
                name,
                GLOBAL_STORE_KEY,
            )
            .message(invariant.message())
            .event(trigger)
            .details(json!({ "repairable": invariant.has_repair() })),
        );
        if !repairable {
            return tally;
        }

        let repaired = match invariant.repair(&states) {
            Ok(repaired) => repaired,
            Err(err) => {
                self.audit_error(name, GLOBAL_STORE_KEY, trigger, &err);
                return tally;
            }
        };
        let mut changed = Vec::new();
        for (key, value) in repaired {
            if states.get(&key) == Some(&value) {
                continue;
            }
            let Some(store) = self.registry.get(&key) else {
                debug!(invariant = name, store = %key, "global repair names unknown store");
                continue;
            };
            match store.set_with(value, repair_metadata(GLOBAL_REPAIR_SOURCE, name).into()) {
                Ok(_) => changed.push(key),
                Err(err) => self.audit_error(name, &key, trigger, &err),
            }
        }
        if !changed.is_empty() {
            tally.repairs += 1;
            self.emit(
                self.entry(TelemetryKind::Repair, Severity::Info, name, GLOBAL_STORE_KEY)
                    .message(format!("{name} repaired {}", changed.join(", ")))
                    .event(trigger)
                    .details(json!({ "stores": changed })),
            );
        }
        tally
    }

    // ---------------------------------------------------------------
    // Telemetry
    // ---------------------------------------------------------------

    fn entry(&self, kind: TelemetryKind, severity: Severity, law: &str, key: &str) -> TelemetryEntry {
        TelemetryEntry::new(
            kind,
            severity,
            law,
            key,
            self.universe_id.clone(),
            self.clock.now(),
        )
    }

    fn audit_error(
        &self,
        name: &str,
        key: &str,
        trigger: Option<EventId>,
        err: &dyn std::error::Error,
    ) {
        let entry = self
            .entry(TelemetryKind::AuditError, Severity::Critical, name, key)
            .message(err.to_string())
            .event(trigger);
        self.emit(entry);
    }

    fn emit(&self, entry: TelemetryEntry) {
        if lock(&self.lifecycle).terminated {
            return;
        }
        match entry.kind {
            TelemetryKind::Violation => {
                warn!(law = %entry.law_name, store = %entry.store_key, message = %entry.message, "constraint violated")
            }
            TelemetryKind::Repair => {
                info!(law = %entry.law_name, store = %entry.store_key, "state repaired")
            }
            TelemetryKind::Reaction => {
                debug!(law = %entry.law_name, store = %entry.store_key, message = %entry.message, "reaction applied")
            }
            TelemetryKind::ReactionError | TelemetryKind::AuditError => {
                error!(kind = %entry.kind, law = %entry.law_name, store = %entry.store_key, message = %entry.message, "audit failure")
            }
        }

        {
            let mut stats = lock(&self.stats);
            match entry.kind {
                TelemetryKind::Violation => stats.violations += 1,
                TelemetryKind::Repair => stats.repairs += 1,
                TelemetryKind::Reaction => stats.reactions += 1,
                TelemetryKind::ReactionError => stats.reaction_errors += 1,
                TelemetryKind::AuditError => stats.errors += 1,
            }
        }
        lock(&self.telemetry).push(entry.clone());

        let sink = self
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            if catch_unwind(AssertUnwindSafe(|| sink(&entry))).is_err() {
                warn!(universe = %self.universe_id, "telemetry sink panicked");
            }
        }
    }
}
