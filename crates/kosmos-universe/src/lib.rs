//! Universes for Kosmos.
//!
//! A universe is a set of causal stores sharing one [`Substrate`] and one
//! lifecycle. The [`UniverseManager`] creates and removes stores, starts,
//! pauses and destroys the auditor that enforces the substrate, and takes
//! snapshots and forks. The [`Multiverse`] is a flat registry of universes
//! with batch lifecycle calls.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kosmos_law::{ExistenceConstraint, Substrate};
//! use kosmos_universe::{UniverseConfig, UniverseManager};
//! use serde_json::json;
//!
//! let substrate = Substrate::builder("physics", "Physics")
//!     .constraint(
//!         "counter",
//!         ExistenceConstraint::new("non-negative")
//!             .check("value >= 0", |s| s["value"].as_i64().is_some_and(|v| v >= 0))
//!             .with_repair(|_| json!({"value": 0})),
//!     )
//!     .build();
//! let universe = UniverseManager::new(UniverseConfig::new("sim"), Arc::new(substrate)).unwrap();
//! let counter = universe.create_store("counter", json!({"value": 1})).unwrap();
//! universe.start().unwrap();
//!
//! counter.set(json!({"value": -5})).unwrap();
//! assert_eq!(counter.get(), json!({"value": 0}));
//! ```
//!
//! [`Substrate`]: kosmos_law::Substrate

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod multiverse;
pub mod snapshot;

pub use config::{ForkOptions, UniverseConfig, FORKED_FROM_KEY};
pub use error::{UniverseError, UniverseResult};
pub use lifecycle::LifecycleState;
pub use manager::{UniverseManager, UniverseStats, RESTORE_SOURCE};
pub use multiverse::{BatchReport, Multiverse, MultiverseStats};
pub use snapshot::{StoreSnapshot, UniverseSnapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use kosmos_auditor::{TelemetryEntry, TelemetryKind};
    use kosmos_law::{define_law, ExistenceConstraint, LawOptions, Substrate};
    use kosmos_store::MergeStrategy;
    use serde_json::{json, Value};

    fn counter_substrate() -> Arc<Substrate> {
        Arc::new(
            Substrate::builder("physics", "Physics")
                .constraint(
                    "counter",
                    ExistenceConstraint::new("non-negative")
                        .check("value >= 0", |s| s["value"].as_i64().is_some_and(|v| v >= 0))
                        .with_repair(|_| json!({"value": 0})),
                )
                .build(),
        )
    }

    fn energy_substrate() -> Arc<Substrate> {
        let law = Arc::new(define_law(
            "energy-conservation",
            ExistenceConstraint::new("numeric").check("is number", Value::is_number),
            LawOptions::new().reaction("total", |_, ctx| {
                let kinetic = ctx.get_state("kinetic").and_then(|v| v.as_i64()).unwrap_or(0);
                let potential = ctx.get_state("potential").and_then(|v| v.as_i64()).unwrap_or(0);
                Ok(json!(kinetic + potential))
            }),
        ));
        Arc::new(
            Substrate::builder("physics", "Physics")
                .law("kinetic", Arc::clone(&law))
                .law("potential", law)
                .build(),
        )
    }

    fn universe(substrate: Arc<Substrate>) -> UniverseManager {
        UniverseManager::new(UniverseConfig::new("u1"), substrate).unwrap()
    }

    // ===============================================================
    // Scenario A: repair on write
    // ===============================================================

    #[test]
    fn scenario_a_negative_counter_is_repaired() {
        let seen: Arc<Mutex<Vec<TelemetryEntry>>> = Arc::default();
        let sink_seen = Arc::clone(&seen);
        let u = universe(counter_substrate()).with_telemetry_sink(Arc::new(move |e: &TelemetryEntry| {
            sink_seen.lock().unwrap().push(e.clone());
        }));
        let counter = u.create_store("counter", json!({"value": 1})).unwrap();
        u.start().unwrap();

        counter.set(json!({"value": -5})).unwrap();
        assert_eq!(counter.get(), json!({"value": 0}));

        let telemetry = u.auditor().telemetry_for("counter");
        let kinds: Vec<_> = telemetry.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![TelemetryKind::Violation, TelemetryKind::Repair]);
        assert_eq!(*seen.lock().unwrap(), telemetry);
        assert!(telemetry.iter().all(|e| e.universe_id.as_str() == "u1"));
    }

    // ===============================================================
    // Scenario B: branch and merge
    // ===============================================================

    #[test]
    fn scenario_b_branch_is_isolated_until_merged() {
        let u = universe(Arc::new(Substrate::empty("none")));
        let store = u.create_store("value", json!(10)).unwrap();
        u.start().unwrap();

        let experiment = store.branch("experiment").unwrap();
        store.switch_branch(&experiment).unwrap();
        store.set(json!(100)).unwrap();
        let main = kosmos_types::BranchId::main();
        store.switch_branch(&main).unwrap();
        assert_eq!(store.get(), json!(10));

        let outcome = store.merge(&experiment, MergeStrategy::Theirs).unwrap();
        assert!(outcome.success);
        assert_eq!(store.get(), json!(100));
    }

    // ===============================================================
    // Scenario C: cross-store reaction
    // ===============================================================

    #[test]
    fn scenario_c_energy_reaction_updates_total() {
        let u = universe(energy_substrate());
        let kinetic = u.create_store("kinetic", json!(100)).unwrap();
        u.create_store("potential", json!(50)).unwrap();
        let total = u.create_store("total", json!(150)).unwrap();
        u.start().unwrap();

        kinetic.set(json!(120)).unwrap();
        assert_eq!(total.get(), json!(170));
        assert_eq!(total.event_count(), 2);

        let reactions: Vec<_> = u
            .telemetry()
            .into_iter()
            .filter(|e| e.kind == TelemetryKind::Reaction)
            .collect();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].law_name, "energy-conservation");
    }

    // ===============================================================
    // Scenario D: pause and catch-up scan
    // ===============================================================

    #[tokio::test]
    async fn scenario_d_pause_allows_drift_resume_repairs() {
        let u = universe(counter_substrate());
        let counter = u.create_store("counter", json!({"value": 1})).unwrap();
        u.start().unwrap();

        u.pause().unwrap();
        counter.set(json!({"value": -1})).unwrap();
        assert_eq!(counter.get(), json!({"value": -1}));

        let report = u.resume().await.unwrap().unwrap();
        assert_eq!(report.repairs, 1);
        assert_eq!(counter.get(), json!({"value": 0}));
        assert_eq!(u.state(), LifecycleState::Running);
    }

    // ===============================================================
    // Scenario E: manual merge conflict
    // ===============================================================

    #[test]
    fn scenario_e_manual_merge_reports_conflict() {
        let u = universe(Arc::new(Substrate::empty("none")));
        let store = u.create_store("doc", json!({"field": 0, "other": 0})).unwrap();

        let branch = store.branch("edit").unwrap();
        store.set(json!({"field": 1, "other": 0})).unwrap();
        store.switch_branch(&branch).unwrap();
        store.set(json!({"field": 2, "other": 0})).unwrap();
        store.switch_branch(&kosmos_types::BranchId::main()).unwrap();
        let before = store.event_count();

        let outcome = store.merge(&branch, MergeStrategy::Manual).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].path.to_string(), "$.field");
        assert_eq!(store.get(), json!({"field": 1, "other": 0}));
        assert_eq!(store.event_count(), before);

        store.switch_branch(&branch).unwrap();
        assert_eq!(store.get(), json!({"field": 2, "other": 0}));
    }

    // ===============================================================
    // Fork independence
    // ===============================================================

    #[test]
    fn fork_and_source_do_not_share_state() {
        let u = universe(counter_substrate());
        let source = u.create_store("counter", json!({"value": 1})).unwrap();
        let fork = u.fork("u2", ForkOptions::new()).unwrap();
        let copy = fork.get_store("counter").unwrap();

        copy.set(json!({"value": 7})).unwrap();
        assert_eq!(source.get(), json!({"value": 1}));
        source.set(json!({"value": 3})).unwrap();
        assert_eq!(copy.get(), json!({"value": 7}));
    }

    #[tokio::test]
    async fn destroy_during_scan_stops_writes() {
        let u = universe(counter_substrate());
        let counter = u.create_store("counter", json!({"value": -1})).unwrap();
        let scan = u.scan();
        u.destroy().unwrap();
        // The scan future had not been polled yet, so it observes the
        // shut-down auditor.
        assert!(scan.await.is_err());
        assert_eq!(counter.get(), json!({"value": -1}));
        assert!(u.telemetry().is_empty());
    }
}
