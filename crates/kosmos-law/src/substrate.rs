//! The rule set that governs one universe.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use kosmos_types::StoreKey;

use crate::constraint::{ConstraintEvaluation, ExistenceConstraint};
use crate::error::{guarded, LawError, LawResult};
use crate::law::UniverseLaw;
use crate::registry::LawRegistry;

/// Current value of every store in a universe, keyed by store key.
pub type GlobalState = BTreeMap<String, Value>;

pub type GlobalCheckFn = Arc<dyn Fn(&GlobalState) -> bool + Send + Sync>;
pub type GlobalRepairFn = Arc<dyn Fn(&GlobalState) -> GlobalState + Send + Sync>;

/// A cross-store invariant evaluated against the merged view of all stores.
///
/// A repair returns the full desired state; only stores whose value
/// changed are rewritten.
#[derive(Clone)]
pub struct GlobalInvariant {
    name: String,
    check: GlobalCheckFn,
    repair: Option<GlobalRepairFn>,
    message: Option<String>,
}

impl fmt::Debug for GlobalInvariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalInvariant")
            .field("name", &self.name)
            .field("has_repair", &self.repair.is_some())
            .field("message", &self.message)
            .finish()
    }
}

impl GlobalInvariant {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&GlobalState) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
            repair: None,
            message: None,
        }
    }

    pub fn with_repair(
        mut self,
        repair: impl Fn(&GlobalState) -> GlobalState + Send + Sync + 'static,
    ) -> Self {
        self.repair = Some(Arc::new(repair));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Failure message, falling back to a generic one.
    pub fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("global invariant {} violated", self.name))
    }

    pub fn has_repair(&self) -> bool {
        self.repair.is_some()
    }

    pub fn holds(&self, states: &GlobalState) -> LawResult<bool> {
        guarded(&self.name, "global check", || (self.check)(states))
    }

    /// Compute and verify the repaired state.
    pub fn repair(&self, states: &GlobalState) -> LawResult<GlobalState> {
        let repair = self
            .repair
            .as_ref()
            .ok_or_else(|| LawError::RepairUnavailable(self.name.clone()))?;
        let repaired = guarded(&self.name, "global repair", || repair(states))?;
        if !self.holds(&repaired)? {
            return Err(LawError::RepairIneffective {
                constraint: self.name.clone(),
                failures: vec![self.name.clone()],
            });
        }
        Ok(repaired)
    }
}

/// Constraints, laws and global invariants for one universe.
///
/// Immutable once built; universes and auditors share it behind an `Arc`.
#[derive(Clone, Debug)]
pub struct Substrate {
    id: String,
    name: String,
    constraints: BTreeMap<StoreKey, ExistenceConstraint>,
    laws: LawRegistry,
    global_invariants: Vec<GlobalInvariant>,
}

impl Substrate {
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> SubstrateBuilder {
        SubstrateBuilder {
            substrate: Substrate {
                id: id.into(),
                name: name.into(),
                constraints: BTreeMap::new(),
                laws: LawRegistry::new(),
                global_invariants: Vec::new(),
            },
        }
    }

    /// A substrate that governs nothing.
    pub fn empty(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::builder(id.clone(), id).build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraint_for(&self, key: &str) -> Option<&ExistenceConstraint> {
        self.constraints.get(key)
    }

    pub fn laws_for(&self, key: &str) -> &[Arc<UniverseLaw>] {
        self.laws.laws_for(key)
    }

    pub fn laws(&self) -> &LawRegistry {
        &self.laws
    }

    pub fn global_invariants(&self) -> &[GlobalInvariant] {
        &self.global_invariants
    }

    /// Every store key named by a constraint or a law.
    pub fn governed_keys(&self) -> BTreeSet<StoreKey> {
        self.constraints
            .keys()
            .chain(self.laws.keys())
            .cloned()
            .collect()
    }

    /// Returns `true` if `key` has a constraint or a law.
    pub fn governs(&self, key: &str) -> bool {
        self.constraints.contains_key(key) || !self.laws.laws_for(key).is_empty()
    }

    /// Evaluate the constraint for `key`. `None` if the key has none.
    pub fn validate(&self, key: &str, state: &Value) -> LawResult<Option<ConstraintEvaluation>> {
        self.constraint_for(key)
            .map(|c| c.evaluate(state))
            .transpose()
    }

    /// Names of the global invariants `states` violates.
    pub fn validate_global(&self, states: &GlobalState) -> LawResult<Vec<String>> {
        let mut violated = Vec::new();
        for invariant in &self.global_invariants {
            if !invariant.holds(states)? {
                violated.push(invariant.name.clone());
            }
        }
        Ok(violated)
    }
}

/// Builder for [`Substrate`].
#[derive(Debug)]
pub struct SubstrateBuilder {
    substrate: Substrate,
}

impl SubstrateBuilder {
    /// Set the constraint for `key`, replacing any earlier one.
    pub fn constraint(mut self, key: impl Into<StoreKey>, constraint: ExistenceConstraint) -> Self {
        self.substrate.constraints.insert(key.into(), constraint);
        self
    }

    /// Register a law for `key`. Pass a cloned `Arc` to share one law
    /// between several keys.
    pub fn law(mut self, key: impl Into<StoreKey>, law: impl Into<Arc<UniverseLaw>>) -> Self {
        self.substrate.laws.register(key, law.into());
        self
    }

    pub fn global_invariant(mut self, invariant: GlobalInvariant) -> Self {
        self.substrate.global_invariants.push(invariant);
        self
    }

    pub fn build(self) -> Substrate {
        self.substrate
    }
}
