//! Per-store invariants and their repair.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{guarded, LawError, LawResult};

/// Predicate over one store's value.
pub type CheckFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Pure function mapping an invalid value to a valid one.
pub type RepairFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A single named check.
#[derive(Clone)]
pub struct Invariant {
    name: String,
    check: CheckFn,
    message: Option<String>,
}

impl Invariant {
    pub fn new(name: impl Into<String>, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
            message: None,
        }
    }

    /// Message reported when the check fails.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Run the check under the panic guard.
    pub fn holds(&self, state: &Value) -> LawResult<bool> {
        guarded(&self.name, "check", || (self.check)(state))
    }

    fn failure(&self) -> InvariantFailure {
        InvariantFailure {
            invariant: self.name.clone(),
            message: self
                .message
                .clone()
                .unwrap_or_else(|| format!("invariant {} violated", self.name)),
        }
    }
}

impl fmt::Debug for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invariant")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// How a violated constraint is brought back into a valid state.
#[derive(Clone)]
pub enum RepairStrategy {
    /// Compute the repaired value from the invalid one.
    Function(RepairFn),
    /// Replace the value with a fixed one.
    Replace(Value),
}

impl RepairStrategy {
    pub fn function(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }

    fn apply(&self, state: &Value) -> Value {
        match self {
            Self::Function(f) => f(state),
            Self::Replace(value) => value.clone(),
        }
    }
}

impl fmt::Debug for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
        }
    }
}

/// A failed invariant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantFailure {
    pub invariant: String,
    pub message: String,
}

/// The result of running every invariant of a constraint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintEvaluation {
    pub constraint: String,
    pub valid: bool,
    /// Failed invariants in declaration order.
    pub failures: Vec<InvariantFailure>,
}

impl ConstraintEvaluation {
    /// Names of the failed invariants.
    pub fn failed_names(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.invariant.clone()).collect()
    }

    /// All failure messages joined into one line.
    pub fn message(&self) -> String {
        self.failures
            .iter()
            .map(|f| f.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A named set of invariants over one store's value.
///
/// If a repair is defined its output must satisfy every invariant.
/// [`repair`](Self::repair) checks this on every call and returns
/// [`LawError::RepairIneffective`] when it does not hold.
#[derive(Clone, Debug)]
pub struct ExistenceConstraint {
    name: String,
    invariants: Vec<Invariant>,
    repair: Option<RepairStrategy>,
}

impl ExistenceConstraint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            invariants: Vec::new(),
            repair: None,
        }
    }

    /// Add an invariant.
    pub fn invariant(mut self, invariant: Invariant) -> Self {
        self.invariants.push(invariant);
        self
    }

    /// Shorthand for adding an [`Invariant`] built from a closure.
    pub fn check(
        self,
        name: impl Into<String>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.invariant(Invariant::new(name, check))
    }

    pub fn with_repair(self, repair: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.with_repair_strategy(RepairStrategy::function(repair))
    }

    pub fn with_repair_strategy(mut self, strategy: RepairStrategy) -> Self {
        self.repair = Some(strategy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invariants(&self) -> &[Invariant] {
        &self.invariants
    }

    pub fn has_repair(&self) -> bool {
        self.repair.is_some()
    }

    /// Run every invariant against `state`.
    ///
    /// All invariants run even after the first failure, so the evaluation
    /// lists every broken one.
    pub fn evaluate(&self, state: &Value) -> LawResult<ConstraintEvaluation> {
        let mut failures = Vec::new();
        for invariant in &self.invariants {
            if !invariant.holds(state)? {
                failures.push(invariant.failure());
            }
        }
        Ok(ConstraintEvaluation {
            constraint: self.name.clone(),
            valid: failures.is_empty(),
            failures,
        })
    }

    /// Repair `state` and verify the result.
    pub fn repair(&self, state: &Value) -> LawResult<Value> {
        let strategy = self
            .repair
            .as_ref()
            .ok_or_else(|| LawError::RepairUnavailable(self.name.clone()))?;
        let repaired = guarded(&self.name, "repair", || strategy.apply(state))?;
        let check = self.evaluate(&repaired)?;
        if !check.valid {
            return Err(LawError::RepairIneffective {
                constraint: self.name.clone(),
                failures: check.failed_names(),
            });
        }
        Ok(repaired)
    }
}
