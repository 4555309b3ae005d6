//! Executable laws: a constraint plus cross-store reactions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use kosmos_graph::EventMetadata;
use kosmos_types::StoreKey;

use crate::constraint::{ConstraintEvaluation, ExistenceConstraint};
use crate::context::LawContext;
use crate::error::{guarded, LawError, LawResult};

/// Metadata source recorded on writes made by reactions.
pub const LAW_REACTION_SOURCE: &str = "law-reaction";

/// Computes the next value of a sibling store from the local state.
pub type ReactionFn = Arc<dyn Fn(&Value, &dyn LawContext) -> LawResult<Value> + Send + Sync>;

/// Called with the failed evaluation and the offending state.
pub type ViolationHook = Arc<dyn Fn(&ConstraintEvaluation, &Value) + Send + Sync>;

/// Called with the state before and after a repair.
pub type RepairHook = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// Optional parts of a law.
#[derive(Clone, Default)]
pub struct LawOptions {
    reactions: BTreeMap<StoreKey, ReactionFn>,
    on_violation: Option<ViolationHook>,
    on_repair: Option<RepairHook>,
}

impl LawOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// React to changes of the governed store by rewriting `target`.
    pub fn reaction(
        mut self,
        target: impl Into<StoreKey>,
        reaction: impl Fn(&Value, &dyn LawContext) -> LawResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.reactions.insert(target.into(), Arc::new(reaction));
        self
    }

    pub fn on_violation(
        mut self,
        hook: impl Fn(&ConstraintEvaluation, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.on_violation = Some(Arc::new(hook));
        self
    }

    pub fn on_repair(mut self, hook: impl Fn(&Value, &Value) + Send + Sync + 'static) -> Self {
        self.on_repair = Some(Arc::new(hook));
        self
    }
}

/// A constraint wrapped for execution.
#[derive(Clone)]
pub struct UniverseLaw {
    name: String,
    constraint: ExistenceConstraint,
    reactions: BTreeMap<StoreKey, ReactionFn>,
    on_violation: Option<ViolationHook>,
    on_repair: Option<RepairHook>,
}

impl fmt::Debug for UniverseLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniverseLaw")
            .field("name", &self.name)
            .field("constraint", &self.constraint.name())
            .field("reactions", &self.reactions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl UniverseLaw {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraint(&self) -> &ExistenceConstraint {
        &self.constraint
    }

    /// Stores this law's reactions write into.
    pub fn reaction_targets(&self) -> Vec<&StoreKey> {
        self.reactions.keys().collect()
    }

    pub fn has_reactions(&self) -> bool {
        !self.reactions.is_empty()
    }
}

/// Build a law. Nothing is executed.
pub fn define_law(
    name: impl Into<String>,
    constraint: ExistenceConstraint,
    options: LawOptions,
) -> UniverseLaw {
    UniverseLaw {
        name: name.into(),
        constraint,
        reactions: options.reactions,
        on_violation: options.on_violation,
        on_repair: options.on_repair,
    }
}

/// Inputs to one law execution.
#[derive(Clone, Copy)]
pub struct LawExecution<'a> {
    pub state: &'a Value,
    pub store_key: &'a str,
    /// Where reactions read sibling state and write their output. Without a
    /// context reactions still run but their output is only returned.
    pub context: Option<&'a dyn LawContext>,
    /// An evaluation of `state` the caller already made. Used in place of
    /// evaluating the constraint again.
    pub evaluation: Option<&'a ConstraintEvaluation>,
    pub attempt_repair: bool,
    pub apply_reactions: bool,
}

impl<'a> LawExecution<'a> {
    /// Repair and reactions enabled, no context.
    pub fn new(state: &'a Value, store_key: &'a str) -> Self {
        Self {
            state,
            store_key,
            context: None,
            evaluation: None,
            attempt_repair: true,
            apply_reactions: true,
        }
    }

    pub fn with_context(mut self, context: &'a dyn LawContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_evaluation(mut self, evaluation: &'a ConstraintEvaluation) -> Self {
        self.evaluation = Some(evaluation);
        self
    }

    pub fn attempt_repair(mut self, enabled: bool) -> Self {
        self.attempt_repair = enabled;
        self
    }

    pub fn apply_reactions(mut self, enabled: bool) -> Self {
        self.apply_reactions = enabled;
        self
    }
}

/// The output of one reaction.
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionEffect {
    pub target: StoreKey,
    pub value: Value,
    /// Whether the value was written through the context.
    pub applied: bool,
}

/// A reaction that failed. Other reactions of the same law still run.
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionFailure {
    pub target: StoreKey,
    pub error: LawError,
}

/// The result of executing a law.
///
/// `evaluation.valid` says whether the input state was valid; `valid` says
/// whether the law is satisfied after repair. A repaired state has
/// `evaluation.valid == false`, `valid == true` and a `repaired_value`.
#[derive(Clone, Debug, PartialEq)]
pub struct LawOutcome {
    pub law: String,
    pub evaluation: ConstraintEvaluation,
    pub valid: bool,
    pub repaired_value: Option<Value>,
    pub reaction_effects: Vec<ReactionEffect>,
    pub reaction_failures: Vec<ReactionFailure>,
}

impl LawOutcome {
    pub fn was_repaired(&self) -> bool {
        self.repaired_value.is_some()
    }

    /// The state the law settled on.
    pub fn effective_state<'a>(&'a self, input: &'a Value) -> &'a Value {
        self.repaired_value.as_ref().unwrap_or(input)
    }
}

/// Context used when the caller supplies none: no stores, no writes.
struct DetachedContext;

impl LawContext for DetachedContext {
    fn get_state(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set_state(&self, key: &str, _value: Value, _metadata: EventMetadata) -> LawResult<()> {
        Err(LawError::StoreNotFound(StoreKey::from(key)))
    }

    fn store_keys(&self) -> Vec<StoreKey> {
        Vec::new()
    }
}

/// Execute `law` against one state.
///
/// 1. Every invariant of the law's constraint is evaluated, unless the
///    execution carries an evaluation already.
/// 2. If the state is invalid the violation hook runs; with
///    `attempt_repair` and a repair defined, the repair is computed and
///    verified, then the repair hook runs.
/// 3. If the settled state is valid and `apply_reactions` is set, every
///    reaction runs against it. Outputs are written through the context
///    tagged with [`LAW_REACTION_SOURCE`] and the law name.
///
/// Errors from steps 1 and 2, including panics, abort the execution.
/// Reaction failures are collected in the outcome instead.
pub fn execute_law(law: &UniverseLaw, execution: LawExecution<'_>) -> LawResult<LawOutcome> {
    let state = execution.state;
    let evaluation = match execution.evaluation {
        Some(evaluation) => evaluation.clone(),
        None => law.constraint.evaluate(state)?,
    };
    let mut repaired_value = None;

    if !evaluation.valid {
        debug!(law = %law.name, store = execution.store_key, failures = ?evaluation.failed_names(), "law violated");
        if let Some(hook) = &law.on_violation {
            guarded(&law.name, "violation hook", || hook(&evaluation, state))?;
        }
        if execution.attempt_repair && law.constraint.has_repair() {
            let repaired = law.constraint.repair(state)?;
            if let Some(hook) = &law.on_repair {
                guarded(&law.name, "repair hook", || hook(state, &repaired))?;
            }
            repaired_value = Some(repaired);
        }
    }

    let valid = evaluation.valid || repaired_value.is_some();
    let mut outcome = LawOutcome {
        law: law.name.clone(),
        evaluation,
        valid,
        repaired_value,
        reaction_effects: Vec::new(),
        reaction_failures: Vec::new(),
    };

    if valid && execution.apply_reactions && law.has_reactions() {
        let settled = outcome.repaired_value.clone().unwrap_or_else(|| state.clone());
        run_reactions(law, &settled, execution, &mut outcome);
    }
    Ok(outcome)
}

fn run_reactions(
    law: &UniverseLaw,
    settled: &Value,
    execution: LawExecution<'_>,
    outcome: &mut LawOutcome,
) {
    let detached = DetachedContext;
    let context: &dyn LawContext = execution.context.unwrap_or(&detached);

    for (target, reaction) in &law.reactions {
        let result = guarded(&law.name, "reaction", || reaction(settled, context)).and_then(|r| r);
        let value = match result {
            Ok(value) => value,
            Err(error) => {
                warn!(law = %law.name, target = %target, %error, "reaction failed");
                outcome.reaction_failures.push(ReactionFailure {
                    target: target.clone(),
                    error,
                });
                continue;
            }
        };

        let mut applied = false;
        if let Some(ctx) = execution.context {
            let metadata = EventMetadata::from_source(LAW_REACTION_SOURCE).with_tag(law.name.clone());
            match ctx.set_state(target.as_str(), value.clone(), metadata) {
                Ok(()) => applied = true,
                Err(error) => {
                    warn!(law = %law.name, target = %target, %error, "reaction write failed");
                    outcome.reaction_failures.push(ReactionFailure {
                        target: target.clone(),
                        error,
                    });
                    continue;
                }
            }
        }
        debug!(law = %law.name, target = %target, applied, "reaction computed");
        outcome.reaction_effects.push(ReactionEffect {
            target: target.clone(),
            value,
            applied,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MapContext;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn non_negative() -> ExistenceConstraint {
        ExistenceConstraint::new("non-negative")
            .check("value >= 0", |s| s["value"].as_i64().is_some_and(|v| v >= 0))
            .with_repair(|_| json!({"value": 0}))
    }

    fn energy_law() -> UniverseLaw {
        define_law(
            "energy-conservation",
            ExistenceConstraint::new("kinetic-defined").check("is number", Value::is_number),
            LawOptions::new().reaction("total", |kinetic, ctx| {
                let potential = ctx
                    .get_state("potential")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| LawError::execution("energy-conservation", "potential missing"))?;
                Ok(json!(kinetic.as_i64().unwrap_or(0) + potential))
            }),
        )
    }

    #[test]
    fn valid_state_passes_without_repair() {
        let law = define_law("n", non_negative(), LawOptions::new());
        let state = json!({"value": 4});
        let outcome = execute_law(&law, LawExecution::new(&state, "counter")).unwrap();
        assert!(outcome.evaluation.valid);
        assert!(outcome.valid);
        assert!(!outcome.was_repaired());
    }

    #[test]
    fn repaired_state_is_valid_after_repair() {
        let law = define_law("n", non_negative(), LawOptions::new());
        let state = json!({"value": -5});
        let outcome = execute_law(&law, LawExecution::new(&state, "counter")).unwrap();
        assert!(!outcome.evaluation.valid);
        assert!(outcome.valid);
        assert_eq!(outcome.repaired_value, Some(json!({"value": 0})));
        assert_eq!(outcome.effective_state(&state), &json!({"value": 0}));
    }

    #[test]
    fn repair_disabled_leaves_state_invalid() {
        let law = define_law("n", non_negative(), LawOptions::new());
        let state = json!({"value": -5});
        let outcome =
            execute_law(&law, LawExecution::new(&state, "counter").attempt_repair(false)).unwrap();
        assert!(!outcome.valid);
        assert!(outcome.repaired_value.is_none());
    }

    #[test]
    fn hooks_fire_on_violation_and_repair() {
        let violations = Arc::new(AtomicUsize::new(0));
        let repairs = Arc::new(AtomicUsize::new(0));
        let (v, r) = (Arc::clone(&violations), Arc::clone(&repairs));
        let law = define_law(
            "n",
            non_negative(),
            LawOptions::new()
                .on_violation(move |_, _| {
                    v.fetch_add(1, Ordering::SeqCst);
                })
                .on_repair(move |before, after| {
                    assert_eq!(before["value"], json!(-1));
                    assert_eq!(after["value"], json!(0));
                    r.fetch_add(1, Ordering::SeqCst);
                }),
        );
        let state = json!({"value": -1});
        execute_law(&law, LawExecution::new(&state, "counter")).unwrap();
        assert_eq!(violations.load(Ordering::SeqCst), 1);
        assert_eq!(repairs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reactions_write_through_context() {
        let ctx = MapContext::new()
            .with_state("potential", json!(50))
            .with_state("total", json!(150));
        let law = energy_law();
        let kinetic = json!(120);
        let outcome =
            execute_law(&law, LawExecution::new(&kinetic, "kinetic").with_context(&ctx)).unwrap();

        assert_eq!(outcome.reaction_effects.len(), 1);
        assert!(outcome.reaction_effects[0].applied);
        assert_eq!(ctx.get_state("total"), Some(json!(170)));

        let writes = ctx.writes();
        let (_, _, metadata) = &writes[0];
        assert_eq!(metadata.source.as_deref(), Some(LAW_REACTION_SOURCE));
        assert!(metadata.has_tag("energy-conservation"));
    }

    #[test]
    fn reactions_without_context_are_returned_only() {
        let law = define_law(
            "mirror",
            ExistenceConstraint::new("any"),
            LawOptions::new().reaction("copy", |s, _| Ok(s.clone())),
        );
        let state = json!({"x": 1});
        let outcome = execute_law(&law, LawExecution::new(&state, "src")).unwrap();
        assert_eq!(
            outcome.reaction_effects,
            vec![ReactionEffect {
                target: "copy".into(),
                value: json!({"x": 1}),
                applied: false,
            }]
        );
    }

    #[test]
    fn reactions_can_be_disabled() {
        let ctx = MapContext::new()
            .with_state("potential", json!(1))
            .with_state("total", json!(0));
        let kinetic = json!(1);
        let execution = LawExecution::new(&kinetic, "kinetic")
            .with_context(&ctx)
            .apply_reactions(false);
        let outcome = execute_law(&energy_law(), execution).unwrap();
        assert!(outcome.reaction_effects.is_empty());
        assert_eq!(ctx.get_state("total"), Some(json!(0)));
    }

    #[test]
    fn failing_reaction_does_not_block_others() {
        let ctx = MapContext::new().with_state("a", json!(0)).with_state("c", json!(0));
        let law = define_law(
            "fanout",
            ExistenceConstraint::new("any"),
            LawOptions::new()
                .reaction("a", |_, _| Ok(json!(1)))
                .reaction("b", |_, _| panic!("reaction bug"))
                .reaction("c", |_, _| Ok(json!(3))),
        );
        let state = json!(null);
        let outcome = execute_law(&law, LawExecution::new(&state, "src").with_context(&ctx)).unwrap();
        assert_eq!(outcome.reaction_effects.len(), 2);
        assert_eq!(outcome.reaction_failures.len(), 1);
        assert_eq!(outcome.reaction_failures[0].target, StoreKey::from("b"));
        assert_eq!(ctx.get_state("c"), Some(json!(3)));
    }

    #[test]
    fn write_to_missing_store_is_a_reaction_failure() {
        let ctx = MapContext::new();
        let law = define_law(
            "ghost",
            ExistenceConstraint::new("any"),
            LawOptions::new().reaction("nowhere", |_, _| Ok(json!(1))),
        );
        let state = json!(0);
        let outcome = execute_law(&law, LawExecution::new(&state, "src").with_context(&ctx)).unwrap();
        assert!(outcome.reaction_effects.is_empty());
        assert_eq!(
            outcome.reaction_failures[0].error,
            LawError::StoreNotFound("nowhere".into())
        );
    }

    #[test]
    fn unrepaired_violation_skips_reactions() {
        let law = define_law(
            "strict",
            ExistenceConstraint::new("never").check("no", |_| false),
            LawOptions::new().reaction("x", |_, _| Ok(json!(1))),
        );
        let state = json!(0);
        let outcome = execute_law(&law, LawExecution::new(&state, "src")).unwrap();
        assert!(!outcome.valid);
        assert!(outcome.reaction_effects.is_empty());
    }

    #[test]
    fn supplied_evaluation_is_not_recomputed() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&checks);
        let law = define_law(
            "n",
            ExistenceConstraint::new("non-negative")
                .check("value >= 0", move |s| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    s["value"].as_i64().is_some_and(|v| v >= 0)
                })
                .with_repair(|_| json!({"value": 0})),
            LawOptions::new(),
        );
        let state = json!({"value": -1});
        let evaluation = law.constraint().evaluate(&state).unwrap();
        assert_eq!(checks.load(Ordering::SeqCst), 1);

        let outcome = execute_law(
            &law,
            LawExecution::new(&state, "counter").with_evaluation(&evaluation),
        )
        .unwrap();
        assert_eq!(outcome.evaluation, evaluation);
        assert_eq!(outcome.repaired_value, Some(json!({"value": 0})));
        // Only the repair verification ran the check again.
        assert_eq!(checks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_repair_aborts_execution() {
        let law = define_law(
            "bad-repair",
            ExistenceConstraint::new("c")
                .check("no", |_| false)
                .with_repair(|_| panic!("repair bug")),
            LawOptions::new(),
        );
        let state = json!(0);
        let err = execute_law(&law, LawExecution::new(&state, "src")).unwrap_err();
        assert!(matches!(err, LawError::Panicked { stage: "repair", .. }));
    }
}
