//! Constraints, laws and substrates for Kosmos.
//!
//! An [`ExistenceConstraint`] is a named set of [`Invariant`]s over one
//! store's value, with an optional repair. A [`UniverseLaw`] wraps a
//! constraint so it can be executed: it reports whether the state was valid,
//! computes a repaired value, and runs reactions that rewrite sibling stores
//! through a [`LawContext`]. A [`Substrate`] bundles the constraints, laws
//! and cross-store [`GlobalInvariant`]s that govern one universe.
//!
//! Everything here is pure data plus pure functions. User functions are run
//! under a panic guard, so a faulty check, repair or reaction surfaces as a
//! [`LawError`] instead of unwinding into the caller.

pub mod constraint;
pub mod context;
pub mod error;
pub mod law;
pub mod registry;
pub mod substrate;

pub use constraint::{
    ConstraintEvaluation, ExistenceConstraint, Invariant, InvariantFailure, RepairStrategy,
};
pub use context::{LawContext, MapContext};
pub use error::{LawError, LawResult};
pub use law::{
    define_law, execute_law, LawExecution, LawOptions, LawOutcome, ReactionEffect,
    ReactionFailure, UniverseLaw, LAW_REACTION_SOURCE,
};
pub use registry::LawRegistry;
pub use substrate::{GlobalInvariant, GlobalState, Substrate, SubstrateBuilder};
