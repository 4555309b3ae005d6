//! Constraint auditor for Kosmos.
//!
//! The [`ConstraintAuditor`] subscribes to the stores of one universe and,
//! on every mutation, re-validates the store against its constraint,
//! writes back a repair when one is available, executes the store's laws
//! and their cross-store reactions, and evaluates the substrate's global
//! invariants. Every violation, repair, reaction and failure is recorded as
//! a [`TelemetryEntry`] and forwarded to an optional sink.
//!
//! Writes made by the auditor are ordinary causal events distinguished by
//! their metadata source ([`AUDITOR_REPAIR_SOURCE`], [`GLOBAL_REPAIR_SOURCE`]
//! and `kosmos_law::LAW_REACTION_SOURCE`).

pub mod auditor;
pub mod config;
pub mod context;
pub mod error;
pub mod telemetry;

pub use auditor::{
    AuditorState, AuditorStats, ConstraintAuditor, ScanReport, AUDITOR_REPAIR_SOURCE,
    GLOBAL_REPAIR_SOURCE,
};
pub use config::AuditorConfig;
pub use context::RegistryContext;
pub use error::{AuditorError, AuditorResult};
pub use telemetry::{Severity, TelemetryEntry, TelemetryKind, TelemetrySink, GLOBAL_STORE_KEY};
