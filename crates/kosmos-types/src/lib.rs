//! Foundation types for Kosmos.
//!
//! Every other Kosmos crate depends on `kosmos-types`. It defines the
//! identifiers that name universes, stores, branches and causal events, the
//! hybrid logical timestamps that order events within a store, and the
//! name-validation rules shared by the registries.
//!
//! # Key Types
//!
//! - [`UniverseId`] -- Caller-chosen name of a universe
//! - [`StoreKey`] -- Unique key of a store within one universe
//! - [`EventId`] -- Content-addressed identifier of a causal event (BLAKE3)
//! - [`BranchId`] -- Identifier of a named branch inside a causal store
//! - [`TemporalAnchor`] -- Hybrid Logical Clock timestamp
//! - [`HybridLogicalClock`] -- Monotonic source of [`TemporalAnchor`] values

pub mod clock;
pub mod error;
pub mod id;
pub mod names;
pub mod temporal;

pub use clock::HybridLogicalClock;
pub use error::TypeError;
pub use id::{BranchId, EventId, StoreKey, UniverseId};
pub use names::{validate_branch_name, validate_store_key, validate_universe_id};
pub use temporal::TemporalAnchor;
