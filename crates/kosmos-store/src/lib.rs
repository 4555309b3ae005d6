//! Causal stores for Kosmos.
//!
//! A [`CausalStore`] wraps one logical value. Every write appends an
//! immutable [`CausalEvent`](kosmos_graph::CausalEvent) whose parent is the
//! active branch head, so the full history stays reachable for time travel,
//! branching and merging. The current value is cached at the head, which
//! keeps [`CausalStore::get`] constant-time for external pollers.
//!
//! # Key Types
//!
//! - [`CausalStore`] -- one value plus its append-only causal history
//! - [`Branch`] / [`MergeStrategy`] / [`MergeOutcome`] -- named heads and how
//!   they are joined back together
//! - [`EventQuery`] -- filter over a store's history
//! - [`HistoryExport`] -- serializable form of a store's full history
//! - [`StoreRegistry`] -- shared, keyed collection of stores

pub mod branch;
pub mod error;
pub mod export;
pub mod query;
pub mod registry;
pub mod store;

pub use branch::{Branch, MergeOutcome, MergeStrategy};
pub use error::{StoreError, StoreResult};
pub use export::HistoryExport;
pub use query::{EventQuery, SortOrder};
pub use registry::StoreRegistry;
pub use store::{CausalStore, StoreOptions, Subscriber, SubscriptionId, WriteOptions};
