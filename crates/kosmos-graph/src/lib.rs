//! Causal event graph for Kosmos.
//!
//! Every write to a causal store becomes an immutable [`CausalEvent`] that
//! names the event(s) that caused it. [`CausalGraph`] is the derived index
//! over those events: an arena addressed by insertion position, with forward
//! (children) and backward (parents) adjacency and a per-universe root set.
//! It answers the ancestry questions causal stores are built on: lineage
//! for time travel, descendants for "what happened because of X", and the
//! closest common ancestor for three-way merges.

pub mod error;
pub mod event;
pub mod graph;

pub use error::{GraphError, GraphResult};
pub use event::{CausalEvent, EventDraft, EventKind, EventMetadata};
pub use graph::CausalGraph;
