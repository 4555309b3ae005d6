//! Error types for causal store operations.

use thiserror::Error;

use kosmos_diff::DiffError;
use kosmos_graph::GraphError;
use kosmos_types::{BranchId, EventId, StoreKey, TypeError};

/// Errors produced by causal store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No branch with this id exists in the store.
    #[error("branch not found: {0}")]
    BranchNotFound(BranchId),

    /// Branch names are unique within a store.
    #[error("branch name already in use: {0}")]
    DuplicateBranch(String),

    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// The store was closed by its owner and accepts no more writes.
    #[error("store {0} is closed")]
    Closed(StoreKey),

    #[error("history is empty")]
    EmptyHistory,

    /// An imported history is internally inconsistent.
    #[error("invalid history: {0}")]
    InvalidHistory(String),

    #[error(transparent)]
    InvalidName(#[from] TypeError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
