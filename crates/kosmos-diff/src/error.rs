//! Error types for the diff crate.

use crate::path::ValuePath;

/// Errors that can occur while applying changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// An intermediate segment of the path is missing or not an object.
    #[error("path not found: {0}")]
    PathNotFound(ValuePath),

    /// The root of a value cannot be removed.
    #[error("cannot remove the root value")]
    RemoveRoot,
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
