//! Structural diff and three-way merge for Kosmos store values.
//!
//! Values are compared as `serde_json::Value` trees. Objects are compared
//! key by key and recursed into; every other value (numbers, strings,
//! arrays, ...) is a leaf. Changes are addressed by [`ValuePath`].
//!
//! # Key Types
//!
//! - [`ValueDiff`] / [`ValueChange`] -- path-level changes between two values
//! - [`ThreeWayMerge`] / [`MergeConflict`] -- result of merging two values
//!   that diverged from a common base

pub mod error;
pub mod path;
pub mod three_way;
pub mod value_diff;

pub use error::{DiffError, DiffResult};
pub use path::ValuePath;
pub use three_way::{three_way, MergeConflict, ThreeWayMerge};
pub use value_diff::{apply_change, diff_values, ValueChange, ValueDiff};
