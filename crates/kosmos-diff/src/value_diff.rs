//! Path-level diff between two JSON values.
//!
//! When both sides are objects the diff recurses key by key; anywhere else
//! a difference is reported as a single change at that path. Keys present
//! only in `new` are `Added`, keys present only in `old` are `Removed`.

use serde_json::Value;

use crate::error::{DiffError, DiffResult};
use crate::path::ValuePath;

/// The result of comparing two values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueDiff {
    /// Changes in depth-first key order.
    pub changes: Vec<ValueChange>,
}

impl ValueDiff {
    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Number of added keys.
    pub fn additions(&self) -> usize {
        self.count(|c| matches!(c, ValueChange::Added { .. }))
    }

    /// Number of removed keys.
    pub fn removals(&self) -> usize {
        self.count(|c| matches!(c, ValueChange::Removed { .. }))
    }

    /// Number of modified paths.
    pub fn modifications(&self) -> usize {
        self.count(|c| matches!(c, ValueChange::Modified { .. }))
    }

    /// Paths touched by this diff.
    pub fn paths(&self) -> impl Iterator<Item = &ValuePath> {
        self.changes.iter().map(ValueChange::path)
    }

    fn count(&self, pred: impl Fn(&ValueChange) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(c)).count()
    }
}

/// A single change between two values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueChange {
    Added { path: ValuePath, value: Value },
    Removed { path: ValuePath, value: Value },
    Modified {
        path: ValuePath,
        old: Value,
        new: Value,
    },
}

impl ValueChange {
    /// The path this change applies to.
    pub fn path(&self) -> &ValuePath {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }

    /// The value at the path after the change (`None` for removals).
    pub fn new_value(&self) -> Option<&Value> {
        match self {
            Self::Added { value, .. } => Some(value),
            Self::Removed { .. } => None,
            Self::Modified { new, .. } => Some(new),
        }
    }
}

/// Compute the diff between two values.
pub fn diff_values(old: &Value, new: &Value) -> ValueDiff {
    let mut changes = Vec::new();
    diff_into(&ValuePath::root(), old, new, &mut changes);
    ValueDiff { changes }
}

fn diff_into(path: &ValuePath, old: &Value, new: &Value, changes: &mut Vec<ValueChange>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_val) in old_map {
                match new_map.get(key) {
                    Some(new_val) => diff_into(&path.child(key), old_val, new_val, changes),
                    None => changes.push(ValueChange::Removed {
                        path: path.child(key),
                        value: old_val.clone(),
                    }),
                }
            }
            for (key, new_val) in new_map {
                if !old_map.contains_key(key) {
                    changes.push(ValueChange::Added {
                        path: path.child(key),
                        value: new_val.clone(),
                    });
                }
            }
        }
        _ if old != new => changes.push(ValueChange::Modified {
            path: path.clone(),
            old: old.clone(),
            new: new.clone(),
        }),
        _ => {}
    }
}

/// Apply one change to `target` in place.
///
/// Every segment but the last must resolve to an object in `target`.
pub fn apply_change(target: &mut Value, change: &ValueChange) -> DiffResult<()> {
    let path = change.path();
    let Some((last, parents)) = path.segments().split_last() else {
        return match change.new_value() {
            Some(value) => {
                *target = value.clone();
                Ok(())
            }
            None => Err(DiffError::RemoveRoot),
        };
    };

    let mut node = target;
    for key in parents {
        node = node
            .as_object_mut()
            .and_then(|map| map.get_mut(key))
            .ok_or_else(|| DiffError::PathNotFound(path.clone()))?;
    }
    let map = node
        .as_object_mut()
        .ok_or_else(|| DiffError::PathNotFound(path.clone()))?;
    match change.new_value() {
        Some(value) => {
            map.insert(last.clone(), value.clone());
        }
        None => {
            map.remove(last);
        }
    }
    Ok(())
}
