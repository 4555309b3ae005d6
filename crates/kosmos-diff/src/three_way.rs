//! Three-way merge of JSON values.
//!
//! Both sides are diffed against the common base. Two changes conflict when
//! their paths overlap (one is a prefix of the other) and the two sides end
//! up with different values at the shorter path. Identical edits on both
//! sides merge cleanly. Without a base every differing path is a conflict.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::ValuePath;
use crate::value_diff::{apply_change, diff_values, ValueChange};

/// A path both sides changed incompatibly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub path: ValuePath,
    pub base: Option<Value>,
    pub ours: Option<Value>,
    pub theirs: Option<Value>,
}

impl MergeConflict {
    fn at(path: ValuePath, base: Option<&Value>, ours: &Value, theirs: &Value) -> Self {
        Self {
            base: base.and_then(|b| path.lookup(b)).cloned(),
            ours: path.lookup(ours).cloned(),
            theirs: path.lookup(theirs).cloned(),
            path,
        }
    }
}

/// The result of a three-way merge.
#[derive(Clone, Debug, PartialEq)]
pub struct ThreeWayMerge {
    /// The merged value, present only when there are no conflicts.
    pub merged: Option<Value>,
    pub conflicts: Vec<MergeConflict>,
}

impl ThreeWayMerge {
    /// Returns `true` if the merge produced a value.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Merge `theirs` into `ours` relative to `base`.
pub fn three_way(base: Option<&Value>, ours: &Value, theirs: &Value) -> ThreeWayMerge {
    let Some(base) = base else {
        return unrelated(ours, theirs);
    };

    let our_changes = diff_values(base, ours).changes;
    let their_changes = diff_values(base, theirs).changes;

    let mut conflicts: BTreeMap<ValuePath, MergeConflict> = BTreeMap::new();
    let mut pending: Vec<&ValueChange> = Vec::new();

    for theirs_change in &their_changes {
        let tp = theirs_change.path();
        let mut overlapped = false;
        for ours_change in &our_changes {
            let op = ours_change.path();
            if !op.overlaps(tp) {
                continue;
            }
            overlapped = true;
            let shorter = if op.is_prefix_of(tp) { op } else { tp };
            if shorter.lookup(ours) != shorter.lookup(theirs) {
                conflicts
                    .entry(shorter.clone())
                    .or_insert_with(|| MergeConflict::at(shorter.clone(), Some(base), ours, theirs));
            }
        }
        if !overlapped {
            pending.push(theirs_change);
        }
    }

    if !conflicts.is_empty() {
        return ThreeWayMerge {
            merged: None,
            conflicts: conflicts.into_values().collect(),
        };
    }

    let mut merged = ours.clone();
    for change in pending {
        if apply_change(&mut merged, change).is_err() {
            let path = change.path().clone();
            conflicts.insert(path.clone(), MergeConflict::at(path, Some(base), ours, theirs));
        }
    }

    if conflicts.is_empty() {
        ThreeWayMerge {
            merged: Some(merged),
            conflicts: Vec::new(),
        }
    } else {
        ThreeWayMerge {
            merged: None,
            conflicts: conflicts.into_values().collect(),
        }
    }
}

fn unrelated(ours: &Value, theirs: &Value) -> ThreeWayMerge {
    let conflicts: Vec<_> = diff_values(ours, theirs)
        .changes
        .iter()
        .map(|c| MergeConflict::at(c.path().clone(), None, ours, theirs))
        .collect();
    ThreeWayMerge {
        merged: conflicts.is_empty().then(|| ours.clone()),
        conflicts,
    }
}
