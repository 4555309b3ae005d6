//! Branch pointers and merge results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use kosmos_diff::MergeConflict;
use kosmos_types::{BranchId, EventId, TemporalAnchor};

/// A named head pointer into a store's event graph.
///
/// The main branch has no parent and no fork point. Every other branch
/// records the branch it was created from and the head it forked at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub parent: Option<BranchId>,
    pub fork_point: Option<EventId>,
    /// The event the next write on this branch will extend.
    pub head: EventId,
    pub created_at: TemporalAnchor,
}

impl Branch {
    pub(crate) fn main(head: EventId, created_at: TemporalAnchor) -> Self {
        Self {
            id: BranchId::main(),
            name: BranchId::MAIN.to_string(),
            parent: None,
            fork_point: None,
            head,
            created_at,
        }
    }

    /// Returns `true` for the genesis branch.
    pub fn is_main(&self) -> bool {
        self.id.is_main()
    }
}

/// How a branch is joined into the active branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// The merged branch's head value wins outright.
    Theirs,
    /// The active branch keeps its value; only the history is joined.
    Ours,
    /// Three-way structural merge against the common ancestor. Divergent
    /// edits to the same path are reported as conflicts and nothing is
    /// written.
    Manual,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Theirs => "theirs",
            Self::Ours => "ours",
            Self::Manual => "manual",
        })
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "theirs" => Ok(Self::Theirs),
            "ours" => Ok(Self::Ours),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown merge strategy: {other}")),
        }
    }
}

/// Result of a merge attempt.
///
/// A conflicted manual merge is a normal result, not an error: `success`
/// is `false`, `conflicts` lists the divergent paths, and the store is
/// left untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub success: bool,
    pub strategy: MergeStrategy,
    pub conflicts: Vec<MergeConflict>,
    /// The merge event appended on success.
    pub event_id: Option<EventId>,
}

impl MergeOutcome {
    pub(crate) fn merged(strategy: MergeStrategy, event_id: Option<EventId>) -> Self {
        Self {
            success: true,
            strategy,
            conflicts: Vec::new(),
            event_id,
        }
    }

    pub(crate) fn conflicted(conflicts: Vec<MergeConflict>) -> Self {
        Self {
            success: false,
            strategy: MergeStrategy::Manual,
            conflicts,
            event_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_and_displays() {
        for s in [MergeStrategy::Theirs, MergeStrategy::Ours, MergeStrategy::Manual] {
            assert_eq!(s.to_string().parse::<MergeStrategy>(), Ok(s));
        }
        assert!("rebase".parse::<MergeStrategy>().is_err());
    }

    #[test]
    fn strategy_serializes_lowercase() {
        let json = serde_json::to_string(&MergeStrategy::Manual).unwrap();
        assert_eq!(json, "\"manual\"");
    }

    #[test]
    fn main_branch_has_no_parent() {
        let head = EventId::from_bytes(b"genesis");
        let branch = Branch::main(head, TemporalAnchor::zero());
        assert!(branch.is_main());
        assert_eq!(branch.name, "main");
        assert!(branch.parent.is_none());
        assert!(branch.fork_point.is_none());
    }
}
