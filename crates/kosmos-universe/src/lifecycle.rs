use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a universe.
///
/// ```text
/// Initializing --start--> Running <--pause/resume--> Paused
///        \                   |                        /
///         +-----------------destroy------------------+--> Destroyed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Initializing,
    Running,
    Paused,
    Destroyed,
}

impl LifecycleState {
    /// Returns `true` if moving from `self` to `next` is allowed.
    /// Staying in the same non-terminal state is not a transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Initializing, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Initializing | Running | Paused, Destroyed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Destroyed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn allowed_transitions() {
        assert!(Initializing.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Paused.can_transition_to(Destroyed));
    }

    #[test]
    fn rejected_transitions() {
        assert!(!Initializing.can_transition_to(Paused));
        assert!(!Running.can_transition_to(Initializing));
        assert!(!Destroyed.can_transition_to(Running));
        assert!(!Destroyed.can_transition_to(Destroyed));
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Paused).unwrap(), "\"paused\"");
        assert_eq!(Running.to_string(), "running");
    }
}
