use serde::{Deserialize, Serialize};

/// Auditor behavior switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    /// Write repaired values back into the violating store.
    pub auto_repair: bool,
    /// Execute law reactions against sibling stores.
    pub apply_reactions: bool,
    /// Evaluate the substrate's global invariants after each cycle.
    pub check_global_invariants: bool,
    /// Telemetry entries kept in memory; the oldest are dropped first.
    pub telemetry_capacity: usize,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            auto_repair: true,
            apply_reactions: true,
            check_global_invariants: true,
            telemetry_capacity: 1024,
        }
    }
}

impl AuditorConfig {
    /// Report violations without writing anything.
    pub fn observe_only() -> Self {
        Self {
            auto_repair: false,
            apply_reactions: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: AuditorConfig = serde_json::from_str(r#"{"auto_repair": false}"#).unwrap();
        assert!(!config.auto_repair);
        assert!(config.apply_reactions);
        assert_eq!(config.telemetry_capacity, 1024);
    }

    #[test]
    fn observe_only_disables_writes() {
        let config = AuditorConfig::observe_only();
        assert!(!config.auto_repair && !config.apply_reactions);
        assert!(config.check_global_invariants);
    }
}
