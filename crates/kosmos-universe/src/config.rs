use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kosmos_auditor::AuditorConfig;
use kosmos_law::Substrate;
use kosmos_types::UniverseId;

use crate::error::UniverseResult;

/// Metadata key naming the universe a fork was taken from.
pub const FORKED_FROM_KEY: &str = "forkedFrom";

/// Configuration of one universe.
///
/// ```toml
/// id = "sim-1"
/// name = "Simulation"
/// node_id = 3
///
/// [metadata]
/// owner = "physics"
///
/// [auditor]
/// auto_repair = false
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniverseConfig {
    pub id: UniverseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Node id stamped into the timestamps of this universe's stores.
    #[serde(default)]
    pub node_id: u16,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub auditor: AuditorConfig,
}

impl UniverseConfig {
    pub fn new(id: impl Into<UniverseId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            node_id: 0,
            metadata: BTreeMap::new(),
            auditor: AuditorConfig::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_auditor(mut self, auditor: AuditorConfig) -> Self {
        self.auditor = auditor;
        self
    }

    pub fn from_toml_str(s: &str) -> UniverseResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> UniverseResult<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Overrides applied by [`UniverseManager::fork`](crate::UniverseManager::fork).
///
/// Unset fields are inherited from the source universe. `metadata` is
/// merged over the source's metadata.
#[derive(Clone, Debug, Default)]
pub struct ForkOptions {
    pub name: Option<String>,
    pub metadata: BTreeMap<String, Value>,
    pub substrate: Option<Arc<Substrate>>,
    pub auditor: Option<AuditorConfig>,
}

impl ForkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn substrate(mut self, substrate: Arc<Substrate>) -> Self {
        self.substrate = Some(substrate);
        self
    }

    pub fn auditor(mut self, auditor: AuditorConfig) -> Self {
        self.auditor = Some(auditor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_toml_takes_defaults() {
        let config = UniverseConfig::from_toml_str(r#"id = "u1""#).unwrap();
        assert_eq!(config, UniverseConfig::new("u1"));
        assert!(config.auditor.auto_repair);
    }

    #[test]
    fn full_toml() {
        let config = UniverseConfig::from_toml_str(
            r#"
            id = "sim-1"
            name = "Simulation"
            node_id = 3

            [metadata]
            owner = "physics"

            [auditor]
            auto_repair = false
            "#,
        )
        .unwrap();
        assert_eq!(config.name.as_deref(), Some("Simulation"));
        assert_eq!(config.node_id, 3);
        assert_eq!(config.metadata["owner"], json!("physics"));
        assert!(!config.auditor.auto_repair);
        assert!(config.auditor.apply_reactions);
    }

    #[test]
    fn toml_round_trip() {
        let config = UniverseConfig::new("u1")
            .with_name("One")
            .with_metadata("seed", json!(42))
            .with_auditor(AuditorConfig::observe_only());
        let text = config.to_toml_string().unwrap();
        assert_eq!(UniverseConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_id_is_config_error() {
        assert!(matches!(
            UniverseConfig::from_toml_str("name = \"x\""),
            Err(crate::UniverseError::Config(_))
        ));
    }
}
