use kosmos_auditor::AuditorError;
use kosmos_store::StoreError;
use kosmos_types::{StoreKey, TypeError, UniverseId};
use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Errors from universe and multiverse operations.
#[derive(Debug, Error)]
pub enum UniverseError {
    /// A store with this key already exists in the universe.
    #[error("store already exists: {0}")]
    DuplicateStoreKey(StoreKey),

    #[error("store not found: {0}")]
    StoreNotFound(StoreKey),

    /// A snapshot taken from another universe was restored.
    #[error("snapshot of {found} cannot be restored into {expected}")]
    UniverseMismatch {
        expected: UniverseId,
        found: UniverseId,
    },

    /// The universe was destroyed; no further lifecycle calls are accepted.
    #[error("universe destroyed: {0}")]
    UniverseDestroyed(UniverseId),

    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// A universe with this id is already in the multiverse.
    #[error("universe already registered: {0}")]
    DuplicateUniverse(UniverseId),

    #[error("universe not found: {0}")]
    UniverseNotFound(UniverseId),

    #[error(transparent)]
    InvalidName(#[from] TypeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("auditor error: {0}")]
    Auditor(#[from] AuditorError),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for UniverseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for UniverseError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for UniverseError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type UniverseResult<T> = Result<T, UniverseError>;
