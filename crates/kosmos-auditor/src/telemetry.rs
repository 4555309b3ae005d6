//! Structured audit records.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kosmos_types::{EventId, StoreKey, TemporalAnchor, UniverseId};

/// Pseudo store key under which global invariant telemetry is reported.
pub const GLOBAL_STORE_KEY: &str = "__global__";

/// Callback receiving every telemetry entry as it is recorded.
pub type TelemetrySink = Arc<dyn Fn(&TelemetryEntry) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TelemetryKind {
    Violation,
    Repair,
    Reaction,
    ReactionError,
    AuditError,
}

impl fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Violation => "violation",
            Self::Repair => "repair",
            Self::Reaction => "reaction",
            Self::ReactionError => "reaction-error",
            Self::AuditError => "audit-error",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// One audit record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub kind: TelemetryKind,
    pub timestamp: TemporalAnchor,
    /// Constraint, law or global invariant that produced the entry.
    pub law_name: String,
    /// The audited store, or [`GLOBAL_STORE_KEY`].
    pub store_key: StoreKey,
    pub universe_id: UniverseId,
    /// The event that triggered the cycle, or the repair/reaction write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl TelemetryEntry {
    pub fn new(
        kind: TelemetryKind,
        severity: Severity,
        law_name: impl Into<String>,
        store_key: impl Into<StoreKey>,
        universe_id: UniverseId,
        timestamp: TemporalAnchor,
    ) -> Self {
        Self {
            kind,
            timestamp,
            law_name: law_name.into(),
            store_key: store_key.into(),
            universe_id,
            event_id: None,
            severity,
            message: String::new(),
            details: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn event(mut self, event_id: Option<EventId>) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_global(&self) -> bool {
        self.store_key.as_str() == GLOBAL_STORE_KEY
    }
}

/// Bounded in-memory telemetry buffer.
#[derive(Debug)]
pub(crate) struct TelemetryLog {
    entries: VecDeque<TelemetryEntry>,
    capacity: usize,
}

impl TelemetryLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, entry: TelemetryEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn snapshot(&self) -> Vec<TelemetryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<TelemetryEntry> {
        self.entries.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> TelemetryEntry {
        TelemetryEntry::new(
            TelemetryKind::ReactionError,
            Severity::Error,
            "law",
            GLOBAL_STORE_KEY,
            "u".into(),
            TemporalAnchor::zero(),
        )
        .message(message)
    }

    #[test]
    fn kinds_serialize_kebab_case() {
        let json = serde_json::to_value(entry("m")).unwrap();
        assert_eq!(json["kind"], "reaction-error");
        assert_eq!(json["severity"], "error");
        assert!(json.get("event_id").is_none());
        assert_eq!(TelemetryKind::AuditError.to_string(), "audit-error");
    }

    #[test]
    fn log_drops_oldest_beyond_capacity() {
        let mut log = TelemetryLog::new(2);
        for m in ["a", "b", "c"] {
            log.push(entry(m));
        }
        let messages: Vec<_> = log.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
        assert_eq!(log.drain().len(), 2);
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn global_entries_are_flagged() {
        assert!(entry("m").is_global());
        assert!(Severity::Critical > Severity::Warning);
    }
}
