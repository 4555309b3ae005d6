//! Causal event records.
//!
//! A [`CausalEvent`] is the immutable record of one state transition in a
//! store. Its id is derived from its causal coordinates, so an event can
//! always be checked against the id it carries ([`CausalEvent::verify_id`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kosmos_types::{EventId, StoreKey, TemporalAnchor, UniverseId};

/// The kind of state transition an event records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Genesis value of a store.
    Create,
    /// A plain write.
    Update,
    /// The first event of a new branch.
    Branch,
    /// The join of two branch heads.
    Merge,
}

impl EventKind {
    fn tag(self) -> &'static [u8] {
        match self {
            Self::Create => b"create",
            Self::Update => b"update",
            Self::Branch => b"branch",
            Self::Merge => b"merge",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Branch => "branch",
            Self::Merge => "merge",
        };
        f.write_str(s)
    }
}

/// Optional annotations attached to an event.
///
/// `source` distinguishes machine writes (e.g. `"auditor-repair"`,
/// `"law-reaction"`) from caller writes, which leave it unset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Who or what produced the write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Free-form tags for filtering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Arbitrary structured annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EventMetadata {
    /// Empty metadata.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Metadata naming the source of the write.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a structured annotation.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Returns `true` if the tag is present.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns `true` if nothing is set.
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.tags.is_empty() && self.extra.is_empty()
    }
}

/// The fields of an event before its id is derived.
#[derive(Clone, Debug)]
pub struct EventDraft<T> {
    pub universe_id: UniverseId,
    pub store_key: StoreKey,
    /// Position of the event in its store's append-only log.
    pub seq: u64,
    pub timestamp: TemporalAnchor,
    pub kind: EventKind,
    pub value: T,
    pub caused_by: Vec<EventId>,
    pub observer_id: Option<String>,
    pub metadata: EventMetadata,
}

impl<T> EventDraft<T> {
    /// Derive the event id and freeze the draft.
    pub fn seal(self) -> CausalEvent<T> {
        let id = derive_event_id(
            &self.universe_id,
            &self.store_key,
            self.seq,
            &self.timestamp,
            self.kind,
            &self.caused_by,
        );
        CausalEvent {
            id,
            timestamp: self.timestamp,
            store_key: self.store_key,
            kind: self.kind,
            value: self.value,
            caused_by: self.caused_by,
            universe_id: self.universe_id,
            seq: self.seq,
            observer_id: self.observer_id,
            metadata: self.metadata,
        }
    }
}

/// An immutable record of one state transition.
///
/// Events are never mutated once sealed. Every id in `caused_by` names an
/// event that was indexed before this one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CausalEvent<T> {
    pub id: EventId,
    pub timestamp: TemporalAnchor,
    pub store_key: StoreKey,
    pub kind: EventKind,
    pub value: T,
    pub caused_by: Vec<EventId>,
    pub universe_id: UniverseId,
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer_id: Option<String>,
    #[serde(default, skip_serializing_if = "EventMetadata::is_empty")]
    pub metadata: EventMetadata,
}

impl<T> CausalEvent<T> {
    /// Returns `true` if the event has no parents.
    pub fn is_root(&self) -> bool {
        self.caused_by.is_empty()
    }

    /// Recompute the id from the event's causal coordinates.
    pub fn computed_id(&self) -> EventId {
        derive_event_id(
            &self.universe_id,
            &self.store_key,
            self.seq,
            &self.timestamp,
            self.kind,
            &self.caused_by,
        )
    }

    /// Returns `true` if the carried id matches the computed one.
    pub fn verify_id(&self) -> bool {
        self.id == self.computed_id()
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} #{} on {}/{} ({})",
            self.kind, self.seq, self.universe_id, self.store_key, self.id
        )
    }
}

fn derive_event_id(
    universe: &UniverseId,
    store: &StoreKey,
    seq: u64,
    timestamp: &TemporalAnchor,
    kind: EventKind,
    parents: &[EventId],
) -> EventId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"kosmos-causal-event-v1:");
    hasher.update(universe.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(store.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(&seq.to_le_bytes());
    hasher.update(&timestamp.physical_ms.to_le_bytes());
    hasher.update(&timestamp.logical.to_le_bytes());
    hasher.update(&timestamp.node_id.to_le_bytes());
    hasher.update(kind.tag());
    for parent in parents {
        hasher.update(parent.as_bytes());
    }
    EventId::from_hash(*hasher.finalize().as_bytes())
}
