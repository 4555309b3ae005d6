//! Filters over a store's event history.

use serde::{Deserialize, Serialize};

use kosmos_graph::{CausalEvent, EventKind};
use kosmos_types::{TemporalAnchor, UniverseId};

/// Result ordering by timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A conjunctive filter over causal events.
///
/// Unset criteria match everything. `tags` requires every listed tag to be
/// present; `kinds` matches any of the listed kinds. The time range is
/// inclusive at both ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub universe: Option<UniverseId>,
    pub observer: Option<String>,
    pub kinds: Vec<EventKind>,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub since: Option<TemporalAnchor>,
    pub until: Option<TemporalAnchor>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl EventQuery {
    /// A query matching every event.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn universe(mut self, universe: impl Into<UniverseId>) -> Self {
        self.universe = Some(universe.into());
        self
    }

    pub fn observer(mut self, observer: impl Into<String>) -> Self {
        self.observer = Some(observer.into());
        self
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Only events whose metadata names this source.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn since(mut self, at: TemporalAnchor) -> Self {
        self.since = Some(at);
        self
    }

    pub fn until(mut self, at: TemporalAnchor) -> Self {
        self.until = Some(at);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if the event satisfies every criterion.
    pub fn matches<T>(&self, event: &CausalEvent<T>) -> bool {
        if let Some(ref universe) = self.universe {
            if &event.universe_id != universe {
                return false;
            }
        }
        if let Some(ref observer) = self.observer {
            if event.observer_id.as_deref() != Some(observer.as_str()) {
                return false;
            }
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.tags.iter().all(|t| event.metadata.has_tag(t)) {
            return false;
        }
        if let Some(ref source) = self.source {
            if event.metadata.source.as_deref() != Some(source.as_str()) {
                return false;
            }
        }
        if let Some(ref since) = self.since {
            if event.timestamp.is_before(since) {
                return false;
            }
        }
        if let Some(ref until) = self.until {
            if event.timestamp.is_after(until) {
                return false;
            }
        }
        true
    }

    /// Filter, sort and cap a set of events.
    pub fn apply<'a, T: Clone + 'a>(
        &self,
        events: impl IntoIterator<Item = &'a CausalEvent<T>>,
    ) -> Vec<CausalEvent<T>> {
        let mut hits: Vec<&CausalEvent<T>> =
            events.into_iter().filter(|e| self.matches(*e)).collect();
        hits.sort_by_key(|e| (e.timestamp, e.seq));
        if self.order == SortOrder::Descending {
            hits.reverse();
        }
        if let Some(limit) = self.limit {
            hits.truncate(limit);
        }
        hits.into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kosmos_graph::{EventDraft, EventMetadata};
    use kosmos_types::StoreKey;

    fn event(seq: u64, ts: u64, kind: EventKind, metadata: EventMetadata) -> CausalEvent<i32> {
        EventDraft {
            universe_id: UniverseId::from(if seq % 2 == 0 { "even" } else { "odd" }),
            store_key: StoreKey::from("k"),
            seq,
            timestamp: TemporalAnchor::new(ts, 0, 0),
            kind,
            value: seq as i32,
            caused_by: Vec::new(),
            observer_id: (seq == 3).then(|| "alice".to_string()),
            metadata,
        }
        .seal()
    }

    fn sample() -> Vec<CausalEvent<i32>> {
        vec![
            event(0, 100, EventKind::Create, EventMetadata::empty()),
            event(1, 200, EventKind::Update, EventMetadata::from_source("auditor-repair").with_tag("non-negative")),
            event(2, 300, EventKind::Update, EventMetadata::empty().with_tag("x")),
            event(3, 400, EventKind::Merge, EventMetadata::from_source("law-reaction").with_tag("x").with_tag("y")),
        ]
    }

    fn seqs(events: &[CausalEvent<i32>]) -> Vec<u64> {
        events.iter().map(|e| e.seq).collect()
    }

    #[test]
    fn empty_query_matches_all_ascending() {
        let events = sample();
        assert_eq!(seqs(&EventQuery::new().apply(&events)), vec![0, 1, 2, 3]);
    }

    #[test]
    fn descending_with_limit() {
        let events = sample();
        let q = EventQuery::new().order(SortOrder::Descending).limit(2);
        assert_eq!(seqs(&q.apply(&events)), vec![3, 2]);
    }

    #[test]
    fn filter_by_universe_and_kind() {
        let events = sample();
        assert_eq!(seqs(&EventQuery::new().universe("odd").apply(&events)), vec![1, 3]);
        let q = EventQuery::new().kinds([EventKind::Create, EventKind::Merge]);
        assert_eq!(seqs(&q.apply(&events)), vec![0, 3]);
    }

    #[test]
    fn tags_are_conjunctive() {
        let events = sample();
        assert_eq!(seqs(&EventQuery::new().tag("x").apply(&events)), vec![2, 3]);
        assert_eq!(seqs(&EventQuery::new().tag("x").tag("y").apply(&events)), vec![3]);
    }

    #[test]
    fn filter_by_source_and_observer() {
        let events = sample();
        assert_eq!(seqs(&EventQuery::new().source("auditor-repair").apply(&events)), vec![1]);
        assert_eq!(seqs(&EventQuery::new().observer("alice").apply(&events)), vec![3]);
    }

    #[test]
    fn time_range_is_inclusive() {
        let events = sample();
        let q = EventQuery::new()
            .since(TemporalAnchor::new(200, 0, 0))
            .until(TemporalAnchor::new(300, 0, 0));
        assert_eq!(seqs(&q.apply(&events)), vec![1, 2]);
    }
}
