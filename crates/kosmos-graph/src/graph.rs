//! The causal graph index and its traversal algorithms.
//!
//! [`CausalGraph`] stores events in an arena (`Vec`) addressed by insertion
//! position. Parent and child edges are kept as position lists, so events
//! never hold references to each other and the graph is trivially `Clone`.
//!
//! # Invariants
//!
//! - Every parent of an event is indexed before the event itself, so
//!   insertion order is a topological order.
//! - Event ids are unique within the graph.
//! - A child is never stamped earlier than any of its parents.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::debug;

use kosmos_types::{EventId, UniverseId};

use crate::error::{GraphError, GraphResult};
use crate::event::CausalEvent;

/// Derived index over a set of causal events.
#[derive(Clone, Debug)]
pub struct CausalGraph<T> {
    events: Vec<CausalEvent<T>>,
    positions: HashMap<EventId, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    roots: BTreeMap<UniverseId, Vec<usize>>,
}

impl<T> Default for CausalGraph<T> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            positions: HashMap::new(),
            parents: Vec::new(),
            children: Vec::new(),
            roots: BTreeMap::new(),
        }
    }
}

impl<T> CausalGraph<T> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from events listed parents-first.
    ///
    /// Rebuilding from the same list always yields the same index. Fails on
    /// the first event whose parents are not already present.
    pub fn rebuild(events: impl IntoIterator<Item = CausalEvent<T>>) -> GraphResult<Self> {
        let mut graph = Self::new();
        for event in events {
            graph.insert(event)?;
        }
        Ok(graph)
    }

    /// Total number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if no events are indexed.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Index a new event.
    ///
    /// Rejects duplicate ids, parents that are not yet indexed, and children
    /// stamped before a parent.
    pub fn insert(&mut self, event: CausalEvent<T>) -> GraphResult<()> {
        if self.positions.contains_key(&event.id) {
            return Err(GraphError::DuplicateEvent(event.id));
        }

        let mut parent_positions = Vec::with_capacity(event.caused_by.len());
        for parent in &event.caused_by {
            let Some(&pos) = self.positions.get(parent) else {
                return Err(GraphError::DanglingParent {
                    event: event.id,
                    parent: *parent,
                });
            };
            let parent_event = &self.events[pos];
            if event.timestamp < parent_event.timestamp {
                return Err(GraphError::TemporalViolation {
                    child: event.id,
                    child_at: event.timestamp,
                    parent: parent_event.id,
                    parent_at: parent_event.timestamp,
                });
            }
            if !parent_positions.contains(&pos) {
                parent_positions.push(pos);
            }
        }

        let pos = self.events.len();
        for &parent in &parent_positions {
            self.children[parent].push(pos);
        }
        if parent_positions.is_empty() {
            self.roots
                .entry(event.universe_id.clone())
                .or_default()
                .push(pos);
        }

        debug!(event = %event.id, seq = event.seq, kind = %event.kind, "indexed causal event");
        self.positions.insert(event.id, pos);
        self.parents.push(parent_positions);
        self.children.push(Vec::new());
        self.events.push(event);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Retrieve an event by id.
    pub fn get(&self, id: &EventId) -> Option<&CausalEvent<T>> {
        self.positions.get(id).map(|&pos| &self.events[pos])
    }

    /// Returns `true` if the event is indexed.
    pub fn contains(&self, id: &EventId) -> bool {
        self.positions.contains_key(id)
    }

    /// All events in insertion order (which is a topological order).
    pub fn events(&self) -> &[CausalEvent<T>] {
        &self.events
    }

    /// The most recently indexed event.
    pub fn last(&self) -> Option<&CausalEvent<T>> {
        self.events.last()
    }

    /// Consume the graph, returning its events parents-first.
    pub fn into_events(self) -> Vec<CausalEvent<T>> {
        self.events
    }

    /// Event ids in a parents-first order.
    pub fn topological_order(&self) -> Vec<EventId> {
        self.events.iter().map(|e| e.id).collect()
    }

    /// Direct parents of an event.
    pub fn parents(&self, id: &EventId) -> Vec<&CausalEvent<T>> {
        self.adjacent(id, &self.parents)
    }

    /// Direct children of an event.
    pub fn children(&self, id: &EventId) -> Vec<&CausalEvent<T>> {
        self.adjacent(id, &self.children)
    }

    /// Root events recorded for the given universe.
    pub fn roots(&self, universe: &UniverseId) -> Vec<&CausalEvent<T>> {
        self.roots
            .get(universe)
            .map(|positions| positions.iter().map(|&p| &self.events[p]).collect())
            .unwrap_or_default()
    }

    /// Universes that have at least one root in this graph.
    pub fn universes(&self) -> Vec<&UniverseId> {
        self.roots.keys().collect()
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// Every ancestor of `id`, optionally including `id` itself, in
    /// insertion (causal) order. Empty if `id` is unknown.
    pub fn ancestors(&self, id: &EventId, inclusive: bool) -> Vec<&CausalEvent<T>> {
        self.closure(id, &self.parents, inclusive)
    }

    /// Every transitive descendant of `id`, in insertion (causal) order.
    /// The event itself is not included.
    pub fn descendants(&self, id: &EventId) -> Vec<&CausalEvent<T>> {
        self.closure(id, &self.children, false)
    }

    /// Returns `true` if `ancestor` is `id` or lies on its ancestry.
    pub fn is_ancestor(&self, ancestor: &EventId, id: &EventId) -> bool {
        match (self.positions.get(ancestor), self.positions.get(id)) {
            (Some(&a), Some(&b)) => self.reach(b, &self.parents)[a],
            _ => false,
        }
    }

    /// The closest event reachable from both `a` and `b`.
    ///
    /// Computes both inclusive ancestor sets and picks the shared event with
    /// the latest timestamp (insertion position breaks ties). Returns `None`
    /// if either id is unknown or the two are causally disjoint.
    pub fn common_ancestor(&self, a: &EventId, b: &EventId) -> Option<&CausalEvent<T>> {
        let &pa = self.positions.get(a)?;
        let &pb = self.positions.get(b)?;
        if pa == pb {
            return Some(&self.events[pa]);
        }

        let from_a = self.reach(pa, &self.parents);
        let from_b = self.reach(pb, &self.parents);

        (0..self.events.len())
            .filter(|&p| from_a[p] && from_b[p])
            .max_by_key(|&p| (self.events[p].timestamp, p))
            .map(|p| &self.events[p])
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Check the structural integrity of the index.
    ///
    /// Verifies that parent positions match each event's `caused_by`, that
    /// every parent precedes its child, and that the child index mirrors the
    /// parent index.
    pub fn validate(&self) -> GraphResult<()> {
        for (pos, event) in self.events.iter().enumerate() {
            for parent in &event.caused_by {
                match self.positions.get(parent) {
                    Some(&pp) if pp < pos && self.children[pp].contains(&pos) => {}
                    _ => {
                        return Err(GraphError::DanglingParent {
                            event: event.id,
                            parent: *parent,
                        })
                    }
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn adjacent(&self, id: &EventId, edges: &[Vec<usize>]) -> Vec<&CausalEvent<T>> {
        self.positions
            .get(id)
            .map(|&pos| edges[pos].iter().map(|&p| &self.events[p]).collect())
            .unwrap_or_default()
    }

    fn closure(&self, id: &EventId, edges: &[Vec<usize>], inclusive: bool) -> Vec<&CausalEvent<T>> {
        let Some(&start) = self.positions.get(id) else {
            return Vec::new();
        };
        let mut seen = self.reach(start, edges);
        if !inclusive {
            seen[start] = false;
        }
        seen.iter()
            .enumerate()
            .filter(|(_, hit)| **hit)
            .map(|(p, _)| &self.events[p])
            .collect()
    }

    /// Breadth-first reachability from `start` along `edges`, including
    /// `start` itself.
    fn reach(&self, start: usize, edges: &[Vec<usize>]) -> Vec<bool> {
        let mut seen = vec![false; self.events.len()];
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        while let Some(current) = queue.pop_front() {
            for &next in &edges[current] {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        seen
    }
}
