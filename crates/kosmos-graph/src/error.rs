//! Error types for the causal graph.

use kosmos_types::{EventId, TemporalAnchor};

/// Errors that can occur while indexing causal events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A referenced event was not found in the graph.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// An event names a parent that has not been indexed.
    #[error("dangling parent reference: event {event} references missing parent {parent}")]
    DanglingParent {
        /// The event containing the bad reference.
        event: EventId,
        /// The missing parent.
        parent: EventId,
    },

    /// Attempted to index an event whose id is already present.
    #[error("duplicate event: {0}")]
    DuplicateEvent(EventId),

    /// A child is stamped earlier than one of its parents.
    #[error("temporal ordering violation: event {child} ({child_at}) precedes parent {parent} ({parent_at})")]
    TemporalViolation {
        /// The offending event.
        child: EventId,
        /// Its timestamp.
        child_at: TemporalAnchor,
        /// The parent stamped later than the child.
        parent: EventId,
        /// The parent's timestamp.
        parent_at: TemporalAnchor,
    },

    /// The stored id does not match the id recomputed from the event's
    /// causal coordinates.
    #[error("event id mismatch: stored {stored}, computed {computed}")]
    IdMismatch {
        /// The id carried by the event.
        stored: EventId,
        /// The id derived from its content.
        computed: EventId,
    },
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
