use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Hybrid Logical Clock timestamp for causal ordering.
///
/// Combines a physical wall-clock component with a logical counter and a
/// node identifier. Two events written in the same millisecond by the same
/// clock still receive distinct, ordered anchors.
///
/// Ordering: `physical_ms` → `logical` → `node_id` (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalAnchor {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events at the same physical time.
    pub logical: u32,
    /// Node identifier to break ties between clocks.
    pub node_id: u16,
}

impl TemporalAnchor {
    /// Create a new anchor with explicit values.
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    /// Create an anchor for the current wall-clock time.
    pub fn now(node_id: u16) -> Self {
        Self {
            physical_ms: wall_clock_ms(),
            logical: 0,
            node_id,
        }
    }

    /// The upper bound of millisecond `ms`: every anchor stamped during that
    /// millisecond compares less than or equal to it.
    ///
    /// Time-travel queries expressed in wall-clock milliseconds use this so
    /// that `at(ms)` includes every event written during `ms`.
    pub fn end_of_millis(ms: u64) -> Self {
        Self {
            physical_ms: ms,
            logical: u32::MAX,
            node_id: u16::MAX,
        }
    }

    /// The zero anchor (genesis).
    pub const fn zero() -> Self {
        Self {
            physical_ms: 0,
            logical: 0,
            node_id: 0,
        }
    }

    /// Returns `true` if this anchor is causally after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this anchor is causally before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Milliseconds elapsed between `earlier` and this anchor, saturating at zero.
    pub fn millis_since(&self, earlier: &Self) -> u64 {
        self.physical_ms.saturating_sub(earlier.physical_ms)
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub(crate) fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl PartialOrd for TemporalAnchor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TemporalAnchor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl fmt::Debug for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TemporalAnchor({}ms.{}.n{})",
            self.physical_ms, self.logical, self.node_id
        )
    }
}

impl fmt::Display for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.n{}", self.physical_ms, self.logical, self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_physical_first() {
        let a = TemporalAnchor::new(100, 5, 1);
        let b = TemporalAnchor::new(200, 0, 0);
        assert!(a < b);
    }

    #[test]
    fn ordering_logical_then_node() {
        assert!(TemporalAnchor::new(100, 1, 9) < TemporalAnchor::new(100, 2, 0));
        assert!(TemporalAnchor::new(100, 1, 1) < TemporalAnchor::new(100, 1, 2));
    }

    #[test]
    fn end_of_millis_bounds_the_millisecond() {
        let bound = TemporalAnchor::end_of_millis(500);
        assert!(TemporalAnchor::new(500, 12, 3) <= bound);
        assert!(TemporalAnchor::new(501, 0, 0) > bound);
    }

    #[test]
    fn now_produces_reasonable_timestamp() {
        let anchor = TemporalAnchor::now(0);
        // After 2020-01-01.
        assert!(anchor.physical_ms > 1_577_836_800_000);
        assert_eq!(anchor.logical, 0);
    }

    #[test]
    fn millis_since_saturates() {
        let a = TemporalAnchor::new(100, 0, 0);
        let b = TemporalAnchor::new(250, 0, 0);
        assert_eq!(b.millis_since(&a), 150);
        assert_eq!(a.millis_since(&b), 0);
    }

    #[test]
    fn display_format() {
        let anchor = TemporalAnchor::new(1000, 5, 3);
        assert_eq!(format!("{anchor}"), "1000.5.n3");
    }

    #[test]
    fn serde_roundtrip() {
        let anchor = TemporalAnchor::new(1234567890, 42, 7);
        let json = serde_json::to_string(&anchor).unwrap();
        let parsed: TemporalAnchor = serde_json::from_str(&json).unwrap();
        assert_eq!(anchor, parsed);
    }
}
