use std::sync::{Mutex, PoisonError};

use crate::temporal::{wall_clock_ms, TemporalAnchor};

/// Last anchor handed out by a clock.
#[derive(Debug)]
struct ClockState {
    physical_ms: u64,
    logical: u32,
}

/// Hybrid Logical Clock stamping causal events.
///
/// Every causal store owns one clock, which makes per-store timestamps
/// strictly increasing even when the wall clock stalls or steps backwards.
///
/// # Rules
///
/// - **Local tick**: `physical = max(wall, last.physical)`; the logical
///   counter resets when physical advances and increments otherwise.
/// - **Observe**: `physical = max(wall, last.physical, seen.physical)`; the
///   logical counter ends strictly above every tied input.
#[derive(Debug)]
pub struct HybridLogicalClock {
    node_id: u16,
    state: Mutex<ClockState>,
}

impl HybridLogicalClock {
    /// Create a new clock for the given node.
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            state: Mutex::new(ClockState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    /// Produce an anchor strictly greater than every anchor this clock has
    /// produced or observed before.
    pub fn now(&self) -> TemporalAnchor {
        let wall = wall_clock_ms();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let physical = wall.max(state.physical_ms);
        let logical = if physical > state.physical_ms {
            0
        } else {
            state.logical.saturating_add(1)
        };

        state.physical_ms = physical;
        state.logical = logical;
        TemporalAnchor::new(physical, logical, self.node_id)
    }

    /// Fold an externally produced anchor (e.g. from imported history) into
    /// the clock and return a fresh anchor that is later than both.
    pub fn update(&self, seen: &TemporalAnchor) -> TemporalAnchor {
        let wall = wall_clock_ms();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let physical = wall.max(state.physical_ms).max(seen.physical_ms);
        let local_tied = physical == state.physical_ms;
        let seen_tied = physical == seen.physical_ms;
        let logical = match (local_tied, seen_tied) {
            (true, true) => state.logical.max(seen.logical).saturating_add(1),
            (true, false) => state.logical.saturating_add(1),
            (false, true) => seen.logical.saturating_add(1),
            (false, false) => 0,
        };

        state.physical_ms = physical;
        state.logical = logical;
        TemporalAnchor::new(physical, logical, self.node_id)
    }

    /// The node identifier this clock stamps into its anchors.
    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn pin(clock: &HybridLogicalClock, physical_ms: u64, logical: u32) {
        let mut state = clock.state.lock().unwrap();
        state.physical_ms = physical_ms;
        state.logical = logical;
    }

    #[test]
    fn strictly_monotonic_across_rapid_calls() {
        let clock = HybridLogicalClock::new(1);
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev, "clock went backwards: {prev:?} >= {next:?}");
            prev = next;
        }
    }

    #[test]
    fn logical_counter_increments_when_wall_clock_stalls() {
        let clock = HybridLogicalClock::new(1);
        pin(&clock, u64::MAX, 0);
        let t1 = clock.now();
        let t2 = clock.now();
        assert_eq!(t1.physical_ms, u64::MAX);
        assert_eq!(t1.logical, 1);
        assert_eq!(t2.logical, 2);
    }

    #[test]
    fn update_moves_past_future_anchor() {
        let clock = HybridLogicalClock::new(1);
        let seen = TemporalAnchor::new(u64::MAX - 1, 10, 2);
        let updated = clock.update(&seen);
        assert!(updated > seen);
        assert!(clock.now() > updated);
    }

    #[test]
    fn update_with_full_tie_takes_max_logical() {
        let clock = HybridLogicalClock::new(1);
        pin(&clock, u64::MAX, 5);
        let updated = clock.update(&TemporalAnchor::new(u64::MAX, 10, 2));
        assert_eq!(updated.logical, 11);
        assert_eq!(updated.node_id, 1);
    }

    #[test]
    fn concurrent_ticks_are_unique() {
        let clock = Arc::new(HybridLogicalClock::new(3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..100).map(|_| clock.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<TemporalAnchor> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let len = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), len);
    }
}
