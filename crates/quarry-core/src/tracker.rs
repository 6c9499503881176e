//! Bounded spawn-order tracker of believed-live targets.
//!
//! The locator gives no stable identity, so a target is its position. The
//! tracker keeps at most `capacity` of them, oldest first; the oldest
//! survivor is served first because it has waited longest and is the most
//! likely to despawn next.

use quarry_types::Position;
use tracing::debug;

use crate::ignore::IgnoreRegistry;

/// A position believed to host a live target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedTarget {
    /// Where the target was seen.
    pub position: Position,
    /// When it was first seen.
    pub first_seen_ms: u64,
}

impl TrackedTarget {
    /// Time since the target was first seen.
    pub const fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.first_seen_ms)
    }
}

/// Tracked targets in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTracker {
    capacity: usize,
    stale_after_ms: u64,
    targets: Vec<TrackedTarget>,
}

impl TargetTracker {
    /// Create an empty tracker.
    pub const fn new(capacity: usize, stale_after_ms: u64) -> Self {
        Self {
            capacity,
            stale_after_ms,
            targets: Vec::new(),
        }
    }

    /// Start tracking `position`. No-op when already tracked or full.
    /// Returns whether the target was added.
    pub fn track(&mut self, position: Position, now: u64) -> bool {
        if self.contains(position) || self.targets.len() >= self.capacity {
            return false;
        }
        self.targets.push(TrackedTarget {
            position,
            first_seen_ms: now,
        });
        // Stable: equal timestamps keep insertion order.
        self.targets.sort_by_key(|t| t.first_seen_ms);
        debug!(%position, tracked = self.targets.len(), "Tracking target");
        true
    }

    /// Evict stale and ignored targets, then return the oldest survivor.
    pub fn next_target(&mut self, now: u64, ignore: &IgnoreRegistry) -> Option<Position> {
        self.remove_stale(now);
        self.evict_ignored(ignore);
        self.targets.first().map(|t| t.position)
    }

    /// Drop targets older than the staleness threshold.
    pub fn remove_stale(&mut self, now: u64) -> usize {
        let limit = self.stale_after_ms;
        let before = self.targets.len();
        self.targets.retain(|t| t.age_ms(now) <= limit);
        before.saturating_sub(self.targets.len())
    }

    /// Drop targets whose position is ignored.
    pub fn evict_ignored(&mut self, ignore: &IgnoreRegistry) -> usize {
        let before = self.targets.len();
        self.targets.retain(|t| !ignore.contains(t.position));
        before.saturating_sub(self.targets.len())
    }

    /// Stop tracking `position`.
    pub fn remove(&mut self, position: Position) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| t.position != position);
        self.targets.len() < before
    }

    /// Whether `position` is tracked.
    pub fn contains(&self, position: Position) -> bool {
        self.targets.iter().any(|t| t.position == position)
    }

    /// Tracked targets, oldest first.
    pub fn targets(&self) -> &[TrackedTarget] {
        &self.targets
    }

    /// Number of tracked targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: u16) -> Position {
        Position::new(x, 10, 0)
    }

    #[test]
    fn capacity_keeps_the_first_three() {
        let mut tracker = TargetTracker::new(3, 10_000);
        assert!(tracker.track(pos(1), 0));
        assert!(tracker.track(pos(2), 10));
        assert!(tracker.track(pos(3), 20));
        assert!(!tracker.track(pos(4), 30));
        assert_eq!(tracker.len(), 3);
        assert!(tracker.contains(pos(1)));
        assert!(tracker.contains(pos(2)));
        assert!(tracker.contains(pos(3)));
        assert!(!tracker.contains(pos(4)));
    }

    #[test]
    fn retracking_is_a_no_op() {
        let mut tracker = TargetTracker::new(3, 10_000);
        assert!(tracker.track(pos(1), 0));
        assert!(!tracker.track(pos(1), 500));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.targets().first().map(|t| t.first_seen_ms), Some(0));
    }

    #[test]
    fn oldest_survivor_is_served_first() {
        let mut tracker = TargetTracker::new(3, 10_000);
        let ignore = IgnoreRegistry::new(30_000);
        tracker.track(pos(1), 100);
        tracker.track(pos(2), 200);
        assert_eq!(tracker.next_target(300, &ignore), Some(pos(1)));
    }

    #[test]
    fn stale_and_ignored_targets_are_evicted_before_selection() {
        let mut tracker = TargetTracker::new(3, 10_000);
        let mut ignore = IgnoreRegistry::new(30_000);
        tracker.track(pos(1), 0);
        tracker.track(pos(2), 5_000);
        tracker.track(pos(3), 6_000);
        ignore.insert(pos(2), 6_000);

        assert_eq!(tracker.next_target(10_001, &ignore), Some(pos(3)));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn staleness_boundary_is_strict() {
        let mut tracker = TargetTracker::new(3, 10_000);
        tracker.track(pos(1), 0);
        assert_eq!(tracker.remove_stale(10_000), 0);
        assert_eq!(tracker.remove_stale(10_001), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn remove_frees_capacity() {
        let mut tracker = TargetTracker::new(1, 10_000);
        tracker.track(pos(1), 0);
        assert!(!tracker.track(pos(2), 1));
        assert!(tracker.remove(pos(1)));
        assert!(tracker.track(pos(2), 2));
    }
}
