//! Time-bounded registry of positions excluded from targeting.
//!
//! A position lands here when it is known not to be ours to attack or
//! harvest: a harvested corpse, a rival's kill, a target that exhausted its
//! attack attempts, or a harvest-only target while harvesting is disabled.
//! Entries expire on [`IgnoreRegistry::sweep`] once strictly older than the
//! TTL; membership checks never expire anything on their own.

use std::collections::BTreeMap;

use quarry_types::{Position, PositionKey};
use tracing::debug;

/// Packed positions and the time each was ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRegistry {
    ttl_ms: u64,
    entries: BTreeMap<PositionKey, u64>,
}

impl IgnoreRegistry {
    /// Create an empty registry whose entries live for `ttl_ms`.
    pub const fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            entries: BTreeMap::new(),
        }
    }

    /// Ignore `position` from `now`. Re-ignoring refreshes the timestamp.
    pub fn insert(&mut self, position: Position, now: u64) {
        self.entries.insert(position.key(), now);
    }

    /// Whether `position` is currently ignored.
    pub fn contains(&self, position: Position) -> bool {
        self.entries.contains_key(&position.key())
    }

    /// Forget `position` early, e.g. once its corpse is verified gone.
    pub fn remove(&mut self, position: Position) -> bool {
        self.entries.remove(&position.key()).is_some()
    }

    /// Drop entries older than the TTL. Returns how many were dropped.
    pub fn sweep(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl_ms;
        self.entries
            .retain(|_, inserted| now.saturating_sub(*inserted) <= ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Expired ignored positions");
        }
        removed
    }

    /// Number of ignored positions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is ignored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    const TTL: u64 = 30_000;

    #[test]
    fn ignored_until_strictly_past_ttl() {
        let mut registry = IgnoreRegistry::new(TTL);
        let p = Position::new(100, 200, 0);
        let t0 = 5_000;
        registry.insert(p, t0);

        for t in [t0, t0 + 1, t0 + 15_000, t0 + TTL - 1, t0 + TTL] {
            assert_eq!(registry.sweep(t), 0, "swept too early at {t}");
            assert!(registry.contains(p));
        }

        assert_eq!(registry.sweep(t0 + TTL + 1), 1);
        assert!(!registry.contains(p));
        assert_eq!(registry.sweep(t0 + TTL + 2), 0);
        assert!(!registry.contains(p));
    }

    #[test]
    fn contains_does_not_expire_on_its_own() {
        let mut registry = IgnoreRegistry::new(TTL);
        let p = Position::new(1, 1, 0);
        registry.insert(p, 0);
        // No sweep: still ignored long after the TTL.
        assert!(registry.contains(p));
    }

    #[test]
    fn reinsert_refreshes_timestamp() {
        let mut registry = IgnoreRegistry::new(TTL);
        let p = Position::new(9, 9, 1);
        registry.insert(p, 0);
        registry.insert(p, 20_000);
        assert_eq!(registry.sweep(40_000), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.sweep(50_001), 1);
    }

    #[test]
    fn early_removal_and_clear() {
        let mut registry = IgnoreRegistry::new(TTL);
        let a = Position::new(1, 2, 0);
        let b = Position::new(3, 4, 0);
        registry.insert(a, 0);
        registry.insert(b, 0);
        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
        assert_eq!(registry.len(), 1);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn layers_are_distinct() {
        let mut registry = IgnoreRegistry::new(TTL);
        registry.insert(Position::new(5, 5, 0), 0);
        assert!(!registry.contains(Position::new(5, 5, 1)));
    }
}
