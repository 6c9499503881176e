//! Authoritative signals fed in from outside the decision core.
//!
//! The host exposes a [`SignalBoard`] that a log-watching collaborator keeps
//! up to date. The [`LogWatcher`] is that collaborator for hosts that can
//! hand over the visible log as a list of lines: it diffs each snapshot
//! against the previous one and turns new lines into board updates.

use tracing::{debug, info, warn};

use crate::config::SignalsConfig;

/// Externally updated flags and counters read by combat and harvest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalBoard {
    /// A kill was credited to us since the flag was last cleared.
    pub kill_observed: bool,
    /// Most recent running kill total reported by the environment.
    pub total_kills: Option<u32>,
    /// Total before this session's first kill, fixed on the first report.
    pub kill_baseline: Option<u32>,
    /// The harvest animation started since the flag was last cleared.
    pub harvest_started: bool,
    /// The consumable needed to attack ran out. Never cleared.
    pub supplies_exhausted: bool,
}

impl SignalBoard {
    /// Record a running total. The first report fixes the baseline at one
    /// below it, since the total is only ever reported after a kill.
    pub fn record_total(&mut self, total: u32) {
        if self.kill_baseline.is_none() {
            let baseline = total.saturating_sub(1);
            self.kill_baseline = Some(baseline);
            info!(baseline, "Kill baseline established");
        }
        self.total_kills = Some(total);
    }

    /// Kills made this session according to the environment, if known.
    pub fn session_kills(&self) -> Option<u32> {
        let total = self.total_kills?;
        let baseline = self.kill_baseline?;
        Some(total.saturating_sub(baseline))
    }

    /// Clear the per-encounter flags. Totals and the supplies flag survive.
    pub const fn clear_transient(&mut self) {
        self.kill_observed = false;
        self.harvest_started = false;
    }
}

/// Turns successive snapshots of the visible log into [`SignalBoard`] updates.
#[derive(Debug, Clone)]
pub struct LogWatcher {
    kill_marker: String,
    total_marker: String,
    harvest_marker: String,
    supplies_marker: String,
    previous: Vec<String>,
}

impl LogWatcher {
    /// Create a watcher for the given markers.
    pub fn new(config: &SignalsConfig) -> Self {
        Self {
            kill_marker: config.kill_marker.to_lowercase(),
            total_marker: config.total_marker.to_lowercase(),
            harvest_marker: config.harvest_marker.to_lowercase(),
            supplies_marker: config.supplies_marker.to_lowercase(),
            previous: Vec::new(),
        }
    }

    /// Feed the current log snapshot, oldest line first.
    ///
    /// Returns the number of lines treated as new.
    pub fn observe(&mut self, snapshot: &[String], board: &mut SignalBoard) -> usize {
        let fresh = new_lines(&self.previous, snapshot);
        for line in fresh {
            self.apply(line, board);
        }
        let count = fresh.len();
        self.previous = snapshot.to_vec();
        count
    }

    fn apply(&self, line: &str, board: &mut SignalBoard) {
        let lower = line.to_lowercase();
        if lower.contains(&self.kill_marker) {
            debug!(line, "Kill marker seen");
            board.kill_observed = true;
        }
        if let Some(total) = parse_total(&lower, &self.total_marker) {
            debug!(total, "Kill total reported");
            board.record_total(total);
        }
        if lower.contains(&self.harvest_marker) {
            board.harvest_started = true;
        }
        if lower.contains(&self.supplies_marker) {
            warn!(line, "Supplies exhausted");
            board.supplies_exhausted = true;
        }
    }
}

/// Lines of `current` that follow its overlap with the tail of `previous`.
///
/// A log window scrolls: the longest suffix of the previous snapshot that is
/// also a prefix of the current one is old text. With no overlap every line
/// is new.
fn new_lines<'a>(previous: &[String], current: &'a [String]) -> &'a [String] {
    let max_overlap = previous.len().min(current.len());
    for overlap in (1..=max_overlap).rev() {
        let start = previous.len().saturating_sub(overlap);
        let tail = previous.get(start..);
        let head = current.get(..overlap);
        if tail.is_some() && tail == head {
            return current.get(overlap..).unwrap_or_default();
        }
    }
    current
}

/// Parse the number following `marker`, ignoring thousands separators.
fn parse_total(line: &str, marker: &str) -> Option<u32> {
    let (_, rest) = line.split_once(marker)?;
    let token = rest.split_whitespace().next()?;
    let digits: String = token.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}
