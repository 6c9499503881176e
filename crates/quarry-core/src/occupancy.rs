//! Detection of rival agents competing for the same targets.
//!
//! Two kinds of evidence raise the interference signal:
//!
//! - **Lingering**: a foreign agent stays inside the detection radius for
//!   longer than the linger threshold. Positions within the self-exclusion
//!   distance are our own marker rendered off-centre and never count.
//! - **Rival engagement**: a target health bar appears on screen while we
//!   are not fighting and did not just attack. Someone else is fighting
//!   here; the target they fight is ignored.
//!
//! A one-shot occupied check with a larger radius runs once on arrival,
//! after the start-up or post-relocation grace period has passed.
//!
//! [`watch`] runs every frame of every bounded wait, so all of this is
//! cheap bookkeeping between host queries.

use std::collections::BTreeMap;

use quarry_types::{Position, PositionKey, ScreenPoint};
use tracing::{debug, warn};

use crate::config::{HuntConfig, OccupancyConfig};
use crate::host::{Clock, EntityLocator, ScreenProjector, VisualDetector};
use crate::state::HuntState;

/// A foreign agent inside the detection radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignPresence {
    /// Where the agent currently is.
    pub position: Position,
    /// When an agent was first seen at or next to this position.
    pub first_seen_ms: u64,
}

impl ForeignPresence {
    /// Time the agent has been lingering.
    pub const fn linger_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.first_seen_ms)
    }
}

/// Linger tracking for foreign agents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyMonitor {
    present: BTreeMap<PositionKey, ForeignPresence>,
    arrival_checked: bool,
}

impl OccupancyMonitor {
    /// Create an empty monitor.
    pub const fn new() -> Self {
        Self {
            present: BTreeMap::new(),
            arrival_checked: false,
        }
    }

    /// Update linger tracking from one locator reading.
    ///
    /// Returns `true` when any tracked agent has lingered strictly longer
    /// than the threshold. Agents that left the radius are forgotten. An
    /// agent reported within one tile of a tracked position keeps that
    /// position's first-seen time, since markers jitter between tiles.
    pub fn poll(
        &mut self,
        now: u64,
        me: Position,
        agents: &[Position],
        config: &OccupancyConfig,
    ) -> bool {
        let exclusion = f64::from(config.self_exclusion);
        let radius = f64::from(config.detection_radius);

        let mut next = BTreeMap::new();
        for agent in agents {
            if !agent.same_layer(&me) {
                continue;
            }
            let distance = agent.distance_to(&me);
            if distance <= exclusion || distance > radius {
                continue;
            }
            let first_seen_ms = self.inherited_first_seen(*agent).unwrap_or(now);
            next.insert(
                agent.key(),
                ForeignPresence {
                    position: *agent,
                    first_seen_ms,
                },
            );
        }
        self.present = next;

        let threshold = config.linger_threshold_ms;
        match self.present.values().find(|p| p.linger_ms(now) > threshold) {
            Some(presence) => {
                debug!(
                    position = %presence.position,
                    linger_ms = presence.linger_ms(now),
                    "Foreign agent lingered past threshold"
                );
                true
            }
            None => false,
        }
    }

    fn inherited_first_seen(&self, position: Position) -> Option<u64> {
        if let Some(exact) = self.present.get(&position.key()) {
            return Some(exact.first_seen_ms);
        }
        self.present
            .values()
            .filter(|p| p.position.same_layer(&position) && p.position.tile_distance(&position) <= 1)
            .map(|p| p.first_seen_ms)
            .min()
    }

    /// Number of foreign agents tracked.
    pub fn len(&self) -> usize {
        self.present.len()
    }

    /// Whether no foreign agent is tracked.
    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Forget all tracked agents and re-arm the arrival check.
    pub fn reset(&mut self) {
        self.present.clear();
        self.arrival_checked = false;
    }
}

/// Whether another agent is already within the occupied-check radius.
pub fn is_occupied(me: Position, agents: &[Position], config: &OccupancyConfig) -> bool {
    let exclusion = f64::from(config.self_exclusion);
    let radius = f64::from(config.occupied_check_radius);
    agents.iter().any(|agent| {
        let distance = agent.distance_to(&me);
        agent.same_layer(&me) && distance > exclusion && distance <= radius
    })
}

/// Whether occupancy judgements are suspended at `now`.
///
/// Positions are unreliable right after start-up and after a relocation.
pub fn in_grace(now: u64, state: &HuntState, config: &OccupancyConfig) -> bool {
    let within = |since: Option<u64>, window: u64| {
        since.is_some_and(|at| now.saturating_sub(at) < window)
    };
    within(state.started_at, config.startup_grace_ms)
        || within(state.last_relocation_at, config.post_relocation_grace_ms)
}

/// Edge-triggered rival health-bar watch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RivalWatch {
    last_check_at: Option<u64>,
    bar_visible: bool,
}

impl RivalWatch {
    /// Create an idle watch.
    pub const fn new() -> Self {
        Self {
            last_check_at: None,
            bar_visible: false,
        }
    }

    /// Forget throttling and edge state.
    pub const fn reset(&mut self) {
        self.last_check_at = None;
        self.bar_visible = false;
    }
}

/// Per-frame occupancy and rival check. Raises `state.interference`.
///
/// Does nothing while a relocation is in progress.
pub fn watch<H>(host: &mut H, state: &mut HuntState, config: &HuntConfig)
where
    H: Clock + VisualDetector + EntityLocator + ScreenProjector,
{
    if state.relocating || state.interference {
        return;
    }
    let now = host.now_ms();
    let occupancy = &config.occupancy;

    if occupancy.enabled && !in_grace(now, state, occupancy) {
        if let Some(me) = host.self_position() {
            let agents = host.agent_positions();
            if !state.occupancy.arrival_checked {
                state.occupancy.arrival_checked = true;
                if is_occupied(me, &agents, occupancy) {
                    state.raise_interference("environment already occupied");
                    return;
                }
            }
            if state.occupancy.poll(now, me, &agents, occupancy) {
                state.raise_interference("foreign agent lingering");
                return;
            }
        }
    }

    watch_rivals(host, state, config, now);
}

fn watch_rivals<H>(host: &mut H, state: &mut HuntState, config: &HuntConfig, now: u64)
where
    H: VisualDetector + EntityLocator + ScreenProjector,
{
    let rival = &config.occupancy.rival;
    if !rival.enabled {
        return;
    }
    let due = state
        .rival
        .last_check_at
        .is_none_or(|at| now.saturating_sub(at) >= rival.check_interval_ms);
    if !due {
        return;
    }
    state.rival.last_check_at = Some(now);

    if state.combat.engaged {
        // Any bar on screen is ours.
        state.rival.bar_visible = false;
        return;
    }
    let own_attack_recent = state
        .combat
        .last_attack_at
        .is_some_and(|at| now.saturating_sub(at) < rival.attack_grace_ms);
    if own_attack_recent {
        return;
    }

    let bars = host.find_clusters(&rival.health_bar);
    if bars.is_empty() {
        state.rival.bar_visible = false;
        return;
    }
    if state.rival.bar_visible {
        return;
    }
    state.rival.bar_visible = true;

    let tops: Vec<(Position, ScreenPoint)> = host
        .entity_positions()
        .into_iter()
        .filter_map(|pos| {
            host.project(pos, config.targeting.target_height)
                .map(|region| (pos, region.top_center()))
        })
        .collect();
    let limit = f64::from(rival.match_radius_px);
    for bar in &bars {
        let centroid = bar.centroid();
        let nearest = tops
            .iter()
            .map(|(pos, top)| (*pos, top.distance_to(&centroid)))
            .filter(|(_, d)| *d <= limit)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((position, _)) = nearest {
            warn!(%position, "Rival engaged a target, ignoring it");
            state.ignore.insert(position, now);
            state.tracker.remove(position);
        }
    }
    state.raise_interference("rival engagement observed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use quarry_types::HealthReading;

    use super::*;
    use crate::testing::FakeHost;

    const ME: Position = Position::new(3200, 3000, 0);

    fn config() -> OccupancyConfig {
        OccupancyConfig::default()
    }

    #[test]
    fn self_exclusion_never_raises() {
        let cfg = config();
        let mut monitor = OccupancyMonitor::new();
        let own_marker = Position::new(3203, 3000, 0);
        for t in (0..=20_000).step_by(500) {
            assert!(!monitor.poll(t, ME, &[own_marker], &cfg));
        }
        assert!(monitor.is_empty());
    }

    #[test]
    fn linger_threshold_is_strict() {
        let cfg = config();
        let rival = Position::new(3205, 3000, 0);

        let mut monitor = OccupancyMonitor::new();
        assert!(!monitor.poll(1_000, ME, &[rival], &cfg));
        assert!(!monitor.poll(1_000 + 2_999, ME, &[rival], &cfg));
        assert!(!monitor.poll(1_000 + 3_000, ME, &[rival], &cfg));
        assert!(monitor.poll(1_000 + 3_001, ME, &[rival], &cfg));
    }

    #[test]
    fn threshold_minus_one_then_plus_one() {
        let cfg = config();
        let rival = Position::new(3200, 3009, 0);
        let mut monitor = OccupancyMonitor::new();
        monitor.poll(0, ME, &[rival], &cfg);
        assert!(!monitor.poll(cfg.linger_threshold_ms - 1, ME, &[rival], &cfg));

        let mut monitor = OccupancyMonitor::new();
        monitor.poll(0, ME, &[rival], &cfg);
        assert!(monitor.poll(cfg.linger_threshold_ms + 1, ME, &[rival], &cfg));
    }

    #[test]
    fn leaving_the_radius_resets_linger() {
        let cfg = config();
        let rival = Position::new(3205, 3000, 0);
        let mut monitor = OccupancyMonitor::new();
        monitor.poll(0, ME, &[rival], &cfg);
        monitor.poll(2_000, ME, &[], &cfg);
        assert!(monitor.is_empty());
        monitor.poll(2_500, ME, &[rival], &cfg);
        assert!(!monitor.poll(5_000, ME, &[rival], &cfg));
        assert!(monitor.poll(5_501, ME, &[rival], &cfg));
    }

    #[test]
    fn one_tile_jitter_keeps_first_seen() {
        let cfg = config();
        let mut monitor = OccupancyMonitor::new();
        monitor.poll(0, ME, &[Position::new(3205, 3000, 0)], &cfg);
        monitor.poll(1_500, ME, &[Position::new(3206, 3001, 0)], &cfg);
        assert!(monitor.poll(3_001, ME, &[Position::new(3205, 3001, 0)], &cfg));
    }

    #[test]
    fn other_layers_and_far_agents_are_ignored() {
        let cfg = config();
        let mut monitor = OccupancyMonitor::new();
        let upstairs = Position::new(3205, 3000, 1);
        let far = Position::new(3210, 3000, 0);
        monitor.poll(0, ME, &[upstairs, far], &cfg);
        assert!(!monitor.poll(10_000, ME, &[upstairs, far], &cfg));
    }

    #[test]
    fn occupied_check_uses_larger_radius() {
        let cfg = config();
        assert!(is_occupied(ME, &[Position::new(3214, 3000, 0)], &cfg));
        assert!(!is_occupied(ME, &[Position::new(3216, 3000, 0)], &cfg));
        assert!(!is_occupied(ME, &[Position::new(3202, 3000, 0)], &cfg));
    }

    #[test]
    fn grace_windows_suspend_judgement() {
        let mut hunt = HuntConfig::default();
        hunt.occupancy.startup_grace_ms = 10_000;
        let mut state = HuntState::new(&hunt);
        state.started_at = Some(0);
        assert!(in_grace(9_999, &state, &hunt.occupancy));
        assert!(!in_grace(10_000, &state, &hunt.occupancy));
        state.last_relocation_at = Some(20_000);
        assert!(in_grace(25_000, &state, &hunt.occupancy));
    }

    #[test]
    fn watch_raises_interference_for_a_lingering_agent() {
        let mut hunt = HuntConfig::default();
        hunt.occupancy.rival.enabled = false;
        let mut host = FakeHost::new();
        host.agents.push(Position::new(3216, 3000, 0));
        let mut state = HuntState::new(&hunt);

        // Outside the occupied radius on arrival, then walks in and stays.
        watch(&mut host, &mut state, &hunt);
        host.agents = vec![Position::new(3206, 3000, 0)];
        watch(&mut host, &mut state, &hunt);
        host.clock += 3_001;
        watch(&mut host, &mut state, &hunt);
        assert!(state.interference);
    }

    #[test]
    fn arrival_in_an_occupied_environment_raises_once_grace_ends() {
        let mut hunt = HuntConfig::default();
        hunt.occupancy.rival.enabled = false;
        let mut host = FakeHost::new();
        host.agents.push(Position::new(3212, 3000, 0));
        let mut state = HuntState::new(&hunt);
        state.last_relocation_at = Some(0);

        watch(&mut host, &mut state, &hunt);
        assert!(!state.interference);
        host.clock = 10_000;
        watch(&mut host, &mut state, &hunt);
        assert!(state.interference);
    }

    #[test]
    fn rival_health_bar_ignores_their_target() {
        let hunt = HuntConfig::default();
        let mut host = FakeHost::new();
        let theirs = Position::new(3204, 3002, 0);
        host.add_target(theirs, 0);
        host.rival_bars = vec![theirs];
        let mut state = HuntState::new(&hunt);
        host.clock = 50_000;

        watch(&mut host, &mut state, &hunt);
        assert!(state.interference);
        assert!(state.ignore.contains(theirs));
    }

    #[test]
    fn own_fight_and_recent_attack_are_not_rivals() {
        let hunt = HuntConfig::default();
        let mut host = FakeHost::new();
        let ours = Position::new(3204, 3002, 0);
        host.add_target(ours, 5);
        host.rival_bars = vec![ours];
        host.health = HealthReading::showing(5);
        let mut state = HuntState::new(&hunt);
        host.clock = 50_000;

        state.combat.engaged = true;
        watch(&mut host, &mut state, &hunt);
        assert!(!state.interference);

        state.combat.engaged = false;
        state.combat.last_attack_at = Some(host.clock);
        host.clock += 400;
        watch(&mut host, &mut state, &hunt);
        assert!(!state.interference);
    }

    #[test]
    fn rival_check_is_edge_triggered() {
        let mut hunt = HuntConfig::default();
        hunt.occupancy.enabled = false;
        let mut host = FakeHost::new();
        let theirs = Position::new(3204, 3002, 0);
        host.add_target(theirs, 0);
        host.rival_bars = vec![theirs];
        let mut state = HuntState::new(&hunt);
        host.clock = 50_000;

        watch(&mut host, &mut state, &hunt);
        assert!(state.interference);
        state.interference = false;
        host.clock += 300;
        watch(&mut host, &mut state, &hunt);
        assert!(!state.interference, "same appearance must not fire twice");
    }
}
