//! The simulated world and its [`Host`](quarry_core::host::Host) bindings.
//!
//! [`SimHost`] advances a small scripted environment one frame at a time:
//! targets spawn around home, take hits while we fight them, die into
//! corpses that fade and later despawn, and rivals come and go on a
//! schedule. Kill and harvest feedback reaches the core the way it would
//! from a real client, as lines in a scrolling log read by a
//! [`LogWatcher`].

use quarry_core::config::HuntConfig;
use quarry_core::host::{
    Clock, EntityLocator, EnvironmentValidator, Interactor, Relocator, ScreenProjector,
    SignalSource, Validation, VisualDetector,
};
use quarry_core::signals::{LogWatcher, SignalBoard};
use quarry_types::{
    Cluster, ColorSignature, HealthReading, Position, RotationKind, ScreenPoint, ScreenRegion,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::WorldConfig;

/// Screen position of the home tile.
const ORIGIN: ScreenPoint = ScreenPoint::new(400, 300);
/// Pixels per tile. Wide enough that neighbouring hitboxes never overlap.
const TILE_PX: i32 = 80;
/// Tiles visible in each direction.
const VIEW_TILES: u16 = 20;
/// Hitbox width.
const HITBOX_PX: i32 = 30;
/// Height, above the tile base, that every hitbox covers.
const AIM_HEIGHT: i32 = 20;
/// Delay between a harvest click and the start message.
const HARVEST_START_MS: u64 = 600;
/// Duration of a harvest once started.
const HARVEST_DURATION_MS: u64 = 1_800;
/// Delay between a harvest click and the corpse disappearing.
const HARVEST_DONE_MS: u64 = HARVEST_START_MS + HARVEST_DURATION_MS;
/// Delay between a kill and the log messages about it.
const KILL_MESSAGE_MS: u64 = 300;
/// How long the indicator keeps showing zero after a kill.
const DEPLETED_SHOW_MS: u64 = 600;

/// Counters for inspecting a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Targets spawned.
    pub spawned: u32,
    /// Attacks that landed on a target.
    pub attacks: u32,
    /// Targets we killed.
    pub kills: u32,
    /// Corpses harvested.
    pub harvests: u32,
    /// Corpses that despawned unharvested.
    pub despawned: u32,
    /// Relocations completed.
    pub relocations: u32,
    /// Breaks taken.
    pub breaks: u32,
    /// Environment validations requested.
    pub validations: u32,
}

#[derive(Debug, Clone, Copy)]
struct Target {
    id: u32,
    position: Position,
    hitpoints: u32,
    died_at: Option<u64>,
    harvest_done_at: Option<u64>,
}

impl Target {
    const fn alive(&self) -> bool {
        self.died_at.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
struct Fight {
    target: u32,
    next_hit_at: u64,
}

/// A scripted environment implementing every host collaborator.
#[derive(Debug)]
pub struct SimHost {
    world: WorldConfig,
    bar_signature: ColorSignature,
    watcher: LogWatcher,
    board: SignalBoard,
    rng: SmallRng,
    clock: u64,
    targets: Vec<Target>,
    next_id: u32,
    next_spawn_at: u64,
    fight: Option<Fight>,
    log: Vec<String>,
    pending_log: Vec<(u64, String)>,
    kill_total: u32,
    ammunition: Option<u32>,
    rivals_gone_before: u64,
    rotation_taken: bool,
    stats: SimStats,
}

impl SimHost {
    /// Build a world from `world`, reading log lines with the markers in
    /// `hunt`.
    pub fn new(world: WorldConfig, hunt: &HuntConfig) -> Self {
        let rng = SmallRng::seed_from_u64(world.seed);
        Self {
            bar_signature: hunt.occupancy.rival.health_bar,
            watcher: LogWatcher::new(&hunt.signals),
            board: SignalBoard::default(),
            rng,
            clock: 0,
            targets: Vec::new(),
            next_id: 0,
            next_spawn_at: world.first_spawn_ms,
            fight: None,
            log: Vec::new(),
            pending_log: Vec::new(),
            kill_total: world.starting_total,
            ammunition: world.ammunition,
            rivals_gone_before: 0,
            rotation_taken: false,
            stats: SimStats::default(),
            world,
        }
    }

    /// Counters so far.
    pub const fn stats(&self) -> SimStats {
        self.stats
    }

    /// Visible log lines, oldest first.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Live targets currently in the world.
    pub fn live_targets(&self) -> usize {
        self.targets.iter().filter(|t| t.alive()).count()
    }

    /// Corpses currently in the world.
    pub fn corpses(&self) -> usize {
        self.targets.iter().filter(|t| !t.alive()).count()
    }

    const fn home(&self) -> Position {
        self.world.home
    }

    fn offset(&self, dx: i32, dy: i32) -> Option<Position> {
        let home = self.home();
        let x = u16::try_from(i32::from(home.x).checked_add(dx)?).ok()?;
        let y = u16::try_from(i32::from(home.y).checked_add(dy)?).ok()?;
        Some(Position::new(x, y, home.layer))
    }

    fn present_rivals(&self) -> impl Iterator<Item = &crate::config::RivalScript> {
        let now = self.clock;
        self.world.rivals.iter().filter(move |r| {
            r.arrives_at_ms <= now
                && r.arrives_at_ms >= self.rivals_gone_before
                && r.leaves_at_ms.is_none_or(|at| now < at)
        })
    }

    /// Tile base point on screen.
    fn base_point(&self, position: Position) -> Option<ScreenPoint> {
        let home = self.home();
        if !home.same_layer(&position) || home.tile_distance(&position) > VIEW_TILES {
            return None;
        }
        let dx = i32::from(position.x).checked_sub(i32::from(home.x))?;
        let dy = i32::from(position.y).checked_sub(i32::from(home.y))?;
        Some(ScreenPoint::new(
            ORIGIN.x.checked_add(dx.checked_mul(TILE_PX)?)?,
            ORIGIN.y.checked_add(dy.checked_mul(TILE_PX)?)?,
        ))
    }

    /// The target a click on `region` lands on.
    fn target_under(&self, region: ScreenRegion) -> Option<usize> {
        let center = region.center();
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                let base = self.base_point(t.position)?;
                let aim = ScreenPoint::new(base.x, base.y.saturating_sub(AIM_HEIGHT));
                region
                    .contains(aim)
                    .then(|| (i, aim.distance_to(&center)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn say_later(&mut self, delay_ms: u64, line: String) {
        let at = self.clock.saturating_add(delay_ms);
        self.pending_log.push((at, line));
    }

    fn step(&mut self) {
        self.spawn();
        self.fight_step();
        self.expire();
        self.flush_log();
        self.watcher.observe(&self.log, &mut self.board);
    }

    fn spawn(&mut self) {
        let now = self.clock;
        if now < self.next_spawn_at {
            return;
        }
        let limit_reached = self
            .world
            .spawn_limit
            .is_some_and(|limit| self.stats.spawned >= limit);
        if limit_reached || self.live_targets() >= self.world.max_alive {
            return;
        }

        let radius = i32::from(self.world.spawn_radius.max(1));
        let mut position = None;
        for _ in 0..8 {
            let dx = self.rng.random_range(radius.saturating_neg()..=radius);
            let dy = self.rng.random_range(radius.saturating_neg()..=radius);
            if dx == 0 && dy == 0 {
                continue;
            }
            let Some(candidate) = self.offset(dx, dy) else {
                continue;
            };
            if self.targets.iter().all(|t| t.position != candidate) {
                position = Some(candidate);
                break;
            }
        }
        let Some(position) = position else {
            return;
        };

        self.targets.push(Target {
            id: self.next_id,
            position,
            hitpoints: self.world.hitpoints,
            died_at: None,
            harvest_done_at: None,
        });
        self.next_id = self.next_id.saturating_add(1);
        self.stats.spawned = self.stats.spawned.saturating_add(1);
        let half = self.world.spawn_interval_ms / 2;
        let jitter = self.rng.random_range(0..=self.world.spawn_interval_ms);
        self.next_spawn_at = now.saturating_add(half).saturating_add(jitter / 2);
        debug!(%position, "Target spawned");
    }

    fn fight_step(&mut self) {
        let now = self.clock;
        let Some(fight) = self.fight else {
            return;
        };
        let Some(index) = self.targets.iter().position(|t| t.id == fight.target) else {
            self.fight = None;
            return;
        };
        if now < fight.next_hit_at {
            return;
        }
        let alive = self.targets.get(index).is_some_and(Target::alive);
        if !alive {
            let shown_until = self
                .targets
                .get(index)
                .and_then(|t| t.died_at)
                .map_or(0, |at| at.saturating_add(DEPLETED_SHOW_MS));
            if now >= shown_until {
                self.fight = None;
            }
            return;
        }

        if self.ammunition == Some(0) {
            self.fight = None;
            return;
        }
        if let Some(left) = self.ammunition.as_mut() {
            *left = left.saturating_sub(1);
            if *left == 0 {
                self.say_later(0, "There is no ammo left in your quiver.".to_owned());
            }
        }

        let hit = self.rng.random_range(1..=self.world.max_hit.max(1));
        let mut killed = None;
        if let Some(target) = self.targets.get_mut(index) {
            target.hitpoints = target.hitpoints.saturating_sub(hit);
            if target.hitpoints == 0 {
                target.died_at = Some(now);
                killed = Some(target.position);
            }
        }
        self.fight = Some(Fight {
            target: fight.target,
            next_hit_at: now.saturating_add(self.world.hit_interval_ms),
        });

        if let Some(position) = killed {
            self.kill_total = self.kill_total.saturating_add(1);
            self.stats.kills = self.stats.kills.saturating_add(1);
            info!(%position, total = self.kill_total, "Target killed");
            self.say_later(
                KILL_MESSAGE_MS,
                "You scratch a notch on your bow for the chompy bird kill.".to_owned(),
            );
            self.say_later(
                KILL_MESSAGE_MS,
                format!(
                    "You've scratched up a total of {} chompy bird kills so far!",
                    with_separators(self.kill_total)
                ),
            );
        }
    }

    fn expire(&mut self) {
        let now = self.clock;
        let ttl = self.world.corpse_ttl_ms;
        let before = self.targets.len();
        let mut harvested: u32 = 0;
        self.targets.retain(|t| {
            if t.harvest_done_at.is_some_and(|at| now >= at) {
                harvested = harvested.saturating_add(1);
                return false;
            }
            t.died_at.is_none_or(|at| now.saturating_sub(at) < ttl)
        });
        let removed = u32::try_from(before.saturating_sub(self.targets.len())).unwrap_or(0);
        self.stats.harvests = self.stats.harvests.saturating_add(harvested);
        self.stats.despawned = self
            .stats
            .despawned
            .saturating_add(removed.saturating_sub(harvested));
    }

    fn flush_log(&mut self) {
        let now = self.clock;
        let (due, later): (Vec<_>, Vec<_>) =
            self.pending_log.drain(..).partition(|(at, _)| *at <= now);
        self.pending_log = later;
        self.log.extend(due.into_iter().map(|(_, line)| line));
        let excess = self.log.len().saturating_sub(self.world.log_window.max(1));
        self.log.drain(..excess);
    }

    /// Advance time without running the world, as while away.
    const fn skip(&mut self, ms: u64) {
        self.clock = self.clock.saturating_add(ms);
    }

    fn leave_environment(&mut self) {
        self.targets.clear();
        self.fight = None;
        self.pending_log.clear();
        self.rivals_gone_before = self.clock.saturating_add(1);
        self.next_spawn_at = self.clock.saturating_add(self.world.first_spawn_ms);
    }
}

/// Format `n` with comma thousands separators.
fn with_separators(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len().saturating_add(digits.len() / 3));
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && len.saturating_sub(i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl Clock for SimHost {
    fn now_ms(&self) -> u64 {
        self.clock
    }

    fn sleep(&mut self, ms: u64) {
        let frame = self.frame_ms().max(1);
        let mut remaining = ms;
        while remaining > 0 {
            let step = remaining.min(frame);
            self.clock = self.clock.saturating_add(step);
            remaining = remaining.saturating_sub(step);
            self.step();
        }
    }
}

impl VisualDetector for SimHost {
    fn find_clusters(&mut self, signature: &ColorSignature) -> Vec<Cluster> {
        if *signature == self.bar_signature {
            return self.rival_bars();
        }
        let now = self.clock;
        let fade = self.world.corpse_fade_ms;
        self.targets
            .iter()
            .filter(|t| t.died_at.is_none_or(|at| now.saturating_sub(at) < fade))
            .filter_map(|t| self.project(t.position, 70))
            .map(|region| {
                let c = region.center();
                Cluster::new(
                    ScreenRegion::new(c.x.saturating_sub(10), c.y.saturating_sub(10), 20, 20),
                    60,
                )
            })
            .collect()
    }

    fn health_indicator(&mut self) -> HealthReading {
        let Some(fight) = self.fight else {
            return HealthReading::HIDDEN;
        };
        self.targets
            .iter()
            .find(|t| t.id == fight.target)
            .map_or(HealthReading::HIDDEN, |t| HealthReading::showing(t.hitpoints))
    }
}

impl SimHost {
    fn rival_bars(&self) -> Vec<Cluster> {
        let engaging = self.present_rivals().filter(|r| r.engages).count();
        let ours = self.fight.map(|f| f.target);
        self.targets
            .iter()
            .filter(|t| t.alive() && Some(t.id) != ours)
            .take(engaging)
            .filter_map(|t| self.base_point(t.position))
            .map(|base| {
                let top = base.y.saturating_sub(70);
                Cluster::new(
                    ScreenRegion::new(base.x.saturating_sub(15), top.saturating_sub(8), 30, 6),
                    40,
                )
            })
            .collect()
    }
}

impl EntityLocator for SimHost {
    fn entity_positions(&self) -> Vec<Position> {
        self.targets.iter().map(|t| t.position).collect()
    }

    fn agent_positions(&self) -> Vec<Position> {
        // The locator reports our own marker alongside everyone else's.
        let mut agents = vec![self.home()];
        agents.extend(self.present_rivals().filter_map(|r| self.offset(r.dx, r.dy)));
        agents
    }

    fn self_position(&self) -> Option<Position> {
        Some(self.home())
    }
}

impl ScreenProjector for SimHost {
    fn project(&self, position: Position, height_hint: i32) -> Option<ScreenRegion> {
        let base = self.base_point(position)?;
        Some(ScreenRegion::new(
            base.x.saturating_sub(HITBOX_PX / 2),
            base.y.saturating_sub(height_hint),
            HITBOX_PX,
            height_hint,
        ))
    }
}

impl Interactor for SimHost {
    fn interact(
        &mut self,
        region: ScreenRegion,
        chooser: &mut dyn FnMut(&[String]) -> Option<usize>,
    ) -> bool {
        let under = self.target_under(region);
        let target = under.and_then(|i| self.targets.get(i)).copied();
        let mut menu = Vec::new();
        match target {
            Some(t) if t.alive() => menu.push("Attack Chompy bird (level-2)".to_owned()),
            Some(t) if t.harvest_done_at.is_none() => menu.push("Pluck Chompy bird".to_owned()),
            _ => {}
        }
        menu.push("Walk here".to_owned());
        menu.push("Cancel".to_owned());

        let Some(entry) = chooser(&menu).and_then(|i| menu.get(i).cloned()) else {
            return false;
        };
        let Some(target) = target else {
            return true;
        };
        let now = self.clock;
        if entry.starts_with("Attack") {
            self.fight = Some(Fight {
                target: target.id,
                next_hit_at: now.saturating_add(self.world.hit_interval_ms / 2),
            });
            self.stats.attacks = self.stats.attacks.saturating_add(1);
        } else if entry.starts_with("Pluck") {
            if let Some(t) = under.and_then(|i| self.targets.get_mut(i)) {
                t.harvest_done_at = Some(now.saturating_add(HARVEST_DONE_MS));
            }
            self.say_later(HARVEST_START_MS, "You start plucking the chompy bird.".to_owned());
        }
        true
    }
}

impl SignalSource for SimHost {
    fn signals(&mut self) -> &mut SignalBoard {
        &mut self.board
    }
}

impl Relocator for SimHost {
    fn has_relocation_profile(&self) -> bool {
        self.world.relocation_profile
    }

    fn relocate(&mut self) -> bool {
        self.skip(self.world.hop_duration_ms);
        self.leave_environment();
        self.rotation_taken = self.rotation_taken || self.rotation_due_now();
        self.stats.relocations = self.stats.relocations.saturating_add(1);
        info!(relocations = self.stats.relocations, "Relocated");
        true
    }

    fn take_break(&mut self) -> bool {
        self.skip(self.world.break_duration_ms);
        self.leave_environment();
        self.rotation_taken = true;
        self.stats.breaks = self.stats.breaks.saturating_add(1);
        info!(breaks = self.stats.breaks, "Break over");
        true
    }

    fn rotation_due(&mut self) -> Option<RotationKind> {
        if !self.rotation_due_now() {
            return None;
        }
        self.world.rotation.map(|r| r.kind)
    }
}

impl SimHost {
    fn rotation_due_now(&self) -> bool {
        !self.rotation_taken
            && self
                .world
                .rotation
                .is_some_and(|r| self.clock >= r.due_at_ms)
    }
}

impl EnvironmentValidator for SimHost {
    fn validate_environment(&mut self) -> Validation {
        self.stats.validations = self.stats.validations.saturating_add(1);
        if self.ammunition == Some(0) {
            return Validation::Fatal("no ammunition equipped".to_owned());
        }
        Validation::Ready
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn host(world: WorldConfig) -> SimHost {
        SimHost::new(world, &HuntConfig::default())
    }

    fn take(host: &mut SimHost, region: ScreenRegion, action: &str) -> bool {
        host.interact(region, &mut |entries| {
            entries
                .iter()
                .position(|entry| entry.to_lowercase().contains(action))
        })
    }

    #[test]
    fn separators() {
        assert_eq!(with_separators(7), "7");
        assert_eq!(with_separators(1_000), "1,000");
        assert_eq!(with_separators(1_234_567), "1,234,567");
    }

    #[test]
    fn spawns_respect_the_limit() {
        let world = WorldConfig {
            spawn_limit: Some(1),
            spawn_interval_ms: 100,
            ..WorldConfig::default()
        };
        let mut host = host(world);
        host.sleep(5_000);
        assert_eq!(host.stats().spawned, 1);
        assert_eq!(host.live_targets(), 1);
    }

    #[test]
    fn attacking_kills_and_reports_through_the_log() {
        let world = WorldConfig {
            spawn_limit: Some(1),
            max_hit: 5,
            hitpoints: 1,
            starting_total: 999,
            ..WorldConfig::default()
        };
        let mut host = host(world);
        host.sleep(1_000);
        let position = host.entity_positions().into_iter().next().unwrap();
        let region = host.project(position, 70).unwrap().scaled(90);
        assert!(take(&mut host, region, "attack"));

        host.sleep(2_000);
        assert_eq!(host.stats().kills, 1);
        assert!(host.signals().kill_observed);
        assert_eq!(host.signals().total_kills, Some(1_000));
        assert_eq!(host.corpses(), 1);
    }

    #[test]
    fn corpses_can_be_harvested() {
        let world = WorldConfig {
            spawn_limit: Some(1),
            hitpoints: 1,
            max_hit: 1,
            ..WorldConfig::default()
        };
        let mut host = host(world);
        host.sleep(1_000);
        let position = host.entity_positions().into_iter().next().unwrap();
        let hitbox = host.project(position, 70).unwrap().scaled(90);
        assert!(take(&mut host, hitbox, "attack"));
        while host.stats().kills == 0 {
            host.sleep(1_200);
        }

        let corpse_box = host.project(position, 40).unwrap().scaled(90);
        assert!(take(&mut host, corpse_box, "pluck"));
        host.sleep(700);
        assert!(host.signals().harvest_started);
        host.sleep(2_000);
        assert_eq!(host.stats().harvests, 1);
        assert_eq!(host.corpses(), 0);
    }

    #[test]
    fn rivals_follow_their_schedule() {
        let world = WorldConfig {
            rivals: vec![crate::config::RivalScript {
                arrives_at_ms: 1_000,
                leaves_at_ms: Some(2_000),
                dx: 4,
                dy: 0,
                engages: false,
            }],
            ..WorldConfig::default()
        };
        let mut host = host(world);
        assert_eq!(host.agent_positions().len(), 1);
        host.sleep(1_000);
        assert_eq!(host.agent_positions().len(), 2);
        host.sleep(1_000);
        assert_eq!(host.agent_positions().len(), 1);
    }

    #[test]
    fn out_of_ammunition_is_reported() {
        let world = WorldConfig {
            spawn_limit: Some(1),
            hitpoints: 1_000,
            ammunition: Some(2),
            ..WorldConfig::default()
        };
        let mut host = host(world);
        host.sleep(1_000);
        let position = host.entity_positions().into_iter().next().unwrap();
        let region = host.project(position, 70).unwrap().scaled(90);
        assert!(take(&mut host, region, "attack"));
        host.sleep(5_000);
        assert!(host.signals().supplies_exhausted);
        assert_eq!(
            host.validate_environment(),
            Validation::Fatal("no ammunition equipped".to_owned())
        );
    }
}
