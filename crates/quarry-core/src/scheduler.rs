//! Cooperative task scheduler.
//!
//! Each tick:
//!
//! 1. **Watch** -- run the per-frame occupancy and rival check, then stop
//!    the hunt if the host reports supplies exhausted.
//! 2. **Select** -- ask each task, in priority order, whether it is
//!    eligible. The first eligible task runs one unit of work to
//!    completion.
//! 3. **Idle** -- when no task is eligible, pause briefly.
//!
//! The default order is recovery, setup, rotation, hunt, harvest: a raised
//! interference signal preempts everything, and live targets come before
//! queued corpses. Hosts can append their own tasks (resource logistics,
//! for instance) with [`Scheduler::push_task`].

use tracing::{debug, info, warn};

use crate::acquisition;
use crate::combat::{self, AttackOutcome, CombatOutcome};
use crate::config::{ConfigError, HuntConfig};
use crate::error::HuntError;
use crate::harvest::{self, HarvestBatch};
use crate::host::{Host, Validation};
use crate::occupancy;
use crate::recovery;
use crate::state::HuntState;
use crate::wait;

/// One schedulable unit of work.
pub trait Task<H: Host> {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether the task wants to run this tick.
    fn is_eligible(&mut self, host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool;

    /// Run one unit of work. An error stops the hunt.
    fn run(&mut self, host: &mut H, state: &mut HuntState, config: &HuntConfig)
    -> Result<(), HuntError>;
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The named task ran.
    Ran(&'static str),
    /// No task was eligible.
    Idle,
}

/// Totals for a bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Ticks in which some task ran.
    pub busy_ticks: u64,
    /// Kills credited by the end of the run.
    pub session_kills: u32,
}

/// Owns the hunt state and the ordered task list.
pub struct Scheduler<H: Host> {
    config: HuntConfig,
    state: HuntState,
    tasks: Vec<Box<dyn Task<H>>>,
}

impl<H: Host> Scheduler<H> {
    /// A scheduler with no tasks. Fails if `config` is invalid.
    pub fn new(config: HuntConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = HuntState::new(&config);
        Ok(Self {
            config,
            state,
            tasks: Vec::new(),
        })
    }

    /// A scheduler with the built-in tasks in priority order.
    pub fn with_default_tasks(config: HuntConfig) -> Result<Self, ConfigError> {
        let mut scheduler = Self::new(config)?;
        scheduler.push_task(Box::new(RecoveryTask));
        scheduler.push_task(Box::new(SetupTask));
        scheduler.push_task(Box::new(RotationTask));
        scheduler.push_task(Box::new(HuntTask));
        scheduler.push_task(Box::new(HarvestTask));
        Ok(scheduler)
    }

    /// Append a task at the lowest priority.
    pub fn push_task(&mut self, task: Box<dyn Task<H>>) {
        self.tasks.push(task);
    }

    /// The active configuration.
    pub const fn config(&self) -> &HuntConfig {
        &self.config
    }

    /// The hunt state.
    pub const fn state(&self) -> &HuntState {
        &self.state
    }

    /// Mutable hunt state, for collaborators outside the task list.
    pub const fn state_mut(&mut self) -> &mut HuntState {
        &mut self.state
    }

    /// Run a single tick.
    pub fn tick(&mut self, host: &mut H) -> Result<TickOutcome, HuntError> {
        let config = &self.config;
        let state = &mut self.state;
        if state.started_at.is_none() {
            state.started_at = Some(host.now_ms());
            info!("Hunt started");
        }

        occupancy::watch(host, state, config);
        if host.signals().supplies_exhausted {
            warn!(session_kills = state.session_kills, "Supplies exhausted, stopping");
            return Err(HuntError::SuppliesExhausted);
        }

        for task in &mut self.tasks {
            if task.is_eligible(host, state, config) {
                debug!(task = task.name(), "Running task");
                task.run(host, state, config)?;
                return Ok(TickOutcome::Ran(task.name()));
            }
        }
        idle(host, state, config);
        Ok(TickOutcome::Idle)
    }

    /// Run up to `max_ticks` ticks, stopping early on a hard stop.
    pub fn run(&mut self, host: &mut H, max_ticks: u64) -> Result<RunSummary, HuntError> {
        let mut busy_ticks: u64 = 0;
        for _ in 0..max_ticks {
            match self.tick(host) {
                Ok(TickOutcome::Ran(_)) => busy_ticks = busy_ticks.saturating_add(1),
                Ok(TickOutcome::Idle) => {}
                Err(e) => {
                    warn!(error = %e, session_kills = self.state.session_kills, "Hunt stopped");
                    return Err(e);
                }
            }
        }
        let summary = RunSummary {
            ticks: max_ticks,
            busy_ticks,
            session_kills: self.state.session_kills,
        };
        info!(
            ticks = summary.ticks,
            busy_ticks = summary.busy_ticks,
            session_kills = summary.session_kills,
            "Run complete"
        );
        Ok(summary)
    }
}

/// Let time pass when there is nothing to do.
///
/// With interference raised an interruptible pause would return at once,
/// so the wait is taken directly on the host clock.
fn idle<H: Host>(host: &mut H, state: &mut HuntState, config: &HuntConfig) {
    let ms = config.recovery.idle_pause_ms;
    if state.interference {
        host.wait_until(ms, &mut |_| false);
    } else {
        wait::pause(host, state, config, ms);
    }
}

/// Relocates when interference is raised and the cooldown allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryTask;

impl<H: Host> Task<H> for RecoveryTask {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn is_eligible(&mut self, host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool {
        recovery::relocation_due(state, config, host.now_ms())
    }

    fn run(
        &mut self,
        host: &mut H,
        state: &mut HuntState,
        config: &HuntConfig,
    ) -> Result<(), HuntError> {
        recovery::relocate_now(host, state, config).map(|_| ())
    }
}

/// Validates the environment on start-up and after every reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupTask;

impl<H: Host> Task<H> for SetupTask {
    fn name(&self) -> &'static str {
        "setup"
    }

    fn is_eligible(&mut self, _host: &mut H, state: &mut HuntState, _config: &HuntConfig) -> bool {
        state.validation_required && !state.interference && !state.relocating
    }

    fn run(
        &mut self,
        host: &mut H,
        state: &mut HuntState,
        config: &HuntConfig,
    ) -> Result<(), HuntError> {
        match host.validate_environment() {
            Validation::Ready => {
                state.validation_required = false;
                info!("Environment validated");
                Ok(())
            }
            Validation::Retry => {
                debug!("Environment not ready, retrying");
                wait::pause(host, state, config, config.recovery.idle_pause_ms);
                Ok(())
            }
            Validation::Fatal(reason) => {
                warn!(%reason, "Environment rejected");
                Err(HuntError::EnvironmentRejected { reason })
            }
        }
    }
}

/// Carries out a scheduled rotation once perishables have drained.
#[derive(Debug, Clone, Copy, Default)]
pub struct RotationTask;

impl<H: Host> Task<H> for RotationTask {
    fn name(&self) -> &'static str {
        "rotation"
    }

    fn is_eligible(&mut self, host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool {
        if state.interference || state.validation_required {
            return false;
        }
        recovery::rotation_ready(host, state, config)
    }

    fn run(
        &mut self,
        host: &mut H,
        state: &mut HuntState,
        config: &HuntConfig,
    ) -> Result<(), HuntError> {
        recovery::rotate(host, state, config).map(|_| ())
    }
}

/// Acquires a target, attacks it and confirms the kill.
#[derive(Debug, Clone, Copy, Default)]
pub struct HuntTask;

impl<H: Host> Task<H> for HuntTask {
    fn name(&self) -> &'static str {
        "hunt"
    }

    fn is_eligible(&mut self, host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool {
        if state.interference || state.validation_required {
            return false;
        }
        let now = host.now_ms();
        if state.combat.expired(now, config.combat.safety_valve_ms) {
            warn!(position = ?state.combat.position, "Combat session outlived the safety valve, clearing");
            state.combat.clear();
        } else if state.combat.engaged {
            return false;
        }

        let cooling = state
            .no_target_since
            .is_some_and(|at| now.saturating_sub(at) < config.targeting.no_target_cooldown_ms);
        if cooling {
            return false;
        }

        state.ignore.sweep(now);
        let stale = state.tracker.remove_stale(now);
        let ignored = state.tracker.evict_ignored(&state.ignore);
        if stale > 0 || ignored > 0 {
            debug!(stale, ignored, remaining = state.tracker.len(), "Pruned tracked targets");
        }
        harvest::validate_queue(host, state, config);

        if !state.tracker.is_empty() || acquisition::acquire(host, state, config).is_some() {
            state.no_target_since = None;
            return true;
        }
        debug!(cooldown_ms = config.targeting.no_target_cooldown_ms, "No target, cooling down");
        state.no_target_since = Some(now);
        false
    }

    fn run(
        &mut self,
        host: &mut H,
        state: &mut HuntState,
        config: &HuntConfig,
    ) -> Result<(), HuntError> {
        let now = host.now_ms();
        let target = match acquisition::acquire(host, state, config) {
            Some(found) => {
                state.tracker.track(found, now);
                Some(found)
            }
            None => state.tracker.next_target(now, &state.ignore),
        };
        let Some(target) = target else {
            debug!("No target, monitoring");
            wait::pause(host, state, config, config.recovery.idle_pause_ms);
            return Ok(());
        };

        info!(%target, "Target acquired");
        let (position, point) = match combat::attack(host, state, config, target) {
            AttackOutcome::Sent { position, point } => (position, point),
            AttackOutcome::Harvested { .. } | AttackOutcome::Interrupted => return Ok(()),
            outcome @ (AttackOutcome::TargetLost
            | AttackOutcome::CapabilityMismatch { .. }
            | AttackOutcome::Exhausted { .. }) => {
                let delay = config.combat.failure_backoff.sample(&mut state.rng);
                debug!(?outcome, delay, "Attack failed, backing off");
                wait::pause(host, state, config, delay);
                return Ok(());
            }
        };

        let outcome = combat::engage(host, state, config, position, point);
        debug!(?outcome, "Engagement finished");
        if matches!(outcome, CombatOutcome::Interrupted) || state.interference {
            return Ok(());
        }
        if config.harvest.enabled && !state.harvest.is_empty() {
            if acquisition::has_live_target(host, state, config) {
                debug!(queued = state.harvest.len(), "Live target visible, deferring harvest");
            } else {
                let batch = harvest::harvest_all(host, state, config);
                debug!(?batch, "Post-kill harvest finished");
            }
        }
        Ok(())
    }
}

/// Harvests queued corpses when no live target is visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarvestTask;

impl<H: Host> Task<H> for HarvestTask {
    fn name(&self) -> &'static str {
        "harvest"
    }

    fn is_eligible(&mut self, host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool {
        config.harvest.enabled
            && !state.interference
            && !state.validation_required
            && !state.harvest.is_empty()
            && !acquisition::has_live_target(host, state, config)
    }

    fn run(
        &mut self,
        host: &mut H,
        state: &mut HuntState,
        config: &HuntConfig,
    ) -> Result<(), HuntError> {
        match harvest::harvest_all(host, state, config) {
            HarvestBatch::Completed { harvested, dropped } => {
                info!(harvested, dropped, "Harvest batch complete");
            }
            HarvestBatch::Preempted => debug!("Harvest preempted by a live target"),
            HarvestBatch::Interrupted => debug!("Harvest interrupted"),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use quarry_types::{Position, RotationKind, ScreenPoint};

    use super::*;
    use crate::recovery::PendingRotation;
    use crate::testing::FakeHost;

    const TARGET: Position = Position::new(3204, 3002, 0);

    fn config() -> HuntConfig {
        let mut config = HuntConfig::default();
        config.seed = Some(21);
        config
    }

    fn scheduler() -> Scheduler<FakeHost> {
        Scheduler::with_default_tasks(config()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.combat.attack_attempt_cap = 0;
        assert!(Scheduler::<FakeHost>::new(config).is_err());
    }

    #[test]
    fn setup_runs_first_then_idles() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();

        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("setup")));
        assert_eq!(host.validations, 1);
        assert!(!scheduler.state().validation_required);
        assert_eq!(scheduler.state().started_at, Some(0));

        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Idle));
        assert!(scheduler.state().no_target_since.is_some());
        assert!(host.clock >= 600);
    }

    #[test]
    fn retry_validation_keeps_setup_pending() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        host.validation = Validation::Retry;
        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("setup")));
        assert!(scheduler.state().validation_required);
    }

    #[test]
    fn fatal_validation_stops_the_hunt() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        host.validation = Validation::Fatal("no weapon".to_owned());
        assert_eq!(
            scheduler.run(&mut host, 10),
            Err(HuntError::EnvironmentRejected {
                reason: "no weapon".to_owned()
            })
        );
    }

    #[test]
    fn supplies_exhausted_stops_the_hunt() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        host.board.supplies_exhausted = true;
        assert_eq!(scheduler.tick(&mut host), Err(HuntError::SuppliesExhausted));
    }

    #[test]
    fn interference_preempts_everything() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        host.add_target(TARGET, 10);
        scheduler.state_mut().raise_interference("test");

        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("recovery")));
        assert_eq!(host.relocations, 1);
        assert!(!scheduler.state().interference);
        assert!(scheduler.state().validation_required);
    }

    #[test]
    fn cooling_down_interference_idles_on_the_host_clock() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        scheduler.state_mut().last_relocation_at = Some(0);
        scheduler.state_mut().raise_interference("test");

        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Idle));
        assert_eq!(host.clock, 600);
        assert_eq!(host.relocations, 0);
    }

    #[test]
    fn hunt_kills_then_harvests_the_corpse() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        host.add_target(TARGET, 10);
        host.script_fight(TARGET, &[10, 0]);
        host.report_total_after_kill = Some(1);
        scheduler.state_mut().ground_resources = 1;

        let summary = scheduler.run(&mut host, 6).unwrap();
        assert_eq!(summary.session_kills, 1);
        assert_eq!(host.harvests, 1);
        let state = scheduler.state();
        assert_eq!(state.ground_resources, 0);
        assert!(state.harvest.is_empty());
        assert!(state.ignore.contains(TARGET));
        assert!(!state.combat.engaged);
    }

    #[test]
    fn break_rotation_waits_for_the_drain() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        host.rotation = Some(RotationKind::Break);
        scheduler.state_mut().ground_resources = 1;

        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("setup")));
        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Idle));
        assert!(scheduler.state().rotation.is_some());
        assert!(!scheduler.state_mut().record_resource_placed());

        scheduler.state_mut().consume_resource();
        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("rotation")));
        assert_eq!(host.breaks, 1);
        assert!(scheduler.state().rotation.is_none());
        assert!(scheduler.state().validation_required);
    }

    #[test]
    fn interference_relocation_does_not_repeat_a_pending_relocation() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        host.rotation = Some(RotationKind::Relocate);
        scheduler.state_mut().rotation = Some(PendingRotation::new(RotationKind::Relocate, 0));
        scheduler.state_mut().raise_interference("test");

        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("recovery")));
        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("setup")));
        for _ in 0..3 {
            assert_ne!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("rotation")));
        }
        assert_eq!(host.relocations, 1);
        assert!(scheduler.state().rotation.is_none());
    }

    #[test]
    fn break_after_a_relocation_waits_for_the_cooldown() {
        let mut scheduler = scheduler();
        let mut host = FakeHost::new();
        scheduler.state_mut().rotation = Some(PendingRotation::new(RotationKind::Break, 0));
        scheduler.state_mut().raise_interference("test");

        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("recovery")));
        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("setup")));
        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Idle));
        assert_eq!(host.breaks, 0);

        host.clock = 3_000 + 8_000;
        assert_eq!(scheduler.tick(&mut host), Ok(TickOutcome::Ran("rotation")));
        assert_eq!(host.breaks, 1);
        assert_eq!(host.relocations, 1);
    }

    #[test]
    fn safety_valve_releases_a_stuck_session() {
        let config = config();
        let mut host = FakeHost::new();
        let mut state = HuntState::new(&config);
        state.validation_required = false;
        state.combat.begin(TARGET, ScreenPoint::new(0, 0), 0);

        host.clock = 30_000;
        assert!(!HuntTask.is_eligible(&mut host, &mut state, &config));
        assert!(state.combat.engaged);

        host.clock = 30_001;
        HuntTask.is_eligible(&mut host, &mut state, &config);
        assert!(!state.combat.engaged);
    }
}
