//! Attack loop and kill confirmation.
//!
//! ```text
//! IDLE --attack()--> ATTACKING --indicator alive--> ENGAGED --kill--> RESOLVED
//!                        |                              |
//!                        +-- miss / lost / exhausted ---+-- timeout / interrupt --> IDLE
//! ```
//!
//! The engagement flag and engaged position live in [`CombatSession`] and
//! are owned by an [`EngagementGuard`] for the whole of [`engage`]. The
//! guard clears them on drop, so no exit path (kill, miss, timeout or an
//! interruption mid-wait) can leave the session latched.

use core::ops::{Deref, DerefMut};

use quarry_types::{Position, ScreenPoint};
use tracing::{debug, info, warn};

use crate::acquisition;
use crate::config::HuntConfig;
use crate::host::Host;
use crate::menu::{self, MenuChoice};
use crate::state::HuntState;
use crate::wait::{self, WaitOutcome, wait_for};

/// The engagement currently in progress, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombatSession {
    /// Whether we are engaged with a target.
    pub engaged: bool,
    /// When the engagement began.
    pub started_at_ms: Option<u64>,
    /// The position being engaged.
    pub position: Option<Position>,
    /// Screen point of the last attack sent.
    pub attack_point: Option<ScreenPoint>,
    /// When our last attack was sent. Survives the session.
    pub last_attack_at: Option<u64>,
}

impl CombatSession {
    /// Mark an engagement as started.
    pub const fn begin(&mut self, position: Position, point: ScreenPoint, now: u64) {
        self.engaged = true;
        self.started_at_ms = Some(now);
        self.position = Some(position);
        self.attack_point = Some(point);
    }

    /// End the engagement.
    pub const fn clear(&mut self) {
        self.engaged = false;
        self.started_at_ms = None;
        self.position = None;
        self.attack_point = None;
    }

    /// Whether an engagement has outlived the safety valve.
    pub fn expired(&self, now: u64, safety_valve_ms: u64) -> bool {
        self.engaged
            && self
                .started_at_ms
                .is_none_or(|at| now.saturating_sub(at) > safety_valve_ms)
    }
}

/// Holds the shared state for the length of an engagement.
///
/// Dereferences to [`HuntState`] so the engagement code keeps working on
/// the state while the guard is alive. Dropping the guard clears the
/// session.
#[derive(Debug)]
pub struct EngagementGuard<'a> {
    state: &'a mut HuntState,
}

impl<'a> EngagementGuard<'a> {
    /// Begin an engagement with `position`, attacked at `point`.
    pub fn begin(state: &'a mut HuntState, position: Position, point: ScreenPoint, now: u64) -> Self {
        state.combat.begin(position, point, now);
        Self { state }
    }
}

impl Deref for EngagementGuard<'_> {
    type Target = HuntState;

    fn deref(&self) -> &HuntState {
        self.state
    }
}

impl DerefMut for EngagementGuard<'_> {
    fn deref_mut(&mut self) -> &mut HuntState {
        self.state
    }
}

impl Drop for EngagementGuard<'_> {
    fn drop(&mut self) {
        if let Some(position) = self.state.combat.position {
            debug!(%position, "Engagement released");
        }
        self.state.combat.clear();
    }
}

/// Result of the attack loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    /// An attack was dispatched.
    Sent {
        /// Where the target was when attacked.
        position: Position,
        /// Screen point that was clicked.
        point: ScreenPoint,
    },
    /// The target was a corpse and was harvested in place.
    Harvested {
        /// The harvested position, now ignored.
        position: Position,
    },
    /// Re-acquisition found nothing; the target is gone.
    TargetLost,
    /// Only a harvest action was offered and harvesting is disabled.
    CapabilityMismatch {
        /// The position, now ignored.
        position: Position,
    },
    /// Every attempt failed.
    Exhausted {
        /// The position, now ignored.
        position: Position,
    },
    /// Interference cut the loop short.
    Interrupted,
}

/// Result of a whole engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatOutcome {
    /// The kill was confirmed and credited.
    Killed {
        /// The killed target's position.
        position: Position,
        /// Corpse queued for harvest, if one was found.
        corpse: Option<Position>,
    },
    /// The health indicator never confirmed engagement: a miss.
    Missed,
    /// Engaged, but the kill never resolved.
    Unresolved,
    /// Interference cut the engagement short.
    Interrupted,
}

/// Try to dispatch an attack on `target`.
///
/// Attempts after the first re-acquire the target, since it may have
/// moved. A harvest-only menu either harvests in place or, with harvesting
/// disabled, fails fast after a single attempt.
pub fn attack<H: Host>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
    target: Position,
) -> AttackOutcome {
    let cap = config.combat.attack_attempt_cap;
    let harvest_enabled = config.harvest.enabled;
    let mut position = target;

    for attempt in 1..=cap {
        if state.interference {
            return AttackOutcome::Interrupted;
        }
        if attempt > 1 {
            match acquisition::acquire(host, state, config) {
                Some(found) => position = found,
                None => {
                    debug!(%target, attempt, "Target no longer detected");
                    return AttackOutcome::TargetLost;
                }
            }
        }

        let Some(hitbox) = host.project(position, config.targeting.target_height) else {
            debug!(%position, attempt, "Target off screen");
            if !retry_pause(host, state, config) {
                return AttackOutcome::Interrupted;
            }
            continue;
        };
        let region = hitbox.scaled(config.combat.shrink_percent);

        let mut choice = MenuChoice::Nothing;
        let dispatched = host.interact(region, &mut |entries: &[String]| {
            choice = menu::resolve(entries, &config.combat, harvest_enabled);
            choice.index()
        });
        let now = host.now_ms();

        match choice {
            MenuChoice::Attack(_) if dispatched => {
                state.combat.last_attack_at = Some(now);
                info!(%position, attempt, "Attack sent");
                return AttackOutcome::Sent {
                    position,
                    point: region.center(),
                };
            }
            MenuChoice::Harvest(_) if dispatched => {
                info!(%position, "Target was a corpse, harvesting in place");
                let delay = crate::harvest::animation_delay(&mut state.rng, config);
                let completed = wait::pause(host, state, config, delay);
                let now = host.now_ms();
                state.ignore.insert(position, now);
                state.tracker.remove(position);
                state.harvest.remove(position);
                if !completed {
                    return AttackOutcome::Interrupted;
                }
                return AttackOutcome::Harvested { position };
            }
            MenuChoice::HarvestDisabled => {
                warn!(%position, attempt, "Harvest-only target with harvesting disabled");
                state.ignore.insert(position, now);
                state.tracker.remove(position);
                return AttackOutcome::CapabilityMismatch { position };
            }
            MenuChoice::Attack(_) | MenuChoice::Harvest(_) | MenuChoice::Nothing => {
                debug!(%position, attempt, ?choice, dispatched, "Attack attempt failed");
                if !retry_pause(host, state, config) {
                    return AttackOutcome::Interrupted;
                }
            }
        }
    }

    let now = host.now_ms();
    warn!(%target, attempts = cap, "Attack attempts exhausted");
    for spent in [target, position] {
        state.ignore.insert(spent, now);
        state.tracker.remove(spent);
    }
    AttackOutcome::Exhausted { position }
}

fn retry_pause<H: Host>(host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool {
    let delay = config.combat.retry_backoff.sample(&mut state.rng);
    wait::pause(host, state, config, delay)
}

/// Confirm engagement with an attacked target and wait for the kill.
///
/// Engagement needs the health indicator visible with a positive value
/// within the engage timeout; otherwise the attack was a miss and nothing
/// is counted or ignored. Once engaged, the kill resolves on the
/// authoritative kill signal, a value of exactly zero, or the indicator
/// disappearing.
pub fn engage<H: Host>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
    position: Position,
    point: ScreenPoint,
) -> CombatOutcome {
    host.signals().kill_observed = false;
    let now = host.now_ms();
    let mut guard = EngagementGuard::begin(state, position, point, now);

    let confirmed = wait_for(host, &mut guard, config, config.combat.engage_timeout_ms, |h, _| {
        h.health_indicator().is_alive()
    });
    match confirmed {
        WaitOutcome::Satisfied => info!(%position, "Engaged"),
        WaitOutcome::TimedOut => {
            debug!(%position, "Engagement never confirmed, treating as a miss");
            return CombatOutcome::Missed;
        }
        WaitOutcome::Interrupted => return CombatOutcome::Interrupted,
    }

    let resolved = wait_for(
        host,
        &mut guard,
        config,
        config.combat.kill_confirm_timeout_ms,
        |h, _| {
            if h.signals().kill_observed {
                return true;
            }
            let reading = h.health_indicator();
            reading.is_depleted() || !reading.visible
        },
    );
    match resolved {
        WaitOutcome::Satisfied => {}
        WaitOutcome::TimedOut => {
            warn!(%position, "Kill not confirmed in time");
            return CombatOutcome::Unresolved;
        }
        WaitOutcome::Interrupted => return CombatOutcome::Interrupted,
    }

    let corpse = credit_kill(host, &mut guard, config, position, point);
    CombatOutcome::Killed { position, corpse }
}

/// Book a confirmed kill: counters, ground resources, corpse and tracker.
///
/// Returns the corpse position if one was queued for harvest.
pub fn credit_kill<H: Host>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
    position: Position,
    point: ScreenPoint,
) -> Option<Position> {
    let previous = host.signals().total_kills;
    let counted = wait_for(host, state, config, config.combat.kill_counter_wait_ms, |h, _| {
        h.signals().total_kills > previous
    });

    let reported = match counted {
        WaitOutcome::Satisfied => host.signals().session_kills(),
        WaitOutcome::TimedOut | WaitOutcome::Interrupted => None,
    };
    match reported {
        Some(session) => {
            state.session_kills = state.session_kills.max(session);
            info!(%position, session_kills = state.session_kills, "Kill credited from reported total");
        }
        None => {
            state.session_kills = state.session_kills.saturating_add(1);
            info!(%position, session_kills = state.session_kills, "Kill credited");
        }
    }

    state.consume_resource();
    state.tracker.remove(position);

    if counted.is_interrupted() || !config.harvest.enabled {
        return None;
    }
    let Some(corpse) = acquisition::locate_corpse(host, state, config, point) else {
        debug!(%position, "No corpse found at death position");
        return None;
    };
    if state.ignore.contains(corpse) {
        debug!(%corpse, "Corpse already ignored");
        return None;
    }
    if !state.harvest.enqueue(corpse) {
        debug!(%corpse, "Corpse already queued");
        return None;
    }
    info!(%corpse, queued = state.harvest.len(), "Corpse queued for harvest");
    Some(corpse)
}
