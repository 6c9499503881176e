//! Relocation on interference and scheduled rotations.
//!
//! Two paths lead out of the current environment:
//!
//! - [`relocate_now`] -- interference was raised. Subject to a cooldown, the
//!   host relocates, the world is given time to settle, and all
//!   accumulated state is reset. A pending scheduled relocation counts as
//!   done once this move completes.
//! - [`check_rotation`] / [`rotate`] -- the host reports a scheduled break
//!   or hop. Placing new perishables stops at once; the rotation itself
//!   waits out the relocation cooldown and until [`drain_complete`] says
//!   what is on the ground, then what is in the harvest queue, has been
//!   used up (or each drain timed out).
//!
//! The `relocating` flag and the pending rotation are owned by
//! [`RelocationGuard`] and [`RotationGuard`] and released on every path out.

use core::ops::{Deref, DerefMut};

use quarry_types::RotationKind;
use tracing::{debug, info, warn};

use crate::config::HuntConfig;
use crate::error::HuntError;
use crate::host::Host;
use crate::state::HuntState;

/// A rotation the host asked for, waiting for the drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRotation {
    /// Break or relocation.
    pub kind: RotationKind,
    /// When the host reported it due.
    pub requested_at: u64,
    /// When the ground resources were first seen drained (or gave up on).
    /// The corpse drain is timed from here.
    pub resources_drained_at: Option<u64>,
}

impl PendingRotation {
    /// A rotation of `kind` requested at `now`.
    pub const fn new(kind: RotationKind, now: u64) -> Self {
        Self {
            kind,
            requested_at: now,
            resources_drained_at: None,
        }
    }

    /// How long the rotation has been pending at `now`.
    pub const fn waited_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.requested_at)
    }
}

/// Holds `relocating` for as long as it lives.
pub struct RelocationGuard<'a> {
    state: &'a mut HuntState,
}

impl<'a> RelocationGuard<'a> {
    /// Mark a relocation in progress.
    pub const fn begin(state: &'a mut HuntState) -> Self {
        state.relocating = true;
        Self { state }
    }
}

impl Deref for RelocationGuard<'_> {
    type Target = HuntState;

    fn deref(&self) -> &HuntState {
        self.state
    }
}

impl DerefMut for RelocationGuard<'_> {
    fn deref_mut(&mut self) -> &mut HuntState {
        self.state
    }
}

impl Drop for RelocationGuard<'_> {
    fn drop(&mut self) {
        self.state.relocating = false;
    }
}

/// Clears the pending rotation when dropped.
pub struct RotationGuard<'a> {
    state: &'a mut HuntState,
}

impl<'a> RotationGuard<'a> {
    /// Take ownership of the pending rotation.
    pub const fn new(state: &'a mut HuntState) -> Self {
        Self { state }
    }
}

impl Deref for RotationGuard<'_> {
    type Target = HuntState;

    fn deref(&self) -> &HuntState {
        self.state
    }
}

impl DerefMut for RotationGuard<'_> {
    fn deref_mut(&mut self) -> &mut HuntState {
        self.state
    }
}

impl Drop for RotationGuard<'_> {
    fn drop(&mut self) {
        self.state.rotation = None;
    }
}

/// Whether an immediate relocation should be attempted at `now`.
pub fn relocation_due(state: &HuntState, config: &HuntConfig, now: u64) -> bool {
    state.interference
        && !state.relocating
        && state.relocation_permitted(now, config.recovery.relocation_cooldown_ms)
}

/// Relocate because of interference.
///
/// Returns `Ok(false)` when the cooldown has not elapsed or the host could
/// not complete the move; interference stays raised and the attempt is
/// repeated once the cooldown allows.
pub fn relocate_now<H: Host>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
) -> Result<bool, HuntError> {
    let now = host.now_ms();
    if !state.relocation_permitted(now, config.recovery.relocation_cooldown_ms) {
        debug!("Relocation cooling down");
        return Ok(false);
    }
    if !host.has_relocation_profile() {
        warn!("Interference detected but no relocation profile is configured");
        return Err(HuntError::NoRelocationProfile);
    }

    info!(session_kills = state.session_kills, "Relocating away from interference");
    let mut guard = RelocationGuard::begin(state);
    if !host.relocate() {
        warn!("Relocation did not complete");
        guard.last_relocation_at = Some(host.now_ms());
        return Ok(false);
    }
    settle(host, &mut guard, config);
    if guard
        .rotation
        .is_some_and(|pending| pending.kind == RotationKind::Relocate)
    {
        // This move already is the scheduled one.
        info!("Pending scheduled relocation satisfied");
        guard.rotation = None;
    }
    info!("Relocation complete");
    Ok(true)
}

/// Ask the host whether a scheduled rotation is due, at most once per
/// check cooldown. Returns whether a rotation is pending.
pub fn check_rotation<H: Host>(host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool {
    if state.rotation.is_some() {
        return true;
    }
    let now = host.now_ms();
    let checked_recently = state
        .last_rotation_check_at
        .is_some_and(|at| now.saturating_sub(at) < config.recovery.rotation_check_cooldown_ms);
    if checked_recently {
        return false;
    }
    state.last_rotation_check_at = Some(now);

    let Some(kind) = host.rotation_due() else {
        return false;
    };
    info!(
        ?kind,
        ground_resources = state.ground_resources,
        queued_corpses = state.harvest.len(),
        "Rotation due, draining before leaving"
    );
    state.rotation = Some(PendingRotation::new(kind, now));
    true
}

/// Whether the pending rotation should be carried out now: it is pending,
/// the relocation cooldown has elapsed and the drain is complete.
pub fn rotation_ready<H: Host>(host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool {
    if !check_rotation(host, state, config) {
        return false;
    }
    let now = host.now_ms();
    if !state.relocation_permitted(now, config.recovery.relocation_cooldown_ms) {
        debug!("Rotation waiting out the relocation cooldown");
        return false;
    }
    drain_complete(state, config, now)
}

/// Whether a pending rotation may proceed at `now`.
///
/// The two drains run one after the other. Placed resources drain for up
/// to the resource timeout from the request; after that, with harvesting
/// enabled, queued corpses get a fresh window of up to the corpse timeout.
pub fn drain_complete(state: &mut HuntState, config: &HuntConfig, now: u64) -> bool {
    let Some(pending) = state.rotation.as_mut() else {
        return false;
    };
    let waited = pending.waited_ms(now);
    let recovery = &config.recovery;

    let resources_left = state.ground_resources > 0;
    if resources_left && waited < recovery.resource_drain_timeout_ms {
        return false;
    }
    let drained_at = *pending.resources_drained_at.get_or_insert(now);
    let corpses_left = config.harvest.enabled && !state.harvest.is_empty();
    if corpses_left && now.saturating_sub(drained_at) < recovery.corpse_drain_timeout_ms {
        return false;
    }
    if resources_left || corpses_left {
        warn!(
            ground_resources = state.ground_resources,
            queued_corpses = state.harvest.len(),
            waited,
            "Drain timed out, rotating anyway"
        );
    }
    true
}

/// Carry out the pending rotation.
///
/// Returns `Ok(false)` when nothing was pending or the host could not
/// complete it. The pending rotation is cleared either way. Callers check
/// the relocation cooldown first; see [`rotation_ready`].
pub fn rotate<H: Host>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
) -> Result<bool, HuntError> {
    let Some(pending) = state.rotation else {
        return Ok(false);
    };
    let mut rotation = RotationGuard::new(state);
    let mut guard = RelocationGuard::begin(&mut rotation);

    let completed = match pending.kind {
        RotationKind::Break => {
            info!("Taking scheduled break");
            host.take_break()
        }
        RotationKind::Relocate => {
            if !host.has_relocation_profile() {
                warn!("Scheduled relocation but no relocation profile is configured");
                return Err(HuntError::NoRelocationProfile);
            }
            info!("Scheduled relocation");
            host.relocate()
        }
    };
    if !completed {
        warn!(kind = ?pending.kind, "Rotation did not complete");
        return Ok(false);
    }
    settle(host, &mut guard, config);
    info!(kind = ?pending.kind, "Rotation complete");
    Ok(true)
}

/// Stabilize after arriving somewhere new, then forget the old environment.
fn settle<H: Host>(host: &mut H, state: &mut HuntState, config: &HuntConfig) {
    host.wait_until(config.recovery.stabilization_ms, &mut |_| false);
    host.signals().clear_transient();
    state.reset_all();
    state.last_relocation_at = Some(host.now_ms());
}
