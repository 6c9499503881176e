//! Collaborator traits the decision core consumes from its host.
//!
//! The core never touches the environment directly. Sensing, clicking,
//! waiting and relocating all go through the traits below, which a host
//! implements once. [`Host`] bundles them and is implemented automatically
//! for any type that implements every collaborator.

use quarry_types::{
    Cluster, ColorSignature, HealthReading, Position, RotationKind, ScreenRegion,
};

use crate::signals::SignalBoard;

/// Monotonic time and bounded waiting.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;

    /// Let `ms` milliseconds pass (one frame of real or simulated time).
    fn sleep(&mut self, ms: u64);

    /// Granularity of [`wait_until`](Clock::wait_until) polling.
    fn frame_ms(&self) -> u64 {
        50
    }

    /// Poll `condition` once per frame until it holds or `timeout_ms`
    /// elapses. Returns whether the condition was met.
    ///
    /// The condition is always evaluated at least once, including with a
    /// zero timeout.
    fn wait_until(
        &mut self,
        timeout_ms: u64,
        condition: &mut dyn FnMut(&mut Self) -> bool,
    ) -> bool
    where
        Self: Sized,
    {
        let deadline = self.now_ms().saturating_add(timeout_ms);
        loop {
            if condition(self) {
                return true;
            }
            let now = self.now_ms();
            if now >= deadline {
                return false;
            }
            let step = self.frame_ms().max(1).min(deadline.saturating_sub(now));
            self.sleep(step);
        }
    }
}

/// Colour-cluster detection and the opponent health indicator.
pub trait VisualDetector {
    /// Clusters of on-screen pixels matching `signature`.
    fn find_clusters(&mut self, signature: &ColorSignature) -> Vec<Cluster>;

    /// Current reading of our opponent's health indicator.
    fn health_indicator(&mut self) -> HealthReading;
}

/// Coarse positions from the minimap-style locator.
pub trait EntityLocator {
    /// Positions of candidate target entities.
    fn entity_positions(&self) -> Vec<Position>;

    /// Positions of other agents, which may include our own marker.
    fn agent_positions(&self) -> Vec<Position>;

    /// Our own position, when the locator can read it.
    fn self_position(&self) -> Option<Position>;
}

/// World-to-screen projection.
pub trait ScreenProjector {
    /// Screen region covered by a tile extruded to `height_hint` pixels, or
    /// `None` when the tile is off screen.
    fn project(&self, position: Position, height_hint: i32) -> Option<ScreenRegion>;
}

/// Contextual-menu interaction.
pub trait Interactor {
    /// Open the action menu on `region` and let `chooser` pick an entry by
    /// index from the raw menu texts. Returns whether an action was
    /// dispatched; `false` when the menu did not open or `chooser` declined.
    fn interact(
        &mut self,
        region: ScreenRegion,
        chooser: &mut dyn FnMut(&[String]) -> Option<usize>,
    ) -> bool;
}

/// Access to the externally updated [`SignalBoard`].
pub trait SignalSource {
    /// The host's signal board.
    fn signals(&mut self) -> &mut SignalBoard;
}

/// Relocation and scheduled rotations.
pub trait Relocator {
    /// Whether a relocation destination profile is configured.
    fn has_relocation_profile(&self) -> bool;

    /// Move to a fresh environment instance. Returns whether the move
    /// completed.
    fn relocate(&mut self) -> bool;

    /// Step away for a scheduled break and come back. Returns whether the
    /// break completed.
    fn take_break(&mut self) -> bool;

    /// Whether a scheduled rotation is due, and which kind.
    fn rotation_due(&mut self) -> Option<RotationKind>;
}

/// Result of validating the environment after start-up or relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The environment is usable.
    Ready,
    /// Not yet usable; ask again later.
    Retry,
    /// Unusable; the hunt must stop.
    Fatal(String),
}

/// One-time environment validation and setup.
pub trait EnvironmentValidator {
    /// Check (and prepare) the environment.
    fn validate_environment(&mut self) -> Validation;
}

/// Every collaborator the decision core needs.
pub trait Host:
    Clock
    + VisualDetector
    + EntityLocator
    + ScreenProjector
    + Interactor
    + SignalSource
    + Relocator
    + EnvironmentValidator
{
}

impl<T> Host for T where
    T: Clock
        + VisualDetector
        + EntityLocator
        + ScreenProjector
        + Interactor
        + SignalSource
        + Relocator
        + EnvironmentValidator
{
}
