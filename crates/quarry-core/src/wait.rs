//! Bounded, interruptible waits.
//!
//! Every wait in the core goes through [`wait_for`]. Each frame it runs the
//! occupancy watch before the caller's condition, so a rival showing up
//! mid-wait ends the wait with [`WaitOutcome::Interrupted`] within one frame.
//! There is no unbounded wait anywhere.

use crate::config::HuntConfig;
use crate::host::Host;
use crate::occupancy;
use crate::state::HuntState;

/// How a bounded wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held before the timeout.
    Satisfied,
    /// The timeout elapsed first.
    TimedOut,
    /// Interference was raised; the caller must unwind.
    Interrupted,
}

impl WaitOutcome {
    /// Whether the wait was cut short by interference.
    pub const fn is_interrupted(self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Poll `condition` each frame for up to `timeout_ms`.
///
/// Interference raised before the wait or during any frame wins over the
/// condition.
pub fn wait_for<H, F>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
    timeout_ms: u64,
    mut condition: F,
) -> WaitOutcome
where
    H: Host,
    F: FnMut(&mut H, &mut HuntState) -> bool,
{
    if state.interference {
        return WaitOutcome::Interrupted;
    }
    let met = host.wait_until(timeout_ms, &mut |h: &mut H| {
        occupancy::watch(h, state, config);
        if state.interference {
            return true;
        }
        condition(h, state)
    });
    if state.interference {
        WaitOutcome::Interrupted
    } else if met {
        WaitOutcome::Satisfied
    } else {
        WaitOutcome::TimedOut
    }
}

/// Let `ms` pass while still watching for interference.
///
/// Returns `false` when interrupted.
pub fn pause<H: Host>(host: &mut H, state: &mut HuntState, config: &HuntConfig, ms: u64) -> bool {
    !wait_for(host, state, config, ms, |_, _| false).is_interrupted()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use quarry_types::Position;

    use super::*;
    use crate::testing::FakeHost;

    fn quiet_config() -> HuntConfig {
        let mut config = HuntConfig::default();
        config.occupancy.rival.enabled = false;
        config
    }

    #[test]
    fn satisfied_before_timeout() {
        let config = quiet_config();
        let mut host = FakeHost::new();
        let mut state = HuntState::new(&config);
        let start = host.clock;
        let outcome = wait_for(&mut host, &mut state, &config, 1_000, |h, _| {
            h.clock >= start + 200
        });
        assert_eq!(outcome, WaitOutcome::Satisfied);
        assert!(host.clock < start + 1_000);
    }

    #[test]
    fn times_out_after_the_full_window() {
        let config = quiet_config();
        let mut host = FakeHost::new();
        let mut state = HuntState::new(&config);
        let start = host.clock;
        let outcome = wait_for(&mut host, &mut state, &config, 3_000, |_, _| false);
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(host.clock, start + 3_000);
    }

    #[test]
    fn interference_mid_wait_interrupts() {
        let config = quiet_config();
        let mut host = FakeHost::new();
        let mut state = HuntState::new(&config);
        // A rival walks in and never leaves.
        host.agents.push(Position::new(3205, 3000, 0));
        let outcome = wait_for(&mut host, &mut state, &config, 20_000, |_, _| false);
        assert_eq!(outcome, WaitOutcome::Interrupted);
        assert!(state.interference);
        assert!(host.clock < 20_000);
    }

    #[test]
    fn pause_reports_interruption() {
        let config = quiet_config();
        let mut host = FakeHost::new();
        let mut state = HuntState::new(&config);
        assert!(pause(&mut host, &mut state, &config, 500));
        state.interference = true;
        assert!(!pause(&mut host, &mut state, &config, 500));
    }
}
