//! Corpse harvesting after a kill.
//!
//! Combat queues the corpse of each confirmed kill. The harvester works the
//! queue in order once no live target is visible: each corpse gets a fixed
//! number of direct attempts, then a fallback over nearby entities (the
//! recorded position may be a tile off), and is dropped either way so a
//! despawned corpse cannot pin the harvester forever.

use quarry_types::Position;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::acquisition;
use crate::config::HuntConfig;
use crate::host::Host;
use crate::menu::{self, MenuAction};
use crate::state::HuntState;
use crate::wait::{self, WaitOutcome, wait_for};

/// Ordered, duplicate-free queue of corpse positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestQueue {
    corpses: Vec<Position>,
}

impl HarvestQueue {
    /// Append `corpse` unless already queued. Returns whether it was added.
    pub fn enqueue(&mut self, corpse: Position) -> bool {
        if self.contains(corpse) {
            return false;
        }
        self.corpses.push(corpse);
        true
    }

    /// Remove `corpse`. Returns whether it was queued.
    pub fn remove(&mut self, corpse: Position) -> bool {
        let before = self.corpses.len();
        self.corpses.retain(|c| *c != corpse);
        self.corpses.len() < before
    }

    /// Whether `corpse` is queued.
    pub fn contains(&self, corpse: Position) -> bool {
        self.corpses.contains(&corpse)
    }

    /// Copy of the queue, safe to iterate while harvesting mutates it.
    pub fn snapshot(&self) -> Vec<Position> {
        self.corpses.clone()
    }

    /// Drop corpses with no entity within `radius` tiles.
    ///
    /// An empty entity list means the feed could not be read, not that every
    /// corpse is gone, so nothing is dropped.
    pub fn validate(&mut self, entities: &[Position], radius: u16) -> usize {
        if entities.is_empty() {
            return 0;
        }
        let limit = f64::from(radius);
        let before = self.corpses.len();
        self.corpses.retain(|corpse| {
            let present = entities
                .iter()
                .any(|e| e.same_layer(corpse) && e.distance_to(corpse) <= limit);
            if !present {
                debug!(%corpse, "Queued corpse despawned");
            }
            present
        });
        before.saturating_sub(self.corpses.len())
    }

    /// Number of queued corpses.
    pub fn len(&self) -> usize {
        self.corpses.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.corpses.is_empty()
    }

    /// Forget every queued corpse.
    pub fn clear(&mut self) {
        self.corpses.clear();
    }
}

/// Result of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestBatch {
    /// The snapshot was worked through.
    Completed {
        /// Corpses harvested.
        harvested: u32,
        /// Corpses given up on.
        dropped: u32,
    },
    /// A live target appeared; hunting takes priority.
    Preempted,
    /// Interference cut the batch short.
    Interrupted,
}

/// Result of harvesting a single corpse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestResult {
    /// Harvested, directly or through the fallback.
    Harvested,
    /// Every attempt failed; the corpse was dropped from the queue.
    GaveUp,
    /// Interference cut the harvest short.
    Interrupted,
}

enum Attempt {
    Done,
    Failed,
    Interrupted,
}

/// Drop despawned corpses from the queue.
pub fn validate_queue<H: Host>(host: &H, state: &mut HuntState, config: &HuntConfig) -> usize {
    if state.harvest.is_empty() {
        return 0;
    }
    let entities = host.entity_positions();
    let removed = state
        .harvest
        .validate(&entities, config.harvest.validation_radius);
    if removed > 0 {
        info!(removed, remaining = state.harvest.len(), "Validated harvest queue");
    }
    removed
}

/// Harvest every queued corpse, yielding to any live target.
pub fn harvest_all<H: Host>(host: &mut H, state: &mut HuntState, config: &HuntConfig) -> HarvestBatch {
    validate_queue(host, state, config);
    let batch = state.harvest.snapshot();
    let mut harvested: u32 = 0;
    let mut dropped: u32 = 0;

    for corpse in batch {
        if state.interference {
            return HarvestBatch::Interrupted;
        }
        if acquisition::has_live_target(host, state, config) {
            info!(remaining = state.harvest.len(), "Live target visible, deferring harvest");
            return HarvestBatch::Preempted;
        }
        if !state.harvest.contains(corpse) {
            continue;
        }
        match harvest_one(host, state, config, corpse) {
            HarvestResult::Harvested => harvested = harvested.saturating_add(1),
            HarvestResult::GaveUp => dropped = dropped.saturating_add(1),
            HarvestResult::Interrupted => return HarvestBatch::Interrupted,
        }
    }
    HarvestBatch::Completed { harvested, dropped }
}

/// Harvest one corpse: direct attempts, then nearby entities.
pub fn harvest_one<H: Host>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
    corpse: Position,
) -> HarvestResult {
    for attempt in 1..=config.harvest.attempt_cap {
        if state.interference {
            return HarvestResult::Interrupted;
        }
        match try_harvest(host, state, config, corpse) {
            Attempt::Done => {
                state.harvest.remove(corpse);
                state.ignore.insert(corpse, host.now_ms());
                info!(%corpse, attempt, remaining = state.harvest.len(), "Corpse harvested");
                return HarvestResult::Harvested;
            }
            Attempt::Interrupted => return HarvestResult::Interrupted,
            Attempt::Failed => {
                debug!(%corpse, attempt, "Harvest attempt failed");
                let delay = config.harvest.backoff.sample(&mut state.rng);
                if !wait::pause(host, state, config, delay) {
                    return HarvestResult::Interrupted;
                }
            }
        }
    }

    let result = harvest_nearby(host, state, config, corpse);
    if result == HarvestResult::GaveUp {
        warn!(%corpse, "Giving up on corpse");
    }
    state.harvest.remove(corpse);
    result
}

fn harvest_nearby<H: Host>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
    corpse: Position,
) -> HarvestResult {
    let limit = f64::from(config.harvest.fallback_radius);
    let mut nearby: Vec<(Position, f64)> = host
        .entity_positions()
        .into_iter()
        .filter(|e| e.same_layer(&corpse))
        .map(|e| (e, e.distance_to(&corpse)))
        .filter(|(_, d)| *d <= limit)
        .collect();
    nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
    debug!(%corpse, candidates = nearby.len(), "Trying entities near corpse");

    for (entity, _) in nearby {
        if state.interference {
            return HarvestResult::Interrupted;
        }
        match try_harvest(host, state, config, entity) {
            Attempt::Done => {
                let now = host.now_ms();
                state.ignore.insert(entity, now);
                state.ignore.insert(corpse, now);
                info!(%corpse, %entity, "Corpse harvested at nearby position");
                return HarvestResult::Harvested;
            }
            Attempt::Interrupted => return HarvestResult::Interrupted,
            Attempt::Failed => {}
        }
    }
    HarvestResult::GaveUp
}

fn try_harvest<H: Host>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
    position: Position,
) -> Attempt {
    let Some(region) = host.project(position, config.harvest.corpse_height) else {
        return Attempt::Failed;
    };
    host.signals().harvest_started = false;
    let dispatched = host.interact(region, &mut |entries: &[String]| {
        entries
            .iter()
            .position(|e| menu::classify(e, &config.combat) == MenuAction::Harvest)
    });
    if !dispatched {
        return Attempt::Failed;
    }

    let started = wait_for(host, state, config, config.harvest.start_timeout_ms, |h, _| {
        h.signals().harvest_started
    });
    match started {
        WaitOutcome::Satisfied => {}
        WaitOutcome::TimedOut => return Attempt::Failed,
        WaitOutcome::Interrupted => return Attempt::Interrupted,
    }

    let delay = animation_delay(&mut state.rng, config);
    if wait::pause(host, state, config, delay) {
        Attempt::Done
    } else {
        Attempt::Interrupted
    }
}

/// Draw a harvest animation duration from the configured gaussian.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn animation_delay(rng: &mut impl Rng, config: &HuntConfig) -> u64 {
    let shape = config.harvest.animation;
    // Box-Muller; `1 - u` keeps the logarithm finite.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (core::f64::consts::TAU * u2).cos();
    let sample = (shape.std_dev_ms as f64).mul_add(z, shape.mean_ms as f64);
    let clamped = sample.clamp(shape.min_ms as f64, shape.max_ms as f64);
    clamped.round() as u64
}
