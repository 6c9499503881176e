//! Shared mutable state of one hunt.
//!
//! Exactly one task runs at a time, so every component works on a plain
//! `&mut HuntState` lent out by the scheduler. Nothing here is locked; a
//! multi-threaded host must keep the scheduler on a single thread.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};

use crate::acquisition::ClusterCache;
use crate::combat::CombatSession;
use crate::config::HuntConfig;
use crate::harvest::HarvestQueue;
use crate::ignore::IgnoreRegistry;
use crate::occupancy::{OccupancyMonitor, RivalWatch};
use crate::recovery::PendingRotation;
use crate::tracker::TargetTracker;

/// Everything the hunt remembers between ticks.
#[derive(Debug, Clone)]
pub struct HuntState {
    /// Positions excluded from targeting.
    pub ignore: IgnoreRegistry,
    /// Believed-live targets in spawn order.
    pub tracker: TargetTracker,
    /// Last cluster scan.
    pub clusters: ClusterCache,
    /// The current or most recent engagement.
    pub combat: CombatSession,
    /// Corpses awaiting harvest.
    pub harvest: HarvestQueue,
    /// Foreign-agent linger tracking.
    pub occupancy: OccupancyMonitor,
    /// Rival health-bar watch.
    pub rival: RivalWatch,
    /// Jitter source for backoffs and animation delays.
    pub rng: SmallRng,
    /// Consumable ground resources placed and not yet consumed by a kill.
    pub ground_resources: u32,
    /// Kills credited this session.
    pub session_kills: u32,
    /// A rival is interfering; relocation is wanted.
    pub interference: bool,
    /// Environment validation must run before hunting resumes.
    pub validation_required: bool,
    /// A scheduled rotation waiting for perishables to drain.
    pub rotation: Option<PendingRotation>,
    /// A relocation or rotation is in progress.
    pub relocating: bool,
    /// When the last relocation completed (or was last attempted).
    pub last_relocation_at: Option<u64>,
    /// When the host was last asked whether a rotation is due.
    pub last_rotation_check_at: Option<u64>,
    /// When the hunt started.
    pub started_at: Option<u64>,
    /// When a scan last came up empty, for the no-target cooldown.
    pub no_target_since: Option<u64>,
}

impl HuntState {
    /// Fresh state for a hunt using `config`.
    pub fn new(config: &HuntConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        Self {
            ignore: IgnoreRegistry::new(config.targeting.ignore_ttl_ms),
            tracker: TargetTracker::new(
                config.targeting.tracker_capacity,
                config.targeting.stale_after_ms,
            ),
            clusters: ClusterCache::new(config.targeting.cluster_cache_ttl_ms),
            combat: CombatSession::default(),
            harvest: HarvestQueue::default(),
            occupancy: OccupancyMonitor::new(),
            rival: RivalWatch::new(),
            rng,
            ground_resources: 0,
            session_kills: 0,
            interference: false,
            validation_required: true,
            rotation: None,
            relocating: false,
            last_relocation_at: None,
            last_rotation_check_at: None,
            started_at: None,
            no_target_since: None,
        }
    }

    /// Raise the interference signal. Logs only on the rising edge.
    pub fn raise_interference(&mut self, reason: &str) {
        if !self.interference {
            warn!(reason, "Interference raised");
        }
        self.interference = true;
    }

    /// A logistics collaborator placed a perishable ground resource.
    ///
    /// Refused while a rotation is pending so the ground can drain.
    pub fn record_resource_placed(&mut self) -> bool {
        if self.rotation.is_some() {
            return false;
        }
        self.ground_resources = self.ground_resources.saturating_add(1);
        true
    }

    /// A kill consumed one ground resource, if any were out.
    pub const fn consume_resource(&mut self) {
        self.ground_resources = self.ground_resources.saturating_sub(1);
    }

    /// Whether logistics collaborators may place new perishables.
    pub const fn placement_allowed(&self) -> bool {
        self.rotation.is_none() && !self.relocating
    }

    /// Whether the relocation cooldown has elapsed at `now`.
    pub fn relocation_permitted(&self, now: u64, cooldown_ms: u64) -> bool {
        self.last_relocation_at
            .is_none_or(|at| now.saturating_sub(at) >= cooldown_ms)
    }

    /// Clear everything accumulated in the current environment.
    ///
    /// Session kill count, start time, relocation bookkeeping and the
    /// pending rotation survive; the guards that own them clear them.
    pub fn reset_all(&mut self) {
        self.interference = false;
        self.ground_resources = 0;
        self.harvest.clear();
        self.combat.clear();
        self.combat.last_attack_at = None;
        self.tracker.clear();
        self.ignore.clear();
        self.occupancy.reset();
        self.rival.reset();
        self.clusters.invalidate();
        self.no_target_since = None;
        self.validation_required = true;
        info!("Hunt state reset");
    }
}
