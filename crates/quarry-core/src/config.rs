//! Configuration loading and typed config structures for the hunt loop.
//!
//! A hunt profile is a YAML document whose sections mirror the components
//! of the core: `targeting`, `combat`, `harvest`, `occupancy`, `recovery`
//! and `signals`. Every field has a default, so an empty document is a
//! valid profile.

use std::path::Path;

use quarry_types::ColorSignature;
use rand::Rng;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The profile parsed but holds values the core cannot run with.
    #[error("invalid hunt configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level hunt configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HuntConfig {
    /// Target detection, tracking and ignore settings.
    #[serde(default)]
    pub targeting: TargetingConfig,

    /// Attack loop and kill confirmation.
    #[serde(default)]
    pub combat: CombatConfig,

    /// Corpse harvesting.
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Foreign-agent occupancy and rival detection.
    #[serde(default)]
    pub occupancy: OccupancyConfig,

    /// Relocation, drain and stabilization timing.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Log markers recognised by the log watcher.
    #[serde(default)]
    pub signals: SignalsConfig,

    /// Seed for the jitter RNG. Unset means seeded from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl HuntConfig {
    /// Load and validate a hunt profile from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate a hunt profile from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targeting.tracker_capacity == 0 {
            return Err(invalid("targeting.tracker_capacity must be at least 1"));
        }
        if self.combat.attack_attempt_cap == 0 {
            return Err(invalid("combat.attack_attempt_cap must be at least 1"));
        }
        if self.combat.shrink_percent == 0 || self.combat.shrink_percent > 100 {
            return Err(invalid("combat.shrink_percent must be within 1..=100"));
        }
        if self.combat.attack_actions.is_empty() {
            return Err(invalid("combat.attack_actions must name at least one action"));
        }
        if self.harvest.attempt_cap == 0 {
            return Err(invalid("harvest.attempt_cap must be at least 1"));
        }
        if self.harvest.animation.min_ms > self.harvest.animation.max_ms {
            return Err(invalid("harvest.animation.min_ms exceeds max_ms"));
        }
        if self.occupancy.self_exclusion >= self.occupancy.detection_radius {
            return Err(invalid(
                "occupancy.self_exclusion must be smaller than detection_radius",
            ));
        }
        for (name, backoff) in [
            ("combat.retry_backoff", self.combat.retry_backoff),
            ("combat.failure_backoff", self.combat.failure_backoff),
            ("harvest.backoff", self.harvest.backoff),
        ] {
            if backoff.min_ms > backoff.max_ms {
                return Err(ConfigError::Invalid {
                    reason: format!("{name}.min_ms exceeds max_ms"),
                });
            }
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// An inclusive range of milliseconds sampled uniformly for retry backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Backoff {
    /// Shortest delay.
    pub min_ms: u64,
    /// Longest delay.
    pub max_ms: u64,
}

impl Backoff {
    /// Create a backoff range.
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draw one delay from the range. A reversed range yields `min_ms`.
    pub fn sample(&self, rng: &mut impl Rng) -> u64 {
        if self.min_ms >= self.max_ms {
            return self.min_ms;
        }
        rng.random_range(self.min_ms..=self.max_ms)
    }
}

/// Target detection, tracking and ignore settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetingConfig {
    /// Colour signature of a live target.
    #[serde(default = "default_target_signature")]
    pub signature: ColorSignature,

    /// Most targets tracked at once.
    #[serde(default = "default_tracker_capacity")]
    pub tracker_capacity: usize,

    /// Age after which a tracked target is presumed gone.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,

    /// How long an ignored position stays ignored.
    #[serde(default = "default_ignore_ttl_ms")]
    pub ignore_ttl_ms: u64,

    /// How long a cluster scan is reused.
    #[serde(default = "default_cluster_cache_ttl_ms")]
    pub cluster_cache_ttl_ms: u64,

    /// Pixel distance below which a cluster matches an entity anchor.
    #[serde(default = "default_match_radius_px")]
    pub match_radius_px: u32,

    /// Tile radius around the agent within which entities are considered.
    #[serde(default = "default_scan_radius")]
    pub scan_radius: u16,

    /// Height hint passed to the projector for a target's hitbox.
    #[serde(default = "default_target_height")]
    pub target_height: i32,

    /// Quiet period after a scan finds nothing, before hunting is retried.
    #[serde(default = "default_no_target_cooldown_ms")]
    pub no_target_cooldown_ms: u64,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            signature: default_target_signature(),
            tracker_capacity: default_tracker_capacity(),
            stale_after_ms: default_stale_after_ms(),
            ignore_ttl_ms: default_ignore_ttl_ms(),
            cluster_cache_ttl_ms: default_cluster_cache_ttl_ms(),
            match_radius_px: default_match_radius_px(),
            scan_radius: default_scan_radius(),
            target_height: default_target_height(),
            no_target_cooldown_ms: default_no_target_cooldown_ms(),
        }
    }
}

/// Attack loop and kill confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CombatConfig {
    /// Attack attempts before a target is given up and ignored.
    #[serde(default = "default_attack_attempt_cap")]
    pub attack_attempt_cap: u32,

    /// Interaction region size as a percentage of the projected hitbox.
    #[serde(default = "default_shrink_percent")]
    pub shrink_percent: u32,

    /// Time allowed for the health indicator to confirm engagement.
    #[serde(default = "default_engage_timeout_ms")]
    pub engage_timeout_ms: u64,

    /// Time allowed for a kill to resolve once engaged.
    #[serde(default = "default_kill_confirm_timeout_ms")]
    pub kill_confirm_timeout_ms: u64,

    /// A combat session older than this is force-cleared.
    #[serde(default = "default_safety_valve_ms")]
    pub safety_valve_ms: u64,

    /// Time allowed for the authoritative kill total to move after a kill.
    #[serde(default = "default_kill_counter_wait_ms")]
    pub kill_counter_wait_ms: u64,

    /// Delay between attempts when the menu offered nothing usable.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: Backoff,

    /// Delay after an interaction failed to dispatch.
    #[serde(default = "default_failure_backoff")]
    pub failure_backoff: Backoff,

    /// Menu entries treated as an attack (case-insensitive substrings).
    #[serde(default = "default_attack_actions")]
    pub attack_actions: Vec<String>,

    /// Menu entries treated as a harvest (case-insensitive substrings).
    #[serde(default = "default_harvest_actions")]
    pub harvest_actions: Vec<String>,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            attack_attempt_cap: default_attack_attempt_cap(),
            shrink_percent: default_shrink_percent(),
            engage_timeout_ms: default_engage_timeout_ms(),
            kill_confirm_timeout_ms: default_kill_confirm_timeout_ms(),
            safety_valve_ms: default_safety_valve_ms(),
            kill_counter_wait_ms: default_kill_counter_wait_ms(),
            retry_backoff: default_retry_backoff(),
            failure_backoff: default_failure_backoff(),
            attack_actions: default_attack_actions(),
            harvest_actions: default_harvest_actions(),
        }
    }
}

/// Gaussian animation delay, clamped to `[min_ms, max_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AnimationDelay {
    /// Centre of the distribution.
    pub mean_ms: u64,
    /// Standard deviation.
    pub std_dev_ms: u64,
    /// Lower clamp.
    pub min_ms: u64,
    /// Upper clamp.
    pub max_ms: u64,
}

/// Corpse harvesting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HarvestConfig {
    /// Whether corpses are harvested at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Attempts on the recorded corpse position before the fallback.
    #[serde(default = "default_harvest_attempt_cap")]
    pub attempt_cap: u32,

    /// Time allowed for the harvest-started signal after dispatch.
    #[serde(default = "default_harvest_start_timeout_ms")]
    pub start_timeout_ms: u64,

    /// Duration of the harvest animation.
    #[serde(default = "default_animation")]
    pub animation: AnimationDelay,

    /// Tile radius searched for the corpse when its position went stale.
    #[serde(default = "default_fallback_radius")]
    pub fallback_radius: u16,

    /// Tile radius within which an entity keeps a queued corpse valid.
    #[serde(default = "default_validation_radius")]
    pub validation_radius: u16,

    /// Delay between harvest attempts.
    #[serde(default = "default_harvest_backoff")]
    pub backoff: Backoff,

    /// Height hint passed to the projector for a corpse.
    #[serde(default = "default_corpse_height")]
    pub corpse_height: i32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attempt_cap: default_harvest_attempt_cap(),
            start_timeout_ms: default_harvest_start_timeout_ms(),
            animation: default_animation(),
            fallback_radius: default_fallback_radius(),
            validation_radius: default_validation_radius(),
            backoff: default_harvest_backoff(),
            corpse_height: default_corpse_height(),
        }
    }
}

/// Rival-engagement detection from foreign health bars.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RivalConfig {
    /// Whether rival engagements are watched for.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Colour signature of a target health bar.
    #[serde(default = "default_health_bar_signature")]
    pub health_bar: ColorSignature,

    /// Minimum time between two health-bar scans.
    #[serde(default = "default_rival_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Health bars seen this soon after our own attack are ours.
    #[serde(default = "default_rival_attack_grace_ms")]
    pub attack_grace_ms: u64,

    /// Pixel distance within which a bar is attributed to an entity.
    #[serde(default = "default_rival_match_radius_px")]
    pub match_radius_px: u32,
}

impl Default for RivalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            health_bar: default_health_bar_signature(),
            check_interval_ms: default_rival_check_interval_ms(),
            attack_grace_ms: default_rival_attack_grace_ms(),
            match_radius_px: default_rival_match_radius_px(),
        }
    }
}

/// Foreign-agent occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OccupancyConfig {
    /// Whether lingering foreign agents raise interference.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tile radius within which foreign agents are tracked.
    #[serde(default = "default_detection_radius")]
    pub detection_radius: u16,

    /// Positions this close to our own are our own indicator, never a rival.
    #[serde(default = "default_self_exclusion")]
    pub self_exclusion: u16,

    /// Linger time after which a foreign agent is interference.
    #[serde(default = "default_linger_threshold_ms")]
    pub linger_threshold_ms: u64,

    /// Tile radius of the one-shot occupied check.
    #[serde(default = "default_occupied_check_radius")]
    pub occupied_check_radius: u16,

    /// Quiet period after a relocation during which occupancy is not judged.
    #[serde(default = "default_grace_ms")]
    pub post_relocation_grace_ms: u64,

    /// Quiet period after start-up during which occupancy is not judged.
    #[serde(default = "default_grace_ms")]
    pub startup_grace_ms: u64,

    /// Rival-engagement detection.
    #[serde(default)]
    pub rival: RivalConfig,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detection_radius: default_detection_radius(),
            self_exclusion: default_self_exclusion(),
            linger_threshold_ms: default_linger_threshold_ms(),
            occupied_check_radius: default_occupied_check_radius(),
            post_relocation_grace_ms: default_grace_ms(),
            startup_grace_ms: default_grace_ms(),
            rival: RivalConfig::default(),
        }
    }
}

/// Relocation, drain and stabilization timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecoveryConfig {
    /// Minimum time between two relocations.
    #[serde(default = "default_relocation_cooldown_ms")]
    pub relocation_cooldown_ms: u64,

    /// Pause after a relocation before the world is trusted again.
    #[serde(default = "default_stabilization_ms")]
    pub stabilization_ms: u64,

    /// Minimum time between two "is a rotation due" queries.
    #[serde(default = "default_rotation_check_cooldown_ms")]
    pub rotation_check_cooldown_ms: u64,

    /// Longest wait for ground resources to be consumed before rotating.
    #[serde(default = "default_resource_drain_timeout_ms")]
    pub resource_drain_timeout_ms: u64,

    /// Longest wait for the harvest queue to empty before rotating.
    #[serde(default = "default_corpse_drain_timeout_ms")]
    pub corpse_drain_timeout_ms: u64,

    /// Pause taken when no task is eligible.
    #[serde(default = "default_idle_pause_ms")]
    pub idle_pause_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            relocation_cooldown_ms: default_relocation_cooldown_ms(),
            stabilization_ms: default_stabilization_ms(),
            rotation_check_cooldown_ms: default_rotation_check_cooldown_ms(),
            resource_drain_timeout_ms: default_resource_drain_timeout_ms(),
            corpse_drain_timeout_ms: default_corpse_drain_timeout_ms(),
            idle_pause_ms: default_idle_pause_ms(),
        }
    }
}

/// Log markers recognised by the log watcher (case-insensitive substrings).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignalsConfig {
    /// A kill was credited to us.
    #[serde(default = "default_kill_marker")]
    pub kill_marker: String,

    /// Precedes the running kill total, e.g. `"total of 1,234"`.
    #[serde(default = "default_total_marker")]
    pub total_marker: String,

    /// The harvest animation began.
    #[serde(default = "default_harvest_marker")]
    pub harvest_marker: String,

    /// We ran out of the consumable needed to attack.
    #[serde(default = "default_supplies_marker")]
    pub supplies_marker: String,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            kill_marker: default_kill_marker(),
            total_marker: default_total_marker(),
            harvest_marker: default_harvest_marker(),
            supplies_marker: default_supplies_marker(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}

const fn default_target_signature() -> ColorSignature {
    ColorSignature {
        rgb: 0x00A1_8C52,
        tolerance: 12,
        min_cluster_size: 20,
        max_gap: 3,
    }
}

const fn default_health_bar_signature() -> ColorSignature {
    ColorSignature {
        rgb: 0x0000_FF00,
        tolerance: 8,
        min_cluster_size: 10,
        max_gap: 1,
    }
}

const fn default_tracker_capacity() -> usize {
    3
}

const fn default_stale_after_ms() -> u64 {
    10_000
}

const fn default_ignore_ttl_ms() -> u64 {
    30_000
}

const fn default_cluster_cache_ttl_ms() -> u64 {
    300
}

const fn default_match_radius_px() -> u32 {
    50
}

const fn default_scan_radius() -> u16 {
    15
}

const fn default_target_height() -> i32 {
    70
}

const fn default_no_target_cooldown_ms() -> u64 {
    3_000
}

const fn default_attack_attempt_cap() -> u32 {
    10
}

const fn default_shrink_percent() -> u32 {
    90
}

const fn default_engage_timeout_ms() -> u64 {
    3_000
}

const fn default_kill_confirm_timeout_ms() -> u64 {
    20_000
}

const fn default_safety_valve_ms() -> u64 {
    30_000
}

const fn default_kill_counter_wait_ms() -> u64 {
    2_000
}

const fn default_retry_backoff() -> Backoff {
    Backoff::new(300, 500)
}

const fn default_failure_backoff() -> Backoff {
    Backoff::new(300, 1_000)
}

fn default_attack_actions() -> Vec<String> {
    vec!["attack".to_owned()]
}

fn default_harvest_actions() -> Vec<String> {
    vec!["pluck".to_owned(), "harvest".to_owned()]
}

const fn default_harvest_attempt_cap() -> u32 {
    5
}

const fn default_harvest_start_timeout_ms() -> u64 {
    6_000
}

const fn default_animation() -> AnimationDelay {
    AnimationDelay {
        mean_ms: 2_100,
        std_dev_ms: 150,
        min_ms: 1_800,
        max_ms: 2_400,
    }
}

const fn default_fallback_radius() -> u16 {
    3
}

const fn default_validation_radius() -> u16 {
    1
}

const fn default_harvest_backoff() -> Backoff {
    Backoff::new(200, 400)
}

const fn default_corpse_height() -> i32 {
    40
}

const fn default_rival_check_interval_ms() -> u64 {
    300
}

const fn default_rival_attack_grace_ms() -> u64 {
    1_500
}

const fn default_rival_match_radius_px() -> u32 {
    100
}

const fn default_detection_radius() -> u16 {
    9
}

const fn default_self_exclusion() -> u16 {
    3
}

const fn default_linger_threshold_ms() -> u64 {
    3_000
}

const fn default_occupied_check_radius() -> u16 {
    15
}

const fn default_grace_ms() -> u64 {
    10_000
}

const fn default_relocation_cooldown_ms() -> u64 {
    8_000
}

const fn default_stabilization_ms() -> u64 {
    3_000
}

const fn default_rotation_check_cooldown_ms() -> u64 {
    2_000
}

const fn default_resource_drain_timeout_ms() -> u64 {
    60_000
}

const fn default_corpse_drain_timeout_ms() -> u64 {
    35_000
}

const fn default_idle_pause_ms() -> u64 {
    600
}

fn default_kill_marker() -> String {
    "scratch a notch".to_owned()
}

fn default_total_marker() -> String {
    "total of".to_owned()
}

fn default_harvest_marker() -> String {
    "you start plucking".to_owned()
}

fn default_supplies_marker() -> String {
    "no ammo left in your quiver".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = HuntConfig::default();
        assert_eq!(config.targeting.tracker_capacity, 3);
        assert_eq!(config.targeting.ignore_ttl_ms, 30_000);
        assert_eq!(config.targeting.cluster_cache_ttl_ms, 300);
        assert_eq!(config.combat.attack_attempt_cap, 10);
        assert_eq!(config.combat.kill_confirm_timeout_ms, 20_000);
        assert_eq!(config.combat.safety_valve_ms, 30_000);
        assert_eq!(config.harvest.attempt_cap, 5);
        assert_eq!(config.occupancy.detection_radius, 9);
        assert_eq!(config.occupancy.self_exclusion, 3);
        assert_eq!(config.occupancy.linger_threshold_ms, 3_000);
        assert_eq!(config.occupancy.post_relocation_grace_ms, 10_000);
        assert_eq!(config.recovery.relocation_cooldown_ms, 8_000);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_is_default() {
        let config = HuntConfig::parse("{}").unwrap();
        assert_eq!(config, HuntConfig::default());
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = r"
seed: 7
targeting:
  tracker_capacity: 5
  stale_after_ms: 15000
combat:
  attack_actions: [attack, fight]
  retry_backoff:
    min_ms: 100
    max_ms: 150
harvest:
  enabled: false
occupancy:
  linger_threshold_ms: 4500
  rival:
    enabled: false
";
        let config = HuntConfig::parse(yaml).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.targeting.tracker_capacity, 5);
        assert_eq!(config.targeting.stale_after_ms, 15_000);
        assert_eq!(config.targeting.ignore_ttl_ms, 30_000);
        assert_eq!(config.combat.attack_actions, vec!["attack", "fight"]);
        assert_eq!(config.combat.retry_backoff, Backoff::new(100, 150));
        assert!(!config.harvest.enabled);
        assert_eq!(config.occupancy.linger_threshold_ms, 4_500);
        assert!(!config.occupancy.rival.enabled);
        assert_eq!(config.occupancy.detection_radius, 9);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = HuntConfig::parse("targeting:\n  tracker_capacity: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = HuntConfig::parse("combat:\n  shrink_percent: 150\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let yaml = "harvest:\n  backoff:\n    min_ms: 500\n    max_ms: 100\n";
        let err = HuntConfig::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("harvest.backoff"));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = HuntConfig::parse("targeting: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn backoff_samples_stay_in_range() {
        let mut rng = SmallRng::seed_from_u64(3);
        let backoff = Backoff::new(300, 500);
        for _ in 0..200 {
            let delay = backoff.sample(&mut rng);
            assert!((300..=500).contains(&delay));
        }
        assert_eq!(Backoff::new(40, 40).sample(&mut rng), 40);
    }
}
