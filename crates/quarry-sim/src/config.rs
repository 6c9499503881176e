//! Scenario files for the simulated world.
//!
//! A scenario is a YAML document with two sections: `hunt`, the
//! [`HuntConfig`] the core runs with, and `world`, which scripts the
//! simulated environment. Both are optional.

use std::path::Path;

use quarry_core::config::{ConfigError, HuntConfig};
use quarry_types::{Position, RotationKind};
use serde::Deserialize;

/// A complete rehearsal scenario.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimConfig {
    /// Configuration handed to the scheduler.
    #[serde(default)]
    pub hunt: HuntConfig,

    /// The simulated world.
    #[serde(default)]
    pub world: WorldConfig,
}

impl SimConfig {
    /// Load a scenario from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse a scenario and validate its hunt section.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.hunt.validate()?;
        Ok(config)
    }
}

/// Script for the simulated environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Seed for spawn placement and hit rolls.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Where we stand.
    #[serde(default = "default_home")]
    pub home: Position,

    /// Time of the first spawn.
    #[serde(default = "default_first_spawn_ms")]
    pub first_spawn_ms: u64,

    /// Mean time between spawns.
    #[serde(default = "default_spawn_interval_ms")]
    pub spawn_interval_ms: u64,

    /// Stop spawning after this many targets. Unset spawns forever.
    #[serde(default)]
    pub spawn_limit: Option<u32>,

    /// Live targets allowed at once.
    #[serde(default = "default_max_alive")]
    pub max_alive: usize,

    /// Spawns land within this many tiles of home.
    #[serde(default = "default_spawn_radius")]
    pub spawn_radius: u16,

    /// Hitpoints of a fresh target.
    #[serde(default = "default_hitpoints")]
    pub hitpoints: u32,

    /// Time between our hits once engaged.
    #[serde(default = "default_hit_interval_ms")]
    pub hit_interval_ms: u64,

    /// Largest single hit.
    #[serde(default = "default_max_hit")]
    pub max_hit: u32,

    /// How long a corpse stays before despawning.
    #[serde(default = "default_corpse_ttl_ms")]
    pub corpse_ttl_ms: u64,

    /// How long a corpse keeps its live colouring.
    #[serde(default = "default_corpse_fade_ms")]
    pub corpse_fade_ms: u64,

    /// Ammunition available. Unset is unlimited.
    #[serde(default)]
    pub ammunition: Option<u32>,

    /// Kill total already on record when the run starts.
    #[serde(default)]
    pub starting_total: u32,

    /// Number of log lines visible at once.
    #[serde(default = "default_log_window")]
    pub log_window: usize,

    /// Whether a relocation destination is configured.
    #[serde(default = "default_true")]
    pub relocation_profile: bool,

    /// Time a relocation takes.
    #[serde(default = "default_hop_duration_ms")]
    pub hop_duration_ms: u64,

    /// Time a scheduled break takes.
    #[serde(default = "default_break_duration_ms")]
    pub break_duration_ms: u64,

    /// Other agents that show up during the run.
    #[serde(default)]
    pub rivals: Vec<RivalScript>,

    /// A scheduled rotation.
    #[serde(default)]
    pub rotation: Option<RotationScript>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            home: default_home(),
            first_spawn_ms: default_first_spawn_ms(),
            spawn_interval_ms: default_spawn_interval_ms(),
            spawn_limit: None,
            max_alive: default_max_alive(),
            spawn_radius: default_spawn_radius(),
            hitpoints: default_hitpoints(),
            hit_interval_ms: default_hit_interval_ms(),
            max_hit: default_max_hit(),
            corpse_ttl_ms: default_corpse_ttl_ms(),
            corpse_fade_ms: default_corpse_fade_ms(),
            ammunition: None,
            starting_total: 0,
            log_window: default_log_window(),
            relocation_profile: true,
            hop_duration_ms: default_hop_duration_ms(),
            break_duration_ms: default_break_duration_ms(),
            rivals: Vec::new(),
            rotation: None,
        }
    }
}

/// Another agent's visit, relative to home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RivalScript {
    /// When the rival arrives.
    pub arrives_at_ms: u64,
    /// When the rival leaves. Unset stays until we relocate.
    #[serde(default)]
    pub leaves_at_ms: Option<u64>,
    /// Tile offset east of home.
    #[serde(default)]
    pub dx: i32,
    /// Tile offset north of home.
    #[serde(default)]
    pub dy: i32,
    /// Whether the rival fights targets while present.
    #[serde(default)]
    pub engages: bool,
}

/// A rotation the world will ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RotationScript {
    /// When the rotation becomes due.
    pub due_at_ms: u64,
    /// Break or relocation.
    pub kind: RotationKind,
}

const fn default_seed() -> u64 {
    7
}

const fn default_home() -> Position {
    Position::new(3200, 3000, 0)
}

const fn default_first_spawn_ms() -> u64 {
    1_000
}

const fn default_spawn_interval_ms() -> u64 {
    8_000
}

const fn default_max_alive() -> usize {
    2
}

const fn default_spawn_radius() -> u16 {
    6
}

const fn default_hitpoints() -> u32 {
    5
}

const fn default_hit_interval_ms() -> u64 {
    1_200
}

const fn default_max_hit() -> u32 {
    3
}

const fn default_corpse_ttl_ms() -> u64 {
    30_000
}

const fn default_corpse_fade_ms() -> u64 {
    600
}

const fn default_log_window() -> usize {
    8
}

const fn default_true() -> bool {
    true
}

const fn default_hop_duration_ms() -> u64 {
    4_000
}

const fn default_break_duration_ms() -> u64 {
    60_000
}
