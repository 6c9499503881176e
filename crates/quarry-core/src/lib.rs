//! Decision core for hunting perishable targets in a contested environment.
//!
//! The core locates a target from approximate visual signals, attacks it,
//! confirms the kill despite unreliable sensors, harvests what it leaves
//! behind, and relocates when rival agents interfere. Everything it senses
//! or does goes through the collaborator traits in [`host`].
//!
//! # Modules
//!
//! - [`acquisition`] -- Cluster-to-entity matching and the cluster cache.
//! - [`combat`] -- Attack attempts, engagement and kill confirmation.
//! - [`config`] -- [`HuntConfig`] loaded from YAML.
//! - [`error`] -- [`HuntError`], the hard stops.
//! - [`harvest`] -- Corpse queue and harvesting with nearby fallback.
//! - [`host`] -- Collaborator traits a host implements.
//! - [`ignore`] -- Time-limited position exclusion.
//! - [`menu`] -- Action-menu classification.
//! - [`occupancy`] -- Foreign-agent linger and rival-engagement detection.
//! - [`recovery`] -- Relocation on interference and scheduled rotations.
//! - [`scheduler`] -- Priority-ordered cooperative task loop.
//! - [`signals`] -- Signal board and log-line watcher.
//! - [`state`] -- [`HuntState`], shared by every component.
//! - [`tracker`] -- Bounded spawn-order target tracking.
//! - [`wait`] -- Bounded waits that end early on interference.
//!
//! [`HuntConfig`]: config::HuntConfig
//! [`HuntError`]: error::HuntError
//! [`HuntState`]: state::HuntState

pub mod acquisition;
pub mod combat;
pub mod config;
pub mod error;
pub mod harvest;
pub mod host;
pub mod ignore;
pub mod menu;
pub mod occupancy;
pub mod recovery;
pub mod scheduler;
pub mod signals;
pub mod state;
pub mod tracker;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;
