//! Rehearsal binary: runs the hunt scheduler against a scripted world.
//!
//! ```text
//! quarry-sim [scenario.yaml] [max-ticks]
//! ```
//!
//! Without a scenario file the built-in defaults are used. Logging honours
//! `RUST_LOG` and defaults to `info`.

use std::path::Path;

use anyhow::Context as _;
use quarry_core::scheduler::Scheduler;
use quarry_sim::config::SimConfig;
use quarry_sim::world::SimHost;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Ticks to run when none are given.
const DEFAULT_MAX_TICKS: u64 = 500;

/// Entry point for the rehearsal binary.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded or fails validation.
/// A hunt that stops early is logged, not returned.
fn main() -> anyhow::Result<()> {
    // 1. Structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // 2. Scenario and tick limit.
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SimConfig::from_file(Path::new(&path))
            .with_context(|| format!("loading scenario {path}"))?,
        None => SimConfig::default(),
    };
    let max_ticks = match args.next() {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid tick count {raw:?}"))?,
        None => DEFAULT_MAX_TICKS,
    };
    info!(
        max_ticks,
        seed = config.world.seed,
        rivals = config.world.rivals.len(),
        harvest = config.hunt.harvest.enabled,
        "Scenario loaded"
    );

    // 3. World and scheduler.
    let mut host = SimHost::new(config.world, &config.hunt);
    let mut scheduler =
        Scheduler::with_default_tasks(config.hunt).context("building scheduler")?;

    match scheduler.run(&mut host, max_ticks) {
        Ok(summary) => info!(
            ticks = summary.ticks,
            session_kills = summary.session_kills,
            "Rehearsal finished"
        ),
        Err(e) => warn!(error = %e, "Rehearsal stopped early"),
    }

    let stats = host.stats();
    info!(
        spawned = stats.spawned,
        kills = stats.kills,
        harvests = stats.harvests,
        despawned = stats.despawned,
        relocations = stats.relocations,
        breaks = stats.breaks,
        "World totals"
    );
    Ok(())
}
