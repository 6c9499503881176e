//! Correlates colour clusters with the coarse entity feed.
//!
//! Neither source is trustworthy alone: clusters have no world position and
//! the entity feed has no notion of which entity is alive. Each entity near
//! the agent is projected to a screen anchor, and each cluster is matched to
//! the anchor nearest its centroid.
//!
//! # Selection policy
//!
//! Clusters are visited largest first (stable, so equal sizes keep detector
//! order). The first cluster whose nearest anchor lies inside the match
//! radius and is not ignored wins. Every cluster is examined before giving
//! up, so a large corpse blob sorting first never hides a smaller live
//! target behind it.

use std::cmp::Reverse;

use quarry_types::{Cluster, ColorSignature, Position, ScreenPoint};
use tracing::debug;

use crate::config::HuntConfig;
use crate::host::{Clock, EntityLocator, ScreenProjector, VisualDetector};
use crate::ignore::IgnoreRegistry;
use crate::state::HuntState;

/// An entity position and where it lands on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// World position reported by the locator.
    pub position: Position,
    /// Centre of its projected hitbox.
    pub point: ScreenPoint,
}

/// Short-lived cache of the last cluster scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterCache {
    ttl_ms: u64,
    scanned_at: Option<u64>,
    clusters: Vec<Cluster>,
}

impl ClusterCache {
    /// Create an empty cache whose scans are reused for `ttl_ms`.
    pub const fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            scanned_at: None,
            clusters: Vec::new(),
        }
    }

    /// Cached clusters, rescanning when the cache is empty or expired.
    pub fn fetch<H>(&mut self, host: &mut H, signature: &ColorSignature) -> Vec<Cluster>
    where
        H: Clock + VisualDetector,
    {
        let now = host.now_ms();
        let fresh = self
            .scanned_at
            .is_some_and(|at| now.saturating_sub(at) < self.ttl_ms);
        if !fresh {
            self.clusters = host.find_clusters(signature);
            self.scanned_at = Some(now);
        }
        self.clusters.clone()
    }

    /// Force the next [`fetch`](Self::fetch) to rescan.
    pub fn invalidate(&mut self) {
        self.scanned_at = None;
        self.clusters.clear();
    }
}

/// Project every entity within the scan radius to a screen anchor.
pub fn screen_anchors<H>(host: &H, config: &HuntConfig) -> Vec<Anchor>
where
    H: EntityLocator + ScreenProjector,
{
    let origin = host.self_position();
    let radius = f64::from(config.targeting.scan_radius);
    host.entity_positions()
        .into_iter()
        .filter(|pos| {
            origin.is_none_or(|me| me.same_layer(pos) && me.distance_to(pos) <= radius)
        })
        .filter_map(|position| {
            host.project(position, config.targeting.target_height)
                .map(|region| Anchor {
                    position,
                    point: region.center(),
                })
        })
        .collect()
}

/// Anchor nearest to `point`, with its pixel distance. Ties keep the first.
pub fn nearest_anchor<'a, I>(point: ScreenPoint, anchors: I) -> Option<(Anchor, f64)>
where
    I: IntoIterator<Item = &'a Anchor>,
{
    let mut best: Option<(Anchor, f64)> = None;
    for anchor in anchors {
        let distance = anchor.point.distance_to(&point);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((*anchor, distance));
        }
    }
    best
}

/// Pure selection step of [`acquire`]: largest matched, non-ignored cluster.
pub fn select_target(
    clusters: &[Cluster],
    anchors: &[Anchor],
    ignore: &IgnoreRegistry,
    match_radius_px: u32,
) -> Option<Position> {
    let mut ordered: Vec<&Cluster> = clusters.iter().collect();
    ordered.sort_by_key(|c| Reverse(c.pixel_count));
    let limit = f64::from(match_radius_px);

    for cluster in ordered {
        let centroid = cluster.centroid();
        let Some((anchor, distance)) = nearest_anchor(centroid, anchors) else {
            continue;
        };
        if distance >= limit {
            debug!(pixels = cluster.pixel_count, distance, "Cluster unmatched");
            continue;
        }
        if ignore.contains(anchor.position) {
            debug!(position = %anchor.position, "Cluster matched an ignored position");
            continue;
        }
        return Some(anchor.position);
    }
    None
}

/// Pure selection step of [`locate_corpse`].
///
/// Each cluster is matched to its nearest non-ignored anchor; among the
/// matches, the cluster closest to `near` wins.
pub fn select_corpse(
    clusters: &[Cluster],
    anchors: &[Anchor],
    ignore: &IgnoreRegistry,
    match_radius_px: u32,
    near: ScreenPoint,
) -> Option<Position> {
    let live: Vec<&Anchor> = anchors
        .iter()
        .filter(|a| !ignore.contains(a.position))
        .collect();
    let limit = f64::from(match_radius_px);

    let mut best: Option<(Position, f64)> = None;
    for cluster in clusters {
        let centroid = cluster.centroid();
        let Some((anchor, distance)) = nearest_anchor(centroid, live.iter().copied()) else {
            continue;
        };
        if distance >= limit {
            continue;
        }
        let from_attack = centroid.distance_to(&near);
        if best.is_none_or(|(_, d)| from_attack < d) {
            best = Some((anchor.position, from_attack));
        }
    }
    best.map(|(position, _)| position)
}

/// Best live target on screen right now, if any.
///
/// Sweeps expired ignores, reads clusters through the cache and pulls the
/// entity feed exactly once.
pub fn acquire<H>(host: &mut H, state: &mut HuntState, config: &HuntConfig) -> Option<Position>
where
    H: Clock + VisualDetector + EntityLocator + ScreenProjector,
{
    state.ignore.sweep(host.now_ms());
    let clusters = state.clusters.fetch(host, &config.targeting.signature);
    if clusters.is_empty() {
        return None;
    }
    let anchors = screen_anchors(host, config);
    select_target(
        &clusters,
        &anchors,
        &state.ignore,
        config.targeting.match_radius_px,
    )
}

/// Whether any cluster maps to a non-ignored entity.
pub fn has_live_target<H>(host: &mut H, state: &mut HuntState, config: &HuntConfig) -> bool
where
    H: Clock + VisualDetector + EntityLocator + ScreenProjector,
{
    acquire(host, state, config).is_some()
}

/// Find the corpse of a just-killed target near the last attack point.
///
/// Always rescans: the cached scan predates the kill.
pub fn locate_corpse<H>(
    host: &mut H,
    state: &mut HuntState,
    config: &HuntConfig,
    near: ScreenPoint,
) -> Option<Position>
where
    H: Clock + VisualDetector + EntityLocator + ScreenProjector,
{
    state.clusters.invalidate();
    let clusters = state.clusters.fetch(host, &config.targeting.signature);
    if clusters.is_empty() {
        return None;
    }
    let anchors = screen_anchors(host, config);
    select_corpse(
        &clusters,
        &anchors,
        &state.ignore,
        config.targeting.match_radius_px,
        near,
    )
}
