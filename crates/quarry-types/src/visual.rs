//! Visual detection results and the signatures that produce them.

use serde::{Deserialize, Serialize};

use crate::screen::{ScreenPoint, ScreenRegion};

/// Colour signature handed to the visual detector.
///
/// Pixels within `tolerance` of `rgb` are grouped into clusters; clusters
/// smaller than `min_cluster_size` pixels are discarded by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorSignature {
    /// Packed `0xRRGGBB` target colour.
    pub rgb: u32,
    /// Per-channel tolerance.
    pub tolerance: u8,
    /// Smallest pixel count reported as a cluster.
    pub min_cluster_size: u32,
    /// Largest pixel gap bridged when growing a cluster.
    pub max_gap: u32,
}

impl ColorSignature {
    /// Create a signature with the given colour and tolerance.
    pub const fn new(rgb: u32, tolerance: u8) -> Self {
        Self {
            rgb,
            tolerance,
            min_cluster_size: 1,
            max_gap: 3,
        }
    }
}

/// A group of adjacent pixels matching a [`ColorSignature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cluster {
    /// Screen bounds of the cluster.
    pub bounds: ScreenRegion,
    /// Number of matching pixels.
    pub pixel_count: u32,
}

impl Cluster {
    /// Create a cluster.
    pub const fn new(bounds: ScreenRegion, pixel_count: u32) -> Self {
        Self {
            bounds,
            pixel_count,
        }
    }

    /// Screen centroid, approximated by the centre of the bounds.
    pub const fn centroid(&self) -> ScreenPoint {
        self.bounds.center()
    }
}

/// One reading of the on-screen health indicator of our current opponent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealthReading {
    /// Whether the indicator is drawn at all.
    pub visible: bool,
    /// Remaining hitpoints, when the value could be read.
    pub hitpoints: Option<u32>,
}

impl HealthReading {
    /// No indicator on screen.
    pub const HIDDEN: Self = Self {
        visible: false,
        hitpoints: None,
    };

    /// A visible indicator showing `hitpoints`.
    pub const fn showing(hitpoints: u32) -> Self {
        Self {
            visible: true,
            hitpoints: Some(hitpoints),
        }
    }

    /// Visible with a strictly positive value.
    pub const fn is_alive(&self) -> bool {
        self.visible && matches!(self.hitpoints, Some(hp) if hp > 0)
    }

    /// Visible with a value of exactly zero.
    pub const fn is_depleted(&self) -> bool {
        self.visible && matches!(self.hitpoints, Some(0))
    }
}

/// What the host wants done when a scheduled rotation comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationKind {
    /// Move to a fresh environment instance.
    Relocate,
    /// Step away for a break, then resume in place.
    Break,
}
