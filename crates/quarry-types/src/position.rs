//! World positions and their packed integer keys.
//!
//! The locator reports coarse tile coordinates with no stable identity, so a
//! position is its own identity. [`PositionKey`] packs a position into a
//! single `u32` for cheap map lookups:
//!
//! ```text
//!  31 30 | 29 ............ 15 | 14 ............. 0
//!  layer |        y           |        x
//! ```
//!
//! The packing is a bijection over `x, y` in `0..=32767` and `layer` in
//! `0..=3`. Coordinates outside that range are masked.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Largest coordinate value that survives packing.
pub const MAX_COORDINATE: u16 = 0x7FFF;

/// Largest layer value that survives packing.
pub const MAX_LAYER: u8 = 0x3;

const COORD_MASK: u32 = 0x7FFF;
const LAYER_MASK: u32 = 0x3;
const Y_SHIFT: u32 = 15;
const LAYER_SHIFT: u32 = 30;

/// A tile position in the world: `x`, `y` and a vertical layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal tile coordinate.
    pub x: u16,
    /// Vertical tile coordinate.
    pub y: u16,
    /// Vertical layer (floor level).
    pub layer: u8,
}

impl Position {
    /// Create a position.
    pub const fn new(x: u16, y: u16, layer: u8) -> Self {
        Self { x, y, layer }
    }

    /// Whether this position packs into a [`PositionKey`] without loss.
    pub const fn is_packable(&self) -> bool {
        self.x <= MAX_COORDINATE && self.y <= MAX_COORDINATE && self.layer <= MAX_LAYER
    }

    /// Pack this position into its integer key.
    pub fn key(&self) -> PositionKey {
        PositionKey::pack(*self)
    }

    /// Euclidean tile distance to `other`, ignoring layers.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }

    /// Chebyshev (king-move) tile distance to `other`, ignoring layers.
    pub const fn tile_distance(&self, other: &Self) -> u16 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }

    /// Whether both positions are on the same layer.
    pub const fn same_layer(&self, other: &Self) -> bool {
        self.layer == other.layer
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.layer)
    }
}

/// A [`Position`] packed into a single integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey(pub u32);

impl PositionKey {
    /// Pack a position. Out-of-range components are masked.
    pub fn pack(position: Position) -> Self {
        let x = u32::from(position.x) & COORD_MASK;
        let y = u32::from(position.y) & COORD_MASK;
        let layer = u32::from(position.layer) & LAYER_MASK;
        Self(layer.wrapping_shl(LAYER_SHIFT) | y.wrapping_shl(Y_SHIFT) | x)
    }

    /// Recover the packed position.
    pub fn unpack(self) -> Position {
        let x = u16::try_from(self.0 & COORD_MASK).unwrap_or(MAX_COORDINATE);
        let y = u16::try_from(self.0.wrapping_shr(Y_SHIFT) & COORD_MASK).unwrap_or(MAX_COORDINATE);
        let layer = u8::try_from(self.0.wrapping_shr(LAYER_SHIFT) & LAYER_MASK).unwrap_or(MAX_LAYER);
        Position { x, y, layer }
    }

    /// Return the raw packed value.
    pub const fn into_inner(self) -> u32 {
        self.0
    }
}

impl From<Position> for PositionKey {
    fn from(position: Position) -> Self {
        Self::pack(position)
    }
}

impl From<PositionKey> for Position {
    fn from(key: PositionKey) -> Self {
        key.unpack()
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unpack())
    }
}
