//! Shared value types for the Quarry hunt-and-harvest core.
//!
//! Everything here is plain data: positions reported by the coarse entity
//! locator, screen geometry produced by the projector and the visual
//! detector, and a handful of small enums exchanged with the host.
//!
//! # Modules
//!
//! - [`position`] -- Tile positions and their packed [`PositionKey`]
//! - [`screen`] -- Screen points and rectangular regions
//! - [`visual`] -- Colour signatures, clusters and health readings

pub mod position;
pub mod screen;
pub mod visual;

pub use position::{MAX_COORDINATE, MAX_LAYER, Position, PositionKey};
pub use screen::{ScreenPoint, ScreenRegion};
pub use visual::{Cluster, ColorSignature, HealthReading, RotationKind};
