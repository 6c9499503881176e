//! Screen-space geometry: points and rectangular regions.

use serde::{Deserialize, Serialize};

/// A pixel coordinate on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPoint {
    /// Horizontal pixel coordinate.
    pub x: i32,
    /// Vertical pixel coordinate.
    pub y: i32,
}

impl ScreenPoint {
    /// Create a screen point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean pixel distance to `other`.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }
}

/// An axis-aligned screen rectangle.
///
/// Interaction regions come from projecting a tile (plus a height hint) onto
/// the screen; detections carry the bounds of their pixel cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenRegion {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl ScreenRegion {
    /// Create a region from its top-left corner and size.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre of the region (integer division, rounding toward the top-left).
    pub const fn center(&self) -> ScreenPoint {
        ScreenPoint {
            x: self.x.saturating_add(self.width / 2),
            y: self.y.saturating_add(self.height / 2),
        }
    }

    /// Midpoint of the top edge. Health bars render just above it.
    pub const fn top_center(&self) -> ScreenPoint {
        ScreenPoint {
            x: self.x.saturating_add(self.width / 2),
            y: self.y,
        }
    }

    /// Scale the region about its centre to `percent` of its size.
    ///
    /// Used to keep clicks off the edge of a hitbox. `percent` above 100
    /// grows the region.
    pub fn scaled(&self, percent: u32) -> Self {
        let pct = i64::from(percent);
        let width = i64::from(self.width).saturating_mul(pct) / 100;
        let height = i64::from(self.height).saturating_mul(pct) / 100;
        let width = i32::try_from(width).unwrap_or(self.width);
        let height = i32::try_from(height).unwrap_or(self.height);
        let center = self.center();
        Self {
            x: center.x.saturating_sub(width / 2),
            y: center.y.saturating_sub(height / 2),
            width,
            height,
        }
    }

    /// Whether `point` lies inside the region (edges inclusive).
    pub const fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x <= self.x.saturating_add(self.width)
            && point.y <= self.y.saturating_add(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_and_top_center() {
        let region = ScreenRegion::new(100, 200, 40, 60);
        assert_eq!(region.center(), ScreenPoint::new(120, 230));
        assert_eq!(region.top_center(), ScreenPoint::new(120, 200));
    }

    #[test]
    fn scaling_keeps_the_centre() {
        let region = ScreenRegion::new(100, 100, 100, 50);
        let shrunk = region.scaled(90);
        assert_eq!(shrunk.width, 90);
        assert_eq!(shrunk.height, 45);
        assert_eq!(shrunk.center(), ScreenPoint::new(150, 125));
        assert!(region.contains(shrunk.center()));
    }

    #[test]
    fn point_distance() {
        let a = ScreenPoint::new(0, 0);
        let b = ScreenPoint::new(30, 40);
        assert!((a.distance_to(&b) - 50.0).abs() < f64::EPSILON);
    }
}
