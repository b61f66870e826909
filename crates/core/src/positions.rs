//! Position types for synchronized entities

use serde::{Deserialize, Serialize};

/// World-space position reported by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Heading in degrees from `self` towards `target`, counter-clockwise from +X
    ///
    /// A zero displacement yields `0.0` (`atan2(0, 0)`).
    pub fn heading_to(self, target: Position) -> f32 {
        let dy = target.y - self.y;
        let dx = target.x - self.x;
        dy.atan2(dx).to_degrees()
    }

    /// Calculate distance to another position
    pub fn distance_to(self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f32, f32)> for Position {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}
