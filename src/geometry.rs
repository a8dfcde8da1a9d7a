//! Screen-space points shared by the calibrator, smoother and cursor sink.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A point in screen coordinates (pixels, origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl ScreenPoint {
    /// Create a new screen point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length when treated as a displacement
    #[must_use]
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Distance to another point
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (self - other).norm()
    }

    /// Both coordinates are finite
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Clamp into `[0, width) × [0, height)`.
    ///
    /// The upper limit is the last addressable pixel, `width - 1`.
    #[must_use]
    pub fn clamp_to_screen(self, width: u32, height: u32) -> Self {
        let max_x = f64::from(width.saturating_sub(1));
        let max_y = f64::from(height.saturating_sub(1));
        Self {
            x: self.x.clamp(0.0, max_x),
            y: self.y.clamp(0.0, max_y),
        }
    }

    /// Whether the point lies within `[0, width) × [0, height)`
    #[must_use]
    pub fn is_within(self, width: u32, height: u32) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x < f64::from(width) && self.y < f64::from(height)
    }
}

impl Add for ScreenPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for ScreenPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for ScreenPoint {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}
