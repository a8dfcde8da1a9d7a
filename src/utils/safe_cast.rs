//! Checked numeric conversions for pixel coordinates and durations

use crate::{Error, Result};
use std::time::Duration;

/// Round a pixel coordinate and clamp it into `[min, max]` as an X11 coordinate
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i16_clamp(value: f64, min: i16, max: i16) -> i16 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.round().clamp(f64::from(min), f64::from(max));
    (clamped as i16).clamp(min, max)
}

/// Convert a screen dimension reported by the display server
///
/// # Errors
///
/// Returns an error for an empty dimension
pub fn dimension_to_u32(value: u16) -> Result<u32> {
    if value == 0 {
        return Err(Error::InvalidInput("Screen dimension must be non-zero".to_string()));
    }
    Ok(u32::from(value))
}

/// Largest X11 coordinate for a screen dimension
#[must_use]
pub fn max_coordinate(dimension: u32) -> i16 {
    i16::try_from(dimension.saturating_sub(1)).unwrap_or(i16::MAX)
}

/// Seconds to a `Duration`, mapping negative or non-finite values to zero
#[must_use]
pub fn secs_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
