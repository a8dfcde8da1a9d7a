use crate::geometry::ScreenPoint;

/// Blend weight of a first-order low-pass filter with time constant `tau`
/// after `dt` seconds. `tau <= 0` disables smoothing.
#[must_use]
pub fn smoothing_alpha(dt: f64, tau: f64) -> f64 {
    if tau <= 0.0 {
        1.0
    } else {
        1.0 - (-dt / tau).exp()
    }
}

/// Move `previous` toward `raw` by `alpha`
#[must_use]
pub fn blend(previous: ScreenPoint, raw: ScreenPoint, alpha: f64) -> ScreenPoint {
    ScreenPoint::new(
        alpha.mul_add(raw.x - previous.x, previous.x),
        alpha.mul_add(raw.y - previous.y, previous.y),
    )
}
