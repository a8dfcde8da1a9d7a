//! Temporal filtering of mapped cursor positions.
//!
//! Each frame passes through a time-constant low-pass filter, a dead zone and
//! a velocity cap, in that order. The filter state is the last emitted point,
//! so holding still inside the dead zone never accumulates drift.

/// Time-constant low-pass blending
pub mod low_pass;

use crate::{config::TrackingParams, geometry::ScreenPoint};
use low_pass::{blend, smoothing_alpha};

/// Raw mapped position for one input frame, before filtering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorFrame {
    pub position: ScreenPoint,
    /// Frame timestamp (seconds)
    pub timestamp: f64,
}

/// Filtered position ready for actuation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorCommand {
    pub position: ScreenPoint,
    /// Implied velocity since the previous command (pixels per second)
    pub velocity: ScreenPoint,
    pub timestamp: f64,
}

impl CursorCommand {
    /// Speed in pixels per second
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }
}

/// Cross-frame memory: the last emitted position and its timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmootherMemory {
    pub position: ScreenPoint,
    pub timestamp: f64,
}

/// Low-pass, dead-zone and velocity-cap filter
#[derive(Debug, Clone)]
pub struct Smoother {
    params: TrackingParams,
    bounds: Option<(u32, u32)>,
    memory: Option<SmootherMemory>,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(TrackingParams::default())
    }
}

impl Smoother {
    #[must_use]
    pub const fn new(params: TrackingParams) -> Self {
        Self {
            params,
            bounds: None,
            memory: None,
        }
    }

    #[must_use]
    pub const fn params(&self) -> &TrackingParams {
        &self.params
    }

    /// Replace parameters; position memory is kept
    pub fn set_params(&mut self, params: TrackingParams) {
        self.params = params;
    }

    /// Clamp every emitted point to a `width` x `height` screen
    pub fn set_bounds(&mut self, width: u32, height: u32) {
        self.bounds = Some((width, height));
    }

    #[must_use]
    pub const fn bounds(&self) -> Option<(u32, u32)> {
        self.bounds
    }

    #[must_use]
    pub const fn memory(&self) -> Option<SmootherMemory> {
        self.memory
    }

    /// Forget position memory; the next frame seeds the filter
    pub fn reset(&mut self) {
        self.memory = None;
    }

    fn clamp(&self, point: ScreenPoint) -> ScreenPoint {
        self.bounds
            .map_or(point, |(width, height)| point.clamp_to_screen(width, height))
    }

    /// Filter one frame
    pub fn filter_frame(&mut self, frame: &CursorFrame) -> CursorCommand {
        self.filter(frame.position, frame.timestamp)
    }

    /// Filter a raw mapped point observed at `timestamp` (seconds)
    pub fn filter(&mut self, raw: ScreenPoint, timestamp: f64) -> CursorCommand {
        let Some(previous) = self.memory else {
            let position = self.clamp(raw);
            if position.is_finite() && timestamp.is_finite() {
                self.memory = Some(SmootherMemory { position, timestamp });
            }
            return CursorCommand {
                position,
                velocity: ScreenPoint::default(),
                timestamp,
            };
        };

        let hold = CursorCommand {
            position: previous.position,
            velocity: ScreenPoint::default(),
            timestamp: previous.timestamp,
        };

        let elapsed = timestamp - previous.timestamp;
        if !(elapsed > 0.0) || !raw.is_finite() {
            return hold;
        }
        let dt = elapsed.min(self.params.max_frame_gap);

        let alpha = smoothing_alpha(dt, self.params.smoothing_time_constant);
        let filtered = blend(previous.position, raw, alpha);

        let displacement = filtered - previous.position;
        let distance = displacement.norm();
        if distance < self.params.dead_zone_radius {
            self.memory = Some(SmootherMemory {
                position: previous.position,
                timestamp,
            });
            return CursorCommand { timestamp, ..hold };
        }

        let max_step = self.params.max_velocity * dt;
        let capped = if distance > max_step {
            previous.position + displacement * (max_step / distance)
        } else {
            filtered
        };

        let position = self.clamp(capped);
        self.memory = Some(SmootherMemory { position, timestamp });
        CursorCommand {
            position,
            velocity: (position - previous.position) * (1.0 / dt),
            timestamp,
        }
    }
}
