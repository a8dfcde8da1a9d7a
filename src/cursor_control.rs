//! Cursor actuation.
//!
//! [`CursorSink`] is the platform pointer. [`CursorActuator`] wraps a sink
//! with the final safety layer: it clamps to the screen, refuses non-finite
//! points, refuses to move once the emergency stop is raised, and limits the
//! update rate.

use crate::{
    config::{CursorConfig, SinkBackend},
    controller::EmergencyStop,
    geometry::ScreenPoint,
    utils::safe_cast::{dimension_to_u32, f64_to_i16_clamp, max_coordinate, secs_to_duration},
    Error, Result,
};
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use x11rb::{
    connection::Connection,
    protocol::xproto::{ConnectionExt, Window},
    rust_connection::RustConnection,
};

/// Platform pointer
pub trait CursorSink: Send {
    /// Screen size in pixels
    fn screen_bounds(&self) -> (u32, u32);

    /// Move the pointer to an in-bounds position
    ///
    /// # Errors
    ///
    /// Returns an error if the pointer could not be moved
    fn set_position(&mut self, x: f64, y: f64) -> Result<()>;

    /// Release the underlying device
    fn release(&mut self) {}

    /// Sink name for logging
    fn name(&self) -> &str;
}

/// Pointer control through the X11 `WarpPointer` request
pub struct X11CursorSink {
    connection: RustConnection,
    root: Window,
    width: u32,
    height: u32,
}

impl X11CursorSink {
    /// Connect to the display named by `$DISPLAY`
    ///
    /// # Errors
    ///
    /// Returns `SinkUnavailable` if the display cannot be reached
    pub fn connect() -> Result<Self> {
        info!("Initializing X11 cursor sink");

        let (connection, screen_num) = RustConnection::connect(None)
            .map_err(|e| Error::SinkUnavailable(format!("Failed to connect to X11: {e}")))?;

        let screen = connection
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| Error::SinkUnavailable("Failed to get screen".to_string()))?;
        let root = screen.root;
        let width = dimension_to_u32(screen.width_in_pixels)?;
        let height = dimension_to_u32(screen.height_in_pixels)?;

        info!("Connected to X11 display, screen: {width}x{height}");

        Ok(Self {
            connection,
            root,
            width,
            height,
        })
    }
}

impl CursorSink for X11CursorSink {
    fn screen_bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_position(&mut self, x: f64, y: f64) -> Result<()> {
        let x = f64_to_i16_clamp(x, 0, max_coordinate(self.width));
        let y = f64_to_i16_clamp(y, 0, max_coordinate(self.height));

        self.connection
            .warp_pointer(x11rb::NONE, self.root, 0, 0, 0, 0, x, y)
            .map_err(|e| Error::SinkUnavailable(format!("Failed to warp pointer: {e}")))?;

        self.connection
            .flush()
            .map_err(|e| Error::SinkUnavailable(format!("Failed to flush connection: {e}")))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "x11"
    }
}

/// Sink that only logs the positions it would apply
#[derive(Debug, Clone)]
pub struct LogCursorSink {
    width: u32,
    height: u32,
    last: Option<ScreenPoint>,
}

impl LogCursorSink {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            last: None,
        }
    }

    /// Most recent position
    #[must_use]
    pub const fn last_position(&self) -> Option<ScreenPoint> {
        self.last
    }
}

impl CursorSink for LogCursorSink {
    fn screen_bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_position(&mut self, x: f64, y: f64) -> Result<()> {
        debug!("Cursor -> ({x:.1}, {y:.1})");
        self.last = Some(ScreenPoint::new(x, y));
        Ok(())
    }

    fn release(&mut self) {
        if let Some(p) = self.last {
            info!("Log cursor sink released at ({:.1}, {:.1})", p.x, p.y);
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Build the sink selected in the configuration
///
/// # Errors
///
/// Returns `SinkUnavailable` if the X11 display cannot be reached
pub fn create_sink(config: &CursorConfig) -> Result<Box<dyn CursorSink>> {
    match config.backend {
        SinkBackend::X11 => Ok(Box::new(X11CursorSink::connect()?)),
        SinkBackend::Log => Ok(Box::new(LogCursorSink::new(
            config.log_screen_width,
            config.log_screen_height,
        ))),
    }
}

/// Actuation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkStats {
    /// Positions delivered to the sink
    pub moves: u64,
    /// Positions dropped by the rate limit
    pub skipped_moves: u64,
    /// Non-finite positions refused
    pub rejected_moves: u64,
}

/// What happened to one requested move
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Actuation {
    /// The pointer was moved to this (clamped) position
    Moved(ScreenPoint),
    /// Too soon after the previous move
    RateLimited,
    /// The position was not finite
    Rejected,
    /// The emergency stop is raised
    Halted,
}

/// Safety wrapper around a [`CursorSink`]
pub struct CursorActuator {
    sink: Box<dyn CursorSink>,
    emergency: EmergencyStop,
    min_update_interval: Duration,
    last_update: Option<Instant>,
    stats: SinkStats,
    released: bool,
}

impl CursorActuator {
    /// Wrap `sink`, refusing to move once `emergency` is raised
    #[must_use]
    pub fn new(sink: Box<dyn CursorSink>, emergency: EmergencyStop, min_update_interval: f64) -> Self {
        let (width, height) = sink.screen_bounds();
        info!(
            "Cursor actuator on '{}' sink: {width}x{height}, min interval {:.1}ms",
            sink.name(),
            min_update_interval * 1000.0
        );
        Self {
            sink,
            emergency,
            min_update_interval: secs_to_duration(min_update_interval),
            last_update: None,
            stats: SinkStats::default(),
            released: false,
        }
    }

    #[must_use]
    pub fn screen_bounds(&self) -> (u32, u32) {
        self.sink.screen_bounds()
    }

    #[must_use]
    pub const fn stats(&self) -> SinkStats {
        self.stats
    }

    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Move the pointer to `point`, clamped to the screen
    ///
    /// # Errors
    ///
    /// Returns `SinkUnavailable` if the sink was released or failed
    pub fn move_to(&mut self, point: ScreenPoint) -> Result<Actuation> {
        if self.released {
            return Err(Error::SinkUnavailable("cursor sink released".to_string()));
        }
        if self.emergency.is_raised() {
            return Ok(Actuation::Halted);
        }
        if !point.is_finite() {
            self.stats.rejected_moves += 1;
            warn!("Refusing non-finite cursor position ({}, {})", point.x, point.y);
            return Ok(Actuation::Rejected);
        }

        let now = Instant::now();
        if let Some(last) = self.last_update {
            if now.duration_since(last) < self.min_update_interval {
                self.stats.skipped_moves += 1;
                return Ok(Actuation::RateLimited);
            }
        }

        let (width, height) = self.sink.screen_bounds();
        let clamped = point.clamp_to_screen(width, height);
        self.sink.set_position(clamped.x, clamped.y).map_err(|e| match e {
            Error::SinkUnavailable(_) => e,
            other => Error::SinkUnavailable(other.to_string()),
        })?;

        self.last_update = Some(now);
        self.stats.moves += 1;
        Ok(Actuation::Moved(clamped))
    }

    /// Release the sink; later moves fail
    pub fn release(&mut self) {
        if !self.released {
            self.sink.release();
            self.released = true;
            info!(
                "Cursor sink '{}' released after {} moves ({} rate-limited, {} rejected)",
                self.sink.name(),
                self.stats.moves,
                self.stats.skipped_moves,
                self.stats.rejected_moves
            );
        }
    }
}

impl Drop for CursorActuator {
    fn drop(&mut self) {
        self.release();
    }
}
