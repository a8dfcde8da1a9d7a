//! Session states and the snapshot exposed to the UI.

use crate::{
    calibration::{CalibrationProgress, CalibrationSession, ModelSummary},
    cursor_control::SinkStats,
    gaze_estimation::{GazeFeatureVector, NoFace},
    smoothing::{CursorCommand, CursorFrame, SmootherMemory},
};
use std::fmt;

/// Session mode without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    Calibrating,
    Tracking,
    Paused,
    Stopped,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Calibrating => "calibrating",
            Self::Tracking => "tracking",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why tracking is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Paused by a command
    User,
    /// Too many consecutive frames without a face
    FaceLost,
}

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stopped by a command
    User,
    /// Emergency stop
    Emergency,
    /// Camera or cursor hardware failed
    HardwareFailure,
}

/// Controller state. `Stopped` is terminal.
#[derive(Debug, Clone)]
pub enum ControllerState {
    Idle,
    Calibrating(CalibrationSession),
    Tracking,
    Paused(PauseReason),
    Stopped(StopReason),
}

impl ControllerState {
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        match self {
            Self::Idle => SessionMode::Idle,
            Self::Calibrating(_) => SessionMode::Calibrating,
            Self::Tracking => SessionMode::Tracking,
            Self::Paused(_) => SessionMode::Paused,
            Self::Stopped(_) => SessionMode::Stopped,
        }
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }
}

/// Snapshot of the session for display and debugging
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub mode: SessionMode,
    pub pause_reason: Option<PauseReason>,
    pub stop_reason: Option<StopReason>,
    /// Target layout and progress while calibrating
    pub calibration: Option<CalibrationProgress>,
    /// Active calibration model
    pub model: Option<ModelSummary>,
    /// Smoother memory (last emitted position and time)
    pub smoother: Option<SmootherMemory>,
    /// Last raw mapped position
    pub last_frame: Option<CursorFrame>,
    /// Last filtered command
    pub last_command: Option<CursorCommand>,
    pub last_gaze: Option<GazeFeatureVector>,
    /// Reason the most recent frame had no usable face
    pub last_no_face: Option<NoFace>,
    pub consecutive_misses: u32,
    pub frames_processed: u64,
    /// Processed frames per second
    pub fps: f64,
    /// Frames replaced in the mailbox before processing
    pub dropped_frames: u64,
    pub sink: SinkStats,
    pub emergency_stop: bool,
    pub last_error: Option<String>,
}
