//! Error types for the gaze cursor library.

use thiserror::Error;

use crate::controller::SessionMode;

/// Reasons a calibration session cannot be turned into a usable model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// Fewer than the required number of distinct targets were captured
    #[error("incomplete calibration: {collected} of {required} targets captured")]
    IncompleteCalibration {
        /// Distinct targets captured so far
        collected: usize,
        /// Targets required for a fit
        required: usize,
    },

    /// Samples cannot support a stable mapping: coincident or collinear gaze,
    /// or targets that are duplicated or off-screen
    #[error("degenerate calibration: {0}")]
    Degenerate(String),
}

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Calibration fit failed
    #[error("Calibration fit error: {0}")]
    Fit(#[from] FitError),

    /// A sample was already recorded for this calibration target
    #[error("Duplicate calibration target {index}")]
    DuplicateTarget {
        /// Index of the target within the session layout
        index: usize,
    },

    /// The point or index does not name one of the session targets
    #[error("Unknown calibration target: {0}")]
    UnknownTarget(String),

    /// Not enough stable gaze samples were collected for the current target
    #[error("Not enough fixation data: {0}")]
    NotEnoughFixation(String),

    /// Tracking was requested but no usable calibration model exists
    #[error("No calibration available")]
    NoCalibration,

    /// Stored calibration was captured on a different screen
    #[error("Calibration was captured at {stored_width}x{stored_height}, screen is {width}x{height}")]
    IncompatibleCalibration {
        /// Width recorded in the model
        stored_width: u32,
        /// Height recorded in the model
        stored_height: u32,
        /// Current screen width
        width: u32,
        /// Current screen height
        height: u32,
    },

    /// No stored calibration exists
    #[error("Calibration not found")]
    CalibrationNotFound,

    /// Command not permitted in the current session mode
    #[error("Cannot {command} while {mode}")]
    InvalidTransition {
        /// Mode the controller was in
        mode: SessionMode,
        /// Command that was rejected
        command: &'static str,
    },

    /// Cursor or camera hardware failed; the session is stopped
    #[error("Device unavailable: {0}")]
    SinkUnavailable(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A worker thread ended abnormally
    #[error("Thread error: {0}")]
    Thread(String),

    /// Calibration storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding or decoding failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether this error means hardware is gone and the session must stop
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::SinkUnavailable(_))
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_error_converts() {
        let err: Error = FitError::Degenerate("collinear".to_string()).into();
        assert!(matches!(err, Error::Fit(FitError::Degenerate(_))));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = Error::Fit(FitError::IncompleteCalibration { collected: 3, required: 5 });
        assert!(err.to_string().contains("3 of 5"));

        let err = Error::InvalidTransition {
            mode: SessionMode::Tracking,
            command: "add a calibration point",
        };
        assert_eq!(err.to_string(), "Cannot add a calibration point while tracking");
        assert!(Error::SinkUnavailable("x11".into()).is_fatal());
    }
}
