//! Gaze-driven cursor control.
//!
//! This library turns face-mesh landmarks from an external detector into
//! pointer movement:
//! - A geometric gaze estimator with head-pose compensation
//! - A five-point thin-plate spline calibration from gaze to screen pixels
//! - A low-pass, dead-zone and velocity-cap smoother
//! - A cursor actuator with an emergency stop that is checked before every move
//!
//! The pipeline is sequenced by a [`controller::Controller`] state machine:
//!
//! ```text
//! Idle -> Calibrating -> Idle -> Tracking <-> Paused
//!                     any state -> Stopped
//! ```
//!
//! # Examples
//!
//! ## Calibrate and map a gaze vector
//!
//! ```no_run
//! use gaze_cursor::calibration::Calibrator;
//! use gaze_cursor::gaze_estimation::GazeFeatureVector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let calibrator = Calibrator::default();
//! let mut session = calibrator.start_calibration(1920, 1080);
//!
//! let gaze = [(0.0, 0.0), (-0.6, -0.5), (0.6, -0.5), (-0.6, 0.5), (0.6, 0.5)];
//! for (index, (x, y)) in gaze.into_iter().enumerate() {
//!     calibrator.add_sample_at(&mut session, index, GazeFeatureVector::new(x, y))?;
//! }
//!
//! let model = calibrator.finish(&session)?;
//! let point = model.apply(&GazeFeatureVector::new(0.1, 0.2));
//! println!("Looking at ({:.0}, {:.0})", point.x, point.y);
//! # Ok(())
//! # }
//! ```
//!
//! ## Estimate gaze from landmarks
//!
//! ```no_run
//! use gaze_cursor::gaze_estimation::{GazeEstimate, GazeEstimator};
//! use gaze_cursor::landmarks::synthetic::SyntheticFace;
//!
//! let estimator = GazeEstimator::default();
//! let landmarks = SyntheticFace::default().with_gaze(0.3, -0.2).build();
//!
//! match estimator.estimate(&landmarks) {
//!     GazeEstimate::Gaze(gaze) => println!("Gaze ({:.3}, {:.3})", gaze.x(), gaze.y()),
//!     GazeEstimate::NoFace(reason) => println!("No face: {reason}"),
//! }
//! ```
//!
//! ## Run a session
//!
//! ```no_run
//! use gaze_cursor::{app::{slot_provider, GazeCursorApp}, config::Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let (slot, provider) = slot_provider(&config.runtime);
//! let running = GazeCursorApp::new(&config, Box::new(provider))?.spawn()?;
//!
//! // A detector thread publishes observations into `slot`;
//! // UI threads drive the session through the handle.
//! let handle = running.handle().clone();
//! handle.start_tracking()?;
//!
//! // Safe to call from any thread at any time
//! handle.emergency_stop();
//! running.join()?;
//! # drop(slot);
//! # Ok(())
//! # }
//! ```

/// Application wiring and the processing loop
pub mod app;

/// Calibration sessions, fitting and persistence records
pub mod calibration;

/// Configuration management
pub mod config;

/// Constants used throughout the application
pub mod constants;

/// Session state machine and its thread-safe handle
pub mod controller;

/// Cursor sinks and the actuation safety layer
pub mod cursor_control;

/// Error types and result handling
pub mod error;

/// Gaze feature extraction from face-mesh landmarks
pub mod gaze_estimation;

/// Screen-space geometry
pub mod geometry;

/// Landmark sets and providers
pub mod landmarks;

/// Single-slot newest-value mailbox
pub mod latest;

/// Temporal filtering of cursor positions
pub mod smoothing;

/// Calibration storage backends
pub mod storage;

/// Frame rate measurement
pub mod timing;

/// Utility functions for numeric conversions
pub mod utils;

pub use error::{Error, FitError, Result};
