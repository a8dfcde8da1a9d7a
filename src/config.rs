//! Configuration management for the gaze cursor application

use crate::{constants::CALIBRATION_TARGET_COUNT, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gaze estimation configuration
    pub estimator: EstimatorConfig,

    /// Calibration configuration
    pub calibration: CalibrationConfig,

    /// Runtime-tunable tracking parameters
    pub tracking: TrackingParams,

    /// Cursor actuation configuration
    pub cursor: CursorConfig,

    /// Calibration storage configuration
    pub storage: StorageConfig,

    /// Processing loop configuration
    pub runtime: RuntimeConfig,
}

/// Geometry thresholds and head-pose compensation gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Smallest distance between eye centers (normalized image units)
    pub min_interocular_distance: f64,

    /// Smallest lid-gap to eye-width ratio before the eye counts as closed
    pub min_eye_openness: f64,

    /// Smallest eye width relative to the interocular distance
    pub min_eye_width_ratio: f64,

    /// Largest plausible normalized iris offset
    pub max_iris_offset: f64,

    /// Gain applied to head yaw before adding it to horizontal gaze
    pub yaw_compensation: f64,

    /// Gain applied to head pitch before adding it to vertical gaze
    pub pitch_compensation: f64,
}

/// Calibration layout and fit thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Target positions as fractions of the screen size
    pub targets: Vec<[f64; 2]>,

    /// Smallest accepted ratio between the minor and major scatter of gaze samples
    pub degeneracy_ratio: f64,

    /// Largest accepted reproduction error at a calibration target (pixels)
    pub consistency_tolerance: f64,

    /// Number of gaze samples kept while fixating a target
    pub fixation_window: usize,

    /// Samples required before a target can be captured
    pub min_fixation_samples: usize,

    /// Fraction trimmed from each end before averaging a fixation
    pub outlier_trim: f64,

    /// Largest accepted standard deviation of a fixation, per component
    pub max_fixation_std_dev: f64,
}

/// Smoothing and safety parameters, adjustable while tracking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingParams {
    /// Displacements below this radius are suppressed (pixels)
    pub dead_zone_radius: f64,

    /// Largest cursor speed (pixels per second)
    pub max_velocity: f64,

    /// Low-pass time constant (seconds); 0 disables smoothing
    pub smoothing_time_constant: f64,

    /// Largest elapsed time credited to a single frame (seconds)
    pub max_frame_gap: f64,

    /// Consecutive frames without a face before tracking pauses; 0 disables
    pub consecutive_miss_threshold: u32,
}

/// Cursor actuation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    /// Warp the X11 pointer
    X11,
    /// Only log the positions that would be applied
    Log,
}

/// Cursor actuation configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Cursor backend
    pub backend: SinkBackend,

    /// Minimum time between two pointer updates (seconds)
    pub min_update_interval: f64,

    /// Screen size used by the log backend
    pub log_screen_width: u32,

    /// Screen size used by the log backend
    pub log_screen_height: u32,
}

/// Calibration storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the calibration file
    pub data_dir: PathBuf,

    /// Calibration file name, no path components
    pub calibration_file: String,
}

/// Processing loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Longest wait for a new frame before the loop re-checks its signals
    pub frame_timeout_ms: u64,

    /// Sleep between polls while not tracking or calibrating
    pub idle_poll_ms: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_interocular_distance: 0.03,
            min_eye_openness: 0.08,
            min_eye_width_ratio: 0.2,
            max_iris_offset: 2.0,
            yaw_compensation: 0.6,
            pitch_compensation: 0.6,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            targets: vec![[0.5, 0.5], [0.1, 0.1], [0.9, 0.1], [0.1, 0.9], [0.9, 0.9]],
            degeneracy_ratio: 1e-3,
            consistency_tolerance: 0.5,
            fixation_window: 90,
            min_fixation_samples: 10,
            outlier_trim: 0.15,
            max_fixation_std_dev: 0.15,
        }
    }
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            dead_zone_radius: 6.0,
            max_velocity: 1200.0,
            smoothing_time_constant: 0.12,
            max_frame_gap: 0.1,
            consecutive_miss_threshold: 45,
        }
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            backend: SinkBackend::X11,
            min_update_interval: 0.01,
            log_screen_width: 1920,
            log_screen_height: 1080,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
        Self {
            data_dir: home.join(".gaze-cursor"),
            calibration_file: crate::constants::DEFAULT_CALIBRATION_FILE.to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 100,
            idle_poll_ms: 20,
        }
    }
}

impl TrackingParams {
    /// Validate tracking parameters
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any value is negative or non-finite,
    /// or if the velocity cap or frame gap is zero.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("dead_zone_radius", self.dead_zone_radius),
            ("smoothing_time_constant", self.smoothing_time_constant),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::ConfigError(format!("{name} must be finite and non-negative")));
            }
        }
        if !self.max_velocity.is_finite() || self.max_velocity <= 0.0 {
            return Err(Error::ConfigError("max_velocity must be positive".to_string()));
        }
        if !self.max_frame_gap.is_finite() || self.max_frame_gap <= 0.0 {
            return Err(Error::ConfigError("max_frame_gap must be positive".to_string()));
        }
        Ok(())
    }
}

impl CalibrationConfig {
    /// Validate the target layout and thresholds
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a layout without exactly five
    /// distinct in-screen targets or for out-of-range thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.targets.len() != CALIBRATION_TARGET_COUNT {
            return Err(Error::ConfigError(format!(
                "Calibration needs exactly {CALIBRATION_TARGET_COUNT} targets, got {}",
                self.targets.len()
            )));
        }
        for (i, [x, y]) in self.targets.iter().enumerate() {
            if !(0.0..1.0).contains(x) || !(0.0..1.0).contains(y) {
                return Err(Error::ConfigError(format!(
                    "Calibration target {i} must lie within [0, 1)"
                )));
            }
            if self.targets[..i].iter().any(|t| (t[0] - x).abs() < 1e-6 && (t[1] - y).abs() < 1e-6) {
                return Err(Error::ConfigError(format!("Calibration target {i} is duplicated")));
            }
        }
        if !(0.0..1.0).contains(&self.degeneracy_ratio) {
            return Err(Error::ConfigError("degeneracy_ratio must be in [0, 1)".to_string()));
        }
        if !self.max_fixation_std_dev.is_finite() || self.max_fixation_std_dev <= 0.0 {
            return Err(Error::ConfigError("max_fixation_std_dev must be positive".to_string()));
        }
        if !(self.consistency_tolerance > 0.0) {
            return Err(Error::ConfigError("consistency_tolerance must be positive".to_string()));
        }
        if self.min_fixation_samples == 0 || self.min_fixation_samples > self.fixation_window {
            return Err(Error::ConfigError(
                "min_fixation_samples must be between 1 and fixation_window".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.outlier_trim) {
            return Err(Error::ConfigError("outlier_trim must be in [0, 0.5)".to_string()));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found
    pub fn validate(&self) -> Result<()> {
        let e = &self.estimator;
        if !(e.min_interocular_distance > 0.0) {
            return Err(Error::ConfigError("min_interocular_distance must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&e.min_eye_openness) || !(0.0..1.0).contains(&e.min_eye_width_ratio) {
            return Err(Error::ConfigError(
                "Eye openness and width ratios must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(e.max_iris_offset > 0.0) {
            return Err(Error::ConfigError("max_iris_offset must be positive".to_string()));
        }
        if !e.yaw_compensation.is_finite() || !e.pitch_compensation.is_finite() {
            return Err(Error::ConfigError("Compensation gains must be finite".to_string()));
        }

        self.calibration.validate()?;
        self.tracking.validate()?;

        if !self.cursor.min_update_interval.is_finite() || self.cursor.min_update_interval < 0.0 {
            return Err(Error::ConfigError("min_update_interval must be non-negative".to_string()));
        }
        if self.cursor.log_screen_width == 0 || self.cursor.log_screen_height == 0 {
            return Err(Error::ConfigError("Log screen size must be non-zero".to_string()));
        }

        let file = Path::new(&self.storage.calibration_file);
        if self.storage.calibration_file.is_empty() || file.file_name() != Some(file.as_os_str()) {
            return Err(Error::ConfigError(
                "calibration_file must be a plain file name".to_string(),
            ));
        }

        if self.runtime.frame_timeout_ms == 0 {
            return Err(Error::ConfigError("frame_timeout_ms must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Gaze Cursor Configuration

# Gaze estimation
estimator:
  min_interocular_distance: 0.03
  min_eye_openness: 0.08
  min_eye_width_ratio: 0.2
  max_iris_offset: 2.0
  yaw_compensation: 0.6
  pitch_compensation: 0.6

# Calibration (targets are fractions of the screen size)
calibration:
  targets:
    - [0.5, 0.5]
    - [0.1, 0.1]
    - [0.9, 0.1]
    - [0.1, 0.9]
    - [0.9, 0.9]
  degeneracy_ratio: 0.001
  consistency_tolerance: 0.5
  fixation_window: 90
  min_fixation_samples: 10
  outlier_trim: 0.15
  max_fixation_std_dev: 0.15

# Tracking (adjustable at runtime)
tracking:
  dead_zone_radius: 6.0
  max_velocity: 1200.0
  smoothing_time_constant: 0.12
  max_frame_gap: 0.1
  consecutive_miss_threshold: 45

# Cursor control
cursor:
  backend: x11
  min_update_interval: 0.01
  log_screen_width: 1920
  log_screen_height: 1080

# Calibration storage
storage:
  data_dir: ".gaze-cursor"
  calibration_file: "calibration_data.json"

# Processing loop
runtime:
  frame_timeout_ms: 100
  idle_poll_ms: 20
"#;
