//! Personal calibration: collects five labeled gaze samples and fits the
//! gaze-to-screen mapping.
//!
//! The default layout is the screen center plus four corners inset by 10%.
//! Each target must be captured exactly once before [`Calibrator::finish`]
//! fits a thin-plate spline through the samples.

pub mod fit;
pub mod fixation;
pub mod model;
pub mod session;

pub use fixation::{FixationBuffer, FixationSummary};
pub use model::{CalibrationModel, CalibrationRecord, CalibrationSample, ModelSummary, ScreenResolution};
pub use session::{CalibrationProgress, CalibrationSession};

use crate::{
    config::CalibrationConfig, constants::CALIBRATION_SCHEMA_VERSION, error::FitError,
    gaze_estimation::GazeFeatureVector, geometry::ScreenPoint, Error, Result,
};
use chrono::Utc;
use log::{debug, info};

/// Fits and applies calibration models
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    #[must_use]
    pub const fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Open a session with targets laid out on a `width` x `height` screen
    #[must_use]
    pub fn start_calibration(&self, width: u32, height: u32) -> CalibrationSession {
        let targets = self
            .config
            .targets
            .iter()
            .map(|[fx, fy]| ScreenPoint::new(fx * f64::from(width), fy * f64::from(height)))
            .collect();
        info!("Starting calibration at {width}x{height}");
        CalibrationSession::new(
            ScreenResolution::new(width, height),
            targets,
            self.config.fixation_window,
        )
    }

    /// Record the gaze vector measured while the user looked at `target`.
    ///
    /// Returns the index of the matched target.
    ///
    /// # Errors
    ///
    /// `UnknownTarget` if `target` is not a session target, `DuplicateTarget`
    /// if it already has a sample, `InvalidInput` for a non-finite vector.
    pub fn add_sample(
        &self,
        session: &mut CalibrationSession,
        target: ScreenPoint,
        gaze: GazeFeatureVector,
    ) -> Result<usize> {
        let index = session
            .target_index(target)
            .ok_or_else(|| Error::UnknownTarget(format!("({:.1}, {:.1})", target.x, target.y)))?;
        self.add_sample_at(session, index, gaze)
    }

    /// Record a sample by target index
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_sample`]
    pub fn add_sample_at(
        &self,
        session: &mut CalibrationSession,
        index: usize,
        gaze: GazeFeatureVector,
    ) -> Result<usize> {
        if session.target(index).is_none() {
            return Err(Error::UnknownTarget(format!("index {index}")));
        }
        if session.is_captured(index) {
            return Err(Error::DuplicateTarget { index });
        }
        if !gaze.is_finite() {
            return Err(Error::InvalidInput("gaze vector must be finite".to_string()));
        }

        session.record(index, gaze);
        session.clear_fixation();
        debug!(
            "Captured calibration target {index}: gaze ({:.4}, {:.4}), {} of {}",
            gaze.x(),
            gaze.y(),
            session.collected(),
            session.targets().len()
        );
        Ok(index)
    }

    /// Reduce the buffered fixation to a sample for target `index`
    ///
    /// # Errors
    ///
    /// `NotEnoughFixation` with too few or too scattered samples, plus the
    /// errors of [`Self::add_sample_at`]
    pub fn capture_fixation(&self, session: &mut CalibrationSession, index: usize) -> Result<usize> {
        if session.target(index).is_none() {
            return Err(Error::UnknownTarget(format!("index {index}")));
        }
        if session.is_captured(index) {
            return Err(Error::DuplicateTarget { index });
        }

        let buffered = session.fixation().len();
        if buffered < self.config.min_fixation_samples {
            return Err(Error::NotEnoughFixation(format!(
                "{buffered} of {} gaze samples",
                self.config.min_fixation_samples
            )));
        }
        let summary = session
            .fixation()
            .summarize(self.config.outlier_trim)
            .ok_or_else(|| Error::NotEnoughFixation("no gaze samples".to_string()))?;
        if summary.max_std_dev() > self.config.max_fixation_std_dev {
            session.clear_fixation();
            return Err(Error::NotEnoughFixation(format!(
                "unstable fixation (std dev {:.3})",
                summary.max_std_dev()
            )));
        }

        self.add_sample_at(session, index, summary.mean)
    }

    /// Fit a model from a complete session
    ///
    /// # Errors
    ///
    /// `IncompleteCalibration` if any target is missing, `Degenerate` if the
    /// samples cannot support a stable mapping
    pub fn finish(&self, session: &CalibrationSession) -> std::result::Result<CalibrationModel, FitError> {
        if !session.is_complete() {
            return Err(FitError::IncompleteCalibration {
                collected: session.collected(),
                required: session.targets().len(),
            });
        }
        let model = CalibrationModel::fit(session.resolution(), session.samples(), Utc::now(), &self.config)?;
        info!("Calibration fitted for {}", model.resolution());
        Ok(model)
    }

    /// Map a gaze vector through a model; the result is not clamped
    #[must_use]
    pub fn apply(&self, model: &CalibrationModel, gaze: &GazeFeatureVector) -> ScreenPoint {
        model.apply(gaze)
    }

    /// Rebuild a model from its persisted record by refitting the points
    ///
    /// # Errors
    ///
    /// `Storage` for an unsupported schema version or empty resolution,
    /// `Fit` if the stored targets are off-screen or duplicated, or the points
    /// no longer fit
    pub fn restore(&self, record: CalibrationRecord) -> Result<CalibrationModel> {
        let major = |v: &str| v.split('.').next().map(str::to_owned);
        if major(&record.version) != major(CALIBRATION_SCHEMA_VERSION) {
            return Err(Error::Storage(format!(
                "Unsupported calibration version {}",
                record.version
            )));
        }
        let resolution = record.screen_resolution;
        if resolution.width == 0 || resolution.height == 0 {
            return Err(Error::Storage("Calibration has an empty screen resolution".to_string()));
        }
        Ok(CalibrationModel::fit(
            resolution,
            record.calibration_points,
            record.timestamp,
            &self.config,
        )?)
    }
}
