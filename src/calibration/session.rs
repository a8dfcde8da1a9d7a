//! In-progress calibration: target layout, captured samples and the
//! fixation buffer for the target currently on screen.

use super::{
    fixation::FixationBuffer,
    model::{CalibrationSample, ScreenResolution},
};
use crate::{gaze_estimation::GazeFeatureVector, geometry::ScreenPoint};

/// Targets closer than this to a requested point are considered a match (pixels)
pub(crate) const TARGET_MATCH_TOLERANCE: f64 = 0.5;

/// Progress snapshot for UI display
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationProgress {
    /// Target positions in pixels
    pub targets: Vec<ScreenPoint>,
    /// Which targets already have a sample
    pub captured: Vec<bool>,
    /// Gaze vectors buffered for the current fixation
    pub fixation_samples: usize,
}

impl CalibrationProgress {
    /// First target still missing a sample
    #[must_use]
    pub fn next_target(&self) -> Option<usize> {
        self.captured.iter().position(|done| !done)
    }
}

/// A calibration in progress. Created by [`super::Calibrator::start_calibration`].
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    resolution: ScreenResolution,
    targets: Vec<ScreenPoint>,
    gaze: Vec<Option<GazeFeatureVector>>,
    fixation: FixationBuffer,
}

impl CalibrationSession {
    pub(crate) fn new(resolution: ScreenResolution, targets: Vec<ScreenPoint>, fixation_window: usize) -> Self {
        let gaze = vec![None; targets.len()];
        Self {
            resolution,
            targets,
            gaze,
            fixation: FixationBuffer::new(fixation_window),
        }
    }

    #[must_use]
    pub const fn resolution(&self) -> ScreenResolution {
        self.resolution
    }

    /// Target positions in pixels, in display order
    #[must_use]
    pub fn targets(&self) -> &[ScreenPoint] {
        &self.targets
    }

    #[must_use]
    pub fn target(&self, index: usize) -> Option<ScreenPoint> {
        self.targets.get(index).copied()
    }

    /// Index of the target at `point`, if any
    #[must_use]
    pub fn target_index(&self, point: ScreenPoint) -> Option<usize> {
        self.targets
            .iter()
            .position(|t| t.distance_to(point) <= TARGET_MATCH_TOLERANCE)
    }

    #[must_use]
    pub fn is_captured(&self, index: usize) -> bool {
        self.gaze.get(index).is_some_and(Option::is_some)
    }

    /// Number of targets with a sample
    #[must_use]
    pub fn collected(&self) -> usize {
        self.gaze.iter().filter(|g| g.is_some()).count()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.collected() == self.targets.len()
    }

    /// Captured samples in target order
    #[must_use]
    pub fn samples(&self) -> Vec<CalibrationSample> {
        self.targets
            .iter()
            .zip(&self.gaze)
            .filter_map(|(&screen_point, gaze)| {
                gaze.map(|gaze_vector| CalibrationSample {
                    screen_point,
                    gaze_vector,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn progress(&self) -> CalibrationProgress {
        CalibrationProgress {
            targets: self.targets.clone(),
            captured: self.gaze.iter().map(Option::is_some).collect(),
            fixation_samples: self.fixation.len(),
        }
    }

    /// Buffer a gaze vector for the current fixation
    pub fn push_fixation(&mut self, gaze: GazeFeatureVector) {
        self.fixation.push(gaze);
    }

    #[must_use]
    pub const fn fixation(&self) -> &FixationBuffer {
        &self.fixation
    }

    pub(crate) fn clear_fixation(&mut self) {
        self.fixation.clear();
    }

    /// Store the sample for a target; the caller has validated the index
    pub(crate) fn record(&mut self, index: usize, gaze: GazeFeatureVector) {
        if let Some(slot) = self.gaze.get_mut(index) {
            *slot = Some(gaze);
        }
    }
}
