//! Calibration samples, fitted models and their persisted form.

use super::{fit::ThinPlateSpline, session::TARGET_MATCH_TOLERANCE};
use crate::{
    config::CalibrationConfig, constants::CALIBRATION_SCHEMA_VERSION, error::FitError,
    gaze_estimation::GazeFeatureVector, geometry::ScreenPoint,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenResolution {
    pub width: u32,
    pub height: u32,
}

impl ScreenResolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ScreenResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One labeled pair: where the user looked and what the estimator measured
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub screen_point: ScreenPoint,
    pub gaze_vector: GazeFeatureVector,
}

/// Persisted calibration. Holds only the labeled points; the mapping is
/// refit on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub screen_resolution: ScreenResolution,
    pub calibration_points: Vec<CalibrationSample>,
}

/// A fitted, immutable gaze-to-screen mapping
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationModel {
    resolution: ScreenResolution,
    samples: Vec<CalibrationSample>,
    timestamp: DateTime<Utc>,
    mapping: ThinPlateSpline,
}

/// Every target must be a distinct on-screen pixel of `resolution`
fn check_targets(resolution: ScreenResolution, samples: &[CalibrationSample]) -> Result<(), FitError> {
    for (i, sample) in samples.iter().enumerate() {
        let point = sample.screen_point;
        if !point.is_within(resolution.width, resolution.height) {
            return Err(FitError::Degenerate(format!(
                "target {i} at ({}, {}) is outside the {resolution} screen",
                point.x, point.y
            )));
        }
        if let Some(j) = samples[..i]
            .iter()
            .position(|other| other.screen_point.distance_to(point) < TARGET_MATCH_TOLERANCE)
        {
            return Err(FitError::Degenerate(format!("targets {j} and {i} share a screen point")));
        }
    }
    Ok(())
}

impl CalibrationModel {
    pub(crate) fn fit(
        resolution: ScreenResolution,
        samples: Vec<CalibrationSample>,
        timestamp: DateTime<Utc>,
        config: &CalibrationConfig,
    ) -> Result<Self, FitError> {
        check_targets(resolution, &samples)?;
        let mapping = ThinPlateSpline::fit(
            &samples,
            config.degeneracy_ratio,
            config.consistency_tolerance,
        )?;
        Ok(Self {
            resolution,
            samples,
            timestamp,
            mapping,
        })
    }

    /// Screen size the model was captured at
    #[must_use]
    pub const fn resolution(&self) -> ScreenResolution {
        self.resolution
    }

    #[must_use]
    pub fn samples(&self) -> &[CalibrationSample] {
        &self.samples
    }

    /// Capture time
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub const fn mapping(&self) -> &ThinPlateSpline {
        &self.mapping
    }

    /// Map a gaze vector to an unclamped screen point
    #[must_use]
    pub fn apply(&self, gaze: &GazeFeatureVector) -> ScreenPoint {
        self.mapping.evaluate(gaze)
    }

    /// Whether the model was captured on a screen of this size
    #[must_use]
    pub fn matches_screen(&self, width: u32, height: u32) -> bool {
        self.resolution == ScreenResolution::new(width, height)
    }

    /// Persisted form of this model
    #[must_use]
    pub fn to_record(&self) -> CalibrationRecord {
        CalibrationRecord {
            version: CALIBRATION_SCHEMA_VERSION.to_string(),
            timestamp: self.timestamp,
            screen_resolution: self.resolution,
            calibration_points: self.samples.clone(),
        }
    }
}

/// Short description for logs and state snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSummary {
    pub resolution: ScreenResolution,
    pub timestamp: DateTime<Utc>,
}

impl From<&CalibrationModel> for ModelSummary {
    fn from(model: &CalibrationModel) -> Self {
        Self {
            resolution: model.resolution,
            timestamp: model.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_layout() {
        let record = CalibrationRecord {
            version: "1.0".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            screen_resolution: ScreenResolution::new(1920, 1080),
            calibration_points: vec![CalibrationSample {
                screen_point: ScreenPoint::new(960.0, 540.0),
                gaze_vector: GazeFeatureVector::new(0.1, -0.2),
            }],
        };

        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["timestamp"], "2024-05-01T12:00:00Z");
        assert_eq!(value["screen_resolution"]["width"], 1920);
        assert_eq!(value["calibration_points"][0]["screen_point"]["x"], 960.0);
        assert_eq!(value["calibration_points"][0]["gaze_vector"][1], -0.2);

        let parsed: CalibrationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
    }
}
