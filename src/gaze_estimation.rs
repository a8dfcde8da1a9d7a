//! Gaze feature estimation from face-mesh landmarks.
//!
//! Iris positions are measured in a face-local frame spanned by the line
//! through both eye centers (`u`) and its normal (`v`). Working in that frame
//! removes head translation, scale and roll. Yaw and pitch are approximated
//! from the nose tip offset against the eye midpoint and added back with a
//! configurable gain, so that looking at the same screen point with a turned
//! head yields nearly the same feature vector.

use crate::{
    config::EstimatorConfig,
    constants::{
        GAZE_FEATURE_DIM, LANDMARK_COORD_MAX, LANDMARK_COORD_MIN, LEFT_EYE_INNER, LEFT_EYE_LOWER,
        LEFT_EYE_OUTER, LEFT_EYE_UPPER, LEFT_IRIS_CENTER, NOSE_TIP, NUM_FACE_MESH_LANDMARKS,
        RIGHT_EYE_INNER, RIGHT_EYE_LOWER, RIGHT_EYE_OUTER, RIGHT_EYE_UPPER, RIGHT_IRIS_CENTER,
    },
    landmarks::LandmarkSet,
};
use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nose tip distance below the eye line of a frontal face, in interocular units
pub const NEUTRAL_NOSE_DROP: f64 = 0.65;

/// Head-pose compensated gaze features
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GazeFeatureVector([f64; GAZE_FEATURE_DIM]);

impl GazeFeatureVector {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self([x, y])
    }

    /// Horizontal component
    #[must_use]
    pub const fn x(&self) -> f64 {
        self.0[0]
    }

    /// Vertical component
    #[must_use]
    pub const fn y(&self) -> f64 {
        self.0[1]
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }

    /// Euclidean distance in feature space
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.x() - other.x()).hypot(self.y() - other.y())
    }
}

impl From<[f64; GAZE_FEATURE_DIM]> for GazeFeatureVector {
    fn from(components: [f64; GAZE_FEATURE_DIM]) -> Self {
        Self(components)
    }
}

/// Why a landmark set did not yield a gaze estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoFace {
    /// The detector found no face
    NotDetected,
    /// The landmark set has the wrong number of points
    WrongCardinality { found: usize },
    /// A landmark is NaN, infinite or far outside the frame
    ImplausibleLandmark { index: usize },
    /// Eyes are too close together to measure reliably
    FaceTooSmall,
    /// An eye is collapsed, typically occluded by a strong head turn
    EyeNotVisible,
    /// Lid gap too small, typically a blink
    EyesClosed,
    /// Iris lies outside the eye outline
    ImplausibleIris,
}

impl fmt::Display for NoFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetected => write!(f, "no face detected"),
            Self::WrongCardinality { found } => {
                write!(f, "expected {NUM_FACE_MESH_LANDMARKS} landmarks, got {found}")
            }
            Self::ImplausibleLandmark { index } => write!(f, "implausible landmark {index}"),
            Self::FaceTooSmall => write!(f, "face too small"),
            Self::EyeNotVisible => write!(f, "eye not visible"),
            Self::EyesClosed => write!(f, "eyes closed"),
            Self::ImplausibleIris => write!(f, "iris outside eye"),
        }
    }
}

/// Output of one estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GazeEstimate {
    Gaze(GazeFeatureVector),
    NoFace(NoFace),
}

/// Intermediate measurements, useful for a debug overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeAnalysis {
    /// Normalized iris offset of the first eye
    pub first_iris: (f64, f64),
    /// Normalized iris offset of the second eye
    pub second_iris: (f64, f64),
    /// Nose offset along the eye line, in interocular units
    pub head_yaw: f64,
    /// Nose offset across the eye line relative to a frontal face
    pub head_pitch: f64,
    /// In-plane rotation of the eye line (radians)
    pub head_roll: f64,
    /// Distance between eye centers (normalized image units)
    pub interocular_distance: f64,
    /// Combined feature vector
    pub feature: GazeFeatureVector,
}

struct EyeMeasurement {
    iris: (f64, f64),
}

/// Stateless gaze estimator
#[derive(Debug, Clone)]
pub struct GazeEstimator {
    config: EstimatorConfig,
}

impl Default for GazeEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

impl GazeEstimator {
    #[must_use]
    pub const fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimate gaze from a detector result, `None` meaning no face
    #[must_use]
    pub fn estimate_observation(&self, landmarks: Option<&LandmarkSet>) -> GazeEstimate {
        landmarks.map_or(GazeEstimate::NoFace(NoFace::NotDetected), |set| self.estimate(set))
    }

    /// Estimate the gaze feature vector for one landmark set
    #[must_use]
    pub fn estimate(&self, landmarks: &LandmarkSet) -> GazeEstimate {
        match self.analyze(landmarks) {
            Ok(analysis) => GazeEstimate::Gaze(analysis.feature),
            Err(reason) => {
                debug!("Gaze estimation rejected frame: {reason}");
                GazeEstimate::NoFace(reason)
            }
        }
    }

    /// Run the full measurement
    ///
    /// # Errors
    ///
    /// Returns the reason the geometry is unusable
    pub fn analyze(&self, landmarks: &LandmarkSet) -> Result<GazeAnalysis, NoFace> {
        if !landmarks.is_full_mesh() {
            return Err(NoFace::WrongCardinality { found: landmarks.len() });
        }
        if let Some(index) = landmarks.points().iter().position(|p| {
            !(p.x.is_finite() && p.y.is_finite())
                || !(LANDMARK_COORD_MIN..=LANDMARK_COORD_MAX).contains(&p.x)
                || !(LANDMARK_COORD_MIN..=LANDMARK_COORD_MAX).contains(&p.y)
        }) {
            return Err(NoFace::ImplausibleLandmark { index });
        }

        let at = |index: usize| {
            landmarks
                .get(index)
                .map(|p| Vector2::new(p.x, p.y))
                .ok_or(NoFace::WrongCardinality { found: landmarks.len() })
        };

        let first_center = (at(LEFT_EYE_OUTER)? + at(LEFT_EYE_INNER)?) / 2.0;
        let second_center = (at(RIGHT_EYE_OUTER)? + at(RIGHT_EYE_INNER)?) / 2.0;

        let axis = second_center - first_center;
        let interocular_distance = axis.norm();
        if interocular_distance < self.config.min_interocular_distance {
            return Err(NoFace::FaceTooSmall);
        }
        let u = axis / interocular_distance;
        let v = Vector2::new(-u.y, u.x);

        let first = self.measure_eye(
            &u,
            &v,
            interocular_distance,
            [at(LEFT_EYE_OUTER)?, at(LEFT_EYE_INNER)?, at(LEFT_EYE_UPPER)?, at(LEFT_EYE_LOWER)?],
            at(LEFT_IRIS_CENTER)?,
        )?;
        let second = self.measure_eye(
            &u,
            &v,
            interocular_distance,
            [at(RIGHT_EYE_OUTER)?, at(RIGHT_EYE_INNER)?, at(RIGHT_EYE_UPPER)?, at(RIGHT_EYE_LOWER)?],
            at(RIGHT_IRIS_CENTER)?,
        )?;

        let midpoint = (first_center + second_center) / 2.0;
        let nose = at(NOSE_TIP)? - midpoint;
        let head_yaw = nose.dot(&u) / interocular_distance;
        let head_pitch = nose.dot(&v) / interocular_distance - NEUTRAL_NOSE_DROP;
        let head_roll = u.y.atan2(u.x);

        let iris_x = (first.iris.0 + second.iris.0) / 2.0;
        let iris_y = (first.iris.1 + second.iris.1) / 2.0;
        let feature = GazeFeatureVector::new(
            self.config.yaw_compensation.mul_add(head_yaw, iris_x),
            self.config.pitch_compensation.mul_add(head_pitch, iris_y),
        );

        Ok(GazeAnalysis {
            first_iris: first.iris,
            second_iris: second.iris,
            head_yaw,
            head_pitch,
            head_roll,
            interocular_distance,
            feature,
        })
    }

    /// Iris offset normalized to the eye outline: corners map to ±1 along `u`,
    /// lids map to ±1 along `v`
    fn measure_eye(
        &self,
        u: &Vector2<f64>,
        v: &Vector2<f64>,
        interocular_distance: f64,
        [outer, inner, upper, lower]: [Vector2<f64>; 4],
        iris: Vector2<f64>,
    ) -> Result<EyeMeasurement, NoFace> {
        let width = (outer - inner).dot(u).abs();
        if width < self.config.min_eye_width_ratio * interocular_distance {
            return Err(NoFace::EyeNotVisible);
        }

        let gap = (lower - upper).dot(v);
        if gap / width < self.config.min_eye_openness {
            return Err(NoFace::EyesClosed);
        }

        let center = (outer + inner) / 2.0;
        let lid_mid = (upper + lower) / 2.0;
        let iris_x = (iris - center).dot(u) / (width / 2.0);
        let iris_y = (iris - lid_mid).dot(v) / (gap / 2.0);

        if iris_x.abs() > self.config.max_iris_offset || iris_y.abs() > self.config.max_iris_offset {
            return Err(NoFace::ImplausibleIris);
        }

        Ok(EyeMeasurement { iris: (iris_x, iris_y) })
    }
}
