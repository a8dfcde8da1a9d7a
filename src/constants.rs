//! Constants used throughout the pipeline

/// Number of points in a refined face mesh (468 face points + 10 iris points)
pub const NUM_FACE_MESH_LANDMARKS: usize = 478;

/// Length of a gaze feature vector
pub const GAZE_FEATURE_DIM: usize = 2;

/// Number of targets in one calibration session
pub const CALIBRATION_TARGET_COUNT: usize = 5;

/// Face mesh indices for the first eye (outer corner, inner corner, upper lid, lower lid)
pub const LEFT_EYE_OUTER: usize = 33;
pub const LEFT_EYE_INNER: usize = 133;
pub const LEFT_EYE_UPPER: usize = 159;
pub const LEFT_EYE_LOWER: usize = 145;
pub const LEFT_IRIS_CENTER: usize = 468;

/// Face mesh indices for the second eye
pub const RIGHT_EYE_INNER: usize = 362;
pub const RIGHT_EYE_OUTER: usize = 263;
pub const RIGHT_EYE_UPPER: usize = 386;
pub const RIGHT_EYE_LOWER: usize = 374;
pub const RIGHT_IRIS_CENTER: usize = 473;

/// Face mesh index of the nose tip
pub const NOSE_TIP: usize = 1;

/// Normalized landmark coordinates outside this range are implausible
pub const LANDMARK_COORD_MIN: f64 = -0.5;
pub const LANDMARK_COORD_MAX: f64 = 1.5;

/// Default frames per second assumption
pub const DEFAULT_FPS: f64 = 30.0;

/// Schema version written into persisted calibration records
pub const CALIBRATION_SCHEMA_VERSION: &str = "1.0";

/// Default calibration file name inside the data directory
pub const DEFAULT_CALIBRATION_FILE: &str = "calibration_data.json";

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
