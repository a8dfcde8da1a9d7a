//! Landmark input: the face-mesh point sets produced by an external detector
//! and the provider interface the processing loop pulls them through.

pub mod synthetic;

use crate::{
    constants::NUM_FACE_MESH_LANDMARKS,
    latest::{LatestSlot, Take},
    Error, Result,
};
use log::info;
use std::time::Duration;

/// A single normalized landmark; `x` and `y` are fractions of the frame size
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Relative depth, 0.0 when the detector only reports 2D points
    pub z: f64,
}

impl Landmark {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Ordered face-mesh points for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    /// Wrap points in detector order
    #[must_use]
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    /// Build from `(x, y)` pairs with zero depth
    #[must_use]
    pub fn from_xy(points: &[(f64, f64)]) -> Self {
        Self::new(points.iter().map(|&(x, y)| Landmark::new(x, y, 0.0)).collect())
    }

    /// Number of points
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the set has the cardinality of a refined face mesh
    #[must_use]
    pub fn is_full_mesh(&self) -> bool {
        self.points.len() == NUM_FACE_MESH_LANDMARKS
    }

    /// Point at a mesh index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    /// All points
    #[must_use]
    pub fn points(&self) -> &[Landmark] {
        &self.points
    }
}

/// One frame's worth of detector output
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Capture time in seconds on the provider's monotonic clock
    pub timestamp: f64,
    /// Detected landmarks, `None` when no face was found
    pub landmarks: Option<LandmarkSet>,
}

impl Observation {
    #[must_use]
    pub const fn face(timestamp: f64, landmarks: LandmarkSet) -> Self {
        Self {
            timestamp,
            landmarks: Some(landmarks),
        }
    }

    #[must_use]
    pub const fn no_face(timestamp: f64) -> Self {
        Self {
            timestamp,
            landmarks: None,
        }
    }
}

/// Source of landmark observations (camera plus face-mesh detector)
pub trait LandmarkProvider: Send {
    /// Next observation.
    ///
    /// `Ok(None)` means no new frame arrived within the provider's wait
    /// bound. An error means the device failed and the session must stop.
    fn next_landmarks(&mut self) -> Result<Option<Observation>>;

    /// Release the underlying device
    fn release(&mut self) {}

    /// Frames discarded before the loop could take them
    fn dropped_frames(&self) -> u64 {
        0
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Provider fed by a detector thread through a [`LatestSlot`]
pub struct SlotLandmarkProvider {
    slot: LatestSlot<Observation>,
    timeout: Duration,
}

impl SlotLandmarkProvider {
    /// Create a provider reading from `slot`, waiting at most `timeout` per call
    #[must_use]
    pub fn new(slot: LatestSlot<Observation>, timeout: Duration) -> Self {
        Self { slot, timeout }
    }
}

impl LandmarkProvider for SlotLandmarkProvider {
    fn next_landmarks(&mut self) -> Result<Option<Observation>> {
        match self.slot.take_timeout(self.timeout) {
            Take::Value(observation) => Ok(Some(observation)),
            Take::Timeout => Ok(None),
            Take::Closed => Err(Error::SinkUnavailable("landmark stream closed".to_string())),
        }
    }

    fn release(&mut self) {
        info!(
            "Releasing landmark stream ({} frames published, {} dropped)",
            self.slot.published(),
            self.slot.dropped()
        );
        self.slot.close();
    }

    fn dropped_frames(&self) -> u64 {
        self.slot.dropped()
    }

    fn name(&self) -> &str {
        "latest-slot"
    }
}
