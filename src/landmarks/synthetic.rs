//! Synthetic face-mesh generator.
//!
//! Produces geometrically consistent 478-point landmark sets with a chosen
//! gaze direction and head pose. Used by the demo mode, the benches and the
//! tests in place of a camera and a face-mesh model.

use super::{LandmarkProvider, LandmarkSet, Landmark, Observation};
use crate::{
    constants::{
        LEFT_EYE_INNER, LEFT_EYE_LOWER, LEFT_EYE_OUTER, LEFT_EYE_UPPER, LEFT_IRIS_CENTER, NOSE_TIP,
        NUM_FACE_MESH_LANDMARKS, RIGHT_EYE_INNER, RIGHT_EYE_LOWER, RIGHT_EYE_OUTER, RIGHT_EYE_UPPER,
        RIGHT_IRIS_CENTER,
    },
    gaze_estimation::NEUTRAL_NOSE_DROP,
    Result,
};
use std::collections::VecDeque;
use std::time::Duration;

/// Eye width as a fraction of the interocular distance
const EYE_WIDTH: f64 = 0.6;

/// Parameters of a synthetic face, in face-local units of interocular distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticFace {
    /// Eye-midpoint position in normalized image coordinates
    pub center: (f64, f64),
    /// Interocular distance in normalized image units
    pub scale: f64,
    /// In-plane head rotation (radians)
    pub roll: f64,
    /// Horizontal nose offset from the eye midpoint
    pub yaw: f64,
    /// Vertical nose offset relative to the neutral drop
    pub pitch: f64,
    /// Iris offset within the eye, each component in [-1, 1]
    pub gaze: (f64, f64),
    /// Lid gap relative to eye width
    pub openness: f64,
    /// Collapse the second eye to a point, as when it is occluded
    pub occlude_second_eye: bool,
}

impl Default for SyntheticFace {
    fn default() -> Self {
        Self {
            center: (0.5, 0.45),
            scale: 0.12,
            roll: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            gaze: (0.0, 0.0),
            openness: 0.35,
            occlude_second_eye: false,
        }
    }
}

impl SyntheticFace {
    #[must_use]
    pub const fn with_gaze(mut self, x: f64, y: f64) -> Self {
        self.gaze = (x, y);
        self
    }

    #[must_use]
    pub const fn with_head_pose(mut self, yaw: f64, pitch: f64) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    #[must_use]
    pub const fn with_roll(mut self, roll: f64) -> Self {
        self.roll = roll;
        self
    }

    #[must_use]
    pub const fn with_center(mut self, x: f64, y: f64) -> Self {
        self.center = (x, y);
        self
    }

    #[must_use]
    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub const fn with_openness(mut self, openness: f64) -> Self {
        self.openness = openness;
        self
    }

    #[must_use]
    pub const fn with_second_eye_occluded(mut self) -> Self {
        self.occlude_second_eye = true;
        self
    }

    /// Map a face-local point to normalized image coordinates
    fn place(&self, u: f64, v: f64) -> Landmark {
        let (sin, cos) = self.roll.sin_cos();
        let x = self.center.0 + self.scale * (u * cos - v * sin);
        let y = self.center.1 + self.scale * (u * sin + v * cos);
        Landmark::new(x, y, 0.0)
    }

    /// Generate the full landmark set
    #[must_use]
    pub fn build(&self) -> LandmarkSet {
        // Filler points on a face oval so every index holds a plausible value
        let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        let mut points: Vec<Landmark> = (0..NUM_FACE_MESH_LANDMARKS)
            .map(|i| {
                let frac = (i as f64 + 0.5) / NUM_FACE_MESH_LANDMARKS as f64;
                let radius = 1.2 * frac.sqrt();
                let angle = i as f64 * golden;
                self.place(radius * angle.cos(), 0.3 + 1.4 * radius * angle.sin())
            })
            .collect();

        let half_width = EYE_WIDTH / 2.0;
        let half_height = self.openness * EYE_WIDTH / 2.0;
        let mut set_eye = |center_u: f64, outer: usize, inner: usize, upper: usize, lower: usize, iris: usize, collapsed: bool| {
            let (hw, hh) = if collapsed { (0.0, 0.0) } else { (half_width, half_height) };
            let outward = center_u.signum();
            points[outer] = self.place(center_u + outward * hw, 0.0);
            points[inner] = self.place(center_u - outward * hw, 0.0);
            points[upper] = self.place(center_u, -hh);
            points[lower] = self.place(center_u, hh);
            points[iris] = self.place(center_u + self.gaze.0 * hw, self.gaze.1 * hh);
        };

        set_eye(-0.5, LEFT_EYE_OUTER, LEFT_EYE_INNER, LEFT_EYE_UPPER, LEFT_EYE_LOWER, LEFT_IRIS_CENTER, false);
        set_eye(
            0.5,
            RIGHT_EYE_OUTER,
            RIGHT_EYE_INNER,
            RIGHT_EYE_UPPER,
            RIGHT_EYE_LOWER,
            RIGHT_IRIS_CENTER,
            self.occlude_second_eye,
        );

        points[NOSE_TIP] = self.place(self.yaw, NEUTRAL_NOSE_DROP + self.pitch);

        LandmarkSet::new(points)
    }
}

/// Provider that replays a prepared sequence of frames at a fixed rate
pub struct ScriptedProvider {
    frames: VecDeque<Option<LandmarkSet>>,
    frame_interval: f64,
    next_index: u64,
    idle: Duration,
}

impl ScriptedProvider {
    /// Create an empty script played back at `fps`
    #[must_use]
    pub fn new(fps: f64) -> Self {
        Self {
            frames: VecDeque::new(),
            frame_interval: 1.0 / fps,
            next_index: 0,
            idle: Duration::from_millis(1),
        }
    }

    /// Queue a frame showing `face`
    pub fn push_face(&mut self, face: &SyntheticFace) {
        self.frames.push_back(Some(face.build()));
    }

    /// Queue a frame without a detected face
    pub fn push_no_face(&mut self) {
        self.frames.push_back(None);
    }

    /// Queue `count` identical frames
    pub fn push_repeated(&mut self, face: &SyntheticFace, count: usize) {
        let landmarks = face.build();
        self.frames.extend(std::iter::repeat(Some(landmarks)).take(count));
    }

    /// Frames still queued
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkProvider for ScriptedProvider {
    fn next_landmarks(&mut self) -> Result<Option<Observation>> {
        let Some(frame) = self.frames.pop_front() else {
            std::thread::sleep(self.idle);
            return Ok(None);
        };
        let timestamp = self.next_index as f64 * self.frame_interval;
        self.next_index += 1;
        Ok(Some(Observation {
            timestamp,
            landmarks: frame,
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
