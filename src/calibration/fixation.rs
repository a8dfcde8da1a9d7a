//! Fixation buffer for calibration targets.
//!
//! Collects gaze vectors while the user looks at a target and reduces them to
//! one robust sample with a trimmed mean.

use crate::gaze_estimation::GazeFeatureVector;
use std::collections::VecDeque;

/// Statistical summary of a fixation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixationSummary {
    /// Trimmed mean gaze vector
    pub mean: GazeFeatureVector,
    /// Standard deviation of the trimmed data, per component
    pub std_dev: (f64, f64),
    /// Samples left after trimming
    pub count: usize,
}

impl FixationSummary {
    /// Larger of the two component deviations
    #[must_use]
    pub fn max_std_dev(&self) -> f64 {
        self.std_dev.0.max(self.std_dev.1)
    }
}

/// Bounded window of recent gaze vectors
#[derive(Debug, Clone)]
pub struct FixationBuffer {
    window_size: usize,
    samples: VecDeque<GazeFeatureVector>,
}

impl FixationBuffer {
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            samples: VecDeque::with_capacity(window_size),
        }
    }

    /// Add a gaze vector, evicting the oldest once the window is full
    pub fn push(&mut self, gaze: GazeFeatureVector) {
        if self.samples.len() >= self.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(gaze);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Trimmed statistics, dropping `trim` of the samples from each end of
    /// every component independently. `None` when empty.
    #[must_use]
    pub fn summarize(&self, trim: f64) -> Option<FixationSummary> {
        if self.samples.is_empty() {
            return None;
        }
        let xs = trimmed(self.samples.iter().map(GazeFeatureVector::x), trim);
        let ys = trimmed(self.samples.iter().map(GazeFeatureVector::y), trim);
        let (mean_x, std_x) = mean_and_std_dev(&xs);
        let (mean_y, std_y) = mean_and_std_dev(&ys);
        Some(FixationSummary {
            mean: GazeFeatureVector::new(mean_x, mean_y),
            std_dev: (std_x, std_y),
            count: xs.len(),
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // trim is in [0, 0.5)
fn trimmed(values: impl Iterator<Item = f64>, trim: f64) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.collect();
    sorted.sort_by(f64::total_cmp);
    let cut = ((sorted.len() as f64) * trim.clamp(0.0, 0.49)).floor() as usize;
    sorted[cut..sorted.len() - cut].to_vec()
}

fn mean_and_std_dev(data: &[f64]) -> (f64, f64) {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
