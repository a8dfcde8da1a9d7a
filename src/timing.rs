//! Frame rate measurement.

use std::collections::VecDeque;

/// Frame rate averaged over the most recent frame timestamps
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_size: usize,
    timestamps: VecDeque<f64>,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(30)
    }
}

impl FpsCounter {
    /// Average over the last `window_size` frames
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(2);
        Self {
            window_size,
            timestamps: VecDeque::with_capacity(window_size),
        }
    }

    /// Record a frame at `timestamp` seconds; out-of-order timestamps are ignored
    pub fn tick(&mut self, timestamp: f64) {
        if self.timestamps.back().is_some_and(|&last| timestamp <= last) || !timestamp.is_finite() {
            return;
        }
        if self.timestamps.len() >= self.window_size {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(timestamp);
    }

    /// Frames per second, 0.0 until two frames have been seen
    #[must_use]
    pub fn fps(&self) -> f64 {
        match (self.timestamps.front(), self.timestamps.back()) {
            (Some(first), Some(last)) if last > first => {
                (self.timestamps.len() - 1) as f64 / (last - first)
            }
            _ => 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.timestamps.clear();
    }
}
