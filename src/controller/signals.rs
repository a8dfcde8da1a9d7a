//! Signals shared between the UI threads and the processing loop.

use crate::{config::TrackingParams, Result};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Emergency stop flag. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct EmergencyStop {
    raised: Arc<AtomicBool>,
}

impl EmergencyStop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag; returns `false` if it was already raised
    pub fn raise(&self) -> bool {
        let first = !self.raised.swap(true, Ordering::SeqCst);
        if first {
            warn!("Emergency stop raised");
        }
        first
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Copy-on-write snapshot of the runtime-tunable parameters
#[derive(Debug, Clone)]
pub struct TuningHandle {
    current: Arc<RwLock<Arc<TrackingParams>>>,
}

impl Default for TuningHandle {
    fn default() -> Self {
        Self::new(TrackingParams::default())
    }
}

impl TuningHandle {
    #[must_use]
    pub fn new(params: TrackingParams) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(params))),
        }
    }

    /// Current parameters; cheap to call once per frame
    #[must_use]
    pub fn snapshot(&self) -> Arc<TrackingParams> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Publish new parameters, taking effect on the next frame
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the parameters are invalid; the
    /// current snapshot is left unchanged
    pub fn set(&self, params: TrackingParams) -> Result<()> {
        params.validate()?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(params);
        info!(
            "Tracking parameters updated: dead zone {:.1}px, max velocity {:.0}px/s, tau {:.3}s",
            params.dead_zone_radius, params.max_velocity, params.smoothing_time_constant
        );
        Ok(())
    }
}
