//! Shared access to a [`Controller`] from UI and processing threads.

use super::{Controller, EmergencyStop, FrameOutcome, SessionMode, SessionState, TuningHandle};
use crate::{
    config::TrackingParams, gaze_estimation::GazeFeatureVector, landmarks::Observation, Error, Result,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle to a controller behind a mutex.
///
/// Emergency stop and tuning go through lock-free side channels so they take
/// effect even while the processing loop holds the lock for a frame.
#[derive(Clone)]
pub struct ControllerHandle {
    inner: Arc<Mutex<Controller>>,
    emergency: EmergencyStop,
    tuning: TuningHandle,
}

impl ControllerHandle {
    #[must_use]
    pub fn new(controller: Controller) -> Self {
        let emergency = controller.emergency_flag();
        let tuning = controller.tuning();
        Self {
            inner: Arc::new(Mutex::new(controller)),
            emergency,
            tuning,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Controller> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the controller
    pub fn with<R>(&self, f: impl FnOnce(&mut Controller) -> R) -> R {
        f(&mut self.lock())
    }

    /// Raise the emergency flag first, then stop the session
    pub fn emergency_stop(&self) {
        self.emergency.raise();
        self.lock().emergency_stop();
    }

    #[must_use]
    pub fn emergency_flag(&self) -> EmergencyStop {
        self.emergency.clone()
    }

    /// Publish new tracking parameters without taking the controller lock
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid parameters
    pub fn set_sensitivity(&self, params: TrackingParams) -> Result<()> {
        self.tuning.set(params)
    }

    #[must_use]
    pub fn tracking_params(&self) -> TrackingParams {
        *self.tuning.snapshot()
    }

    #[must_use]
    pub fn get_state(&self) -> SessionState {
        self.lock().get_state()
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.lock().mode()
    }

    /// # Errors
    ///
    /// See [`Controller::start_calibration`]
    pub fn start_calibration(&self) -> Result<()> {
        self.lock().start_calibration()
    }

    /// # Errors
    ///
    /// See [`Controller::restart_fixation`]
    pub fn restart_fixation(&self) -> Result<()> {
        self.lock().restart_fixation()
    }

    /// # Errors
    ///
    /// See [`Controller::add_calibration_point`]
    pub fn add_calibration_point(&self, index: usize) -> Result<usize> {
        self.lock().add_calibration_point(index)
    }

    /// # Errors
    ///
    /// See [`Controller::add_calibration_sample`]
    pub fn add_calibration_sample(&self, index: usize, gaze: GazeFeatureVector) -> Result<usize> {
        self.lock().add_calibration_sample(index, gaze)
    }

    /// # Errors
    ///
    /// See [`Controller::finish_calibration`]
    pub fn finish_calibration(&self) -> Result<()> {
        self.lock().finish_calibration()
    }

    /// # Errors
    ///
    /// See [`Controller::cancel_calibration`]
    pub fn cancel_calibration(&self) -> Result<()> {
        self.lock().cancel_calibration()
    }

    /// # Errors
    ///
    /// See [`Controller::start_tracking`]
    pub fn start_tracking(&self) -> Result<()> {
        self.lock().start_tracking()
    }

    /// # Errors
    ///
    /// See [`Controller::pause`]
    pub fn pause(&self) -> Result<()> {
        self.lock().pause()
    }

    /// # Errors
    ///
    /// See [`Controller::resume`]
    pub fn resume(&self) -> Result<()> {
        self.lock().resume()
    }

    /// # Errors
    ///
    /// See [`Controller::stop`]
    pub fn stop(&self) -> Result<()> {
        self.lock().stop()
    }

    /// # Errors
    ///
    /// See [`Controller::load_calibration`]
    pub fn load_calibration(&self) -> Result<()> {
        self.lock().load_calibration()
    }

    /// # Errors
    ///
    /// See [`Controller::delete_calibration`]
    pub fn delete_calibration(&self) -> Result<bool> {
        self.lock().delete_calibration()
    }

    /// # Errors
    ///
    /// See [`Controller::process_frame`]
    pub fn process_frame(&self, observation: &Observation) -> Result<FrameOutcome> {
        self.lock().process_frame(observation)
    }

    pub fn hardware_failure(&self, failure: &Error) {
        self.lock().hardware_failure(failure);
    }

    pub fn record_dropped_frames(&self, total: u64) {
        self.lock().record_dropped_frames(total);
    }
}
