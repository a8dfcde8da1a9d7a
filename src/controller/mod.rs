//! Session state machine.
//!
//! The [`Controller`] owns the estimator, calibrator, smoother, cursor
//! actuator and the active calibration model. It sequences calibration and
//! tracking and runs the per-frame pipeline:
//!
//! ```text
//! landmarks -> GazeEstimator -> CalibrationModel -> Smoother -> CursorActuator
//! ```
//!
//! Commands that are not legal in the current state return
//! [`Error::InvalidTransition`] and leave the state unchanged. `Stopped` is
//! terminal. The emergency stop is an atomic flag checked at the start of
//! every frame and again right before the cursor is moved.

mod handle;
mod signals;
mod state;

pub use handle::ControllerHandle;
pub use signals::{EmergencyStop, TuningHandle};
pub use state::{ControllerState, PauseReason, SessionMode, SessionState, StopReason};

use crate::{
    calibration::{CalibrationModel, CalibrationProgress, Calibrator, ModelSummary},
    config::{Config, TrackingParams},
    cursor_control::{Actuation, CursorActuator, CursorSink},
    gaze_estimation::{GazeEstimate, GazeEstimator, GazeFeatureVector, NoFace},
    landmarks::Observation,
    smoothing::{CursorCommand, CursorFrame, Smoother},
    storage::CalibrationStore,
    timing::FpsCounter,
    Error, Result,
};
use log::{debug, error, info, warn};

/// What one frame did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The current mode does not consume frames
    Ignored,
    /// The emergency stop was observed; nothing was actuated
    Halted,
    /// No usable face in the frame
    NoFace(NoFace),
    /// Gaze buffered for the calibration target on screen
    Fixation(GazeFeatureVector),
    /// A cursor command was produced and handed to the actuator
    Tracked {
        command: CursorCommand,
        actuation: Actuation,
    },
}

#[derive(Debug, Default)]
struct Diagnostics {
    last_frame: Option<CursorFrame>,
    last_command: Option<CursorCommand>,
    last_gaze: Option<GazeFeatureVector>,
    last_no_face: Option<NoFace>,
    consecutive_misses: u32,
    frames_processed: u64,
    dropped_frames: u64,
    last_error: Option<String>,
}

/// Gaze cursor session controller
pub struct Controller {
    state: ControllerState,
    estimator: GazeEstimator,
    calibrator: Calibrator,
    smoother: Smoother,
    model: Option<CalibrationModel>,
    actuator: CursorActuator,
    store: Box<dyn CalibrationStore>,
    emergency: EmergencyStop,
    tuning: TuningHandle,
    fps: FpsCounter,
    diagnostics: Diagnostics,
}

impl Controller {
    /// Create an idle controller driving `sink` and persisting to `store`
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid `config`, or
    /// `SinkUnavailable` if the sink reports an empty screen
    pub fn new(config: &Config, sink: Box<dyn CursorSink>, store: Box<dyn CalibrationStore>) -> Result<Self> {
        config.validate()?;

        let emergency = EmergencyStop::new();
        let actuator = CursorActuator::new(sink, emergency.clone(), config.cursor.min_update_interval);
        let (width, height) = actuator.screen_bounds();
        if width == 0 || height == 0 {
            return Err(Error::SinkUnavailable("sink reports an empty screen".to_string()));
        }

        let mut smoother = Smoother::new(config.tracking);
        smoother.set_bounds(width, height);

        Ok(Self {
            state: ControllerState::Idle,
            estimator: GazeEstimator::new(config.estimator),
            calibrator: Calibrator::new(config.calibration.clone()),
            smoother,
            model: None,
            actuator,
            store,
            emergency,
            tuning: TuningHandle::new(config.tracking),
            fps: FpsCounter::default(),
            diagnostics: Diagnostics::default(),
        })
    }

    #[must_use]
    pub const fn state(&self) -> &ControllerState {
        &self.state
    }

    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.state.mode()
    }

    /// Active calibration model
    #[must_use]
    pub const fn model(&self) -> Option<&CalibrationModel> {
        self.model.as_ref()
    }

    /// Shared emergency stop flag
    #[must_use]
    pub fn emergency_flag(&self) -> EmergencyStop {
        self.emergency.clone()
    }

    /// Shared tuning snapshot
    #[must_use]
    pub fn tuning(&self) -> TuningHandle {
        self.tuning.clone()
    }

    #[must_use]
    pub fn screen_bounds(&self) -> (u32, u32) {
        self.actuator.screen_bounds()
    }

    fn invalid(&self, command: &'static str) -> Error {
        Error::InvalidTransition {
            mode: self.state.mode(),
            command,
        }
    }

    fn transition(&mut self, next: ControllerState) {
        let from = self.state.mode();
        self.state = next;
        info!("Session {from} -> {}", self.state.mode());
    }

    /// Open a calibration session. Legal only while idle.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Idle`
    pub fn start_calibration(&mut self) -> Result<()> {
        if !matches!(self.state, ControllerState::Idle) {
            return Err(self.invalid("start calibration"));
        }
        let (width, height) = self.actuator.screen_bounds();
        let session = self.calibrator.start_calibration(width, height);
        self.transition(ControllerState::Calibrating(session));
        Ok(())
    }

    /// Target layout and progress of the open session
    #[must_use]
    pub fn calibration_progress(&self) -> Option<CalibrationProgress> {
        match &self.state {
            ControllerState::Calibrating(session) => Some(session.progress()),
            _ => None,
        }
    }

    /// Discard buffered gaze, typically when a new target is shown
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Calibrating`
    pub fn restart_fixation(&mut self) -> Result<()> {
        let mode = self.state.mode();
        let ControllerState::Calibrating(session) = &mut self.state else {
            return Err(Error::InvalidTransition {
                mode,
                command: "restart fixation",
            });
        };
        session.clear_fixation();
        Ok(())
    }

    /// Capture target `index` from the gaze buffered since the last capture
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Calibrating`; `UnknownTarget`,
    /// `DuplicateTarget` or `NotEnoughFixation` from the calibrator
    pub fn add_calibration_point(&mut self, index: usize) -> Result<usize> {
        let mode = self.state.mode();
        let ControllerState::Calibrating(session) = &mut self.state else {
            return Err(Error::InvalidTransition {
                mode,
                command: "add a calibration point",
            });
        };
        self.calibrator.capture_fixation(session, index)
    }

    /// Record an explicit gaze vector for target `index`
    ///
    /// # Errors
    ///
    /// As [`Self::add_calibration_point`]
    pub fn add_calibration_sample(&mut self, index: usize, gaze: GazeFeatureVector) -> Result<usize> {
        let mode = self.state.mode();
        let ControllerState::Calibrating(session) = &mut self.state else {
            return Err(Error::InvalidTransition {
                mode,
                command: "add a calibration sample",
            });
        };
        self.calibrator.add_sample_at(session, index, gaze)
    }

    /// Fit the model, make it active and persist it
    ///
    /// A storage failure is logged and recorded in the session state; the
    /// fitted model stays active.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Calibrating`; `Fit` if the samples are
    /// incomplete or degenerate, in which case the session stays open
    pub fn finish_calibration(&mut self) -> Result<()> {
        let mode = self.state.mode();
        let ControllerState::Calibrating(session) = &self.state else {
            return Err(Error::InvalidTransition {
                mode,
                command: "finish calibration",
            });
        };

        let model = self.calibrator.finish(session).map_err(|e| {
            warn!("Calibration fit failed: {e}");
            Error::Fit(e)
        })?;

        if let Err(e) = self.store.save(&model.to_record()) {
            warn!("Failed to save calibration: {e}");
            self.diagnostics.last_error = Some(format!("Failed to save calibration: {e}"));
        }

        self.model = Some(model);
        self.smoother.reset();
        self.transition(ControllerState::Idle);
        Ok(())
    }

    /// Abandon the open session
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Calibrating`
    pub fn cancel_calibration(&mut self) -> Result<()> {
        if !matches!(self.state, ControllerState::Calibrating(_)) {
            return Err(self.invalid("cancel calibration"));
        }
        self.transition(ControllerState::Idle);
        Ok(())
    }

    fn load_stored_model(&self) -> Result<CalibrationModel> {
        let record = self.store.load()?;
        self.calibrator.restore(record)
    }

    fn ensure_model(&mut self) -> Result<()> {
        if self.model.is_some() {
            return Ok(());
        }
        match self.load_stored_model() {
            Ok(model) => {
                info!("Loaded stored calibration from {}", model.timestamp());
                self.model = Some(model);
                Ok(())
            }
            Err(Error::CalibrationNotFound) => Err(Error::NoCalibration),
            Err(e) => {
                warn!("Stored calibration is unusable: {e}");
                self.diagnostics.last_error = Some(e.to_string());
                Err(Error::NoCalibration)
            }
        }
    }

    /// Start moving the cursor. From `Paused` this resumes.
    ///
    /// Loads the stored calibration when none is active.
    ///
    /// # Errors
    ///
    /// `NoCalibration` without a usable model, `IncompatibleCalibration` if
    /// the model was captured on a different screen, `InvalidTransition`
    /// from `Calibrating`, `Tracking` or `Stopped`
    pub fn start_tracking(&mut self) -> Result<()> {
        match self.state {
            ControllerState::Idle => {}
            ControllerState::Paused(_) => return self.resume(),
            _ => return Err(self.invalid("start tracking")),
        }

        self.ensure_model()?;
        let (width, height) = self.actuator.screen_bounds();
        if let Some(model) = &self.model {
            if !model.matches_screen(width, height) {
                let stored = model.resolution();
                return Err(Error::IncompatibleCalibration {
                    stored_width: stored.width,
                    stored_height: stored.height,
                    width,
                    height,
                });
            }
        }

        self.smoother.reset();
        self.smoother.set_params(*self.tuning.snapshot());
        self.diagnostics.consecutive_misses = 0;
        self.fps.reset();
        self.transition(ControllerState::Tracking);
        Ok(())
    }

    /// Suspend tracking; smoother memory is kept
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Tracking`
    pub fn pause(&mut self) -> Result<()> {
        if !matches!(self.state, ControllerState::Tracking) {
            return Err(self.invalid("pause"));
        }
        self.transition(ControllerState::Paused(PauseReason::User));
        Ok(())
    }

    /// Continue tracking from the retained smoother state
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Paused`
    pub fn resume(&mut self) -> Result<()> {
        if !matches!(self.state, ControllerState::Paused(_)) {
            return Err(self.invalid("resume"));
        }
        self.diagnostics.consecutive_misses = 0;
        self.transition(ControllerState::Tracking);
        Ok(())
    }

    fn shutdown(&mut self, reason: StopReason) {
        self.transition(ControllerState::Stopped(reason));
        self.actuator.release();
    }

    /// End the session and release the cursor sink
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if already stopped
    pub fn stop(&mut self) -> Result<()> {
        if self.state.is_stopped() {
            return Err(self.invalid("stop"));
        }
        self.shutdown(StopReason::User);
        Ok(())
    }

    /// Raise the emergency flag and stop; legal in every state
    pub fn emergency_stop(&mut self) {
        self.emergency.raise();
        if !self.state.is_stopped() {
            self.shutdown(StopReason::Emergency);
        }
    }

    /// A camera or cursor device failed; the session stops
    pub fn hardware_failure(&mut self, failure: &Error) {
        error!("Hardware failure: {failure}");
        self.diagnostics.last_error = Some(failure.to_string());
        if !self.state.is_stopped() {
            self.shutdown(StopReason::HardwareFailure);
        }
    }

    /// Publish new tracking parameters, applied from the next frame
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid parameters
    pub fn set_sensitivity(&self, params: TrackingParams) -> Result<()> {
        self.tuning.set(params)
    }

    /// Replace the active model with the stored one
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Idle`, `CalibrationNotFound`, or a
    /// storage or fit error
    pub fn load_calibration(&mut self) -> Result<()> {
        if !matches!(self.state, ControllerState::Idle) {
            return Err(self.invalid("load calibration"));
        }
        let model = self.load_stored_model()?;
        info!("Calibration for {} loaded", model.resolution());
        self.model = Some(model);
        Ok(())
    }

    /// Delete the stored calibration and forget the active model.
    ///
    /// Returns whether a stored calibration existed.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `Idle`, or a storage error
    pub fn delete_calibration(&mut self) -> Result<bool> {
        if !matches!(self.state, ControllerState::Idle) {
            return Err(self.invalid("delete calibration"));
        }
        let removed = self.store.delete()?;
        self.model = None;
        Ok(removed)
    }

    /// Total frames dropped upstream of the controller
    pub fn record_dropped_frames(&mut self, total: u64) {
        self.diagnostics.dropped_frames = total;
    }

    /// Run one frame through the pipeline for the current mode
    ///
    /// # Errors
    ///
    /// `SinkUnavailable` if the cursor sink failed; the session is stopped
    pub fn process_frame(&mut self, observation: &Observation) -> Result<FrameOutcome> {
        if self.emergency.is_raised() {
            if !self.state.is_stopped() {
                self.shutdown(StopReason::Emergency);
            }
            return Ok(FrameOutcome::Halted);
        }

        match self.state.mode() {
            SessionMode::Tracking => self.track(observation),
            SessionMode::Calibrating => Ok(self.collect_fixation(observation)),
            SessionMode::Idle | SessionMode::Paused | SessionMode::Stopped => Ok(FrameOutcome::Ignored),
        }
    }

    fn estimate(&mut self, observation: &Observation) -> GazeEstimate {
        self.diagnostics.frames_processed += 1;
        self.fps.tick(observation.timestamp);
        let estimate = self.estimator.estimate_observation(observation.landmarks.as_ref());
        match estimate {
            GazeEstimate::Gaze(gaze) => {
                self.diagnostics.last_gaze = Some(gaze);
                self.diagnostics.last_no_face = None;
            }
            GazeEstimate::NoFace(reason) => self.diagnostics.last_no_face = Some(reason),
        }
        estimate
    }

    fn collect_fixation(&mut self, observation: &Observation) -> FrameOutcome {
        match self.estimate(observation) {
            GazeEstimate::Gaze(gaze) => {
                if let ControllerState::Calibrating(session) = &mut self.state {
                    session.push_fixation(gaze);
                }
                FrameOutcome::Fixation(gaze)
            }
            GazeEstimate::NoFace(reason) => FrameOutcome::NoFace(reason),
        }
    }

    fn track(&mut self, observation: &Observation) -> Result<FrameOutcome> {
        let params = self.tuning.snapshot();
        if *self.smoother.params() != *params {
            self.smoother.set_params(*params);
        }

        let gaze = match self.estimate(observation) {
            GazeEstimate::Gaze(gaze) => gaze,
            GazeEstimate::NoFace(reason) => {
                self.record_miss(reason, params.consecutive_miss_threshold);
                return Ok(FrameOutcome::NoFace(reason));
            }
        };
        self.diagnostics.consecutive_misses = 0;

        let Some(model) = &self.model else {
            self.transition(ControllerState::Idle);
            return Err(Error::NoCalibration);
        };
        let frame = CursorFrame {
            position: self.calibrator.apply(model, &gaze),
            timestamp: observation.timestamp,
        };
        let command = self.smoother.filter_frame(&frame);
        self.diagnostics.last_frame = Some(frame);
        self.diagnostics.last_command = Some(command);

        if self.emergency.is_raised() {
            self.shutdown(StopReason::Emergency);
            return Ok(FrameOutcome::Halted);
        }

        match self.actuator.move_to(command.position) {
            Ok(Actuation::Halted) => {
                self.shutdown(StopReason::Emergency);
                Ok(FrameOutcome::Halted)
            }
            Ok(actuation) => Ok(FrameOutcome::Tracked { command, actuation }),
            Err(e) => {
                self.hardware_failure(&e);
                Err(e)
            }
        }
    }

    fn record_miss(&mut self, reason: NoFace, threshold: u32) {
        let misses = self.diagnostics.consecutive_misses.saturating_add(1);
        self.diagnostics.consecutive_misses = misses;
        debug!("No face ({reason}), {misses} consecutive");
        if threshold > 0 && misses >= threshold {
            info!("Face lost for {misses} frames, pausing");
            self.transition(ControllerState::Paused(PauseReason::FaceLost));
        }
    }

    /// Snapshot for display and debugging
    #[must_use]
    pub fn get_state(&self) -> SessionState {
        let (pause_reason, stop_reason) = match self.state {
            ControllerState::Paused(reason) => (Some(reason), None),
            ControllerState::Stopped(reason) => (None, Some(reason)),
            _ => (None, None),
        };
        SessionState {
            mode: self.state.mode(),
            pause_reason,
            stop_reason,
            calibration: self.calibration_progress(),
            model: self.model.as_ref().map(ModelSummary::from),
            smoother: self.smoother.memory(),
            last_frame: self.diagnostics.last_frame,
            last_command: self.diagnostics.last_command,
            last_gaze: self.diagnostics.last_gaze,
            last_no_face: self.diagnostics.last_no_face,
            consecutive_misses: self.diagnostics.consecutive_misses,
            frames_processed: self.diagnostics.frames_processed,
            fps: self.fps.fps(),
            dropped_frames: self.diagnostics.dropped_frames,
            sink: self.actuator.stats(),
            emergency_stop: self.emergency.is_raised(),
            last_error: self.diagnostics.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calibration::CalibrationRecord,
        geometry::ScreenPoint,
        landmarks::synthetic::SyntheticFace,
        storage::MemoryCalibrationStore,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    const GAZE_LAYOUT: [(f64, f64); 5] = [(0.0, 0.0), (-0.6, -0.5), (0.6, -0.5), (-0.6, 0.5), (0.6, 0.5)];

    #[derive(Clone, Default)]
    struct Recorder {
        moves: Arc<Mutex<Vec<ScreenPoint>>>,
        released: Arc<AtomicBool>,
        fail: Arc<AtomicBool>,
    }

    struct RecordingSink {
        recorder: Recorder,
        bounds: (u32, u32),
    }

    impl CursorSink for RecordingSink {
        fn screen_bounds(&self) -> (u32, u32) {
            self.bounds
        }

        fn set_position(&mut self, x: f64, y: f64) -> Result<()> {
            if self.recorder.fail.load(Ordering::SeqCst) {
                return Err(Error::SinkUnavailable("unplugged".to_string()));
            }
            self.recorder.moves.lock().unwrap().push(ScreenPoint::new(x, y));
            Ok(())
        }

        fn release(&mut self) {
            self.recorder.released.store(true, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    struct FailingStore;

    impl CalibrationStore for FailingStore {
        fn save(&mut self, _record: &CalibrationRecord) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }

        fn load(&self) -> Result<CalibrationRecord> {
            Err(Error::CalibrationNotFound)
        }

        fn delete(&mut self) -> Result<bool> {
            Ok(false)
        }

        fn exists(&self) -> bool {
            false
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.cursor.min_update_interval = 0.0;
        config.tracking.consecutive_miss_threshold = 3;
        config
    }

    fn controller_with(store: Box<dyn CalibrationStore>, bounds: (u32, u32)) -> (Controller, Recorder) {
        let recorder = Recorder::default();
        let sink = RecordingSink {
            recorder: recorder.clone(),
            bounds,
        };
        let controller = Controller::new(&test_config(), Box::new(sink), store).unwrap();
        (controller, recorder)
    }

    fn calibrate(controller: &mut Controller) {
        controller.start_calibration().unwrap();
        for (index, &(x, y)) in GAZE_LAYOUT.iter().enumerate() {
            controller
                .add_calibration_sample(index, GazeFeatureVector::new(x, y))
                .unwrap();
        }
        controller.finish_calibration().unwrap();
    }

    fn face_frame(timestamp: f64, gaze: (f64, f64)) -> Observation {
        Observation::face(timestamp, SyntheticFace::default().with_gaze(gaze.0, gaze.1).build())
    }

    #[test]
    fn test_illegal_commands_leave_state_unchanged() {
        let (mut controller, _) = controller_with(Box::new(MemoryCalibrationStore::new()), (1920, 1080));
        assert!(matches!(
            controller.pause(),
            Err(Error::InvalidTransition { mode: SessionMode::Idle, .. })
        ));
        assert!(matches!(controller.finish_calibration(), Err(Error::InvalidTransition { .. })));
        assert!(matches!(controller.add_calibration_point(0), Err(Error::InvalidTransition { .. })));
        assert!(matches!(controller.start_tracking(), Err(Error::NoCalibration)));
        assert_eq!(controller.mode(), SessionMode::Idle);
    }

    #[test]
    fn test_calibration_from_fixation_frames() {
        let store = MemoryCalibrationStore::new();
        let (mut controller, recorder) = controller_with(Box::new(store.clone()), (1920, 1080));
        controller.start_calibration().unwrap();

        let mut t = 0.0;
        for (index, &gaze) in GAZE_LAYOUT.iter().enumerate() {
            controller.restart_fixation().unwrap();
            for _ in 0..15 {
                t += 1.0 / 30.0;
                let outcome = controller.process_frame(&face_frame(t, gaze)).unwrap();
                assert!(matches!(outcome, FrameOutcome::Fixation(_)));
            }
            controller.add_calibration_point(index).unwrap();
        }
        assert!(matches!(
            controller.add_calibration_point(0),
            Err(Error::DuplicateTarget { index: 0 })
        ));

        controller.finish_calibration().unwrap();
        assert_eq!(controller.mode(), SessionMode::Idle);
        assert!(store.exists());
        assert!(recorder.moves.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fit_error_keeps_session_open() {
        let (mut controller, _) = controller_with(Box::new(MemoryCalibrationStore::new()), (1920, 1080));
        controller.start_calibration().unwrap();
        controller.add_calibration_sample(0, GazeFeatureVector::new(0.0, 0.0)).unwrap();
        assert!(matches!(controller.finish_calibration(), Err(Error::Fit(_))));
        assert_eq!(controller.mode(), SessionMode::Calibrating);

        controller.cancel_calibration().unwrap();
        assert_eq!(controller.mode(), SessionMode::Idle);
        assert!(controller.model().is_none());
    }

    #[test]
    fn test_storage_failure_keeps_model() {
        let (mut controller, _) = controller_with(Box::new(FailingStore), (1920, 1080));
        calibrate(&mut controller);
        assert!(controller.model().is_some());
        assert!(controller.get_state().last_error.unwrap().contains("disk full"));
        controller.start_tracking().unwrap();
    }

    #[test]
    fn test_tracking_moves_cursor_to_center() {
        let (mut controller, recorder) = controller_with(Box::new(MemoryCalibrationStore::new()), (1920, 1080));
        calibrate(&mut controller);
        controller.start_tracking().unwrap();

        for i in 0..60 {
            let outcome = controller
                .process_frame(&face_frame(f64::from(i) / 30.0, GAZE_LAYOUT[0]))
                .unwrap();
            assert!(matches!(outcome, FrameOutcome::Tracked { .. }));
        }
        let last = *recorder.moves.lock().unwrap().last().unwrap();
        assert!(last.distance_to(ScreenPoint::new(960.0, 540.0)) < 1e-6);
        assert_eq!(controller.get_state().frames_processed, 60);
    }

    #[test]
    fn test_face_loss_pauses_and_resume_keeps_memory() {
        let (mut controller, recorder) = controller_with(Box::new(MemoryCalibrationStore::new()), (1920, 1080));
        calibrate(&mut controller);
        controller.start_tracking().unwrap();
        controller.process_frame(&face_frame(0.0, GAZE_LAYOUT[1])).unwrap();
        let memory = controller.get_state().smoother;

        for i in 1..=3 {
            controller.process_frame(&Observation::no_face(f64::from(i) / 30.0)).unwrap();
        }
        let state = controller.get_state();
        assert_eq!(state.mode, SessionMode::Paused);
        assert_eq!(state.pause_reason, Some(PauseReason::FaceLost));
        assert_eq!(state.smoother, memory);

        let moves = recorder.moves.lock().unwrap().len();
        assert_eq!(
            controller.process_frame(&face_frame(0.2, GAZE_LAYOUT[0])).unwrap(),
            FrameOutcome::Ignored
        );
        assert_eq!(recorder.moves.lock().unwrap().len(), moves);

        controller.start_tracking().unwrap();
        assert_eq!(controller.mode(), SessionMode::Tracking);
        assert_eq!(controller.get_state().smoother, memory);
    }

    #[test]
    fn test_emergency_stop_halts_before_actuation() {
        let (mut controller, recorder) = controller_with(Box::new(MemoryCalibrationStore::new()), (1920, 1080));
        calibrate(&mut controller);
        controller.start_tracking().unwrap();
        controller.process_frame(&face_frame(0.0, GAZE_LAYOUT[0])).unwrap();

        // Raised from another thread through the shared flag
        controller.emergency_flag().raise();
        assert_eq!(
            controller.process_frame(&face_frame(0.1, GAZE_LAYOUT[2])).unwrap(),
            FrameOutcome::Halted
        );
        assert_eq!(recorder.moves.lock().unwrap().len(), 1);
        assert_eq!(controller.get_state().stop_reason, Some(StopReason::Emergency));
        assert!(recorder.released.load(Ordering::SeqCst));
        assert!(matches!(controller.start_calibration(), Err(Error::InvalidTransition { .. })));
    }

    #[test]
    fn test_sink_failure_stops_session() {
        let (mut controller, recorder) = controller_with(Box::new(MemoryCalibrationStore::new()), (1920, 1080));
        calibrate(&mut controller);
        controller.start_tracking().unwrap();
        recorder.fail.store(true, Ordering::SeqCst);

        assert!(matches!(
            controller.process_frame(&face_frame(0.0, GAZE_LAYOUT[0])),
            Err(Error::SinkUnavailable(_))
        ));
        assert_eq!(controller.get_state().stop_reason, Some(StopReason::HardwareFailure));
        assert!(recorder.released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_start_tracking_loads_stored_model() {
        let store = MemoryCalibrationStore::new();
        let (mut first, _) = controller_with(Box::new(store.clone()), (1920, 1080));
        calibrate(&mut first);

        let (mut second, _) = controller_with(Box::new(store.clone()), (1920, 1080));
        second.start_tracking().unwrap();
        let gaze = GazeFeatureVector::new(0.2, -0.1);
        assert_eq!(
            second.model().unwrap().apply(&gaze),
            first.model().unwrap().apply(&gaze)
        );

        let (mut other_screen, _) = controller_with(Box::new(store), (2560, 1440));
        assert!(matches!(
            other_screen.start_tracking(),
            Err(Error::IncompatibleCalibration { stored_width: 1920, .. })
        ));
        assert_eq!(other_screen.mode(), SessionMode::Idle);
    }

    #[test]
    fn test_stored_off_screen_targets_are_refused() {
        let mut store = MemoryCalibrationStore::new();
        let (mut first, _) = controller_with(Box::new(store.clone()), (1920, 1080));
        calibrate(&mut first);

        let mut record = store.load().unwrap();
        record.calibration_points[1].screen_point = ScreenPoint::new(-5000.0, 99999.0);
        store.save(&record).unwrap();

        let (mut second, _) = controller_with(Box::new(store), (1920, 1080));
        assert!(matches!(second.start_tracking(), Err(Error::NoCalibration)));
        assert!(second.model().is_none());
        assert_eq!(second.mode(), SessionMode::Idle);
        assert!(second.get_state().last_error.unwrap().contains("outside"));
    }

    #[test]
    fn test_delete_calibration() {
        let store = MemoryCalibrationStore::new();
        let (mut controller, _) = controller_with(Box::new(store.clone()), (1920, 1080));
        calibrate(&mut controller);
        assert!(controller.delete_calibration().unwrap());
        assert!(!store.exists());
        assert!(matches!(controller.start_tracking(), Err(Error::NoCalibration)));
        assert!(matches!(controller.load_calibration(), Err(Error::CalibrationNotFound)));
    }

    #[test]
    fn test_sensitivity_applies_next_frame() {
        let (mut controller, _) = controller_with(Box::new(MemoryCalibrationStore::new()), (1920, 1080));
        calibrate(&mut controller);
        controller.start_tracking().unwrap();
        controller.process_frame(&face_frame(0.0, GAZE_LAYOUT[0])).unwrap();

        let mut params = *controller.tuning().snapshot();
        params.dead_zone_radius = 5000.0;
        controller.set_sensitivity(params).unwrap();

        let outcome = controller.process_frame(&face_frame(0.033, GAZE_LAYOUT[4])).unwrap();
        let FrameOutcome::Tracked { command, .. } = outcome else {
            panic!("expected a tracked frame, got {outcome:?}");
        };
        assert!(command.position.distance_to(ScreenPoint::new(960.0, 540.0)) < 1e-6);
    }
}
