//! Application wiring.
//!
//! [`GazeCursorApp`] builds a controller from the configuration and runs the
//! frame loop on a dedicated thread. [`InputBridge`] feeds that loop from a
//! line-oriented JSON stream written by an external face-mesh detector,
//! interleaving landmark frames with session commands.

use crate::{
    config::{Config, RuntimeConfig, TrackingParams},
    controller::{Controller, ControllerHandle, FrameOutcome, SessionMode},
    cursor_control::{create_sink, CursorSink},
    landmarks::{Landmark, LandmarkProvider, LandmarkSet, Observation, SlotLandmarkProvider},
    latest::LatestSlot,
    storage::{CalibrationStore, JsonCalibrationStore},
    Error, Result,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::BufRead;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
    /// Frames handed to the controller
    pub frames: u64,
    /// Frames pulled while idle or paused
    pub discarded: u64,
    /// Waits that ended without a frame
    pub timeouts: u64,
}

/// Mailbox and provider pair for a detector running on another thread
#[must_use]
pub fn slot_provider(runtime: &RuntimeConfig) -> (LatestSlot<Observation>, SlotLandmarkProvider) {
    let slot = LatestSlot::new();
    let provider = SlotLandmarkProvider::new(slot.clone(), Duration::from_millis(runtime.frame_timeout_ms));
    (slot, provider)
}

/// Controller plus the landmark source that drives it
pub struct GazeCursorApp {
    handle: ControllerHandle,
    provider: Box<dyn LandmarkProvider>,
    runtime: RuntimeConfig,
}

impl GazeCursorApp {
    /// Build the configured cursor sink and calibration file store
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the cursor sink
    /// cannot be opened
    pub fn new(config: &Config, provider: Box<dyn LandmarkProvider>) -> Result<Self> {
        info!("Initializing gaze cursor application");
        let sink = create_sink(&config.cursor)?;
        let store = JsonCalibrationStore::new(&config.storage.data_dir, &config.storage.calibration_file)?;
        info!("Calibration file: {}", store.path().display());
        Self::with_parts(config, provider, sink, Box::new(store))
    }

    /// Build from explicit collaborators
    ///
    /// # Errors
    ///
    /// See [`Controller::new`]
    pub fn with_parts(
        config: &Config,
        provider: Box<dyn LandmarkProvider>,
        sink: Box<dyn CursorSink>,
        store: Box<dyn CalibrationStore>,
    ) -> Result<Self> {
        let controller = Controller::new(config, sink, store)?;
        info!("Landmark provider: {}", provider.name());
        Ok(Self {
            handle: ControllerHandle::new(controller),
            provider,
            runtime: config.runtime,
        })
    }

    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Run the frame loop until the session stops, then release the provider
    pub fn run(&mut self) -> LoopStats {
        info!("Starting processing loop");
        let idle = Duration::from_millis(self.runtime.idle_poll_ms);
        let mut stats = LoopStats::default();

        loop {
            let active = match self.handle.mode() {
                SessionMode::Stopped => break,
                SessionMode::Tracking | SessionMode::Calibrating => true,
                SessionMode::Idle | SessionMode::Paused => {
                    thread::sleep(idle);
                    false
                }
            };

            let observation = match self.provider.next_landmarks() {
                Ok(Some(observation)) => observation,
                Ok(None) => {
                    stats.timeouts += 1;
                    continue;
                }
                Err(e) => {
                    self.handle.hardware_failure(&e);
                    continue;
                }
            };
            self.handle.record_dropped_frames(self.provider.dropped_frames());

            if !active {
                stats.discarded += 1;
                continue;
            }

            stats.frames += 1;
            match self.handle.process_frame(&observation) {
                Ok(FrameOutcome::NoFace(reason)) => debug!("Frame at {:.3}s: {reason}", observation.timestamp),
                Ok(_) => {}
                // The controller has already stopped and recorded the failure
                Err(e) if e.is_fatal() => debug!("Frame ended the session: {e}"),
                Err(e) => warn!("Frame processing failed: {e}"),
            }
        }

        self.provider.release();
        info!(
            "Processing loop finished: {} frames processed, {} discarded",
            stats.frames, stats.discarded
        );
        stats
    }

    /// Run the loop on its own thread
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned
    pub fn spawn(mut self) -> Result<TrackingLoop> {
        let handle = self.handle.clone();
        let thread = thread::Builder::new()
            .name("gaze-loop".to_string())
            .spawn(move || self.run())?;
        Ok(TrackingLoop { handle, thread })
    }
}

/// A processing loop running on its own thread
pub struct TrackingLoop {
    handle: ControllerHandle,
    thread: JoinHandle<LoopStats>,
}

impl TrackingLoop {
    #[must_use]
    pub const fn handle(&self) -> &ControllerHandle {
        &self.handle
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to exit
    ///
    /// # Errors
    ///
    /// `Thread` if the loop panicked
    pub fn join(self) -> Result<LoopStats> {
        self.thread
            .join()
            .map_err(|_| Error::Thread("processing loop panicked".to_string()))
    }

    /// Stop the session if it is still running, then wait for the loop
    ///
    /// # Errors
    ///
    /// `Thread` if the loop panicked
    pub fn stop_and_join(self) -> Result<LoopStats> {
        if self.handle.mode() != SessionMode::Stopped {
            if let Err(e) = self.handle.stop() {
                debug!("Stop request ignored: {e}");
            }
        }
        self.join()
    }
}

/// One line of the input stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputMessage {
    /// Detector output; `landmarks` is absent or null when no face was found
    Frame {
        timestamp: f64,
        #[serde(default)]
        landmarks: Option<Vec<[f64; 3]>>,
    },
    StartCalibration,
    /// A new target is on screen; buffered gaze is discarded
    ShowTarget {
        index: usize,
    },
    CapturePoint {
        index: usize,
    },
    FinishCalibration,
    CancelCalibration,
    StartTracking,
    Pause,
    Resume,
    Stop,
    EmergencyStop,
    SetSensitivity(TrackingParams),
    LoadCalibration,
    DeleteCalibration,
    /// Log a state summary
    State,
}

/// Routes input lines to the frame mailbox or the controller
pub struct InputBridge {
    handle: ControllerHandle,
    slot: LatestSlot<Observation>,
}

impl InputBridge {
    #[must_use]
    pub const fn new(handle: ControllerHandle, slot: LatestSlot<Observation>) -> Self {
        Self { handle, slot }
    }

    /// Apply one message
    ///
    /// # Errors
    ///
    /// Returns the controller's error for a rejected command
    pub fn dispatch(&self, message: InputMessage) -> Result<()> {
        match message {
            InputMessage::Frame { timestamp, landmarks } => {
                let landmarks = landmarks.map(|points| {
                    LandmarkSet::new(points.into_iter().map(|[x, y, z]| Landmark::new(x, y, z)).collect())
                });
                if !self.slot.publish(Observation { timestamp, landmarks }) {
                    debug!("Frame at {timestamp:.3}s arrived after the stream closed");
                }
            }
            InputMessage::StartCalibration => {
                self.handle.start_calibration()?;
                if let Some(progress) = self.handle.with(|c| c.calibration_progress()) {
                    for (index, target) in progress.targets.iter().enumerate() {
                        info!("Calibration target {index}: ({:.0}, {:.0})", target.x, target.y);
                    }
                }
            }
            InputMessage::ShowTarget { index } => {
                self.handle.restart_fixation()?;
                debug!("Showing calibration target {index}");
            }
            InputMessage::CapturePoint { index } => {
                self.handle.add_calibration_point(index)?;
                info!("Calibration target {index} captured");
            }
            InputMessage::FinishCalibration => self.handle.finish_calibration()?,
            InputMessage::CancelCalibration => self.handle.cancel_calibration()?,
            InputMessage::StartTracking => self.handle.start_tracking()?,
            InputMessage::Pause => self.handle.pause()?,
            InputMessage::Resume => self.handle.resume()?,
            InputMessage::Stop => self.handle.stop()?,
            InputMessage::EmergencyStop => self.handle.emergency_stop(),
            InputMessage::SetSensitivity(params) => self.handle.set_sensitivity(params)?,
            InputMessage::LoadCalibration => self.handle.load_calibration()?,
            InputMessage::DeleteCalibration => {
                let removed = self.handle.delete_calibration()?;
                info!("Stored calibration {}", if removed { "deleted" } else { "not present" });
            }
            InputMessage::State => {
                let state = self.handle.get_state();
                info!(
                    "mode={} frames={} fps={:.1} misses={} dropped={} moves={} last_error={:?}",
                    state.mode,
                    state.frames_processed,
                    state.fps,
                    state.consecutive_misses,
                    state.dropped_frames,
                    state.sink.moves,
                    state.last_error
                );
            }
        }
        Ok(())
    }

    /// Read JSON lines until end of input or until the session stops.
    /// Returns the number of messages handled.
    ///
    /// Malformed lines and rejected commands are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input fails
    pub fn run(&self, reader: impl BufRead) -> Result<u64> {
        let mut handled = 0;
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match serde_json::from_str::<InputMessage>(line) {
                Ok(message) => {
                    if let Err(e) = self.dispatch(message) {
                        warn!("Command rejected: {e}");
                    }
                    handled += 1;
                }
                Err(e) => warn!("Ignoring malformed input line: {e}"),
            }

            if self.handle.mode() == SessionMode::Stopped {
                break;
            }
        }
        Ok(handled)
    }
}
