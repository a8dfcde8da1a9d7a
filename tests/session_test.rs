//! End-to-end session tests: calibrate, track, persist


use gaze_cursor::{
    app::GazeCursorApp,
    calibration::Calibrator,
    controller::{ControllerHandle, PauseReason, SessionMode, StopReason},
    gaze_estimation::GazeFeatureVector,
    geometry::ScreenPoint,
    landmarks::{
        synthetic::{ScriptedProvider, SyntheticFace},
        Observation,
    },
    smoothing::low_pass::smoothing_alpha,
    storage::{CalibrationStore, JsonCalibrationStore, MemoryCalibrationStore},
    Error,
};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use test_helpers::{
    calibrate_with_frames, calibrate_with_samples, create_test_controller, create_test_handle, face_observation,
    test_config, RecordingSink, TARGET_GAZE,
};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gaze-cursor-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn wait_for(handle: &ControllerHandle, frames: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.get_state().frames_processed < frames && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_full_session_centers_cursor() {
    let config = test_config();
    let mut provider = ScriptedProvider::new(30.0);
    let (gx, gy) = TARGET_GAZE[1];
    provider.push_repeated(&SyntheticFace::default().with_gaze(gx, gy), 10);
    provider.push_repeated(&SyntheticFace::default().with_gaze(0.0, 0.0), 90);

    let (sink, log) = RecordingSink::new(1920, 1080);
    let app = GazeCursorApp::with_parts(
        &config,
        Box::new(provider),
        Box::new(sink),
        Box::new(MemoryCalibrationStore::new()),
    )
    .unwrap();
    let handle = app.handle();

    calibrate_with_frames(&handle, 15).unwrap();
    handle.start_tracking().unwrap();
    let calibration_frames = handle.get_state().frames_processed;

    let running = app.spawn().unwrap();
    wait_for(running.handle(), calibration_frames + 100);
    let stats = running.stop_and_join().unwrap();
    assert_eq!(stats.frames, 100);

    let center = ScreenPoint::new(960.0, 540.0);
    let positions = log.positions();
    assert!(positions[0].distance_to(center) > 400.0);

    // The cursor travels toward the center no faster than the velocity cap
    let dt = 1.0 / 30.0;
    let max_step = config.tracking.max_velocity * dt + 1e-6;
    for pair in positions.windows(2) {
        assert!(pair[0].distance_to(pair[1]) <= max_step);
    }

    // and settles once the next filtered step falls inside the dead zone
    let alpha = smoothing_alpha(dt, config.tracking.smoothing_time_constant);
    let settle = config.tracking.dead_zone_radius / alpha;
    let last = log.last().unwrap();
    assert!(
        last.distance_to(center) < settle + 1.0,
        "cursor settled at ({}, {})",
        last.x,
        last.y
    );
    assert!(log.is_released());
    assert_eq!(handle.get_state().stop_reason, Some(StopReason::User));
}

#[test]
fn test_head_turn_is_compensated() {
    let (handle, log) = create_test_handle().unwrap();
    calibrate_with_samples(&handle).unwrap();
    handle.start_tracking().unwrap();

    // Eyes counter-rotate as the head turns while looking at the same point
    let face = SyntheticFace::default().with_gaze(0.0, 0.0);
    handle
        .process_frame(&Observation::face(0.0, face.build()))
        .unwrap();
    let straight = log.last().unwrap();

    let config = test_config();
    let yaw = 0.1;
    let turned = face
        .with_head_pose(yaw, 0.0)
        .with_gaze(-yaw * config.estimator.yaw_compensation, 0.0);
    let (other, other_log) = create_test_handle().unwrap();
    calibrate_with_samples(&other).unwrap();
    other.start_tracking().unwrap();
    other
        .process_frame(&Observation::face(0.0, turned.build()))
        .unwrap();

    assert!(other_log.last().unwrap().distance_to(straight) < 1.0);
}

#[test]
fn test_persistence_round_trip_gives_identical_mapping() {
    let dir = temp_dir("persist");
    let config = test_config();

    let store = JsonCalibrationStore::new(&dir, "calibration.json").unwrap();
    let (controller, _) = create_test_controller(&config, 1920, 1080, Box::new(store.clone())).unwrap();
    let first = ControllerHandle::new(controller);
    calibrate_with_samples(&first).unwrap();
    assert!(store.exists());

    let (controller, _) = create_test_controller(&config, 1920, 1080, Box::new(store.clone())).unwrap();
    let second = ControllerHandle::new(controller);
    second.load_calibration().unwrap();

    let restored = Calibrator::default().restore(store.load().unwrap()).unwrap();
    for gaze in [(0.0, 0.0), (0.3, -0.2), (-0.55, 0.41), (1.2, 0.9)] {
        let gaze = GazeFeatureVector::new(gaze.0, gaze.1);
        let fitted = first.with(|c| c.model().unwrap().apply(&gaze));
        assert_eq!(second.with(|c| c.model().unwrap().apply(&gaze)), fitted);
        assert_eq!(restored.apply(&gaze), fitted);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_calibration_errors_keep_session_open() {
    let (handle, _) = create_test_handle().unwrap();
    handle.start_calibration().unwrap();

    assert!(matches!(
        handle.add_calibration_point(0),
        Err(Error::NotEnoughFixation(_))
    ));
    assert!(matches!(handle.add_calibration_sample(7, GazeFeatureVector::new(0.0, 0.0)), Err(Error::UnknownTarget(_))));

    handle.add_calibration_sample(0, GazeFeatureVector::new(0.0, 0.0)).unwrap();
    assert!(matches!(
        handle.add_calibration_sample(0, GazeFeatureVector::new(0.1, 0.0)),
        Err(Error::DuplicateTarget { index: 0 })
    ));

    // Collinear gaze cannot support a two-dimensional mapping
    for index in 1..5 {
        let x = index as f64 * 0.2;
        handle.add_calibration_sample(index, GazeFeatureVector::new(x, x)).unwrap();
    }
    assert!(matches!(handle.finish_calibration(), Err(Error::Fit(_))));
    assert_eq!(handle.mode(), SessionMode::Calibrating);
}

#[test]
fn test_unstable_fixation_is_rejected() {
    let (handle, _) = create_test_handle().unwrap();
    handle.start_calibration().unwrap();
    for i in 0..20 {
        let gaze = if i % 2 == 0 { (-0.8, 0.0) } else { (0.8, 0.0) };
        handle.process_frame(&face_observation(f64::from(i) / 30.0, gaze)).unwrap();
    }
    assert!(matches!(handle.add_calibration_point(0), Err(Error::NotEnoughFixation(_))));
    assert_eq!(handle.get_state().calibration.unwrap().fixation_samples, 0);
}

#[test]
fn test_state_transitions() {
    let (handle, log) = create_test_handle().unwrap();

    assert!(matches!(handle.start_tracking(), Err(Error::NoCalibration)));
    assert!(matches!(handle.resume(), Err(Error::InvalidTransition { .. })));
    assert_eq!(handle.mode(), SessionMode::Idle);

    calibrate_with_samples(&handle).unwrap();
    handle.start_tracking().unwrap();
    assert!(matches!(handle.start_calibration(), Err(Error::InvalidTransition { .. })));
    assert!(matches!(handle.delete_calibration(), Err(Error::InvalidTransition { .. })));

    handle.pause().unwrap();
    assert_eq!(handle.get_state().pause_reason, Some(PauseReason::User));
    handle.process_frame(&face_observation(0.0, TARGET_GAZE[1])).unwrap();
    assert_eq!(log.count(), 0);

    handle.resume().unwrap();
    handle.stop().unwrap();
    assert!(matches!(handle.stop(), Err(Error::InvalidTransition { mode: SessionMode::Stopped, .. })));
    assert!(matches!(handle.start_tracking(), Err(Error::InvalidTransition { .. })));
    assert!(log.is_released());
}

#[test]
fn test_incompatible_screen() {
    let store = MemoryCalibrationStore::new();
    let config = test_config();

    let (controller, _) = create_test_controller(&config, 1920, 1080, Box::new(store.clone())).unwrap();
    calibrate_with_samples(&ControllerHandle::new(controller)).unwrap();

    let (controller, _) = create_test_controller(&config, 1280, 720, Box::new(store)).unwrap();
    let handle = ControllerHandle::new(controller);
    assert!(matches!(
        handle.start_tracking(),
        Err(Error::IncompatibleCalibration {
            stored_width: 1920,
            stored_height: 1080,
            width: 1280,
            height: 720
        })
    ));
    assert_eq!(handle.mode(), SessionMode::Idle);
}
