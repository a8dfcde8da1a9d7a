//! Configuration file handling

use gaze_cursor::{
    config::{Config, SinkBackend},
    Error,
};

fn temp_file(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("gaze-cursor-{name}-{}.yaml", std::process::id()))
}

#[test]
fn test_config_file_round_trip() {
    let path = temp_file("roundtrip");
    let mut config = Config::default();
    config.tracking.dead_zone_radius = 9.5;
    config.cursor.backend = SinkBackend::Log;
    config.calibration.targets[0] = [0.45, 0.55];

    config.to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.tracking, config.tracking);
    assert_eq!(loaded.cursor, config.cursor);
    assert_eq!(loaded.calibration, config.calibration);
    loaded.validate().unwrap();

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_malformed_config_is_reported() {
    let path = temp_file("malformed");
    std::fs::write(&path, "tracking: [not, a, mapping]\n").unwrap();
    assert!(matches!(Config::from_file(&path), Err(Error::ConfigError(_))));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_missing_config_file() {
    assert!(matches!(
        Config::from_file("/nonexistent/gaze-cursor.yaml"),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_invalid_values_fail_validation() {
    let mut config = Config::default();
    config.runtime.frame_timeout_ms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.calibration.min_fixation_samples = config.calibration.fixation_window + 1;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.cursor.min_update_interval = -0.1;
    assert!(config.validate().is_err());
}
