//! Calibration persistence.
//!
//! Only the labeled calibration points, the screen size and a timestamp are
//! stored. Models are refit from the points when loaded.

use crate::{calibration::CalibrationRecord, Error, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Persistence backend for calibration records
pub trait CalibrationStore: Send {
    /// Persist `record`, replacing any stored calibration
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written
    fn save(&mut self, record: &CalibrationRecord) -> Result<()>;

    /// Load the stored calibration
    ///
    /// # Errors
    ///
    /// `CalibrationNotFound` if nothing is stored, or a read/parse error
    fn load(&self) -> Result<CalibrationRecord>;

    /// Remove the stored calibration; returns whether anything was removed
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed
    fn delete(&mut self) -> Result<bool>;

    /// Whether a calibration is stored
    fn exists(&self) -> bool;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonCalibrationStore {
    path: PathBuf,
}

impl JsonCalibrationStore {
    /// Store `file_name` inside `data_dir`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `file_name` is not a plain file name
    pub fn new(data_dir: impl AsRef<Path>, file_name: &str) -> Result<Self> {
        let name = Path::new(file_name);
        if file_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
            return Err(Error::ConfigError(format!(
                "Calibration file '{file_name}' must be a plain file name"
            )));
        }
        Ok(Self {
            path: data_dir.as_ref().join(name),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CalibrationStore for JsonCalibrationStore {
    fn save(&mut self, record: &CalibrationRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(record)?;

        // Write then rename so a crash never leaves a truncated file
        let temp = self.temp_path();
        fs::write(&temp, content)?;
        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        info!("Saved calibration to {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<CalibrationRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::CalibrationNotFound);
            }
            Err(e) => return Err(e.into()),
        };
        let record: CalibrationRecord = serde_json::from_str(&content)?;
        debug!("Loaded calibration from {}", self.path.display());
        Ok(record)
    }

    fn delete(&mut self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Deleted calibration at {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Store kept in memory, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryCalibrationStore {
    record: Arc<Mutex<Option<CalibrationRecord>>>,
}

impl MemoryCalibrationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalibrationStore for MemoryCalibrationStore {
    fn save(&mut self, record: &CalibrationRecord) -> Result<()> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }

    fn load(&self) -> Result<CalibrationRecord> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::CalibrationNotFound)
    }

    fn delete(&mut self) -> Result<bool> {
        Ok(self.record.lock().unwrap_or_else(PoisonError::into_inner).take().is_some())
    }

    fn exists(&self) -> bool {
        self.record.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationSample, ScreenResolution};
    use crate::{gaze_estimation::GazeFeatureVector, geometry::ScreenPoint};
    use chrono::Utc;

    fn record() -> CalibrationRecord {
        CalibrationRecord {
            version: "1.0".to_string(),
            timestamp: Utc::now(),
            screen_resolution: ScreenResolution::new(1920, 1080),
            calibration_points: vec![CalibrationSample {
                screen_point: ScreenPoint::new(960.0, 540.0),
                gaze_vector: GazeFeatureVector::new(0.1234567890123, -0.000_000_1),
            }],
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gaze-cursor-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_rejects_path_components() {
        assert!(JsonCalibrationStore::new("/tmp", "../escape.json").is_err());
        assert!(JsonCalibrationStore::new("/tmp", "sub/file.json").is_err());
        assert!(JsonCalibrationStore::new("/tmp", "").is_err());
        assert!(JsonCalibrationStore::new("/tmp", "calibration.json").is_ok());
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = temp_dir("store");
        let mut store = JsonCalibrationStore::new(&dir, "calibration.json").unwrap();
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(Error::CalibrationNotFound)));

        let saved = record();
        store.save(&saved).unwrap();
        assert!(store.exists());
        assert!(!store.temp_path().exists());
        assert_eq!(store.load().unwrap(), saved);

        assert!(store.delete().unwrap());
        assert!(!store.delete().unwrap());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = temp_dir("corrupt");
        fs::create_dir_all(&dir).unwrap();
        let store = JsonCalibrationStore::new(&dir, "calibration.json").unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(Error::Json(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_memory_store_shared_between_clones() {
        let mut store = MemoryCalibrationStore::new();
        let view = store.clone();
        store.save(&record()).unwrap();
        assert!(view.exists());
        assert!(store.delete().unwrap());
        assert!(!view.exists());
    }
}
