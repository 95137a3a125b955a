//! Side file holding the last nonzero chemistry readings across restarts

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The values that survive a restart
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LastReadings {
    #[serde(rename = "lastPH", default)]
    pub last_ph: f64,
    #[serde(rename = "lastOrp", default)]
    pub last_orp: i64,
}

/// A JSON file at a fixed path
#[derive(Debug, Clone)]
pub struct SideFile {
    path: PathBuf,
}

impl SideFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the readings; a missing file is not an error
    pub fn load(&self) -> Result<Option<LastReadings>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Overwrite the file, creating its directory if needed
    pub fn save(&self, readings: &LastReadings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(readings)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateError;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempdir().unwrap();
        let file = SideFile::new(dir.path().join("absent.json"));
        assert_eq!(file.load().unwrap(), None);
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = tempdir().unwrap();
        let file = SideFile::new(dir.path().join("nested").join("last-readings.json"));
        let readings = LastReadings {
            last_ph: 7.5,
            last_orp: 700,
        };

        file.save(&readings).unwrap();

        let raw = fs::read_to_string(file.path()).unwrap();
        assert!(raw.contains("\"lastPH\":7.5"));
        assert!(raw.contains("\"lastOrp\":700"));
        assert_eq!(file.load().unwrap(), Some(readings));
    }

    #[test]
    fn test_partial_and_corrupt_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.json");

        fs::write(&path, r#"{"lastOrp": 640}"#).unwrap();
        let readings = SideFile::new(&path).load().unwrap().unwrap();
        assert_eq!(readings.last_orp, 640);
        assert_eq!(readings.last_ph, 0.0);

        fs::write(&path, "garbage").unwrap();
        assert!(matches!(
            SideFile::new(&path).load(),
            Err(StateError::Serialization(_))
        ));
    }
}
