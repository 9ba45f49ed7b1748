//! [`StatePersistence`] backed by a single YAML file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use echorift_core::persist::{StatePersistence, StoreError};
use echorift_types::EventSnapshot;
use tracing::debug;

use crate::document::DataDocument;

/// Stores the event snapshot in one YAML file.
///
/// Saves go through a sibling temporary file and a rename, so a crash
/// mid-write leaves the previous file intact.
#[derive(Debug, Clone)]
pub struct YamlFileStore {
    path: PathBuf,
}

impl YamlFileStore {
    /// A store writing to `path`. Nothing is touched until the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The data file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StatePersistence for YamlFileStore {
    fn save(&self, snapshot: &EventSnapshot) -> Result<(), StoreError> {
        let document = DataDocument::from_snapshot(snapshot).map_err(|e| encoding(&e))?;
        let yaml = serde_yml::to_string(&document).map_err(|e| encoding(&e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, yaml)?;
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), zones = snapshot.zones.len(), "Data file written");
        Ok(())
    }

    fn load(&self) -> Result<Option<EventSnapshot>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Some(EventSnapshot::default()));
        }
        let document: DataDocument = serde_yml::from_str(&contents).map_err(|e| encoding(&e))?;
        let snapshot = document.into_snapshot(Utc::now());
        debug!(path = %self.path.display(), zones = snapshot.zones.len(), "Data file read");
        Ok(Some(snapshot))
    }
}

fn encoding(e: &serde_yml::Error) -> StoreError {
    StoreError::Encoding {
        message: e.to_string(),
    }
}
