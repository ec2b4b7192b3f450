//! Single-document JSON history, compatible with `incident_history.json`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{HistoryBackend, StorageError};
use crate::detect::IncidentRecord;

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl HistoryBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<IncidentRecord>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No incident history found, starting fresh");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StorageError::unavailable(self.location(), e)),
        };

        let incidents: Vec<IncidentRecord> =
            serde_json::from_str(&content).map_err(|e| StorageError::corrupt(self.location(), e))?;
        info!(path = %self.path.display(), count = incidents.len(), "Loaded incident history");
        Ok(incidents)
    }

    fn save(&self, incidents: &[IncidentRecord]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::unavailable(self.location(), e))?;
        }

        let body = serde_json::to_string_pretty(incidents)
            .map_err(|e| StorageError::unavailable(self.location(), e))?;

        // Write beside the target and rename over it so readers never see half a document.
        let staging = self.staging_path();
        fs::write(&staging, body).map_err(|e| StorageError::unavailable(self.location(), e))?;
        fs::rename(&staging, &self.path).map_err(|e| StorageError::unavailable(self.location(), e))?;

        debug!(path = %self.path.display(), count = incidents.len(), "Saved incident history");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ActionEntry, CategoryMapper};
    use chrono::Utc;

    fn record(id: u64) -> IncidentRecord {
        let mapper = CategoryMapper::new([("knife", "weapon")]);
        IncidentRecord {
            id,
            kind: mapper.map("knife").unwrap(),
            confidence: 0.91,
            timestamp: Utc::now(),
            camera_id: "CAM-001".into(),
            location: "Main Entrance".into(),
            snapshot_reference: format!("frame_{id}.jpg"),
            actions: vec![ActionEntry::new("Building admin notified")],
        }
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("history.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested/dir/history.json"));
        let incidents = vec![record(1), record(2)];

        backend.save(&incidents).unwrap();
        assert_eq!(backend.load().unwrap(), incidents);
        assert!(!backend.staging_path().exists());
    }

    #[test]
    fn test_output_is_indented() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("history.json"));
        backend.save(&[record(1)]).unwrap();

        let raw = fs::read_to_string(backend.path()).unwrap();
        assert!(raw.starts_with("[\n  {"));
        assert!(raw.contains("\"snapshot_path\""));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonFileBackend::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn test_directory_in_the_way_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path());
        assert!(matches!(backend.load().unwrap_err(), StorageError::Unavailable { .. }));
    }
}
