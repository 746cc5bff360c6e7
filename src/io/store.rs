//! Persistence of the working project and named snapshots.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ViewSettings;
use crate::model::sample::sample_forest;
use crate::model::task::new_id;
use crate::model::Forest;

use super::envelope::ImportError;
use super::file::{load_project, save_project};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("no snapshot with id {0}")]
    UnknownSnapshot(String),
}

/// A named copy of the project saved at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub data: Forest,
}

pub trait ProjectStore {
    /// The saved working project, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<Forest>, StoreError>;
    fn save(&mut self, forest: &Forest) -> Result<(), StoreError>;
    fn list_snapshots(&self) -> Result<Vec<Snapshot>, StoreError>;
    fn save_snapshot(&mut self, name: &str, forest: &Forest) -> Result<Snapshot, StoreError>;
    fn delete_snapshot(&mut self, id: &str) -> Result<(), StoreError>;
}

/// Load the saved project, falling back to the sample project when nothing
/// was saved or the saved data cannot be read.
pub fn load_or_sample(store: &dyn ProjectStore, today: NaiveDate) -> Forest {
    match store.load() {
        Ok(Some(forest)) => forest,
        Ok(None) => sample_forest(today),
        Err(e) => {
            warn!(error = %e, "could not load saved project, starting from sample");
            sample_forest(today)
        }
    }
}

fn new_snapshot(name: &str, forest: &Forest) -> Snapshot {
    let name = name.trim();
    Snapshot {
        id: new_id(),
        name: if name.is_empty() {
            "Untitled snapshot".to_string()
        } else {
            name.to_string()
        },
        timestamp: Utc::now(),
        data: forest.clone(),
    }
}

/// JSON files in a directory: `project.json` and `snapshots.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The OS data directory for the app, or the working directory.
    pub fn default_location() -> Self {
        let root = directories::ProjectDirs::from("", "", "GanttPlanner")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_path(&self) -> PathBuf {
        self.root.join("project.json")
    }

    fn snapshots_path(&self) -> PathBuf {
        self.root.join("snapshots.json")
    }

    fn write_snapshots(&self, snapshots: &[Snapshot]) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.snapshots_path(), serde_json::to_string_pretty(snapshots)?)?;
        Ok(())
    }
}

impl ProjectStore for FileStore {
    fn load(&self) -> Result<Option<Forest>, StoreError> {
        let path = self.project_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(load_project(&path)?.forest))
    }

    fn save(&mut self, forest: &Forest) -> Result<(), StoreError> {
        save_project(forest, &ViewSettings::default(), &self.project_path())
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>, StoreError> {
        let path = self.snapshots_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save_snapshot(&mut self, name: &str, forest: &Forest) -> Result<Snapshot, StoreError> {
        let mut snapshots = self.list_snapshots()?;
        let snapshot = new_snapshot(name, forest);
        snapshots.push(snapshot.clone());
        self.write_snapshots(&snapshots)?;
        info!(name = %snapshot.name, "saved snapshot");
        Ok(snapshot)
    }

    fn delete_snapshot(&mut self, id: &str) -> Result<(), StoreError> {
        let mut snapshots = self.list_snapshots()?;
        let before = snapshots.len();
        snapshots.retain(|s| s.id != id);
        if snapshots.len() == before {
            return Err(StoreError::UnknownSnapshot(id.to_string()));
        }
        self.write_snapshots(&snapshots)
    }
}

/// Keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    project: Option<Forest>,
    snapshots: Vec<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryStore {
    fn load(&self) -> Result<Option<Forest>, StoreError> {
        Ok(self.project.clone())
    }

    fn save(&mut self, forest: &Forest) -> Result<(), StoreError> {
        self.project = Some(forest.clone());
        Ok(())
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>, StoreError> {
        Ok(self.snapshots.clone())
    }

    fn save_snapshot(&mut self, name: &str, forest: &Forest) -> Result<Snapshot, StoreError> {
        let snapshot = new_snapshot(name, forest);
        self.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    fn delete_snapshot(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.id != id);
        if self.snapshots.len() == before {
            return Err(StoreError::UnknownSnapshot(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::tests::sample;
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn exercise(store: &mut dyn ProjectStore) {
        assert!(store.load().unwrap().is_none());
        assert_eq!(load_or_sample(store, today()).roots().len(), 3);

        let forest = sample();
        store.save(&forest).unwrap();
        assert_eq!(store.load().unwrap(), Some(forest.clone()));

        let first = store.save_snapshot("Baseline", &forest).unwrap();
        let second = store.save_snapshot("  ", &forest).unwrap();
        assert_eq!(second.name, "Untitled snapshot");
        let listed = store.list_snapshots().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].data, forest);

        store.delete_snapshot(&first.id).unwrap();
        assert_eq!(store.list_snapshots().unwrap(), vec![second]);
        assert!(matches!(
            store.delete_snapshot(&first.id),
            Err(StoreError::UnknownSnapshot(_))
        ));
    }

    #[test]
    fn memory_store_contract() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn file_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&mut FileStore::new(dir.path().join("data")));
    }

    #[test]
    fn unreadable_project_falls_back_to_sample() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(dir.path().join("project.json"), "garbage").unwrap();
        assert!(store.load().is_err());
        let forest = load_or_sample(&store, today());
        assert_eq!(forest.task_count(), 7);
    }
}
