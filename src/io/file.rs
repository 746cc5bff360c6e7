use std::path::Path;

use tracing::info;

use crate::config::ViewSettings;
use crate::model::Forest;

use super::envelope::{export_json, parse_import, Imported};
use super::store::StoreError;

/// Save a project to a JSON file in the exchange format.
pub fn save_project(forest: &Forest, view_settings: &ViewSettings, path: &Path) -> Result<(), StoreError> {
    let json = export_json(forest, view_settings)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;
    info!(path = %path.display(), tasks = forest.task_count(), "saved project");
    Ok(())
}

/// Load a project file, accepting both the envelope and legacy task arrays.
pub fn load_project(path: &Path) -> Result<Imported, StoreError> {
    let json = std::fs::read_to_string(path)?;
    let imported = parse_import(&json)?;
    info!(path = %path.display(), tasks = imported.forest.task_count(), "loaded project");
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample::sample_forest;
    use chrono::NaiveDate;

    #[test]
    fn save_and_load_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans").join("project.json");
        let forest = sample_forest(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        save_project(&forest, &ViewSettings::default(), &path).unwrap();
        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.forest, forest);
    }

    #[test]
    fn missing_and_corrupt_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_project(&dir.path().join("none.json")), Err(StoreError::Io(_))));
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[{]").unwrap();
        assert!(matches!(load_project(&bad), Err(StoreError::Import(_))));
    }
}
