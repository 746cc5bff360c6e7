//! The project exchange format: `{ meta: { version, exportedAt, viewSettings }, data: [Task] }`.
//! A bare array of tasks is accepted on import for older files.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::ViewSettings;
use crate::model::{Forest, TreeError, TreePath};
use crate::ops::tree_ops::clone_with_fresh_ids;

use super::migrate::migrate_tasks;

pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a list of tasks or a {{ meta, data }} object")]
    UnknownShape,
    #[error("invalid project: {0}")]
    Invalid(#[from] TreeError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV is missing required columns (found: {0}); need task name, start date and end date")]
    MissingColumns(String),
    #[error("no valid rows found ({0} skipped)")]
    NoRows(usize),
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    pub version: u32,
    pub exported_at: String,
    #[serde(default)]
    pub view_settings: ViewSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub meta: ExportMeta,
    pub data: Forest,
}

impl Envelope {
    pub fn new(forest: &Forest, view_settings: &ViewSettings) -> Self {
        Self {
            meta: ExportMeta {
                version: FORMAT_VERSION,
                exported_at: chrono::Utc::now().to_rfc3339(),
                view_settings: view_settings.clone(),
            },
            data: forest.clone(),
        }
    }
}

/// A decoded, migrated and validated import.
#[derive(Debug, Clone)]
pub struct Imported {
    pub forest: Forest,
    /// Present only for envelope input.
    pub view_settings: Option<ViewSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// The imported forest becomes the project.
    #[default]
    Replace,
    /// Imported roots are appended with fresh IDs and no dependencies.
    Merge,
}

pub fn export_json(forest: &Forest, view_settings: &ViewSettings) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Envelope::new(forest, view_settings))
}

pub fn parse_import(text: &str) -> Result<Imported, ImportError> {
    parse_value(serde_json::from_str(text)?)
}

pub fn parse_value(value: Value) -> Result<Imported, ImportError> {
    let (data, view_settings) = match value {
        Value::Array(_) => (value, None),
        Value::Object(mut map) => {
            let data = map.remove("data").ok_or(ImportError::UnknownShape)?;
            let view_settings = map
                .get("meta")
                .and_then(|m| m.get("viewSettings"))
                .and_then(|v| serde_json::from_value(v.clone()).ok());
            (data, view_settings)
        }
        _ => return Err(ImportError::UnknownShape),
    };
    let mut forest: Forest = serde_json::from_value(migrate_tasks(data)?)?;
    sync_spans(&mut forest);
    forest.validate()?;
    info!(tasks = forest.task_count(), "parsed project data");
    Ok(Imported {
        forest,
        view_settings,
    })
}

/// Combine `incoming` with `current` according to `mode`.
pub fn apply_import(current: &Forest, incoming: &Forest, mode: ImportMode) -> Forest {
    match mode {
        ImportMode::Replace => incoming.clone(),
        ImportMode::Merge => {
            let mut merged = current.clone();
            merged.extend_roots(
                incoming
                    .roots()
                    .iter()
                    .map(|root| Arc::new(clone_with_fresh_ids(root, 0))),
            );
            merged
        }
    }
}

fn sync_spans(forest: &mut Forest) {
    let paths: Vec<TreePath> = forest
        .flatten()
        .into_iter()
        .filter(|n| n.task.uses_ranges())
        .map(|n| n.path)
        .collect();
    for path in paths {
        if let Some(task) = forest.task_mut(&path) {
            task.sync_span();
        }
    }
}
