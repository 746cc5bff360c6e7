//! User settings, persisted as `settings.json` in the OS config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::history::HISTORY_LIMIT;
use crate::model::snap::{SnapConfig, SnapMode};
use crate::model::TimelineScale;

/// Chart display options. Also written into exported files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewSettings {
    pub scale: TimelineScale,
    pub pixels_per_day: f32,
    pub show_dependencies: bool,
    pub show_today: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            scale: TimelineScale::Weeks,
            pixels_per_day: 18.0,
            show_dependencies: true,
            show_today: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub snap_mode: SnapMode,
    /// Visible days from which adaptive snapping switches to months.
    pub adaptive_month_threshold_days: i64,
    pub history_limit: usize,
    /// Length of a newly added task.
    pub default_task_days: i64,
    pub view: ViewSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snap_mode: SnapMode::Adaptive,
            adaptive_month_threshold_days: SnapConfig::DEFAULT_MONTH_THRESHOLD_DAYS,
            history_limit: HISTORY_LIMIT,
            default_task_days: 30,
            view: ViewSettings::default(),
        }
    }
}

impl Settings {
    pub fn snap_config(&self) -> SnapConfig {
        SnapConfig::new(self.snap_mode, self.adaptive_month_threshold_days.max(1))
    }

    /// Directory holding `settings.json`; the working directory if the OS
    /// gives us none.
    pub fn config_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "GanttPlanner")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("settings.json")
    }

    /// Read settings from `path`. Missing or unreadable files give defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring malformed settings");
                Self::default()
            }),
            Err(_) => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Self::default()
            }
        }
    }

    /// Write settings to `path`. Failures are logged and otherwise ignored.
    pub fn save(&self, path: &Path) {
        let json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "could not serialize settings");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(path, json) {
            warn!(path = %path.display(), error = %e, "could not save settings");
        }
    }
}
