use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use egui::Color32;
use serde::{Deserialize, Serialize};

/// Identifier shared by tasks, time ranges and milestones.
pub type EntityId = String;

/// Generate a fresh, globally unique entity ID.
pub fn new_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}

pub const DEFAULT_TASK_COLOR: Color32 = Color32::from_rgb(70, 130, 180); // Steel blue
pub const DEFAULT_MILESTONE_COLOR: Color32 = Color32::from_rgb(255, 165, 0); // Orange

/// One independently draggable date span of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub id: EntityId,
    #[serde(with = "date_serde")]
    pub start_date: NaiveDate,
    #[serde(with = "date_serde")]
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Overrides the owning task's color when set.
    #[serde(default, with = "color_serde::option", skip_serializing_if = "Option::is_none")]
    pub color: Option<Color32>,
    #[serde(default)]
    pub dependencies: Vec<EntityId>,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id: new_id(),
            start_date: start,
            end_date: end.max(start),
            label: None,
            color: None,
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneShape {
    #[default]
    Diamond,
    Circle,
    Square,
    Triangle,
    Star,
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelPosition {
    Top,
    Bottom,
    Left,
    Right,
    #[default]
    Auto,
}

/// A single-date marker owned by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: EntityId,
    #[serde(with = "date_serde")]
    pub date: NaiveDate,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_milestone_color", with = "color_serde")]
    pub color: Color32,
    #[serde(default)]
    pub shape: MilestoneShape,
    #[serde(default)]
    pub label_position: LabelPosition,
    #[serde(default)]
    pub dependencies: Vec<EntityId>,
}

impl Milestone {
    pub fn new(label: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: new_id(),
            date,
            label: label.into(),
            color: DEFAULT_MILESTONE_COLOR,
            shape: MilestoneShape::Diamond,
            label_position: LabelPosition::Auto,
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DividerStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Horizontal separator drawn below a task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Divider {
    pub enabled: bool,
    #[serde(with = "color_serde")]
    pub color: Color32,
    pub style: DividerStyle,
    pub thickness: f32,
}

impl Default for Divider {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Color32::from_rgb(100, 105, 120),
            style: DividerStyle::Solid,
            thickness: 1.0,
        }
    }
}

/// A node of the project tree.
///
/// Children are reference counted so that a forest snapshot can share every
/// subtree an edit did not touch; mutate through `Arc::make_mut`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: EntityId,
    pub name: String,
    #[serde(with = "date_serde")]
    pub start_date: NaiveDate,
    #[serde(with = "date_serde")]
    pub end_date: NaiveDate,
    #[serde(default = "default_task_color", with = "color_serde")]
    pub color: Color32,
    #[serde(default = "default_true")]
    pub expanded: bool,
    #[serde(default)]
    pub children: Vec<Arc<Task>>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    /// Empty for legacy single-span tasks, whose span is `start_date..=end_date`.
    #[serde(default)]
    pub time_ranges: Vec<TimeRange>,
    #[serde(default)]
    pub dependencies: Vec<EntityId>,
    #[serde(default)]
    pub divider: Divider,
    #[serde(default)]
    pub description: String,
}

impl Task {
    /// Create a new task with sensible defaults.
    pub fn new(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            start_date: start,
            end_date: end.max(start),
            color: DEFAULT_TASK_COLOR,
            expanded: true,
            children: Vec::new(),
            milestones: Vec::new(),
            time_ranges: Vec::new(),
            dependencies: Vec::new(),
            divider: Divider::default(),
            description: String::new(),
        }
    }

    /// A task spanning `span_days` days (inclusive) from `start`.
    pub fn with_span(name: impl Into<String>, start: NaiveDate, span_days: i64) -> Self {
        let end = start + Duration::days((span_days - 1).max(0));
        Self::new(name, start, end)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// True when the task's span is carried by explicit time ranges.
    pub fn uses_ranges(&self) -> bool {
        !self.time_ranges.is_empty()
    }

    /// Pull `start_date`/`end_date` in line with the time ranges, if any.
    pub fn sync_span(&mut self) {
        let start = self.time_ranges.iter().map(|r| r.start_date).min();
        let end = self.time_ranges.iter().map(|r| r.end_date).max();
        if let (Some(start), Some(end)) = (start, end) {
            self.start_date = start;
            self.end_date = end;
        }
    }

    /// Every span drawn for this task as `(range id, start, end)`.
    /// Legacy tasks yield a single span with no range id.
    pub fn spans(&self) -> Vec<(Option<&str>, NaiveDate, NaiveDate)> {
        if self.time_ranges.is_empty() {
            vec![(None, self.start_date, self.end_date)]
        } else {
            self.time_ranges
                .iter()
                .map(|r| (Some(r.id.as_str()), r.start_date, r.end_date))
                .collect()
        }
    }

    /// True if `id` names a task somewhere below this one.
    pub fn has_descendant(&self, id: &str) -> bool {
        self.children
            .iter()
            .any(|c| c.id == id || c.has_descendant(id))
    }

    /// Number of tasks in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }

    /// IDs of every task, range and milestone owned by this subtree.
    pub fn owned_ids(&self) -> Vec<EntityId> {
        let mut ids = Vec::new();
        self.collect_owned_ids(&mut ids);
        ids
    }

    fn collect_owned_ids(&self, ids: &mut Vec<EntityId>) {
        ids.push(self.id.clone());
        ids.extend(self.time_ranges.iter().map(|r| r.id.clone()));
        ids.extend(self.milestones.iter().map(|m| m.id.clone()));
        for child in &self.children {
            child.collect_owned_ids(ids);
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_task_color() -> Color32 {
    DEFAULT_TASK_COLOR
}

fn default_milestone_color() -> Color32 {
    DEFAULT_MILESTONE_COLOR
}

/// Dates are written as `YYYY-MM-DD`. Reading also accepts full timestamps
/// (`2024-03-01T00:00:00.000Z`) as found in older exports.
pub(crate) mod date_serde {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", raw)))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        let day = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// Serde helper for `Color32` as a `#rrggbb` / `#rrggbbaa` hex string.
pub(crate) mod color_serde {
    use egui::Color32;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(color: &Color32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_hex(*color))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Color32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_hex(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid color '{}'", raw)))
    }

    pub fn to_hex(color: Color32) -> String {
        if color.a() == 255 {
            format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                color.r(),
                color.g(),
                color.b(),
                color.a()
            )
        }
    }

    pub fn parse_hex(raw: &str) -> Option<Color32> {
        let hex = raw.trim().trim_start_matches('#');
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Color32::from_rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Color32::from_rgba_unmultiplied(
                byte(0)?,
                byte(2)?,
                byte(4)?,
                byte(6)?,
            )),
            _ => None,
        }
    }

    pub mod option {
        use egui::Color32;
        use serde::{self, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(color: &Option<Color32>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match color {
                Some(c) => serializer.serialize_some(&super::to_hex(*c)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Color32>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw {
                Some(raw) => super::parse_hex(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid color '{}'", raw))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn sync_span_covers_all_ranges() {
        let mut task = Task::new("Build", d(2026, 1, 1), d(2026, 1, 2));
        task.time_ranges = vec![
            TimeRange::new(d(2026, 2, 10), d(2026, 2, 20)),
            TimeRange::new(d(2026, 1, 5), d(2026, 1, 8)),
        ];
        task.sync_span();
        assert_eq!(task.start_date, d(2026, 1, 5));
        assert_eq!(task.end_date, d(2026, 2, 20));
    }

    #[test]
    fn sync_span_leaves_legacy_tasks_alone() {
        let mut task = Task::new("Legacy", d(2026, 3, 1), d(2026, 3, 9));
        task.sync_span();
        assert_eq!((task.start_date, task.end_date), (d(2026, 3, 1), d(2026, 3, 9)));
        assert_eq!(task.spans(), vec![(None, d(2026, 3, 1), d(2026, 3, 9))]);
    }

    #[test]
    fn with_span_is_inclusive() {
        let task = Task::with_span("Thirty", d(2026, 1, 1), 30);
        assert_eq!(task.end_date, d(2026, 1, 30));
    }

    #[test]
    fn task_json_uses_camel_case_and_hex_colors() {
        let mut task = Task::new("Design", d(2026, 4, 1), d(2026, 4, 3));
        task.color = Color32::from_rgb(0x3b, 0x82, 0xf6);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["startDate"], "2026-04-01");
        assert_eq!(json["color"], "#3b82f6");
        assert!(json["timeRanges"].as_array().unwrap().is_empty());
    }

    #[test]
    fn dates_accept_timestamps() {
        let json = r#"{"id":"a","name":"A","startDate":"2024-03-01T00:00:00.000Z","endDate":"2024-03-05"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.start_date, d(2024, 3, 1));
        assert!(task.expanded);
        assert!(!task.divider.enabled);
    }

    #[test]
    fn owned_ids_include_ranges_and_milestones() {
        let mut child = Task::new("Child", d(2026, 1, 1), d(2026, 1, 2));
        child.milestones.push(Milestone::new("M", d(2026, 1, 2)));
        let mut parent = Task::new("Parent", d(2026, 1, 1), d(2026, 1, 2));
        parent.time_ranges.push(TimeRange::new(d(2026, 1, 1), d(2026, 1, 2)));
        parent.children.push(Arc::new(child));
        assert_eq!(parent.owned_ids().len(), 4);
        assert_eq!(parent.subtree_len(), 2);
    }
}
