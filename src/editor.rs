//! The application controller: owns the undo history and routes every
//! edit through it.

use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::config::Settings;
use crate::drag::{DragKind, DragSignal};
use crate::io::envelope::{apply_import, ImportMode};
use crate::model::history::HISTORY_LIMIT;
use crate::model::task::new_id;
use crate::model::{EntityId, EntityRef, Forest, Milestone, Task, TimeRange, UndoHistory};
use crate::ops::deps::{self, DependencyError, LinkedEntity};
use crate::ops::tree_ops::{self, MilestonePatch, RangePatch, TaskPatch};

static EMPTY: Forest = Forest::empty();

pub struct ProjectEditor {
    history: UndoHistory<Forest>,
    selected: Option<EntityId>,
    default_task_days: i64,
    status: String,
}

impl ProjectEditor {
    pub fn new(forest: Forest) -> Self {
        Self {
            history: UndoHistory::with_initial(forest, HISTORY_LIMIT),
            selected: None,
            default_task_days: 30,
            status: "Ready".to_string(),
        }
    }

    pub fn with_settings(forest: Forest, settings: &Settings) -> Self {
        Self {
            history: UndoHistory::with_initial(forest, settings.history_limit),
            default_task_days: settings.default_task_days.max(1),
            ..Self::new(Forest::empty())
        }
    }

    pub fn forest(&self) -> &Forest {
        self.history.current().unwrap_or(&EMPTY)
    }

    pub fn history(&self) -> &UndoHistory<Forest> {
        &self.history
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, id: Option<EntityId>) {
        self.selected = id;
    }

    /// Last user-facing message.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    /// Make `next` the current project as one undo step. Returns false, and
    /// records nothing, if `next` shares every root with the current forest.
    pub fn commit(&mut self, next: Forest, action: &str) -> bool {
        if next.same_nodes(self.forest()) {
            debug!(action, "no-op edit, history unchanged");
            return false;
        }
        self.history.push(next);
        info!(action, entries = self.history.len(), "committed edit");
        self.status = action.to_string();
        true
    }

    /// Replace the whole project and start a fresh history (opening a file).
    pub fn replace_project(&mut self, forest: Forest) {
        self.history.reset(forest);
        self.selected = None;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        if self.history.undo().is_none() {
            return false;
        }
        self.drop_stale_selection();
        self.status = "Undo".to_string();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.history.redo().is_none() {
            return false;
        }
        self.drop_stale_selection();
        self.status = "Redo".to_string();
        true
    }

    fn drop_stale_selection(&mut self) {
        if let Some(id) = &self.selected {
            if self.forest().find_entity(id).is_none() {
                self.selected = None;
            }
        }
    }

    // ── Tasks ───────────────────────────────────────────────────

    /// Add a task of the default length starting on `today`, under
    /// `parent_id` or at the root level. Returns the new task's ID.
    pub fn add_task(&mut self, parent_id: Option<&str>, name: &str, today: NaiveDate) -> Option<EntityId> {
        let name = if name.trim().is_empty() { "New Task" } else { name };
        self.add_task_with(parent_id, Task::with_span(name, today, self.default_task_days))
    }

    /// Add a fully built task and select it.
    pub fn add_task_with(&mut self, parent_id: Option<&str>, task: Task) -> Option<EntityId> {
        let id = task.id.clone();
        let next = tree_ops::add_task(self.forest(), parent_id, task);
        self.commit(next, "Task added").then(|| {
            self.selected = Some(id.clone());
            id
        })
    }

    pub fn update_task(&mut self, task_id: &str, patch: &TaskPatch) -> bool {
        let next = tree_ops::update_task(self.forest(), task_id, patch);
        self.commit(next, "Task updated")
    }

    pub fn bulk_update(&mut self, updates: &[(EntityId, TaskPatch)]) -> bool {
        let next = tree_ops::bulk_update(self.forest(), updates);
        self.commit(next, "Tasks updated")
    }

    /// Delete a task and its subtree. Clears the selection if it was inside.
    pub fn delete_task(&mut self, task_id: &str) -> bool {
        let owned = self
            .forest()
            .find_task(task_id)
            .map(Task::owned_ids)
            .unwrap_or_default();
        let next = tree_ops::delete_task(self.forest(), task_id);
        if !self.commit(next, "Task deleted") {
            return false;
        }
        if self.selected.as_ref().is_some_and(|s| owned.contains(s)) {
            self.selected = None;
        }
        true
    }

    pub fn indent(&mut self, task_id: &str) -> bool {
        let next = tree_ops::indent_task(self.forest(), task_id);
        self.commit(next, "Task indented")
    }

    pub fn outdent(&mut self, task_id: &str) -> bool {
        let next = tree_ops::outdent_task(self.forest(), task_id);
        self.commit(next, "Task outdented")
    }

    pub fn reorder(&mut self, reordered: Forest) -> bool {
        let next = tree_ops::reorder(self.forest(), reordered);
        self.commit(next, "Tasks reordered")
    }

    pub fn move_task(&mut self, active_id: &str, over_id: &str) -> bool {
        let next = tree_ops::move_task(self.forest(), active_id, over_id);
        self.commit(next, "Task moved")
    }

    pub fn toggle_expanded(&mut self, task_id: &str) -> bool {
        let next = tree_ops::toggle_expanded(self.forest(), task_id);
        self.commit(next, "Toggled task")
    }

    pub fn set_all_expanded(&mut self, expanded: bool) -> bool {
        let next = tree_ops::set_all_expanded(self.forest(), expanded);
        let action = if expanded { "Expanded all" } else { "Collapsed all" };
        self.commit(next, action)
    }

    /// Copy a subtree so that it starts on `start`; returns the copy's ID.
    pub fn duplicate_task(&mut self, task_id: &str, start: NaiveDate) -> Option<EntityId> {
        let (next, copy_id) = tree_ops::duplicate_task(self.forest(), task_id, start);
        if self.commit(next, "Task duplicated") {
            copy_id
        } else {
            None
        }
    }

    // ── Ranges and milestones ───────────────────────────────────

    pub fn add_time_range(&mut self, task_id: &str, range: TimeRange) -> bool {
        let next = tree_ops::add_time_range(self.forest(), task_id, range);
        self.commit(next, "Time range added")
    }

    pub fn update_time_range(&mut self, range_id: &str, patch: &RangePatch) -> bool {
        let next = tree_ops::update_time_range(self.forest(), range_id, patch);
        self.commit(next, "Time range updated")
    }

    pub fn delete_time_range(&mut self, range_id: &str) -> bool {
        let next = tree_ops::delete_time_range(self.forest(), range_id);
        self.commit(next, "Time range deleted")
    }

    pub fn add_milestone(&mut self, task_id: &str, milestone: Milestone) -> bool {
        let next = tree_ops::add_milestone(self.forest(), task_id, milestone);
        self.commit(next, "Milestone added")
    }

    pub fn update_milestone(&mut self, milestone_id: &str, patch: &MilestonePatch) -> bool {
        let next = tree_ops::update_milestone(self.forest(), milestone_id, patch);
        self.commit(next, "Milestone updated")
    }

    pub fn delete_milestone(&mut self, milestone_id: &str) -> bool {
        let next = tree_ops::delete_milestone(self.forest(), milestone_id);
        self.commit(next, "Milestone deleted")
    }

    // ── Dependencies ────────────────────────────────────────────

    /// Link `holder_id` to `predecessor_id`. A refused link leaves the
    /// project untouched and its reason in `status`.
    pub fn add_dependency(&mut self, holder_id: &str, predecessor_id: &str) -> Result<bool, DependencyError> {
        match deps::add_dependency(self.forest(), holder_id, predecessor_id) {
            Ok(next) => Ok(self.commit(next, "Dependency added")),
            Err(e) => {
                self.status = e.to_string();
                Err(e)
            }
        }
    }

    pub fn remove_dependency(&mut self, holder_id: &str, predecessor_id: &str) -> bool {
        let next = deps::remove_dependency(self.forest(), holder_id, predecessor_id);
        self.commit(next, "Dependency removed")
    }

    pub fn predecessors(&self, id: &str) -> Vec<LinkedEntity> {
        deps::predecessors(self.forest(), id)
    }

    pub fn successors(&self, id: &str) -> Vec<LinkedEntity> {
        deps::successors(self.forest(), id)
    }

    // ── Drag results and imports ────────────────────────────────

    /// Apply the outcome of a drag session as a single undo step.
    pub fn apply_drag(&mut self, signal: DragSignal) -> bool {
        match signal {
            DragSignal::Cancel => false,
            DragSignal::CommitBar {
                target,
                kind,
                start,
                end,
                row_delta,
                copy,
            } => {
                let forest = self.forest();
                if copy && kind == DragKind::Move {
                    let Some(task) = forest.find_task(&target.task_id) else {
                        return false;
                    };
                    let copy_start = task.start_date + (start - target.start);
                    return self.duplicate_task(&target.task_id, copy_start).is_some();
                }
                let mut next = match &target.range_id {
                    Some(range_id) => {
                        tree_ops::update_time_range(forest, range_id, &RangePatch::dates(start, end))
                    }
                    None => tree_ops::update_task(forest, &target.task_id, &TaskPatch::dates(start, end)),
                };
                if kind == DragKind::Move && row_delta != 0 {
                    if let Some(over_id) = row_target(&next, &target.task_id, row_delta) {
                        next = tree_ops::move_task(&next, &target.task_id, &over_id);
                    }
                }
                self.commit(next, "Timeline updated")
            }
            DragSignal::CommitMilestone { target, date, copy } => {
                if copy {
                    let Some(original) = self
                        .forest()
                        .find_entity(&target.milestone_id)
                        .and_then(|e| match e {
                            EntityRef::Milestone { milestone, .. } => Some(milestone.clone()),
                            _ => None,
                        })
                    else {
                        return false;
                    };
                    let mut copy = original;
                    copy.id = new_id();
                    copy.date = date;
                    copy.dependencies.clear();
                    return self.add_milestone(&target.task_id, copy);
                }
                self.update_milestone(&target.milestone_id, &MilestonePatch::date(date))
            }
        }
    }

    /// Bring imported data into the project as one undo step.
    pub fn import(&mut self, incoming: &Forest, mode: ImportMode) -> bool {
        let next = apply_import(self.forest(), incoming, mode);
        let action = match mode {
            ImportMode::Replace => "Project imported",
            ImportMode::Merge => "Project merged",
        };
        self.commit(next, action)
    }

    /// Overall date span of the project, if it has any tasks.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let rows = self.forest().flatten();
        let start = rows.iter().map(|n| n.task.start_date).min()?;
        let end = rows
            .iter()
            .map(|n| n.task.end_date)
            .chain(rows.iter().flat_map(|n| n.task.milestones.iter().map(|m| m.date)))
            .max()?;
        Some((start, end.max(start)))
    }

    /// Default span for a task added from a dialog: `today` plus the
    /// configured length.
    pub fn default_span(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today, today + Duration::days(self.default_task_days - 1))
    }
}

/// The visible row `row_delta` rows away from `task_id`, if that is a
/// different row.
fn row_target(forest: &Forest, task_id: &str, row_delta: i32) -> Option<EntityId> {
    let visible = forest.flatten_visible();
    let index = visible.iter().position(|n| n.task.id == task_id)?;
    let last = visible.len().checked_sub(1)?;
    let target = (index as i64 + row_delta as i64).clamp(0, last as i64) as usize;
    (target != index).then(|| visible[target].task.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::{BarTarget, MilestoneTarget};
    use crate::model::tree::tests::{d, ids, sample};
    use pretty_assertions::assert_eq;

    fn editor() -> ProjectEditor {
        ProjectEditor::new(sample())
    }

    #[test]
    fn no_op_edits_leave_history_alone() {
        let mut ed = editor();
        assert!(!ed.indent("a"));
        assert!(!ed.move_task("a", "a21"));
        assert!(!ed.update_task("ghost", &TaskPatch::name("x")));
        assert_eq!(ed.history().len(), 1);
        assert!(!ed.can_undo());
    }

    #[test]
    fn edits_undo_and_redo() {
        let mut ed = editor();
        let before = ed.forest().clone();
        assert!(ed.indent("b"));
        assert!(ed.can_undo());
        assert!(ed.undo());
        assert_eq!(ed.forest(), &before);
        assert!(ed.redo());
        assert_eq!(ed.forest().parent_of("b").unwrap().id, "a");
        assert!(!ed.redo());
    }

    #[test]
    fn delete_clears_selection_inside_subtree() {
        let mut ed = editor();
        ed.select(Some("a21".into()));
        assert!(ed.delete_task("a"));
        assert_eq!(ed.selected(), None);
        assert!(ed.undo());
        assert!(ed.forest().find_task("a21").is_some());
    }

    #[test]
    fn add_task_selects_new_task() {
        let mut ed = editor();
        let id = ed.add_task(Some("b"), "", d(2026, 3, 1)).unwrap();
        let task = ed.forest().find_task(&id).unwrap();
        assert_eq!(task.name, "New Task");
        assert_eq!(task.end_date, d(2026, 3, 30));
        assert_eq!(ed.selected(), Some(id.as_str()));
        assert_eq!(ed.forest().parent_of(&id).unwrap().id, "b");
    }

    #[test]
    fn refused_dependency_sets_status() {
        let mut ed = editor();
        assert_eq!(ed.add_dependency("b", "a"), Ok(true));
        assert_eq!(ed.add_dependency("a", "b"), Err(DependencyError::DirectCycle));
        assert_eq!(ed.status(), DependencyError::DirectCycle.to_string());
        assert_eq!(ed.history().len(), 2);
        assert_eq!(ed.predecessors("b")[0].id, "a");
        assert_eq!(ed.successors("a")[0].id, "b");
    }

    #[test]
    fn drag_with_row_delta_moves_in_one_step() {
        let mut ed = editor();
        let signal = DragSignal::CommitBar {
            target: BarTarget {
                task_id: "b".into(),
                range_id: None,
                start: d(2026, 1, 1),
                end: d(2026, 1, 10),
            },
            kind: DragKind::Move,
            start: d(2026, 1, 5),
            end: d(2026, 1, 14),
            row_delta: 1,
            copy: false,
        };
        assert!(ed.apply_drag(signal));
        assert_eq!(ed.history().len(), 2);
        let b = ed.forest().find_task("b").unwrap();
        assert_eq!(b.start_date, d(2026, 1, 5));
        // the row below b is the open parent c
        assert_eq!(ed.forest().parent_of("b").unwrap().id, "c");
        assert_eq!(ids(ed.forest())[5], ("b".to_string(), 1));
        assert!(ed.undo());
        assert_eq!(ed.forest(), &sample());
    }

    #[test]
    fn copy_drag_duplicates_instead_of_moving() {
        let mut ed = editor();
        let signal = DragSignal::CommitBar {
            target: BarTarget {
                task_id: "b".into(),
                range_id: None,
                start: d(2026, 1, 1),
                end: d(2026, 1, 10),
            },
            kind: DragKind::Move,
            start: d(2026, 2, 1),
            end: d(2026, 2, 10),
            row_delta: 0,
            copy: true,
        };
        assert!(ed.apply_drag(signal));
        assert_eq!(ed.forest().find_task("b").unwrap().start_date, d(2026, 1, 1));
        assert_eq!(ed.forest().roots()[2].start_date, d(2026, 2, 1));
        assert_eq!(ed.forest().roots().len(), 4);
    }

    #[test]
    fn milestone_drag_and_cancel() {
        let mut ed = editor();
        let mut m = Milestone::new("Ship", d(2026, 1, 5));
        m.id = "m".into();
        assert!(ed.add_milestone("c", m));
        let target = MilestoneTarget {
            task_id: "c".into(),
            milestone_id: "m".into(),
            date: d(2026, 1, 5),
        };
        assert!(!ed.apply_drag(DragSignal::Cancel));
        assert!(ed.apply_drag(DragSignal::CommitMilestone {
            target: target.clone(),
            date: d(2026, 1, 31),
            copy: false,
        }));
        assert_eq!(ed.forest().find_task("c").unwrap().milestones[0].date, d(2026, 1, 31));
        assert!(ed.apply_drag(DragSignal::CommitMilestone {
            target,
            date: d(2026, 2, 1),
            copy: true,
        }));
        assert_eq!(ed.forest().find_task("c").unwrap().milestones.len(), 2);
    }

    #[test]
    fn history_limit_comes_from_settings() {
        let settings = Settings {
            history_limit: 3,
            ..Settings::default()
        };
        let mut ed = ProjectEditor::with_settings(sample(), &settings);
        for i in 0..5 {
            ed.update_task("b", &TaskPatch::name(format!("B{i}")));
        }
        assert_eq!(ed.history().len(), 3);
    }
}
