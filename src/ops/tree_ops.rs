//! Structural edits of the task forest.
//!
//! Every operation takes the current forest and returns the next one. An
//! unknown ID or an illegal move returns the input unchanged (sharing all of
//! its nodes, so `Forest::same_nodes` reports "no edit").

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use egui::Color32;
use tracing::debug;

use crate::model::task::{new_id, Divider, LabelPosition, MilestoneShape};
use crate::model::{EntityId, Forest, Milestone, Task, TimeRange, TreeError};

use super::deps::purge_references_in_place;

/// Fields to shallow-merge onto a task. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub color: Option<Color32>,
    pub expanded: Option<bool>,
    pub milestones: Option<Vec<Milestone>>,
    pub time_ranges: Option<Vec<TimeRange>>,
    pub dependencies: Option<Vec<EntityId>>,
    pub divider: Option<Divider>,
    pub description: Option<String>,
}

impl TaskPatch {
    pub fn dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn expanded(expanded: bool) -> Self {
        Self {
            expanded: Some(expanded),
            ..Default::default()
        }
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name = name.clone();
        }
        if let Some(start) = self.start_date {
            task.start_date = start;
        }
        if let Some(end) = self.end_date {
            task.end_date = end;
        }
        if let Some(color) = self.color {
            task.color = color;
        }
        if let Some(expanded) = self.expanded {
            task.expanded = expanded;
        }
        if let Some(milestones) = &self.milestones {
            task.milestones = milestones.clone();
        }
        if let Some(ranges) = &self.time_ranges {
            task.time_ranges = ranges.clone();
        }
        if let Some(deps) = &self.dependencies {
            task.dependencies = deps.clone();
        }
        if let Some(divider) = &self.divider {
            task.divider = divider.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        task.sync_span();
    }
}

/// Fields to merge onto a time range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangePatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub label: Option<String>,
    pub color: Option<Color32>,
}

impl RangePatch {
    pub fn dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }
}

/// Fields to merge onto a milestone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MilestonePatch {
    pub date: Option<NaiveDate>,
    pub label: Option<String>,
    pub color: Option<Color32>,
    pub shape: Option<MilestoneShape>,
    pub label_position: Option<LabelPosition>,
}

impl MilestonePatch {
    pub fn date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Append `task` under `parent_id` (forcing the parent open), or at the root
/// level when `parent_id` is `None`.
pub fn add_task(forest: &Forest, parent_id: Option<&str>, task: Task) -> Forest {
    let mut next = forest.clone();
    match parent_id {
        None => next.push_root(task),
        Some(parent_id) => {
            let Some(path) = forest.find_path(parent_id) else {
                debug!(parent_id, "add_task: parent not found");
                return forest.clone();
            };
            let Some(parent) = next.task_mut(&path) else {
                return forest.clone();
            };
            parent.children.push(Arc::new(task));
            parent.expanded = true;
        }
    }
    next
}

/// Shallow-merge `patch` onto the task with `task_id`, at any depth.
pub fn update_task(forest: &Forest, task_id: &str, patch: &TaskPatch) -> Forest {
    bulk_update(forest, std::slice::from_ref(&(task_id.to_string(), patch.clone())))
}

/// Apply several patches as one transform. Patches for unknown IDs, or that
/// would leave a task ending before it starts, are skipped.
pub fn bulk_update(forest: &Forest, updates: &[(EntityId, TaskPatch)]) -> Forest {
    let mut next = forest.clone();
    let mut changed = false;
    for (task_id, patch) in updates {
        let Some(path) = next.find_path(task_id) else {
            debug!(task_id = task_id.as_str(), "update: task not found");
            continue;
        };
        let Some(current) = next.task_at(&path) else {
            continue;
        };
        let mut merged = current.clone();
        patch.apply(&mut merged);
        if let Some(error) = patch_conflict(&next, &path, &merged) {
            debug!(task_id = task_id.as_str(), %error, "update: rejected patch");
            continue;
        }
        if merged == *current {
            continue;
        }
        if let Some(task) = next.task_mut(&path) {
            *task = merged;
            changed = true;
        }
    }
    if changed {
        next
    } else {
        forest.clone()
    }
}

/// The invariant `merged` would break if it replaced the task at `path`:
/// an inverted task or range span, or a range or milestone ID already used
/// elsewhere in the forest.
fn patch_conflict(forest: &Forest, path: &[usize], merged: &Task) -> Option<TreeError> {
    if merged.start_date > merged.end_date {
        return Some(TreeError::InvalidTaskSpan(merged.id.clone()));
    }
    if let Some(range) = merged.time_ranges.iter().find(|r| r.start_date > r.end_date) {
        return Some(TreeError::InvalidRangeSpan(range.id.clone()));
    }
    let mut taken: HashSet<&str> = HashSet::new();
    for node in forest.flatten() {
        let task = node.task;
        if node.path.as_slice() == path {
            taken.insert(&task.id);
            continue;
        }
        taken.insert(&task.id);
        taken.extend(task.time_ranges.iter().map(|r| r.id.as_str()));
        taken.extend(task.milestones.iter().map(|m| m.id.as_str()));
    }
    let patched = merged
        .time_ranges
        .iter()
        .map(|r| r.id.as_str())
        .chain(merged.milestones.iter().map(|m| m.id.as_str()));
    for id in patched {
        if !taken.insert(id) {
            return Some(TreeError::DuplicateId(id.to_string()));
        }
    }
    None
}

/// Remove a task and its whole subtree, then drop every dependency edge
/// that pointed at anything the subtree owned.
pub fn delete_task(forest: &Forest, task_id: &str) -> Forest {
    let Some(path) = forest.find_path(task_id) else {
        debug!(task_id, "delete: task not found");
        return forest.clone();
    };
    let mut next = forest.clone();
    let Some(removed) = next.remove_at(&path) else {
        return forest.clone();
    };
    let orphaned: HashSet<EntityId> = removed.owned_ids().into_iter().collect();
    purge_references_in_place(&mut next, &orphaned);
    next
}

/// Make the task the last child of its preceding sibling.
pub fn indent_task(forest: &Forest, task_id: &str) -> Forest {
    let Some(path) = forest.find_path(task_id) else {
        return forest.clone();
    };
    let Some((&index, parent)) = path.split_last() else {
        return forest.clone();
    };
    if index == 0 {
        debug!(task_id, "indent: no preceding sibling");
        return forest.clone();
    }
    let mut next = forest.clone();
    let Some(node) = next.remove_at(&path) else {
        return forest.clone();
    };
    let mut new_parent_path = parent.to_vec();
    new_parent_path.push(index - 1);
    let Some(new_parent) = next.task_mut(&new_parent_path) else {
        return forest.clone();
    };
    new_parent.children.push(node);
    new_parent.expanded = true;
    next
}

/// Move the task out of its parent, to just after that parent.
pub fn outdent_task(forest: &Forest, task_id: &str) -> Forest {
    let Some(path) = forest.find_path(task_id) else {
        return forest.clone();
    };
    if path.len() < 2 {
        debug!(task_id, "outdent: already top-level");
        return forest.clone();
    }
    let parent_index = path[path.len() - 2];
    let grandparent = &path[..path.len() - 2];
    let mut next = forest.clone();
    let Some(node) = next.remove_at(&path) else {
        return forest.clone();
    };
    next.insert_at(grandparent, parent_index + 1, node);
    next
}

/// Replace the forest with a caller-reordered one. Rejected if the new
/// forest does not hold exactly the same tasks or breaks an invariant.
pub fn reorder(forest: &Forest, reordered: Forest) -> Forest {
    let ids = |f: &Forest| -> Vec<String> {
        let mut ids: Vec<String> = f.flatten().iter().map(|n| n.task.id.clone()).collect();
        ids.sort();
        ids
    };
    if ids(forest) != ids(&reordered) || reordered.validate().is_err() {
        debug!("reorder: rejected forest with different task set");
        return forest.clone();
    }
    reordered
}

/// Drag-and-drop `active_id` onto `over_id`.
///
/// Positions come from the visible rows. Dragging downward inserts after
/// the target, upward inserts before it. A root dropped onto a nested row
/// lands next to that row's root instead. Dropping downward onto an
/// expanded parent nests the task as that parent's first child; a leaf
/// never receives children this way.
pub fn move_task(forest: &Forest, active_id: &str, over_id: &str) -> Forest {
    if active_id == over_id {
        return forest.clone();
    }
    let Some(active) = forest.find_task(active_id) else {
        return forest.clone();
    };
    if active.has_descendant(over_id) {
        debug!(active_id, over_id, "move: target is inside the dragged subtree");
        return forest.clone();
    }

    let visible = forest.flatten_visible();
    let position = |id: &str| visible.iter().position(|n| n.task.id == id);
    let (Some(active_index), Some(over_index)) = (position(active_id), position(over_id)) else {
        debug!(active_id, over_id, "move: row not visible");
        return forest.clone();
    };

    let moving_down = active_index < over_index;
    let over = visible[over_index].task;
    let over_is_open_parent = over.expanded && over.has_children();

    let mut target_id = over_id;
    if visible[active_index].level == 0 && visible[over_index].level > 0 {
        if let Some(root) = visible[..over_index].iter().rev().find(|n| n.level == 0) {
            target_id = root.task.id.as_str();
        }
    }
    let remapped = target_id != over_id;

    let mut next = forest.clone();
    let Some(active_path) = next.find_path(active_id) else {
        return forest.clone();
    };
    let Some(node) = next.remove_at(&active_path) else {
        return forest.clone();
    };
    let Some(target_path) = next.find_path(target_id) else {
        return forest.clone();
    };

    if moving_down && over_is_open_parent && !remapped {
        next.insert_at(&target_path, 0, node);
    } else {
        let Some((&index, parent)) = target_path.split_last() else {
            return forest.clone();
        };
        let at = if moving_down { index + 1 } else { index };
        next.insert_at(parent, at, node);
    }
    next
}

pub fn toggle_expanded(forest: &Forest, task_id: &str) -> Forest {
    match forest.find_task(task_id) {
        Some(task) => update_task(forest, task_id, &TaskPatch::expanded(!task.expanded)),
        None => forest.clone(),
    }
}

/// Expand or collapse every task that has children, as one transform.
pub fn set_all_expanded(forest: &Forest, expanded: bool) -> Forest {
    let updates: Vec<(EntityId, TaskPatch)> = forest
        .flatten()
        .iter()
        .filter(|n| n.task.has_children() && n.task.expanded != expanded)
        .map(|n| (n.task.id.clone(), TaskPatch::expanded(expanded)))
        .collect();
    bulk_update(forest, &updates)
}

/// Deep copy with fresh IDs everywhere, dates shifted by `shift_days`, and
/// no dependency edges (the copy cannot know what its links should be).
pub fn clone_with_fresh_ids(task: &Task, shift_days: i64) -> Task {
    let shift = Duration::days(shift_days);
    let mut copy = task.clone();
    copy.id = new_id();
    copy.start_date += shift;
    copy.end_date += shift;
    copy.dependencies.clear();
    for range in &mut copy.time_ranges {
        range.id = new_id();
        range.start_date += shift;
        range.end_date += shift;
        range.dependencies.clear();
    }
    for milestone in &mut copy.milestones {
        milestone.id = new_id();
        milestone.date += shift;
        milestone.dependencies.clear();
    }
    copy.children = task
        .children
        .iter()
        .map(|c| Arc::new(clone_with_fresh_ids(c, shift_days)))
        .collect();
    copy
}

/// Copy a subtree so that it starts on `start`, inserted right after the
/// original. Returns the new forest and the copy's ID.
pub fn duplicate_task(forest: &Forest, task_id: &str, start: NaiveDate) -> (Forest, Option<EntityId>) {
    let Some(path) = forest.find_path(task_id) else {
        return (forest.clone(), None);
    };
    let Some(original) = forest.task_at(&path) else {
        return (forest.clone(), None);
    };
    let copy = clone_with_fresh_ids(original, (start - original.start_date).num_days());
    let copy_id = copy.id.clone();
    let Some((&index, parent)) = path.split_last() else {
        return (forest.clone(), None);
    };
    let mut next = forest.clone();
    next.insert_at(parent, index + 1, Arc::new(copy));
    (next, Some(copy_id))
}

// ---------------------------------------------------------------------------
// Time ranges and milestones
// ---------------------------------------------------------------------------

fn owner_path(forest: &Forest, entity_id: &str) -> Option<Vec<usize>> {
    forest.index().locate(entity_id).map(|e| e.owner_path.clone())
}

/// Add a time range to a task. A legacy single-span task first has its span
/// turned into a range so the new range does not swallow it.
pub fn add_time_range(forest: &Forest, task_id: &str, range: TimeRange) -> Forest {
    if range.start_date > range.end_date {
        return forest.clone();
    }
    let Some(path) = forest.find_path(task_id) else {
        return forest.clone();
    };
    let mut next = forest.clone();
    let Some(task) = next.task_mut(&path) else {
        return forest.clone();
    };
    if task.time_ranges.is_empty() {
        task.time_ranges
            .push(TimeRange::new(task.start_date, task.end_date));
    }
    task.time_ranges.push(range);
    task.sync_span();
    next
}

pub fn update_time_range(forest: &Forest, range_id: &str, patch: &RangePatch) -> Forest {
    let Some(path) = owner_path(forest, range_id) else {
        return forest.clone();
    };
    let Some(current) = forest
        .task_at(&path)
        .and_then(|t| t.time_ranges.iter().find(|r| r.id == range_id))
    else {
        return forest.clone();
    };
    let mut merged = current.clone();
    if let Some(start) = patch.start_date {
        merged.start_date = start;
    }
    if let Some(end) = patch.end_date {
        merged.end_date = end;
    }
    if let Some(label) = &patch.label {
        merged.label = (!label.trim().is_empty()).then(|| label.clone());
    }
    if let Some(color) = patch.color {
        merged.color = Some(color);
    }
    if merged.start_date > merged.end_date || merged == *current {
        return forest.clone();
    }
    let mut next = forest.clone();
    let Some(task) = next.task_mut(&path) else {
        return forest.clone();
    };
    if let Some(slot) = task.time_ranges.iter_mut().find(|r| r.id == range_id) {
        *slot = merged;
    }
    task.sync_span();
    next
}

/// Remove a time range. The task keeps the span of whatever ranges remain;
/// removing the last one leaves a legacy single-span task.
pub fn delete_time_range(forest: &Forest, range_id: &str) -> Forest {
    let Some(path) = owner_path(forest, range_id) else {
        return forest.clone();
    };
    let mut next = forest.clone();
    let Some(task) = next.task_mut(&path) else {
        return forest.clone();
    };
    let before = task.time_ranges.len();
    task.time_ranges.retain(|r| r.id != range_id);
    if task.time_ranges.len() == before {
        return forest.clone();
    }
    task.sync_span();
    let orphaned: HashSet<EntityId> = [range_id.to_string()].into_iter().collect();
    purge_references_in_place(&mut next, &orphaned);
    next
}

pub fn add_milestone(forest: &Forest, task_id: &str, milestone: Milestone) -> Forest {
    let Some(path) = forest.find_path(task_id) else {
        return forest.clone();
    };
    let mut next = forest.clone();
    match next.task_mut(&path) {
        Some(task) => {
            task.milestones.push(milestone);
            next
        }
        None => forest.clone(),
    }
}

pub fn update_milestone(forest: &Forest, milestone_id: &str, patch: &MilestonePatch) -> Forest {
    let Some(path) = owner_path(forest, milestone_id) else {
        return forest.clone();
    };
    let Some(current) = forest
        .task_at(&path)
        .and_then(|t| t.milestones.iter().find(|m| m.id == milestone_id))
    else {
        return forest.clone();
    };
    let mut merged = current.clone();
    if let Some(date) = patch.date {
        merged.date = date;
    }
    if let Some(label) = &patch.label {
        merged.label = label.clone();
    }
    if let Some(color) = patch.color {
        merged.color = color;
    }
    if let Some(shape) = patch.shape {
        merged.shape = shape;
    }
    if let Some(position) = patch.label_position {
        merged.label_position = position;
    }
    if merged == *current {
        return forest.clone();
    }
    let mut next = forest.clone();
    if let Some(slot) = next
        .task_mut(&path)
        .and_then(|t| t.milestones.iter_mut().find(|m| m.id == milestone_id))
    {
        *slot = merged;
    }
    next
}

pub fn delete_milestone(forest: &Forest, milestone_id: &str) -> Forest {
    let Some(path) = owner_path(forest, milestone_id) else {
        return forest.clone();
    };
    let mut next = forest.clone();
    let Some(task) = next.task_mut(&path) else {
        return forest.clone();
    };
    let before = task.milestones.len();
    task.milestones.retain(|m| m.id != milestone_id);
    if task.milestones.len() == before {
        return forest.clone();
    }
    let orphaned: HashSet<EntityId> = [milestone_id.to_string()].into_iter().collect();
    purge_references_in_place(&mut next, &orphaned);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::tests::{d, ids, node, sample, task};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn order(forest: &Forest) -> Vec<(String, usize)> {
        ids(forest)
    }

    fn rows(expected: &[(&str, usize)]) -> Vec<(String, usize)> {
        expected.iter().map(|(id, l)| (id.to_string(), *l)).collect()
    }

    #[test]
    fn add_task_at_root_and_under_parent() {
        let forest = sample();
        let next = add_task(&forest, None, task("z"));
        assert_eq!(next.roots().last().unwrap().id, "z");

        let mut collapsed = forest.clone();
        let path = collapsed.find_path("c").unwrap();
        collapsed.task_mut(&path).unwrap().expanded = false;
        let next = add_task(&collapsed, Some("c"), task("c2"));
        let c = next.find_task("c").unwrap();
        assert!(c.expanded);
        assert_eq!(c.children.last().unwrap().id, "c2");
    }

    #[test]
    fn add_task_under_unknown_parent_is_a_no_op() {
        let forest = sample();
        let next = add_task(&forest, Some("missing"), task("z"));
        assert!(next.same_nodes(&forest));
    }

    #[test]
    fn update_reaches_any_depth_and_skips_unknown_ids() {
        let forest = sample();
        let next = update_task(&forest, "a21", &TaskPatch::name("Deep"));
        assert_eq!(next.find_task("a21").unwrap().name, "Deep");
        assert!(update_task(&forest, "zzz", &TaskPatch::name("x")).same_nodes(&forest));
    }

    #[test]
    fn update_rejects_inverted_span() {
        let forest = sample();
        let patch = TaskPatch {
            start_date: Some(d(2026, 5, 1)),
            ..Default::default()
        };
        assert!(update_task(&forest, "b", &patch).same_nodes(&forest));
    }

    #[test]
    fn update_rejects_inverted_range_and_taken_ids() {
        let forest = sample();
        let ranges = TaskPatch {
            time_ranges: Some(vec![
                TimeRange::new(d(2026, 1, 1), d(2026, 1, 10)),
                TimeRange::new(d(2026, 3, 1), d(2026, 1, 1)),
            ]),
            ..Default::default()
        };
        assert!(update_task(&forest, "b", &ranges).same_nodes(&forest));

        let mut clash = Milestone::new("Clash", d(2026, 1, 5));
        clash.id = "a1".into();
        let milestones = TaskPatch {
            milestones: Some(vec![clash]),
            ..Default::default()
        };
        assert!(update_task(&forest, "b", &milestones).same_nodes(&forest));

        let mut twice = Milestone::new("Twice", d(2026, 1, 5));
        twice.id = "m-twice".into();
        let doubled = TaskPatch {
            milestones: Some(vec![twice.clone(), twice]),
            ..Default::default()
        };
        assert!(update_task(&forest, "b", &doubled).same_nodes(&forest));

        let fine = TaskPatch {
            milestones: Some(vec![Milestone::new("Fine", d(2026, 1, 5))]),
            ..Default::default()
        };
        let next = update_task(&forest, "b", &fine);
        assert_eq!(next.find_task("b").unwrap().milestones.len(), 1);
        assert_eq!(next.validate(), Ok(()));
    }

    #[test]
    fn bulk_update_is_one_transform() {
        let forest = sample();
        let next = bulk_update(
            &forest,
            &[
                ("a1".into(), TaskPatch::name("One")),
                ("c1".into(), TaskPatch::name("Two")),
                ("nope".into(), TaskPatch::name("Three")),
            ],
        );
        assert_eq!(next.find_task("a1").unwrap().name, "One");
        assert_eq!(next.find_task("c1").unwrap().name, "Two");
        assert!(Arc::ptr_eq(&forest.roots()[1], &next.roots()[1]));
    }

    #[test]
    fn delete_removes_the_whole_subtree_only() {
        let mut forest = sample();
        let path = forest.find_path("a21").unwrap();
        let deep = forest.task_mut(&path).unwrap();
        deep.milestones.push(Milestone::new("m", d(2026, 1, 2)));
        deep.time_ranges.push(TimeRange::new(d(2026, 1, 1), d(2026, 1, 3)));
        deep.sync_span();

        let next = delete_task(&forest, "a");
        assert_eq!(order(&next), rows(&[("b", 0), ("c", 0), ("c1", 1)]));
        assert!(next.index().len() == 3);
        assert!(Arc::ptr_eq(&forest.roots()[1], &next.roots()[0]));
    }

    #[test]
    fn indent_nests_under_previous_sibling() {
        let forest = sample();
        let next = indent_task(&forest, "b");
        assert_eq!(
            order(&next),
            rows(&[("a", 0), ("a1", 1), ("a2", 1), ("a21", 2), ("b", 1), ("c", 0), ("c1", 1)])
        );
        assert!(indent_task(&forest, "a").same_nodes(&forest));
        assert!(indent_task(&forest, "a1").same_nodes(&forest));
    }

    #[test]
    fn outdent_places_task_after_former_parent() {
        let forest = sample();
        let next = outdent_task(&forest, "a1");
        assert_eq!(
            order(&next),
            rows(&[("a", 0), ("a2", 1), ("a21", 2), ("a1", 0), ("b", 0), ("c", 0), ("c1", 1)])
        );
        assert!(outdent_task(&forest, "b").same_nodes(&forest));
    }

    #[test]
    fn outdent_undoes_indent_except_expanded_flag() {
        // with the new parent already open the round trip is exact
        let forest = sample();
        assert_eq!(outdent_task(&indent_task(&forest, "b"), "b"), forest);

        // a collapsed new parent stays expanded afterwards
        let mut collapsed = sample();
        let path = collapsed.find_path("a").unwrap();
        collapsed.task_mut(&path).unwrap().expanded = false;
        let round_trip = outdent_task(&indent_task(&collapsed, "b"), "b");
        assert_eq!(order(&round_trip), order(&collapsed));
        assert!(round_trip.find_task("a").unwrap().expanded);
        assert_ne!(round_trip, collapsed);
    }

    #[test]
    fn reorder_accepts_permutations_only() {
        let forest = sample();
        let mut roots = forest.roots().to_vec();
        roots.reverse();
        let reversed = reorder(&forest, Forest::from_shared(roots));
        assert_eq!(reversed.roots()[0].id, "c");

        let foreign = Forest::new(vec![task("x")]);
        assert!(reorder(&forest, foreign).same_nodes(&forest));
    }

    #[test]
    fn move_same_level_down_and_up() {
        let forest = Forest::new(vec![task("x"), task("y"), task("z")]);
        let down = move_task(&forest, "x", "y");
        assert_eq!(order(&down), rows(&[("y", 0), ("x", 0), ("z", 0)]));
        let up = move_task(&forest, "z", "x");
        assert_eq!(order(&up), rows(&[("z", 0), ("x", 0), ("y", 0)]));

        let forest = sample();
        let up = move_task(&forest, "c", "b");
        assert_eq!(
            order(&up),
            rows(&[("a", 0), ("a1", 1), ("a2", 1), ("a21", 2), ("c", 0), ("c1", 1), ("b", 0)])
        );
    }

    #[test]
    fn move_down_onto_open_parent_nests_as_first_child() {
        let forest = Forest::new(vec![task("x"), node("p", vec![task("p1")])]);
        let next = move_task(&forest, "x", "p");
        assert_eq!(order(&next), rows(&[("p", 0), ("x", 1), ("p1", 1)]));
    }

    #[test]
    fn move_down_onto_leaf_never_nests() {
        let forest = Forest::new(vec![task("x"), task("leaf"), task("y")]);
        let next = move_task(&forest, "x", "leaf");
        assert_eq!(order(&next), rows(&[("leaf", 0), ("x", 0), ("y", 0)]));
    }

    #[test]
    fn move_down_onto_collapsed_parent_lands_after_it() {
        let mut forest = Forest::new(vec![task("x"), node("p", vec![task("p1")])]);
        let path = forest.find_path("p").unwrap();
        forest.task_mut(&path).unwrap().expanded = false;
        let next = move_task(&forest, "x", "p");
        assert_eq!(order(&next), rows(&[("p", 0), ("p1", 1), ("x", 0)]));
    }

    #[test]
    fn root_dropped_on_nested_row_goes_beside_its_root() {
        let forest = sample();
        // b dragged down onto c1 lands after c, not inside c
        let next = move_task(&forest, "b", "c1");
        assert_eq!(
            order(&next),
            rows(&[("a", 0), ("a1", 1), ("a2", 1), ("a21", 2), ("c", 0), ("c1", 1), ("b", 0)])
        );
        // c dragged up onto a21 lands before a
        let next = move_task(&forest, "c", "a21");
        assert_eq!(
            order(&next),
            rows(&[("c", 0), ("c1", 1), ("a", 0), ("a1", 1), ("a2", 1), ("a21", 2), ("b", 0)])
        );
    }

    #[test]
    fn nested_task_moves_between_parents() {
        let forest = sample();
        // c1 dragged up onto a1 is inserted before a1
        let next = move_task(&forest, "c1", "a1");
        assert_eq!(
            order(&next),
            rows(&[("a", 0), ("c1", 1), ("a1", 1), ("a2", 1), ("a21", 2), ("b", 0), ("c", 0)])
        );
        // a1 dragged down onto b (a root) becomes a root after b
        let next = move_task(&forest, "a1", "b");
        assert_eq!(
            order(&next),
            rows(&[("a", 0), ("a2", 1), ("a21", 2), ("b", 0), ("a1", 0), ("c", 0), ("c1", 1)])
        );
    }

    #[test]
    fn move_rejects_self_and_descendants() {
        let forest = sample();
        assert!(move_task(&forest, "a", "a").same_nodes(&forest));
        assert!(move_task(&forest, "a", "a21").same_nodes(&forest));
        assert!(move_task(&forest, "missing", "b").same_nodes(&forest));
    }

    #[test]
    fn duplicate_shifts_dates_and_renews_ids() {
        let mut forest = sample();
        let path = forest.find_path("a2").unwrap();
        forest.task_mut(&path).unwrap().dependencies.push("a1".into());
        let (next, copy_id) = duplicate_task(&forest, "a2", d(2026, 1, 11));
        let copy_id = copy_id.unwrap();
        let copy = next.find_task(&copy_id).unwrap();
        assert_eq!(copy.start_date, d(2026, 1, 11));
        assert_eq!(copy.end_date, d(2026, 1, 20));
        assert!(copy.dependencies.is_empty());
        assert_ne!(copy.children[0].id, "a21");
        assert_eq!(next.parent_of(&copy_id).unwrap().id, "a");
        assert_eq!(next.validate(), Ok(()));
    }

    #[test]
    fn ranges_keep_task_span_in_sync() {
        let forest = Forest::new(vec![task("t")]);
        let mut extra = TimeRange::new(d(2026, 2, 1), d(2026, 2, 5));
        extra.id = "r2".into();
        let next = add_time_range(&forest, "t", extra);
        let t = next.find_task("t").unwrap();
        assert_eq!(t.time_ranges.len(), 2);
        assert_eq!((t.start_date, t.end_date), (d(2026, 1, 1), d(2026, 2, 5)));

        let moved = update_time_range(&next, "r2", &RangePatch::dates(d(2026, 3, 1), d(2026, 3, 4)));
        assert_eq!(moved.find_task("t").unwrap().end_date, d(2026, 3, 4));
        assert_eq!(moved.validate(), Ok(()));

        let inverted = update_time_range(&next, "r2", &RangePatch::dates(d(2026, 3, 9), d(2026, 3, 4)));
        assert!(inverted.same_nodes(&next));

        let trimmed = delete_time_range(&moved, "r2");
        let t = trimmed.find_task("t").unwrap();
        assert_eq!(t.time_ranges.len(), 1);
        assert_eq!(t.end_date, d(2026, 1, 10));
    }

    #[test]
    fn milestone_edits() {
        let forest = Forest::new(vec![task("t"), task("u")]);
        let mut m = Milestone::new("Ship", d(2026, 1, 5));
        m.id = "m".into();
        let next = add_milestone(&forest, "t", m);
        let next = update_milestone(&next, "m", &MilestonePatch::date(d(2026, 1, 9)));
        assert_eq!(next.find_task("t").unwrap().milestones[0].date, d(2026, 1, 9));

        let linked = update_task(
            &next,
            "u",
            &TaskPatch {
                dependencies: Some(vec!["m".into()]),
                ..Default::default()
            },
        );
        let removed = delete_milestone(&linked, "m");
        assert!(removed.find_task("t").unwrap().milestones.is_empty());
        assert!(removed.find_task("u").unwrap().dependencies.is_empty());
    }

    #[test]
    fn set_all_expanded_touches_only_parents() {
        let forest = sample();
        let collapsed = set_all_expanded(&forest, false);
        assert!(!collapsed.find_task("a").unwrap().expanded);
        assert!(!collapsed.find_task("a2").unwrap().expanded);
        assert!(collapsed.find_task("b").unwrap().expanded);
        assert_eq!(collapsed.flatten_visible().len(), 3);
        let toggled = toggle_expanded(&collapsed, "a");
        assert!(toggled.find_task("a").unwrap().expanded);
    }

    fn all_ids(forest: &Forest) -> Vec<String> {
        forest.flatten().iter().map(|n| n.task.id.clone()).collect()
    }

    proptest! {
        #[test]
        fn prop_move_into_own_subtree_is_rejected(a in 0usize..7, b in 0usize..7) {
            let forest = sample();
            let ids = all_ids(&forest);
            let (active, over) = (&ids[a], &ids[b]);
            let next = move_task(&forest, active, over);
            if forest.find_task(active).unwrap().has_descendant(over) || active == over {
                prop_assert!(next.same_nodes(&forest));
            } else {
                prop_assert_eq!(next.validate(), Ok(()));
                prop_assert_eq!(next.task_count(), forest.task_count());
            }
        }
    }
}
