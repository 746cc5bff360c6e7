//! The project forest: ordered root tasks, traversal and invariant checks.
//!
//! Every edit produces a new `Forest`. Cloning a forest only bumps the root
//! reference counts; `task_mut` copies the nodes on the path it walks and
//! leaves all other subtrees shared with earlier snapshots.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::entity::{EntityIndex, EntityRef};
use super::task::Task;

/// Child indices from the root list down to a task.
pub type TreePath = Vec<usize>;

/// An invariant that a forest failed to uphold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("task {0} starts after it ends")]
    InvalidTaskSpan(String),
    #[error("time range {0} starts after it ends")]
    InvalidRangeSpan(String),
    #[error("task {0} span does not match its time ranges")]
    UnsyncedSpan(String),
}

/// One row of a flattened forest.
#[derive(Debug, Clone)]
pub struct FlatNode<'a> {
    pub task: &'a Task,
    pub level: usize,
    /// True if every ancestor is expanded.
    pub visible: bool,
    pub path: TreePath,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forest(Vec<Arc<Task>>);

impl Forest {
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn new(roots: Vec<Task>) -> Self {
        Self(roots.into_iter().map(Arc::new).collect())
    }

    pub fn from_shared(roots: Vec<Arc<Task>>) -> Self {
        Self(roots)
    }

    pub fn roots(&self) -> &[Arc<Task>] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of tasks at every depth.
    pub fn task_count(&self) -> usize {
        self.0.iter().map(|t| t.subtree_len()).sum()
    }

    /// True if both forests hold the very same root nodes, i.e. no edit
    /// happened between them.
    pub fn same_nodes(&self, other: &Forest) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }

    // ── Traversal ───────────────────────────────────────────────

    /// Depth-first, parent-before-children flatten of every task,
    /// ignoring `expanded`. Each row records whether it is visible.
    pub fn flatten(&self) -> Vec<FlatNode<'_>> {
        let mut out = Vec::with_capacity(self.task_count());
        let mut path = Vec::new();
        flatten_into(&self.0, 0, true, &mut path, &mut out);
        out
    }

    /// Only the rows whose ancestors are all expanded.
    pub fn flatten_visible(&self) -> Vec<FlatNode<'_>> {
        self.flatten().into_iter().filter(|n| n.visible).collect()
    }

    /// Rebuild nesting from `(task, level)` rows in flatten order. Children
    /// of each row are taken from the rows, not from the task itself.
    pub fn from_levels(rows: &[(Task, usize)]) -> Forest {
        fn build(rows: &[(Task, usize)], pos: &mut usize, level: usize) -> Vec<Arc<Task>> {
            let mut out: Vec<Arc<Task>> = Vec::new();
            while *pos < rows.len() && rows[*pos].1 >= level {
                if rows[*pos].1 > level {
                    // Malformed jump in depth; treat as a child of the last node.
                    let nested = build(rows, pos, rows[*pos].1);
                    if let Some(last) = out.last_mut() {
                        Arc::make_mut(last).children.extend(nested);
                    } else {
                        out.extend(nested);
                    }
                    continue;
                }
                let mut task = rows[*pos].0.clone();
                *pos += 1;
                task.children = build(rows, pos, level + 1);
                out.push(Arc::new(task));
            }
            out
        }
        let mut pos = 0;
        Forest(build(rows, &mut pos, 0))
    }

    /// Path to the task with `id`, at any depth.
    pub fn find_path(&self, id: &str) -> Option<TreePath> {
        fn search(tasks: &[Arc<Task>], id: &str, path: &mut TreePath) -> bool {
            for (i, task) in tasks.iter().enumerate() {
                path.push(i);
                if task.id == id || search(&task.children, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        let mut path = Vec::new();
        search(&self.0, id, &mut path).then_some(path)
    }

    pub fn task_at(&self, path: &[usize]) -> Option<&Task> {
        let (first, rest) = path.split_first()?;
        let mut node: &Task = self.0.get(*first)?;
        for &i in rest {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.find_path(id).and_then(|p| self.task_at(&p))
    }

    /// The parent of the task with `id`, or `None` for roots and unknown IDs.
    pub fn parent_of(&self, id: &str) -> Option<&Task> {
        let path = self.find_path(id)?;
        let parent = path.split_last().map(|(_, p)| p)?;
        if parent.is_empty() {
            None
        } else {
            self.task_at(parent)
        }
    }

    /// Look up a task, time range or milestone by ID.
    pub fn find_entity(&self, id: &str) -> Option<EntityRef<'_>> {
        if let Some(task) = self.find_task(id) {
            return Some(EntityRef::Task(task));
        }
        self.flatten().into_iter().find_map(|node| {
            let owner = node.task;
            if let Some((index, range)) = owner.time_ranges.iter().enumerate().find(|(_, r)| r.id == id)
            {
                return Some(EntityRef::TimeRange { owner, index, range });
            }
            owner
                .milestones
                .iter()
                .find(|m| m.id == id)
                .map(|milestone| EntityRef::Milestone { owner, milestone })
        })
    }

    /// Build an ID index over every entity in the forest.
    pub fn index(&self) -> EntityIndex<'_> {
        EntityIndex::build(self)
    }

    // ── Path-copying mutation ───────────────────────────────────

    /// Mutable access to the task at `path`, copying every shared node on
    /// the way down.
    pub fn task_mut(&mut self, path: &[usize]) -> Option<&mut Task> {
        let (first, rest) = path.split_first()?;
        let mut node = Arc::make_mut(self.0.get_mut(*first)?);
        for &i in rest {
            node = Arc::make_mut(node.children.get_mut(i)?);
        }
        Some(node)
    }

    /// The child list that `parent` owns; the root list for an empty path.
    pub fn siblings_mut(&mut self, parent: &[usize]) -> Option<&mut Vec<Arc<Task>>> {
        if parent.is_empty() {
            Some(&mut self.0)
        } else {
            self.task_mut(parent).map(|t| &mut t.children)
        }
    }

    /// Detach the subtree at `path`.
    pub fn remove_at(&mut self, path: &[usize]) -> Option<Arc<Task>> {
        let (&index, parent) = path.split_last()?;
        let siblings = self.siblings_mut(parent)?;
        (index < siblings.len()).then(|| siblings.remove(index))
    }

    /// Insert `node` into `parent`'s child list at `index` (clamped).
    pub fn insert_at(&mut self, parent: &[usize], index: usize, node: Arc<Task>) -> bool {
        match self.siblings_mut(parent) {
            Some(siblings) => {
                let index = index.min(siblings.len());
                siblings.insert(index, node);
                true
            }
            None => false,
        }
    }

    pub fn push_root(&mut self, task: Task) {
        self.0.push(Arc::new(task));
    }

    pub fn extend_roots(&mut self, roots: impl IntoIterator<Item = Arc<Task>>) {
        self.0.extend(roots);
    }

    // ── Invariants ──────────────────────────────────────────────

    /// Check every structural invariant. Acyclicity follows from ownership;
    /// a node reachable twice shows up as a duplicate ID.
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for node in self.flatten() {
            let task = node.task;
            if !seen.insert(&task.id) {
                return Err(TreeError::DuplicateId(task.id.clone()));
            }
            if task.start_date > task.end_date {
                return Err(TreeError::InvalidTaskSpan(task.id.clone()));
            }
            for range in &task.time_ranges {
                if !seen.insert(&range.id) {
                    return Err(TreeError::DuplicateId(range.id.clone()));
                }
                if range.start_date > range.end_date {
                    return Err(TreeError::InvalidRangeSpan(range.id.clone()));
                }
            }
            if task.uses_ranges() {
                let mut synced = task.clone();
                synced.sync_span();
                if synced.start_date != task.start_date || synced.end_date != task.end_date {
                    return Err(TreeError::UnsyncedSpan(task.id.clone()));
                }
            }
            for milestone in &task.milestones {
                if !seen.insert(&milestone.id) {
                    return Err(TreeError::DuplicateId(milestone.id.clone()));
                }
            }
        }
        Ok(())
    }
}

fn flatten_into<'a>(
    tasks: &'a [Arc<Task>],
    level: usize,
    visible: bool,
    path: &mut TreePath,
    out: &mut Vec<FlatNode<'a>>,
) {
    for (i, task) in tasks.iter().enumerate() {
        path.push(i);
        out.push(FlatNode {
            task,
            level,
            visible,
            path: path.clone(),
        });
        flatten_into(&task.children, level + 1, visible && task.expanded, path, out);
        path.pop();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::task::{Milestone, TimeRange};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    pub fn task(id: &str) -> Task {
        let mut t = Task::new(id.to_uppercase(), d(2026, 1, 1), d(2026, 1, 10));
        t.id = id.to_string();
        t
    }

    pub fn node(id: &str, children: Vec<Task>) -> Task {
        let mut t = task(id);
        t.children = children.into_iter().map(Arc::new).collect();
        t
    }

    /// a(a1, a2(a21)), b, c(c1)
    pub fn sample() -> Forest {
        Forest::new(vec![
            node("a", vec![task("a1"), node("a2", vec![task("a21")])]),
            task("b"),
            node("c", vec![task("c1")]),
        ])
    }

    pub fn ids(forest: &Forest) -> Vec<(String, usize)> {
        forest
            .flatten()
            .into_iter()
            .map(|n| (n.task.id.clone(), n.level))
            .collect()
    }

    #[test]
    fn flatten_is_depth_first_with_levels() {
        let forest = sample();
        let got: Vec<(String, usize)> = ids(&forest);
        let expected: Vec<(String, usize)> = [
            ("a", 0),
            ("a1", 1),
            ("a2", 1),
            ("a21", 2),
            ("b", 0),
            ("c", 0),
            ("c1", 1),
        ]
        .iter()
        .map(|(id, l)| (id.to_string(), *l))
        .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn flatten_visible_hides_collapsed_subtrees() {
        let mut forest = sample();
        let path = forest.find_path("a2").unwrap();
        forest.task_mut(&path).unwrap().expanded = false;
        let visible: Vec<&str> = forest
            .flatten_visible()
            .iter()
            .map(|n| n.task.id.as_str())
            .collect();
        assert_eq!(visible, vec!["a", "a1", "a2", "b", "c", "c1"]);
        // the structural flatten still lists the hidden child
        assert_eq!(forest.flatten().len(), 7);
    }

    #[test]
    fn find_entity_searches_ranges_and_milestones() {
        let mut forest = sample();
        let path = forest.find_path("a21").unwrap();
        let target = forest.task_mut(&path).unwrap();
        let mut range = TimeRange::new(d(2026, 1, 1), d(2026, 1, 3));
        range.id = "r1".into();
        let mut milestone = Milestone::new("Ship", d(2026, 1, 4));
        milestone.id = "m1".into();
        target.time_ranges.push(range);
        target.milestones.push(milestone);

        assert!(matches!(forest.find_entity("r1"), Some(EntityRef::TimeRange { owner, .. }) if owner.id == "a21"));
        assert!(matches!(forest.find_entity("m1"), Some(EntityRef::Milestone { .. })));
        assert!(matches!(forest.find_entity("c1"), Some(EntityRef::Task(_))));
        assert!(forest.find_entity("nope").is_none());
    }

    #[test]
    fn task_mut_copies_only_the_path() {
        let before = sample();
        let mut after = before.clone();
        let path = after.find_path("a21").unwrap();
        after.task_mut(&path).unwrap().name = "renamed".into();

        assert!(!Arc::ptr_eq(&before.roots()[0], &after.roots()[0]));
        assert!(Arc::ptr_eq(&before.roots()[1], &after.roots()[1]));
        assert!(Arc::ptr_eq(&before.roots()[2], &after.roots()[2]));
        assert!(Arc::ptr_eq(
            &before.roots()[0].children[0],
            &after.roots()[0].children[0]
        ));
        assert_eq!(before.find_task("a21").unwrap().name, "A21");
    }

    #[test]
    fn parent_of_reports_direct_parent() {
        let forest = sample();
        assert_eq!(forest.parent_of("a21").unwrap().id, "a2");
        assert!(forest.parent_of("b").is_none());
    }

    #[test]
    fn validate_catches_duplicates_and_bad_spans() {
        assert_eq!(sample().validate(), Ok(()));

        let dup = Forest::new(vec![task("x"), node("y", vec![task("x")])]);
        assert_eq!(dup.validate(), Err(TreeError::DuplicateId("x".into())));

        let mut bad = task("z");
        bad.start_date = d(2026, 2, 1);
        bad.end_date = d(2026, 1, 1);
        assert_eq!(
            Forest::new(vec![bad]).validate(),
            Err(TreeError::InvalidTaskSpan("z".into()))
        );

        let mut unsynced = task("u");
        unsynced.time_ranges.push(TimeRange::new(d(2026, 5, 1), d(2026, 5, 2)));
        assert_eq!(
            Forest::new(vec![unsynced]).validate(),
            Err(TreeError::UnsyncedSpan("u".into()))
        );
    }

    fn arb_levels() -> impl Strategy<Value = Vec<usize>> {
        // Each row may go at most one level deeper than the previous row.
        prop::collection::vec(0usize..4, 1..30).prop_map(|raw| {
            let mut levels = Vec::with_capacity(raw.len());
            let mut prev: Option<usize> = None;
            for r in raw {
                let level = match prev {
                    None => 0,
                    Some(p) => r.min(p + 1),
                };
                levels.push(level);
                prev = Some(level);
            }
            levels
        })
    }

    proptest! {
        #[test]
        fn prop_flatten_round_trips(levels in arb_levels()) {
            let rows: Vec<(Task, usize)> = levels
                .iter()
                .enumerate()
                .map(|(i, l)| (task(&format!("t{}", i)), *l))
                .collect();
            let forest = Forest::from_levels(&rows);
            let flat: Vec<(Task, usize)> = forest
                .flatten()
                .into_iter()
                .map(|n| {
                    let mut t = n.task.clone();
                    t.children.clear();
                    (t, n.level)
                })
                .collect();
            prop_assert_eq!(&flat, &rows);
            prop_assert_eq!(Forest::from_levels(&flat), forest);
        }
    }
}
