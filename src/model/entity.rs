//! Tasks, time ranges and milestones share one ID space for dependency
//! links. `EntityRef` gives them a uniform view.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::task::{Milestone, Task, TimeRange};
use super::tree::{Forest, TreePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    TimeRange,
    Milestone,
}

/// A borrowed task, time range or milestone.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Task(&'a Task),
    TimeRange {
        owner: &'a Task,
        index: usize,
        range: &'a TimeRange,
    },
    Milestone {
        owner: &'a Task,
        milestone: &'a Milestone,
    },
}

impl<'a> EntityRef<'a> {
    pub fn id(&self) -> &'a str {
        match *self {
            EntityRef::Task(t) => &t.id,
            EntityRef::TimeRange { range, .. } => &range.id,
            EntityRef::Milestone { milestone, .. } => &milestone.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Task(_) => EntityKind::Task,
            EntityRef::TimeRange { .. } => EntityKind::TimeRange,
            EntityRef::Milestone { .. } => EntityKind::Milestone,
        }
    }

    pub fn dependencies(&self) -> &'a [String] {
        match *self {
            EntityRef::Task(t) => &t.dependencies,
            EntityRef::TimeRange { range, .. } => &range.dependencies,
            EntityRef::Milestone { milestone, .. } => &milestone.dependencies,
        }
    }

    /// The task that owns this entity (itself for tasks).
    pub fn owner(&self) -> &'a Task {
        match *self {
            EntityRef::Task(t) => t,
            EntityRef::TimeRange { owner, .. } | EntityRef::Milestone { owner, .. } => owner,
        }
    }

    /// Name shown in dependency lists. Unlabelled ranges read
    /// "<Task> (Period N)", unlabelled milestones read "Milestone".
    pub fn display_name(&self) -> String {
        match self {
            EntityRef::Task(t) => t.name.clone(),
            EntityRef::TimeRange {
                owner,
                index,
                range,
            } => match range.label.as_deref() {
                Some(label) if !label.trim().is_empty() => label.to_string(),
                _ => format!("{} (Period {})", owner.name, index + 1),
            },
            EntityRef::Milestone { milestone, .. } => {
                if milestone.label.trim().is_empty() {
                    "Milestone".to_string()
                } else {
                    milestone.label.clone()
                }
            }
        }
    }

    /// Date span on the timeline; a milestone is a single day.
    pub fn span(&self) -> (NaiveDate, NaiveDate) {
        match self {
            EntityRef::Task(t) => (t.start_date, t.end_date),
            EntityRef::TimeRange { range, .. } => (range.start_date, range.end_date),
            EntityRef::Milestone { milestone, .. } => (milestone.date, milestone.date),
        }
    }
}

/// Where an entity lives: the owning task's path plus the entity itself.
#[derive(Debug, Clone)]
pub struct IndexedEntity<'a> {
    pub entity: EntityRef<'a>,
    pub owner_path: TreePath,
}

/// ID → entity lookup over a whole forest, rebuilt per snapshot.
#[derive(Debug, Default)]
pub struct EntityIndex<'a> {
    entries: HashMap<&'a str, IndexedEntity<'a>>,
    order: Vec<&'a str>,
}

impl<'a> EntityIndex<'a> {
    pub fn build(forest: &'a Forest) -> Self {
        let mut index = EntityIndex::default();
        for node in forest.flatten() {
            let owner = node.task;
            index.insert(EntityRef::Task(owner), &node.path);
            for (i, range) in owner.time_ranges.iter().enumerate() {
                index.insert(
                    EntityRef::TimeRange {
                        owner,
                        index: i,
                        range,
                    },
                    &node.path,
                );
            }
            for milestone in &owner.milestones {
                index.insert(EntityRef::Milestone { owner, milestone }, &node.path);
            }
        }
        index
    }

    fn insert(&mut self, entity: EntityRef<'a>, path: &[usize]) {
        let id = entity.id();
        // First occurrence wins; duplicates are reported by `Forest::validate`.
        if !self.entries.contains_key(id) {
            self.order.push(id);
            self.entries.insert(
                id,
                IndexedEntity {
                    entity,
                    owner_path: path.to_vec(),
                },
            );
        }
    }

    pub fn get(&self, id: &str) -> Option<EntityRef<'a>> {
        self.entries.get(id).map(|e| e.entity)
    }

    pub fn locate(&self, id: &str) -> Option<&IndexedEntity<'a>> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entities in forest order: each task, then its ranges, then its milestones.
    pub fn iter(&self) -> impl Iterator<Item = EntityRef<'a>> + '_ {
        self.order.iter().filter_map(|id| self.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::tests::{d, node, task};

    #[test]
    fn display_names_fall_back_to_synthetic_labels() {
        let mut owner = task("t");
        owner.name = "Backend".into();
        owner.time_ranges.push(TimeRange::new(d(2026, 1, 1), d(2026, 1, 2)));
        owner.time_ranges.push(TimeRange::new(d(2026, 1, 5), d(2026, 1, 6)));
        owner.time_ranges[0].label = Some("Sprint".into());
        owner.milestones.push(Milestone::new("", d(2026, 1, 9)));

        let first = EntityRef::TimeRange {
            owner: &owner,
            index: 0,
            range: &owner.time_ranges[0],
        };
        let second = EntityRef::TimeRange {
            owner: &owner,
            index: 1,
            range: &owner.time_ranges[1],
        };
        let milestone = EntityRef::Milestone {
            owner: &owner,
            milestone: &owner.milestones[0],
        };
        assert_eq!(first.display_name(), "Sprint");
        assert_eq!(second.display_name(), "Backend (Period 2)");
        assert_eq!(milestone.display_name(), "Milestone");
    }

    #[test]
    fn index_covers_every_entity_kind() {
        let mut leaf = task("leaf");
        let mut range = TimeRange::new(d(2026, 1, 1), d(2026, 1, 2));
        range.id = "r".into();
        leaf.time_ranges.push(range);
        let mut milestone = Milestone::new("M", d(2026, 1, 2));
        milestone.id = "m".into();
        leaf.milestones.push(milestone);
        let forest = Forest::new(vec![node("root", vec![leaf])]);

        let index = forest.index();
        assert_eq!(index.len(), 4);
        assert_eq!(index.get("r").unwrap().kind(), EntityKind::TimeRange);
        assert_eq!(index.get("m").unwrap().owner().id, "leaf");
        assert_eq!(index.locate("m").unwrap().owner_path, vec![0, 0]);
        let order: Vec<&str> = index.iter().map(|e| e.id()).collect();
        assert_eq!(order, vec!["root", "leaf", "r", "m"]);
    }
}
