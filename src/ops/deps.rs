//! Dependency links between tasks, time ranges and milestones.
//!
//! An edge is stored on its holder: `holder.dependencies` lists the IDs the
//! holder depends on (its predecessors).

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::model::{EntityId, EntityIndex, EntityKind, EntityRef, Forest, TreePath};

/// Why a new edge was refused. These reach the user as status messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    #[error("This dependency already exists")]
    Duplicate,
    #[error("Circular dependency: the predecessor already depends on this item")]
    DirectCycle,
    #[error("Dependency would create a cycle")]
    Cycle,
}

/// A resolved neighbour in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub owner_id: EntityId,
}

impl LinkedEntity {
    fn from_ref(entity: EntityRef<'_>) -> Self {
        Self {
            id: entity.id().to_string(),
            kind: entity.kind(),
            name: entity.display_name(),
            owner_id: entity.owner().id.clone(),
        }
    }
}

/// Make `holder_id` depend on `predecessor_id`.
///
/// Self links and unknown IDs are silent no-ops. Duplicate edges and edges
/// that would close a cycle are refused with an error for the user.
pub fn add_dependency(
    forest: &Forest,
    holder_id: &str,
    predecessor_id: &str,
) -> Result<Forest, DependencyError> {
    if holder_id == predecessor_id {
        return Ok(forest.clone());
    }
    let index = forest.index();
    let (Some(holder), Some(predecessor)) = (index.locate(holder_id), index.get(predecessor_id))
    else {
        debug!(holder_id, predecessor_id, "add_dependency: unknown entity");
        return Ok(forest.clone());
    };
    if holder.entity.dependencies().iter().any(|d| d == predecessor_id) {
        info!(holder_id, predecessor_id, "rejected duplicate dependency");
        return Err(DependencyError::Duplicate);
    }
    if predecessor.dependencies().iter().any(|d| d == holder_id) {
        info!(holder_id, predecessor_id, "rejected circular dependency");
        return Err(DependencyError::DirectCycle);
    }
    if would_create_cycle(&index, holder_id, predecessor_id) {
        info!(holder_id, predecessor_id, "rejected dependency cycle");
        return Err(DependencyError::Cycle);
    }

    let path = holder.owner_path.clone();
    let kind = holder.entity.kind();

    let mut next = forest.clone();
    if let Some(list) = dependencies_mut(&mut next, &path, kind, holder_id) {
        list.push(predecessor_id.to_string());
    }
    Ok(next)
}

/// Drop the edge `holder_id → predecessor_id`. The holder is looked up among
/// tasks first, then time ranges, then milestones.
pub fn remove_dependency(forest: &Forest, holder_id: &str, predecessor_id: &str) -> Forest {
    let found = find_holder(forest, holder_id);
    let Some((path, kind)) = found else {
        return forest.clone();
    };
    let has_edge = forest
        .index()
        .get(holder_id)
        .is_some_and(|e| e.dependencies().iter().any(|d| d == predecessor_id));
    if !has_edge {
        return forest.clone();
    }
    let mut next = forest.clone();
    if let Some(list) = dependencies_mut(&mut next, &path, kind, holder_id) {
        list.retain(|d| d != predecessor_id);
    }
    next
}

/// Entities that `id` depends on. Dangling IDs are skipped.
pub fn predecessors(forest: &Forest, id: &str) -> Vec<LinkedEntity> {
    let index = forest.index();
    let Some(entity) = index.get(id) else {
        return Vec::new();
    };
    entity
        .dependencies()
        .iter()
        .filter_map(|dep| index.get(dep))
        .map(LinkedEntity::from_ref)
        .collect()
}

/// Entities that depend on `id`, in forest order.
pub fn successors(forest: &Forest, id: &str) -> Vec<LinkedEntity> {
    forest
        .index()
        .iter()
        .filter(|e| e.dependencies().iter().any(|d| d == id))
        .map(LinkedEntity::from_ref)
        .collect()
}

/// Every `(holder, predecessor)` edge whose both ends resolve, in forest order.
pub fn edges(forest: &Forest) -> Vec<(EntityId, EntityId)> {
    edges_where(forest, true)
}

/// Edges pointing at IDs that no longer exist.
pub fn dangling(forest: &Forest) -> Vec<(EntityId, EntityId)> {
    edges_where(forest, false)
}

fn edges_where(forest: &Forest, resolved: bool) -> Vec<(EntityId, EntityId)> {
    let index = forest.index();
    let mut out = Vec::new();
    for entity in index.iter() {
        for dep in entity.dependencies() {
            if index.contains(dep) == resolved {
                out.push((entity.id().to_string(), dep.clone()));
            }
        }
    }
    out
}

/// Remove every reference to `removed` from all dependency lists.
pub fn purge_references(forest: &Forest, removed: &HashSet<EntityId>) -> Forest {
    let mut next = forest.clone();
    if purge_references_in_place(&mut next, removed) {
        next
    } else {
        forest.clone()
    }
}

/// In-place variant used by delete operations. Only tasks holding a stale
/// reference are copied. Returns true if anything changed.
pub(crate) fn purge_references_in_place(forest: &mut Forest, removed: &HashSet<EntityId>) -> bool {
    if removed.is_empty() {
        return false;
    }
    let stale = |deps: &[EntityId]| deps.iter().any(|d| removed.contains(d));
    let paths: Vec<TreePath> = forest
        .flatten()
        .into_iter()
        .filter(|n| {
            let t = n.task;
            stale(&t.dependencies)
                || t.time_ranges.iter().any(|r| stale(&r.dependencies))
                || t.milestones.iter().any(|m| stale(&m.dependencies))
        })
        .map(|n| n.path)
        .collect();

    for path in &paths {
        if let Some(task) = forest.task_mut(path) {
            task.dependencies.retain(|d| !removed.contains(d));
            for range in &mut task.time_ranges {
                range.dependencies.retain(|d| !removed.contains(d));
            }
            for milestone in &mut task.milestones {
                milestone.dependencies.retain(|d| !removed.contains(d));
            }
        }
    }
    if !paths.is_empty() {
        debug!(tasks = paths.len(), "purged stale dependency references");
    }
    !paths.is_empty()
}

/// Adding `holder → predecessor` closes a cycle if `holder` is already
/// reachable from `predecessor` by following dependencies.
pub fn would_create_cycle(index: &EntityIndex<'_>, holder_id: &str, predecessor_id: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![predecessor_id];
    while let Some(current) = stack.pop() {
        if current == holder_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(entity) = index.get(current) {
            stack.extend(entity.dependencies().iter().map(String::as_str));
        }
    }
    false
}

/// True if the dependency graph has no cycle.
pub fn is_acyclic(forest: &Forest) -> bool {
    let index = forest.index();
    let graph: HashMap<&str, &[EntityId]> = index.iter().map(|e| (e.id(), e.dependencies())).collect();

    fn visit<'a>(
        id: &'a str,
        graph: &HashMap<&'a str, &'a [EntityId]>,
        done: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
    ) -> bool {
        if on_stack.contains(id) {
            return false;
        }
        if !done.insert(id) {
            return true;
        }
        on_stack.insert(id);
        let ok = match graph.get(id).copied() {
            Some(deps) => deps.iter().all(|d| visit(d, graph, done, on_stack)),
            None => true,
        };
        on_stack.remove(id);
        ok
    }

    let mut done = HashSet::new();
    let mut on_stack = HashSet::new();
    graph
        .keys()
        .all(|&id| visit(id, &graph, &mut done, &mut on_stack))
}

fn find_holder(forest: &Forest, holder_id: &str) -> Option<(TreePath, EntityKind)> {
    let nodes = forest.flatten();
    if let Some(n) = nodes.iter().find(|n| n.task.id == holder_id) {
        return Some((n.path.clone(), EntityKind::Task));
    }
    if let Some(n) = nodes
        .iter()
        .find(|n| n.task.time_ranges.iter().any(|r| r.id == holder_id))
    {
        return Some((n.path.clone(), EntityKind::TimeRange));
    }
    nodes
        .iter()
        .find(|n| n.task.milestones.iter().any(|m| m.id == holder_id))
        .map(|n| (n.path.clone(), EntityKind::Milestone))
}

fn dependencies_mut<'f>(
    forest: &'f mut Forest,
    owner_path: &[usize],
    kind: EntityKind,
    holder_id: &str,
) -> Option<&'f mut Vec<EntityId>> {
    let task = forest.task_mut(owner_path)?;
    match kind {
        EntityKind::Task => Some(&mut task.dependencies),
        EntityKind::TimeRange => task
            .time_ranges
            .iter_mut()
            .find(|r| r.id == holder_id)
            .map(|r| &mut r.dependencies),
        EntityKind::Milestone => task
            .milestones
            .iter_mut()
            .find(|m| m.id == holder_id)
            .map(|m| &mut m.dependencies),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::tests::{d, sample, task};
    use crate::model::{Milestone, TimeRange};
    use crate::ops::tree_ops::delete_task;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn link(forest: &Forest, holder: &str, predecessor: &str) -> Forest {
        add_dependency(forest, holder, predecessor).unwrap()
    }

    fn with_range_and_milestone() -> Forest {
        let mut forest = sample();
        let path = forest.find_path("b").unwrap();
        let b = forest.task_mut(&path).unwrap();
        let mut range = TimeRange::new(d(2026, 1, 1), d(2026, 1, 4));
        range.id = "r".into();
        b.time_ranges.push(range);
        b.sync_span();
        let mut milestone = Milestone::new("", d(2026, 1, 6));
        milestone.id = "m".into();
        b.milestones.push(milestone);
        forest
    }

    #[test]
    fn add_records_predecessor_on_holder() {
        let forest = sample();
        let next = link(&forest, "b", "a1");
        assert_eq!(next.find_task("b").unwrap().dependencies, vec!["a1".to_string()]);
        // untouched subtrees stay shared
        assert!(Arc::ptr_eq(&forest.roots()[2], &next.roots()[2]));
    }

    #[test]
    fn add_to_range_and_milestone_holders() {
        let forest = with_range_and_milestone();
        let next = link(&forest, "r", "a1");
        let next = link(&next, "m", "c");
        let b = next.find_task("b").unwrap();
        assert_eq!(b.time_ranges[0].dependencies, vec!["a1".to_string()]);
        assert_eq!(b.milestones[0].dependencies, vec!["c".to_string()]);
        assert!(b.dependencies.is_empty());
    }

    #[test]
    fn self_links_and_unknown_ids_are_no_ops() {
        let forest = sample();
        assert!(add_dependency(&forest, "a", "a").unwrap().same_nodes(&forest));
        assert!(add_dependency(&forest, "a", "ghost").unwrap().same_nodes(&forest));
        assert!(add_dependency(&forest, "ghost", "a").unwrap().same_nodes(&forest));
    }

    #[test]
    fn duplicates_and_cycles_are_refused() {
        let forest = link(&sample(), "b", "a");
        assert_eq!(add_dependency(&forest, "b", "a"), Err(DependencyError::Duplicate));
        assert_eq!(add_dependency(&forest, "a", "b"), Err(DependencyError::DirectCycle));

        // c -> b -> a; a -> c would close a three-node loop
        let chain = link(&forest, "c", "b");
        assert_eq!(add_dependency(&chain, "a", "c"), Err(DependencyError::Cycle));
        assert!(is_acyclic(&chain));
    }

    #[test]
    fn remove_drops_only_the_named_edge() {
        let forest = link(&link(&sample(), "c", "a"), "c", "b");
        let next = remove_dependency(&forest, "c", "a");
        assert_eq!(next.find_task("c").unwrap().dependencies, vec!["b".to_string()]);
        assert!(remove_dependency(&next, "c", "a").same_nodes(&next));
        assert!(remove_dependency(&next, "ghost", "a").same_nodes(&next));
    }

    #[test]
    fn neighbours_resolve_across_entity_kinds() {
        let forest = with_range_and_milestone();
        let forest = link(&forest, "c", "r");
        let forest = link(&forest, "c", "m");
        let forest = link(&forest, "a1", "c");

        let preds = predecessors(&forest, "c");
        let names: Vec<&str> = preds.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["B (Period 1)", "Milestone"]);
        assert_eq!(preds[0].kind, EntityKind::TimeRange);
        assert_eq!(preds[0].owner_id, "b");

        let succs = successors(&forest, "c");
        assert_eq!(succs.len(), 1);
        assert_eq!(succs[0].id, "a1");
        assert_eq!(edges(&forest).len(), 3);
    }

    #[test]
    fn delete_purges_references_to_the_whole_subtree() {
        let forest = link(&link(&sample(), "b", "a21"), "c1", "a");
        let forest = link(&forest, "c1", "b");
        let next = delete_task(&forest, "a");
        assert!(next.find_task("b").unwrap().dependencies.is_empty());
        assert_eq!(next.find_task("c1").unwrap().dependencies, vec!["b".to_string()]);
        assert!(dangling(&next).is_empty());
    }

    #[test]
    fn purge_leaves_clean_forest_shared() {
        let forest = Forest::new(vec![task("x"), task("y")]);
        let removed: HashSet<EntityId> = ["gone".to_string()].into_iter().collect();
        assert!(purge_references(&forest, &removed).same_nodes(&forest));
    }

    #[test]
    fn dangling_reports_unresolved_ids() {
        let mut forest = sample();
        let path = forest.find_path("b").unwrap();
        forest.task_mut(&path).unwrap().dependencies.push("ghost".into());
        assert_eq!(dangling(&forest), vec![("b".to_string(), "ghost".to_string())]);
        assert!(predecessors(&forest, "b").is_empty());
    }
}
