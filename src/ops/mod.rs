//! Forest transforms: structural edits and dependency bookkeeping.

pub mod deps;
pub mod tree_ops;

pub use deps::{add_dependency, predecessors, remove_dependency, successors, DependencyError, LinkedEntity};
pub use tree_ops::{MilestonePatch, RangePatch, TaskPatch};
