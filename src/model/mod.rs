pub mod entity;
pub mod history;
pub mod sample;
pub mod snap;
pub mod task;
pub mod timeline;
pub mod tree;

pub use entity::{EntityIndex, EntityKind, EntityRef};
pub use history::UndoHistory;
pub use snap::{SnapConfig, SnapEdge, SnapMode};
pub use task::{EntityId, Milestone, Task, TimeRange};
pub use timeline::{TimelineScale, TimelineViewport};
pub use tree::{FlatNode, Forest, TreeError, TreePath};
