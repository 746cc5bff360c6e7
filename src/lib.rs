//! Core of the Gantt planner: the task forest, its edit operations, undo
//! history, timeline geometry and the drag state machine.

pub mod config;
pub mod drag;
pub mod editor;
pub mod io;
pub mod model;
pub mod ops;
