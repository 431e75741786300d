//!
//! Testflow Core - editing, saving and monitoring of composed test flows
//!
//! This crate holds the structural step tree operations used by the flow
//! builder, the flattening and diffing that turn a tree into assignment
//! create/update/delete calls, and the execution monitor that follows a
//! running test through its live event stream.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - step tree, assignments, execution state, repositories
pub mod domain;

/// Application services - editor, previews, monitor channels
pub mod application;

/// Error types
pub mod error;

pub use error::CoreError;

// Re-export main API types for easy use
pub use application::editor::{DragSource, DropTarget, FlowEditor};
pub use application::monitor::{ChannelMessage, MonitorBoard, MonitorChannel};
pub use application::preview::{preview_step, script_preview};
pub use domain::assignment::{
    diff_assignments, flatten, Assignment, AssignmentDraft, AssignmentPayload, AssignmentUpdate,
    SavePlan,
};
pub use domain::execution::{
    ExecutionId, ExecutionMonitor, ExecutionStatus, MonitorCommand, MonitorEvent, MonitorSnapshot,
};
pub use domain::repository::{
    load_catalog, AssignmentRepository, CatalogProvider, ExecutionCommandSink,
};
pub use domain::step_tree::{ContainerRef, StepTree};
