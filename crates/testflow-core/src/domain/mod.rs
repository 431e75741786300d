/// Editable step tree
pub mod step_tree;

/// Persisted assignments and the save diff
pub mod assignment;

/// Execution monitor state machine
pub mod execution;

/// Repository interfaces
pub mod repository;
