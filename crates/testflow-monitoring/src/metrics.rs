//! Metric helpers that report through `tracing` events.

use tracing::info;

/// Flow editor metrics
pub struct EditorMetrics;

impl EditorMetrics {
    /// Record a validation run
    pub fn record_validation(steps: usize, violations: usize) {
        info!(metric = "editor.validation", steps, violations, "Validation run");
    }

    /// Record a computed save plan
    pub fn record_save_plan(creates: usize, updates: usize, deletes: usize) {
        info!(metric = "editor.save_plan", creates, updates, deletes, "Save plan");
    }
}

/// Execution monitor metrics
pub struct MonitorMetrics;

impl MonitorMetrics {
    /// Record an inbound monitor event
    pub fn record_event(execution_id: i64, status: &str, progress: u8) {
        info!(metric = "monitor.event", execution_id, status, progress, "Monitor event");
    }

    /// Record the end of a monitor replay
    pub fn record_replay(execution_id: i64, messages: usize, status: &str) {
        info!(metric = "monitor.replay", execution_id, messages, status, "Monitor replay");
    }
}
