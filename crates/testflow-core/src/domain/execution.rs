//! Execution monitor state machine.
//!
//! Local state is always derived from the events received from the
//! backend. Commands are requests: sending one never changes the state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Backend identifier of a running test execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub i64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Executing (also while the agent is being called)
    Running,
    /// Paused by the user
    Paused,
    /// Completed
    Finished,
    /// Cancelled by the user
    Cancelled,
    /// Failed or lost connection
    Error,
}

impl ExecutionStatus {
    /// Map a status string sent by the backend
    pub fn from_wire(status: &str) -> Option<Self> {
        match status.trim() {
            "En ejecucion" | "En ejecución" | "Llamando al agente" | "running" => Some(Self::Running),
            "Pausado" | "paused" => Some(Self::Paused),
            "Finalizado" | "finished" | "completed" => Some(Self::Finished),
            "Cancelado" | "cancelled" => Some(Self::Cancelled),
            "Error" | "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Error)
    }

    /// Whether the state machine allows moving to `next`
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Running, Paused)
                | (Paused, Running)
                | (Running, Finished)
                | (Running | Paused, Cancelled)
                | (Running | Paused, Error)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One inbound monitor message; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    /// Wire status string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Progress percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    /// Log line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,

    /// Screenshot URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// User command sent to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorCommand {
    /// Pause a running execution
    Pause,
    /// Resume a paused execution
    Resume,
    /// Cancel a running or paused execution
    Cancel,
}

impl MonitorCommand {
    /// Whether the command may be sent while in `status`
    pub fn allowed_from(self, status: ExecutionStatus) -> bool {
        match self {
            Self::Pause => status == ExecutionStatus::Running,
            Self::Resume => status == ExecutionStatus::Paused,
            Self::Cancel => matches!(status, ExecutionStatus::Running | ExecutionStatus::Paused),
        }
    }
}

impl fmt::Display for MonitorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// What the monitor widget displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Execution being monitored
    pub execution_id: ExecutionId,

    /// Current state
    pub status: ExecutionStatus,

    /// Progress percentage, 0-100
    pub progress: u8,

    /// Log lines in arrival order
    pub logs: Vec<String>,

    /// Latest screenshot URL
    pub screenshot: Option<String>,

    /// Time of the last applied message
    pub updated_at: Option<DateTime<Utc>>,
}

/// Applies inbound events to a snapshot
#[derive(Debug, Clone)]
pub struct ExecutionMonitor {
    snapshot: MonitorSnapshot,
}

impl ExecutionMonitor {
    /// Start monitoring in `initial` state with no progress
    pub fn new(execution_id: ExecutionId, initial: ExecutionStatus) -> Self {
        Self {
            snapshot: MonitorSnapshot {
                execution_id,
                status: initial,
                progress: 0,
                logs: Vec::new(),
                screenshot: None,
                updated_at: None,
            },
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> &MonitorSnapshot {
        &self.snapshot
    }

    /// Current state
    pub fn status(&self) -> ExecutionStatus {
        self.snapshot.status
    }

    /// Whether `command` may be sent now
    pub fn permits(&self, command: MonitorCommand) -> bool {
        command.allowed_from(self.snapshot.status)
    }

    /// Apply the fields present in `event`.
    ///
    /// Progress is applied before status so a final message carrying both
    /// is recorded in full. Returns true when the snapshot changed.
    pub fn apply(&mut self, event: &MonitorEvent) -> bool {
        let mut changed = false;
        let id = self.snapshot.execution_id;

        if let Some(progress) = event.progress {
            changed |= self.apply_progress(progress);
        }

        if let Some(line) = &event.log {
            self.snapshot.logs.push(line.clone());
            changed = true;
        }

        if let Some(url) = &event.screenshot {
            self.snapshot.screenshot = Some(url.clone());
            changed = true;
        }

        if let Some(wire) = &event.status {
            match ExecutionStatus::from_wire(wire) {
                Some(next) => changed |= self.transition(next),
                None => warn!(execution_id = %id, status = %wire, "Ignoring unknown execution status"),
            }
        }

        if changed {
            self.snapshot.updated_at = Some(Utc::now());
        }
        changed
    }

    /// The connection was lost or failed; moves to Error unless terminal
    pub fn fail(&mut self, reason: &str) -> bool {
        let id = self.snapshot.execution_id;
        if self.snapshot.status.is_terminal() {
            debug!(execution_id = %id, reason, "Connection ended after terminal state");
            return false;
        }

        warn!(execution_id = %id, reason, "Monitor connection failed");
        self.snapshot.status = ExecutionStatus::Error;
        self.snapshot.updated_at = Some(Utc::now());
        true
    }

    fn apply_progress(&mut self, value: f64) -> bool {
        let id = self.snapshot.execution_id;
        if self.snapshot.status.is_terminal() {
            debug!(execution_id = %id, value, "Ignoring progress after terminal state");
            return false;
        }
        if value.is_nan() {
            warn!(execution_id = %id, "Ignoring NaN progress");
            return false;
        }

        let clamped = value.clamp(0.0, 100.0).round() as u8;
        if clamped < self.snapshot.progress {
            debug!(execution_id = %id, current = self.snapshot.progress, value = clamped, "Ignoring decreasing progress");
            return false;
        }

        let changed = clamped != self.snapshot.progress;
        self.snapshot.progress = clamped;
        changed
    }

    fn transition(&mut self, next: ExecutionStatus) -> bool {
        let id = self.snapshot.execution_id;
        let current = self.snapshot.status;
        if current == next {
            return false;
        }
        if !current.can_transition_to(next) {
            warn!(execution_id = %id, from = %current, to = %next, "Ignoring invalid status transition");
            return false;
        }

        debug!(execution_id = %id, from = %current, to = %next, "Execution status changed");
        self.snapshot.status = next;
        true
    }
}
