//! Commands of the `testflow` binary.
//!
//! Each command reads its inputs from files, drives the library and returns
//! an [`Outcome`] holding the text to print.

use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use testflow_core::domain::repository::memory::MemoryCommandSink;
use testflow_core::{
    preview_step, script_preview, Assignment, ChannelMessage, CoreError, ExecutionId,
    ExecutionStatus, FlowEditor, MonitorChannel, StepTree,
};
use testflow_dsl::{
    parse_flow_document, parse_flow_document_json, Catalog, FlowDocument, Step, StepId,
    TestCaseId, ValidationError,
};
use testflow_monitoring::{EditorMetrics, MonitorMetrics};

use crate::config::TestflowConfig;
use crate::error::{CliError, CliResult};

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a flow against the catalog and list every violation
    Validate {
        /// Catalog file (YAML or JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Flow document (YAML or JSON)
        flow: PathBuf,
    },

    /// Print the generated script, or one step's resolved code
    Preview {
        /// Catalog file (YAML or JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Flow document (YAML or JSON)
        flow: PathBuf,
        /// Only resolve this action step
        #[arg(long)]
        step: Option<String>,
    },

    /// Print the assignment calls a save would make
    PlanSave {
        /// Catalog file (YAML or JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Assignments currently stored for the test case (YAML or JSON list)
        #[arg(long)]
        assignments: PathBuf,
        /// Test case the flow belongs to
        #[arg(long)]
        test_id: i64,
        /// Flow document (YAML or JSON)
        flow: PathBuf,
    },

    /// Replay recorded monitor messages and print the final snapshot
    Monitor {
        /// Execution the messages belong to
        #[arg(long)]
        execution_id: i64,
        /// File with one inbound JSON message per line
        #[arg(long)]
        events: PathBuf,
    },
}

/// Text produced by a command and whether it succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Text for stdout
    pub output: String,
    /// False when the command found problems
    pub success: bool,
}

impl Outcome {
    fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }

    fn violations(violations: &[ValidationError]) -> Self {
        let output = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            output,
            success: false,
        }
    }
}

/// Run one command
pub async fn execute(command: Command, config: &TestflowConfig) -> CliResult<Outcome> {
    match command {
        Command::Validate { catalog, flow } => validate(&catalog, &flow),
        Command::Preview {
            catalog,
            flow,
            step,
        } => preview(&catalog, &flow, step.as_deref()),
        Command::PlanSave {
            catalog,
            assignments,
            test_id,
            flow,
        } => plan_save(&catalog, &assignments, TestCaseId(test_id), &flow),
        Command::Monitor {
            execution_id,
            events,
        } => monitor(ExecutionId(execution_id), &events, config).await,
    }
}

/// Validate a flow document
pub fn validate(catalog: &Path, flow: &Path) -> CliResult<Outcome> {
    let catalog = load_catalog(catalog)?;
    let tree = StepTree::from_steps(load_flow(flow)?.steps);

    let violations = tree.validate(&catalog);
    EditorMetrics::record_validation(tree.len(), violations.len());

    if violations.is_empty() {
        Ok(Outcome::success(format!("Flow is valid ({} steps)", tree.len())))
    } else {
        Ok(Outcome::violations(&violations))
    }
}

/// Preview the whole script or a single step
pub fn preview(catalog: &Path, flow: &Path, step: Option<&str>) -> CliResult<Outcome> {
    let catalog = load_catalog(catalog)?;
    let tree = StepTree::from_steps(load_flow(flow)?.steps);

    let Some(step_id) = step.map(StepId::from) else {
        return Ok(Outcome::success(script_preview(tree.steps(), &catalog)));
    };

    let action = match tree.find(&step_id) {
        Some(Step::Action(action)) => action,
        Some(_) => {
            return Err(CliError::InvalidInput(format!(
                "Step {} is not an action step",
                step_id
            )))
        }
        None => return Err(CliError::InvalidInput(format!("Unknown step {}", step_id))),
    };

    let resolution = preview_step(action, &catalog).ok_or_else(|| {
        CliError::InvalidInput(format!("Step {} has no action in the catalog", step_id))
    })?;
    if !resolution.is_complete() {
        warn!(step_id = %step_id, unresolved = ?resolution.unresolved, "Preview has unresolved placeholders");
    }
    Ok(Outcome::success(resolution.code))
}

/// Plan the save of a flow against the stored assignments
pub fn plan_save(
    catalog: &Path,
    assignments: &Path,
    test_id: TestCaseId,
    flow: &Path,
) -> CliResult<Outcome> {
    let catalog = load_catalog(catalog)?;
    let document = load_flow(flow)?;
    let baseline = load_assignments(assignments)?;

    let editor = FlowEditor::from_document(catalog, test_id, document, baseline);
    match editor.plan_save() {
        Ok(plan) => {
            EditorMetrics::record_save_plan(
                plan.creates.len(),
                plan.updates.len(),
                plan.deletes.len(),
            );
            Ok(Outcome::success(serde_json::to_string_pretty(&plan)?))
        }
        Err(CoreError::ValidationFailed(violations)) => Ok(Outcome::violations(&violations)),
        Err(e) => Err(e.into()),
    }
}

/// Replay a recorded event stream through a monitor channel
pub async fn monitor(
    execution_id: ExecutionId,
    events: &Path,
    config: &TestflowConfig,
) -> CliResult<Outcome> {
    let content = read_file(events)?;
    info!(
        execution_id = %execution_id,
        url = %config.monitor_url(execution_id),
        "Replaying recorded monitor messages"
    );

    let (tx, rx) = mpsc::channel(config.monitor_buffer);
    let sink = Arc::new(MemoryCommandSink::new());
    let mut channel = MonitorChannel::open(execution_id, ExecutionStatus::Running, rx, sink);

    let mut state = channel.subscribe();
    let recorder = tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let snapshot = state.borrow_and_update().clone();
            MonitorMetrics::record_event(
                snapshot.execution_id.0,
                &snapshot.status.to_string(),
                snapshot.progress,
            );
        }
    });

    let mut messages = 0;
    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if tx.send(ChannelMessage::Text(line.to_string())).await.is_err() {
            break;
        }
        messages += 1;
    }
    drop(tx);

    channel.finished().await;
    if let Err(e) = recorder.await {
        warn!(execution_id = %execution_id, error = %e, "Snapshot recorder ended abnormally");
    }

    let snapshot = channel.snapshot();
    MonitorMetrics::record_replay(execution_id.0, messages, &snapshot.status.to_string());

    Ok(Outcome {
        output: serde_json::to_string_pretty(&snapshot)?,
        success: snapshot.status != ExecutionStatus::Error,
    })
}

fn read_file(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

fn load_catalog(path: &Path) -> CliResult<Catalog> {
    let content = read_file(path)?;
    let catalog = if is_json(path) {
        Catalog::from_json_str(&content)?
    } else {
        Catalog::from_yaml_str(&content)?
    };
    Ok(catalog)
}

fn load_flow(path: &Path) -> CliResult<FlowDocument> {
    let content = read_file(path)?;
    let document = if is_json(path) {
        parse_flow_document_json(&content)?
    } else {
        parse_flow_document(&content)?
    };
    Ok(document)
}

fn load_assignments(path: &Path) -> CliResult<Vec<Assignment>> {
    let content = read_file(path)?;
    let assignments = if is_json(path) {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_json() {
        assert!(is_json(Path::new("flow.json")));
        assert!(is_json(Path::new("FLOW.JSON")));
        assert!(!is_json(Path::new("flow.yaml")));
        assert!(!is_json(Path::new("flow")));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = read_file(Path::new("/nonexistent/flow.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/flow.yaml"));
    }
}
