mod step;

pub use step::{leaf_actions, ActionStep, IfStep, LoopStep, ParameterMap, Step, StepKind};

use serde::{Deserialize, Serialize};

use crate::types::TestCaseId;

/// Document version written by this crate
pub const CURRENT_DSL_VERSION: &str = "1.0";

/// The persisted, nested form of a composed flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDocument {
    /// The DSL version (e.g., "1.0")
    pub dsl_version: String,

    /// Test case the flow parameterizes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<TestCaseId>,

    /// Free-form global variable declarations kept alongside the flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globals: Option<String>,

    /// Root step sequence
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl FlowDocument {
    /// Wrap a root sequence in a current-version document
    pub fn new(test_id: Option<TestCaseId>, steps: Vec<Step>) -> Self {
        Self {
            dsl_version: CURRENT_DSL_VERSION.to_string(),
            test_id,
            globals: None,
            steps,
        }
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, crate::DslError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, crate::DslError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
