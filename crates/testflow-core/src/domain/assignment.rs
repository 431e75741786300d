//! Persisted element-action assignments and the save diff.
//!
//! The backend stores a flow as a flat list of assignments, one per action
//! step. Saving flattens the tree depth-first and diffs the result against
//! the assignments loaded when the editor opened.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use testflow_dsl::{
    leaf_actions, ActionId, AssignmentId, ElementId, ParameterMap, Step, StepId, TestCaseId,
};

use super::step_tree::StepTree;
use crate::CoreError;

/// The fields of an assignment the editor controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPayload {
    /// Bound action template
    #[serde(alias = "action_id")]
    pub action_id: ActionId,

    /// Element the action runs against
    #[serde(alias = "element_id")]
    pub element_id: ElementId,

    /// Owning test case
    #[serde(alias = "test_id")]
    pub test_id: TestCaseId,

    /// Parameter values; absent when the action declares none
    #[serde(default, alias = "parametros", skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterMap>,
}

impl AssignmentPayload {
    /// Treat an empty parameter map the same as an absent one
    pub fn normalized(mut self) -> Self {
        if self.parameters.as_ref().map_or(false, |p| p.is_empty()) {
            self.parameters = None;
        }
        self
    }
}

/// A persisted assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Backend identifier
    pub id: AssignmentId,

    /// Stored fields
    #[serde(flatten)]
    pub payload: AssignmentPayload,
}

/// One flattened action step ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDraft {
    /// Step the draft was produced from
    pub step_id: StepId,

    /// Assignment the step was loaded from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<AssignmentId>,

    /// Fields to store
    #[serde(flatten)]
    pub payload: AssignmentPayload,
}

/// An assignment whose stored fields changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentUpdate {
    /// Assignment to rewrite
    pub id: AssignmentId,

    /// Step the new fields come from
    pub step_id: StepId,

    /// New fields
    #[serde(flatten)]
    pub payload: AssignmentPayload,
}

/// Create, update and delete calls needed to persist a tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePlan {
    /// New assignments, in depth-first step order
    pub creates: Vec<AssignmentDraft>,

    /// Changed assignments
    pub updates: Vec<AssignmentUpdate>,

    /// Assignments no longer present in the tree
    pub deletes: Vec<AssignmentId>,
}

impl SavePlan {
    /// True when nothing needs to be written
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Number of backend calls the plan makes
    pub fn operation_count(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }
}

/// Flatten the tree's action steps into drafts, depth-first.
///
/// Every action step must have an action bound.
pub fn flatten(steps: &[Step], test_id: TestCaseId) -> Result<Vec<AssignmentDraft>, CoreError> {
    leaf_actions(steps)
        .into_iter()
        .map(|step| {
            let action_id = step
                .action_ref
                .ok_or_else(|| CoreError::ActionNotBound(step.id.to_string()))?;
            Ok(AssignmentDraft {
                step_id: step.id.clone(),
                assignment_id: step.assignment_id,
                payload: AssignmentPayload {
                    action_id,
                    element_id: step.element_ref,
                    test_id,
                    parameters: Some(step.parameters.clone()),
                }
                .normalized(),
            })
        })
        .collect()
}

/// Compute the calls that turn `old` into `new`.
///
/// Drafts are matched to old assignments by assignment id. A draft with no
/// id, an unknown id, or an id already claimed by an earlier draft is a
/// create. Unchanged assignments produce no call.
pub fn diff_assignments(old: &[Assignment], new: &[AssignmentDraft]) -> SavePlan {
    let previous: HashMap<AssignmentId, AssignmentPayload> = old
        .iter()
        .map(|a| (a.id, a.payload.clone().normalized()))
        .collect();
    let mut claimed: HashSet<AssignmentId> = HashSet::new();
    let mut plan = SavePlan::default();

    for draft in new {
        let known = draft
            .assignment_id
            .filter(|id| !claimed.contains(id))
            .and_then(|id| previous.get(&id).map(|payload| (id, payload)));

        match known {
            Some((id, payload)) => {
                claimed.insert(id);
                if *payload != draft.payload.clone().normalized() {
                    plan.updates.push(AssignmentUpdate {
                        id,
                        step_id: draft.step_id.clone(),
                        payload: draft.payload.clone(),
                    });
                }
            }
            None => plan.creates.push(draft.clone()),
        }
    }

    plan.deletes = old
        .iter()
        .map(|a| a.id)
        .filter(|id| !claimed.contains(id))
        .collect();

    plan
}

impl StepTree {
    /// Rebuild a tree from a flat assignment list.
    ///
    /// Each assignment becomes a root-level action step, in list order.
    pub fn from_assignments(assignments: &[Assignment]) -> Self {
        let steps = assignments
            .iter()
            .map(|assignment| {
                let mut step = Step::new_action(assignment.payload.element_id);
                if let Some(action) = step.as_action_mut() {
                    action.action_ref = Some(assignment.payload.action_id);
                    action.parameters = assignment.payload.parameters.clone().unwrap_or_default();
                    action.assignment_id = Some(assignment.id);
                }
                step
            })
            .collect();

        StepTree::from_steps(steps)
    }
}
