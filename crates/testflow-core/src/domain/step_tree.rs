//! The editable step tree.
//!
//! Every structural change goes through a method on [`StepTree`]. Each
//! method checks all of its preconditions before touching the tree, so a
//! rejected operation leaves the tree exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use testflow_dsl::{
    leaf_actions, validate_for_save, ActionId, ActionStep, Catalog, ElementId, Step, StepId,
    ValidationError,
};

use crate::CoreError;

/// Addresses one ordered step sequence in the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "container", content = "step", rename_all = "snake_case")]
pub enum ContainerRef {
    /// The root sequence
    Root,
    /// Then-branch of the conditional with this id
    Then(StepId),
    /// Else-branch of the conditional with this id
    Else(StepId),
    /// Body of the loop with this id
    Body(StepId),
}

impl ContainerRef {
    /// The step owning this container, `None` for the root
    pub fn owner(&self) -> Option<&StepId> {
        match self {
            ContainerRef::Root => None,
            ContainerRef::Then(id) | ContainerRef::Else(id) | ContainerRef::Body(id) => Some(id),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Root => write!(f, "root"),
            ContainerRef::Then(id) => write!(f, "{}.then", id),
            ContainerRef::Else(id) => write!(f, "{}.else", id),
            ContainerRef::Body(id) => write!(f, "{}.body", id),
        }
    }
}

/// Owns the root sequence of a flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepTree {
    steps: Vec<Step>,
}

impl StepTree {
    /// An empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing root sequence
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// The root sequence
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Consume the tree, returning the root sequence
    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    /// True when the root sequence is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total number of steps at every depth
    pub fn len(&self) -> usize {
        self.steps.iter().map(Step::subtree_len).sum()
    }

    /// Find a step anywhere in the tree
    pub fn find(&self, id: &StepId) -> Option<&Step> {
        find_in(&self.steps, id)
    }

    /// Locate the container and index holding `id`
    pub fn position_of(&self, id: &StepId) -> Option<(ContainerRef, usize)> {
        position_in(&self.steps, ContainerRef::Root, id)
    }

    /// Borrow a container's steps
    pub fn container(&self, container: &ContainerRef) -> Result<&[Step], CoreError> {
        let owner = match container.owner() {
            None => return Ok(&self.steps),
            Some(id) => self
                .find(id)
                .ok_or_else(|| CoreError::ContainerNotFound(container.to_string()))?,
        };

        match (container, owner) {
            (ContainerRef::Then(_), Step::If(s)) => Ok(&s.then_branch),
            (ContainerRef::Else(_), Step::If(s)) => Ok(&s.else_branch),
            (ContainerRef::Body(_), Step::Loop(s)) => Ok(&s.body),
            _ => Err(invalid_container(container, owner)),
        }
    }

    fn container_mut(&mut self, container: &ContainerRef) -> Result<&mut Vec<Step>, CoreError> {
        let owner = match container.owner() {
            None => return Ok(&mut self.steps),
            Some(id) => find_in_mut(&mut self.steps, id)
                .ok_or_else(|| CoreError::ContainerNotFound(container.to_string()))?,
        };

        match (container, owner) {
            (ContainerRef::Then(_), Step::If(s)) => Ok(&mut s.then_branch),
            (ContainerRef::Else(_), Step::If(s)) => Ok(&mut s.else_branch),
            (ContainerRef::Body(_), Step::Loop(s)) => Ok(&mut s.body),
            (_, owner) => Err(invalid_container(container, owner)),
        }
    }

    /// Insert `step` at `index` in `container`.
    ///
    /// `index` must be in `[0, len]`. The step and all of its descendants
    /// must carry ids not already present in the tree.
    pub fn insert(
        &mut self,
        container: &ContainerRef,
        index: usize,
        step: Step,
    ) -> Result<StepId, CoreError> {
        let len = self.container(container)?.len();
        if index > len {
            return Err(CoreError::IndexOutOfRange(format!(
                "insert at {} in {} (len {})",
                index, container, len
            )));
        }

        let mut existing = self.step_ids();
        let mut incoming = Vec::new();
        collect_ids(std::slice::from_ref(&step), &mut incoming);
        for id in incoming {
            if !existing.insert(id) {
                return Err(CoreError::DuplicateStep(id.to_string()));
            }
        }

        let id = step.id().clone();
        debug!(step_id = %id, container = %container, index, kind = %step.kind(), "Inserting step");
        self.container_mut(container)?.insert(index, step);
        Ok(id)
    }

    /// Move a step to another position.
    ///
    /// The step at `from_index` in `from` must be `step_id`. Within one
    /// container the step is removed and reinserted at `to_index`, which
    /// must be in `[0, len - 1]`; across containers `to_index` must be in
    /// `[0, len(to)]`. A conditional or loop cannot be moved into its own
    /// containers or any container below it.
    pub fn move_step(
        &mut self,
        step_id: &StepId,
        from: &ContainerRef,
        from_index: usize,
        to: &ContainerRef,
        to_index: usize,
    ) -> Result<(), CoreError> {
        let source = self.container(from)?;
        let moving = source.get(from_index).ok_or_else(|| {
            CoreError::IndexOutOfRange(format!(
                "move from {} in {} (len {})",
                from_index,
                from,
                source.len()
            ))
        })?;
        if moving.id() != step_id {
            return Err(CoreError::StepNotFound(format!(
                "{} is not at {}[{}]",
                step_id, from, from_index
            )));
        }
        if let Some(owner) = to.owner() {
            if moving.contains(owner) {
                return Err(CoreError::InvalidMove(format!(
                    "{} cannot be moved into {}",
                    step_id, to
                )));
            }
        }

        let dest_len = self.container(to)?.len();
        let max_index = if from == to { dest_len - 1 } else { dest_len };
        if to_index > max_index {
            return Err(CoreError::IndexOutOfRange(format!(
                "move to {} in {} (max {})",
                to_index, to, max_index
            )));
        }

        debug!(step_id = %step_id, from = %from, from_index, to = %to, to_index, "Moving step");
        let step = self.container_mut(from)?.remove(from_index);
        self.container_mut(to)?.insert(to_index, step);
        Ok(())
    }

    /// Remove the step at `index`, discarding all of its descendants
    pub fn delete(&mut self, container: &ContainerRef, index: usize) -> Result<Step, CoreError> {
        let steps = self.container_mut(container)?;
        if index >= steps.len() {
            return Err(CoreError::IndexOutOfRange(format!(
                "delete at {} in {} (len {})",
                index,
                container,
                steps.len()
            )));
        }

        let removed = steps.remove(index);
        debug!(
            step_id = %removed.id(),
            container = %container,
            discarded = removed.subtree_len() - 1,
            "Deleted step"
        );
        Ok(removed)
    }

    /// Create an unconfigured action step for a catalog element
    pub fn add_action_from_catalog(
        &mut self,
        container: &ContainerRef,
        index: usize,
        element: ElementId,
        catalog: &Catalog,
    ) -> Result<StepId, CoreError> {
        if catalog.element(element).is_none() {
            return Err(CoreError::ElementNotFound(element.to_string()));
        }
        self.insert(container, index, Step::new_action(element))
    }

    /// Create a conditional with an empty condition and empty branches
    pub fn add_condition(&mut self, container: &ContainerRef, index: usize) -> Result<StepId, CoreError> {
        self.insert(container, index, Step::new_if())
    }

    /// Create a loop repeating once with an empty body
    pub fn add_loop(&mut self, container: &ContainerRef, index: usize) -> Result<StepId, CoreError> {
        self.insert(container, index, Step::new_loop())
    }

    /// Bind an action and reset the parameters to its argument names.
    ///
    /// `None` clears the action and the parameters.
    pub fn set_action_ref(
        &mut self,
        step_id: &StepId,
        action: Option<ActionId>,
        catalog: &Catalog,
    ) -> Result<(), CoreError> {
        let template = match action {
            Some(id) => Some(
                catalog
                    .action(id)
                    .ok_or_else(|| CoreError::ActionNotFound(id.to_string()))?,
            ),
            None => None,
        };

        let step = self.action_mut(step_id)?;
        step.bind(template);
        debug!(step_id = %step_id, action = ?action, parameters = step.parameters.len(), "Bound action");
        Ok(())
    }

    /// Set one parameter value of an action step.
    ///
    /// The key must be declared by the step's bound action.
    pub fn set_parameter(
        &mut self,
        step_id: &StepId,
        key: &str,
        value: impl Into<String>,
        catalog: &Catalog,
    ) -> Result<(), CoreError> {
        let step = self.action_mut(step_id)?;
        let action_id = step
            .action_ref
            .ok_or_else(|| CoreError::ActionNotBound(step_id.to_string()))?;
        let template = catalog
            .action(action_id)
            .ok_or_else(|| CoreError::ActionNotFound(action_id.to_string()))?;
        if !template.declares_argument(key) {
            return Err(CoreError::UnknownParameter(format!(
                "'{}' is not an argument of action '{}'",
                key, template.name
            )));
        }

        step.parameters.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Replace a conditional's condition
    pub fn set_condition(&mut self, step_id: &StepId, condition: impl Into<String>) -> Result<(), CoreError> {
        match self.step_mut(step_id)? {
            Step::If(s) => {
                s.condition = condition.into();
                Ok(())
            }
            other => Err(wrong_kind(step_id, "if", other)),
        }
    }

    /// Replace a loop's repeat count; values below 1 are kept until save
    pub fn set_repeat_count(&mut self, step_id: &StepId, repeat_count: i64) -> Result<(), CoreError> {
        match self.step_mut(step_id)? {
            Step::Loop(s) => {
                s.repeat_count = repeat_count;
                Ok(())
            }
            other => Err(wrong_kind(step_id, "loop", other)),
        }
    }

    /// Action steps in depth-first order
    pub fn leaf_actions(&self) -> Vec<&ActionStep> {
        leaf_actions(&self.steps)
    }

    /// Save-time violations of the whole tree
    pub fn validate(&self, catalog: &Catalog) -> Vec<ValidationError> {
        validate_for_save(&self.steps, catalog)
    }

    pub(crate) fn action_mut(&mut self, step_id: &StepId) -> Result<&mut ActionStep, CoreError> {
        match self.step_mut(step_id)? {
            Step::Action(s) => Ok(s),
            _ => Err(CoreError::NotAnActionStep(step_id.to_string())),
        }
    }

    fn step_mut(&mut self, step_id: &StepId) -> Result<&mut Step, CoreError> {
        find_in_mut(&mut self.steps, step_id).ok_or_else(|| CoreError::StepNotFound(step_id.to_string()))
    }

    fn step_ids(&self) -> HashSet<&StepId> {
        let mut ids = Vec::new();
        collect_ids(&self.steps, &mut ids);
        ids.into_iter().collect()
    }
}

fn invalid_container(container: &ContainerRef, owner: &Step) -> CoreError {
    CoreError::InvalidContainer(format!("{} on a {} step", container, owner.kind()))
}

fn wrong_kind(step_id: &StepId, expected: &str, found: &Step) -> CoreError {
    CoreError::WrongStepKind(format!(
        "{} is a {} step, expected {}",
        step_id,
        found.kind(),
        expected
    ))
}

fn collect_ids<'a>(steps: &'a [Step], out: &mut Vec<&'a StepId>) {
    for step in steps {
        out.push(step.id());
        match step {
            Step::Action(_) => {}
            Step::If(s) => {
                collect_ids(&s.then_branch, out);
                collect_ids(&s.else_branch, out);
            }
            Step::Loop(s) => collect_ids(&s.body, out),
        }
    }
}

fn find_in<'a>(steps: &'a [Step], id: &StepId) -> Option<&'a Step> {
    let step = steps.iter().find(|s| s.contains(id))?;
    if step.id() == id {
        return Some(step);
    }
    step.children().find_map(|child| find_in(std::slice::from_ref(child), id))
}

fn find_in_mut<'a>(steps: &'a mut [Step], id: &StepId) -> Option<&'a mut Step> {
    let step = steps.iter_mut().find(|s| s.contains(id))?;
    if step.id() == id {
        return Some(step);
    }
    match step {
        Step::Action(_) => None,
        Step::If(s) => {
            if s.then_branch.iter().any(|c| c.contains(id)) {
                find_in_mut(&mut s.then_branch, id)
            } else {
                find_in_mut(&mut s.else_branch, id)
            }
        }
        Step::Loop(s) => find_in_mut(&mut s.body, id),
    }
}

fn position_in(steps: &[Step], container: ContainerRef, id: &StepId) -> Option<(ContainerRef, usize)> {
    for (index, step) in steps.iter().enumerate() {
        if step.id() == id {
            return Some((container, index));
        }
        if !step.contains(id) {
            continue;
        }
        let owner = step.id().clone();
        return match step {
            Step::Action(_) => None,
            Step::If(s) => position_in(&s.then_branch, ContainerRef::Then(owner.clone()), id)
                .or_else(|| position_in(&s.else_branch, ContainerRef::Else(owner), id)),
            Step::Loop(s) => position_in(&s.body, ContainerRef::Body(owner), id),
        };
    }
    None
}
