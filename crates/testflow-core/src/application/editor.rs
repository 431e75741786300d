//! Flow editor service.
//!
//! Translates drag/drop and inline edits into [`StepTree`] operations,
//! re-validates after every change and keeps the previews of expanded
//! action steps current. Saving diffs the flattened tree against the
//! assignments loaded at open time.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

use testflow_dsl::template::Resolution;
use testflow_dsl::{
    ActionId, Catalog, ElementId, FlowDocument, Step, StepId, TestCaseId, ValidationError,
};

use super::preview::{preview_step, script_preview};
use crate::domain::assignment::{diff_assignments, flatten, Assignment, SavePlan};
use crate::domain::repository::AssignmentRepository;
use crate::domain::step_tree::{ContainerRef, StepTree};
use crate::CoreError;

/// What is being dragged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragSource {
    /// An element from the catalog list
    CatalogElement(ElementId),

    /// A step already in the tree
    Step {
        /// Container the step currently sits in
        container: ContainerRef,
        /// Position in that container
        index: usize,
        /// The dragged step, checked against the position
        step_id: StepId,
    },
}

/// Where it is dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    /// Destination container
    pub container: ContainerRef,
    /// Position in the destination container
    pub index: usize,
}

impl DropTarget {
    /// Drop at `index` of `container`
    pub fn new(container: ContainerRef, index: usize) -> Self {
        Self { container, index }
    }
}

/// Editing session for one test case's flow
#[derive(Debug)]
pub struct FlowEditor {
    catalog: Catalog,
    test_id: TestCaseId,
    tree: StepTree,
    globals: Option<String>,
    baseline: Vec<Assignment>,
    expanded: HashSet<StepId>,
    previews: HashMap<StepId, Resolution>,
    violations: Vec<ValidationError>,
}

impl FlowEditor {
    /// Open the editor over the assignments currently stored for `test_id`
    pub fn open(catalog: Catalog, test_id: TestCaseId, assignments: Vec<Assignment>) -> Self {
        let tree = StepTree::from_assignments(&assignments);
        info!(test_id = %test_id, assignments = assignments.len(), "Opened flow editor");
        Self::with_tree(catalog, test_id, tree, None, assignments)
    }

    /// Open a nested flow document; `baseline` are the stored assignments
    pub fn from_document(
        catalog: Catalog,
        test_id: TestCaseId,
        document: FlowDocument,
        baseline: Vec<Assignment>,
    ) -> Self {
        if let Some(doc_test) = document.test_id {
            if doc_test != test_id {
                warn!(test_id = %test_id, document_test_id = %doc_test, "Flow document belongs to another test case");
            }
        }
        let tree = StepTree::from_steps(document.steps);
        Self::with_tree(catalog, test_id, tree, document.globals, baseline)
    }

    fn with_tree(
        catalog: Catalog,
        test_id: TestCaseId,
        tree: StepTree,
        globals: Option<String>,
        baseline: Vec<Assignment>,
    ) -> Self {
        let mut editor = Self {
            catalog,
            test_id,
            tree,
            globals,
            baseline,
            expanded: HashSet::new(),
            previews: HashMap::new(),
            violations: Vec::new(),
        };
        editor.refresh();
        editor
    }

    /// Reference data of this session
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Test case being parameterized
    pub fn test_id(&self) -> TestCaseId {
        self.test_id
    }

    /// Current tree
    pub fn tree(&self) -> &StepTree {
        &self.tree
    }

    /// Assignments the save diff compares against
    pub fn baseline(&self) -> &[Assignment] {
        &self.baseline
    }

    /// Global variable declarations
    pub fn globals(&self) -> Option<&str> {
        self.globals.as_deref()
    }

    /// Replace the global variable declarations
    pub fn set_globals(&mut self, globals: Option<String>) {
        self.globals = globals;
    }

    /// Apply a drop: a catalog element becomes a new action step, a step is moved
    #[instrument(skip(self), fields(test_id = %self.test_id))]
    pub fn drop(&mut self, source: DragSource, target: DropTarget) -> Result<StepId, CoreError> {
        let id = match source {
            DragSource::CatalogElement(element) => self.tree.add_action_from_catalog(
                &target.container,
                target.index,
                element,
                &self.catalog,
            )?,
            DragSource::Step {
                container,
                index,
                step_id,
            } => {
                self.tree
                    .move_step(&step_id, &container, index, &target.container, target.index)?;
                step_id
            }
        };
        self.refresh();
        Ok(id)
    }

    /// Insert a new conditional
    pub fn add_condition(&mut self, target: DropTarget) -> Result<StepId, CoreError> {
        let id = self.tree.add_condition(&target.container, target.index)?;
        self.refresh();
        Ok(id)
    }

    /// Insert a new loop
    pub fn add_loop(&mut self, target: DropTarget) -> Result<StepId, CoreError> {
        let id = self.tree.add_loop(&target.container, target.index)?;
        self.refresh();
        Ok(id)
    }

    /// Delete a step and everything below it
    pub fn delete(&mut self, container: &ContainerRef, index: usize) -> Result<Step, CoreError> {
        let removed = self.tree.delete(container, index)?;
        self.refresh();
        Ok(removed)
    }

    /// Bind or clear an action step's action
    pub fn set_action(&mut self, step_id: &StepId, action: Option<ActionId>) -> Result<(), CoreError> {
        self.tree.set_action_ref(step_id, action, &self.catalog)?;
        self.refresh();
        Ok(())
    }

    /// Set one parameter value
    pub fn set_parameter(&mut self, step_id: &StepId, key: &str, value: impl Into<String>) -> Result<(), CoreError> {
        self.tree.set_parameter(step_id, key, value, &self.catalog)?;
        self.refresh();
        Ok(())
    }

    /// Edit a conditional's condition
    pub fn set_condition(&mut self, step_id: &StepId, condition: impl Into<String>) -> Result<(), CoreError> {
        self.tree.set_condition(step_id, condition)?;
        self.refresh();
        Ok(())
    }

    /// Edit a loop's repeat count
    pub fn set_repeat_count(&mut self, step_id: &StepId, repeat_count: i64) -> Result<(), CoreError> {
        self.tree.set_repeat_count(step_id, repeat_count)?;
        self.refresh();
        Ok(())
    }

    /// Show the code preview of an action step
    pub fn expand(&mut self, step_id: &StepId) -> Result<(), CoreError> {
        match self.tree.find(step_id) {
            Some(Step::Action(_)) => {}
            Some(_) => return Err(CoreError::NotAnActionStep(step_id.to_string())),
            None => return Err(CoreError::StepNotFound(step_id.to_string())),
        }
        self.expanded.insert(step_id.clone());
        self.refresh_previews();
        Ok(())
    }

    /// Hide the code preview of a step
    pub fn collapse(&mut self, step_id: &StepId) {
        self.expanded.remove(step_id);
        self.previews.remove(step_id);
    }

    /// Whether a step's preview is shown
    pub fn is_expanded(&self, step_id: &StepId) -> bool {
        self.expanded.contains(step_id)
    }

    /// Resolved code of an expanded step, as of the last change
    pub fn preview(&self, step_id: &StepId) -> Option<&Resolution> {
        self.previews.get(step_id)
    }

    /// Script the executor would receive for the current tree
    pub fn script(&self) -> String {
        script_preview(self.tree.steps(), &self.catalog)
    }

    /// Violations found by the last re-validation
    pub fn violations(&self) -> &[ValidationError] {
        &self.violations
    }

    /// True when the tree can be saved
    pub fn is_savable(&self) -> bool {
        self.violations.is_empty()
    }

    /// Nested document form of the current tree
    pub fn to_document(&self) -> FlowDocument {
        let mut document = FlowDocument::new(Some(self.test_id), self.tree.steps().to_vec());
        document.globals = self.globals.clone();
        document
    }

    /// Compute the calls a save would make.
    ///
    /// Refused with every violation when the tree is not valid.
    pub fn plan_save(&self) -> Result<SavePlan, CoreError> {
        if !self.violations.is_empty() {
            return Err(CoreError::ValidationFailed(self.violations.clone()));
        }
        let drafts = flatten(self.tree.steps(), self.test_id)?;
        let plan = diff_assignments(&self.baseline, &drafts);
        debug!(
            creates = plan.creates.len(),
            updates = plan.updates.len(),
            deletes = plan.deletes.len(),
            "Planned save"
        );
        Ok(plan)
    }

    /// Persist the tree: creates, then updates, then deletes, then mark the test case.
    ///
    /// The baseline follows each successful call, so retrying after a
    /// failure only repeats the calls that did not go through.
    #[instrument(skip(self, repository), fields(test_id = %self.test_id))]
    pub async fn save(&mut self, repository: &dyn AssignmentRepository) -> Result<SavePlan, CoreError> {
        let plan = self.plan_save()?;

        for draft in &plan.creates {
            let created = repository.create(&draft.payload).await?;
            self.tree.action_mut(&draft.step_id)?.assignment_id = Some(created.id);
            self.baseline.push(created);
        }

        for update in &plan.updates {
            repository.update(update.id, &update.payload).await?;
            if let Some(stored) = self.baseline.iter_mut().find(|a| a.id == update.id) {
                stored.payload = update.payload.clone();
            }
        }

        for id in &plan.deletes {
            repository.delete(*id).await?;
            self.baseline.retain(|a| a.id != *id);
        }

        repository.mark_parameterized(self.test_id).await?;

        let order: Vec<_> = self
            .tree
            .leaf_actions()
            .iter()
            .filter_map(|step| step.assignment_id)
            .collect();
        self.baseline
            .sort_by_key(|a| order.iter().position(|id| *id == a.id).unwrap_or(usize::MAX));

        info!(
            creates = plan.creates.len(),
            updates = plan.updates.len(),
            deletes = plan.deletes.len(),
            "Saved flow"
        );
        Ok(plan)
    }

    fn refresh(&mut self) {
        self.violations = self.tree.validate(&self.catalog);
        self.refresh_previews();
        debug!(violations = self.violations.len(), steps = self.tree.len(), "Re-validated flow");
    }

    fn refresh_previews(&mut self) {
        let tree = &self.tree;
        self.expanded.retain(|id| tree.find(id).is_some());
        self.previews.clear();
        for id in &self.expanded {
            if let Some(preview) = tree
                .find(id)
                .and_then(Step::as_action)
                .and_then(|step| preview_step(step, &self.catalog))
            {
                self.previews.insert(id.clone(), preview);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::memory::MemoryAssignmentRepository;
    use pretty_assertions::assert_eq;
    use testflow_dsl::validation::error_codes;

    fn catalog() -> Catalog {
        Catalog::from_yaml_str(
            r#"
            elements:
              - { id: 5, page_id: 1, name: Login Button }
              - { id: 6, page_id: 1, name: User Field }
            actions:
              - { id: 9, name: Click, code: "click({selector})", arguments: selector }
              - { id: 10, name: Type, code: "type({selector}, {text})", arguments: "selector, text" }
              - { id: 12, name: Assert Text, code: "assert text == {expected text}", arguments: "expected text" }
            "#,
        )
        .unwrap()
    }

    fn root(index: usize) -> DropTarget {
        DropTarget::new(ContainerRef::Root, index)
    }

    #[test]
    fn test_drop_from_catalog_and_reorder() {
        let mut editor = FlowEditor::open(catalog(), TestCaseId(1), vec![]);
        let a = editor.drop(DragSource::CatalogElement(ElementId(5)), root(0)).unwrap();
        let b = editor.drop(DragSource::CatalogElement(ElementId(6)), root(1)).unwrap();

        editor
            .drop(
                DragSource::Step {
                    container: ContainerRef::Root,
                    index: 1,
                    step_id: b.clone(),
                },
                root(0),
            )
            .unwrap();

        let order: Vec<_> = editor.tree().steps().iter().map(|s| s.id().clone()).collect();
        assert_eq!(order, vec![b, a]);
        assert_eq!(editor.violations().len(), 2);
        assert!(editor.violations().iter().all(|v| v.code == error_codes::MISSING_ACTION));
    }

    #[test]
    fn test_drop_unknown_element_changes_nothing() {
        let mut editor = FlowEditor::open(catalog(), TestCaseId(1), vec![]);
        let result = editor.drop(DragSource::CatalogElement(ElementId(404)), root(0));
        assert!(matches!(result, Err(CoreError::ElementNotFound(_))));
        assert!(editor.tree().is_empty());
    }

    #[test]
    fn test_expanded_previews_follow_edits() {
        let mut editor = FlowEditor::open(catalog(), TestCaseId(1), vec![]);
        let id = editor.drop(DragSource::CatalogElement(ElementId(6)), root(0)).unwrap();
        editor.set_action(&id, Some(ActionId(10))).unwrap();
        editor.expand(&id).unwrap();
        assert_eq!(editor.preview(&id).unwrap().code, "type(, )");

        editor.set_parameter(&id, "text", "alice").unwrap();
        assert_eq!(editor.preview(&id).unwrap().code, "type(, alice)");

        editor.collapse(&id);
        assert!(editor.preview(&id).is_none());
        editor.set_parameter(&id, "selector", "#user").unwrap();
        assert!(editor.preview(&id).is_none());
    }

    #[test]
    fn test_preview_resolves_argument_with_inner_space() {
        let mut editor = FlowEditor::open(catalog(), TestCaseId(1), vec![]);
        let id = editor.drop(DragSource::CatalogElement(ElementId(6)), root(0)).unwrap();
        editor.set_action(&id, Some(ActionId(12))).unwrap();
        editor.expand(&id).unwrap();
        assert_eq!(editor.preview(&id).unwrap().unresolved, Vec::<String>::new());

        editor.set_parameter(&id, "expected text", "Welcome").unwrap();
        let preview = editor.preview(&id).unwrap();
        assert_eq!(preview.code, "assert text == Welcome");
        assert!(preview.is_complete());
        assert!(editor.is_savable());
    }

    #[test]
    fn test_expand_rejects_control_steps() {
        let mut editor = FlowEditor::open(catalog(), TestCaseId(1), vec![]);
        let cond = editor.add_condition(root(0)).unwrap();
        assert!(matches!(editor.expand(&cond), Err(CoreError::NotAnActionStep(_))));
    }

    #[test]
    fn test_plan_save_refuses_invalid_tree() {
        let mut editor = FlowEditor::open(catalog(), TestCaseId(1), vec![]);
        let l = editor.add_loop(root(0)).unwrap();
        editor.set_repeat_count(&l, 0).unwrap();
        editor.add_condition(DropTarget::new(ContainerRef::Body(l), 0)).unwrap();

        match editor.plan_save() {
            Err(CoreError::ValidationFailed(violations)) => assert_eq!(violations.len(), 2),
            other => panic!("Expected ValidationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_records_ids_and_resave_is_empty() {
        let repo = MemoryAssignmentRepository::new();
        let mut editor = FlowEditor::open(catalog(), TestCaseId(3), vec![]);
        let id = editor.drop(DragSource::CatalogElement(ElementId(5)), root(0)).unwrap();
        editor.set_action(&id, Some(ActionId(9))).unwrap();
        editor.set_parameter(&id, "selector", "#login").unwrap();

        let plan = editor.save(&repo).await.unwrap();
        assert_eq!(plan.creates.len(), 1);
        assert_eq!(repo.len(), 1);
        assert_eq!(editor.baseline().len(), 1);
        let step = editor.tree().find(&id).and_then(Step::as_action).unwrap();
        assert_eq!(step.assignment_id, Some(editor.baseline()[0].id));

        assert!(editor.plan_save().unwrap().is_empty());

        editor.delete(&ContainerRef::Root, 0).unwrap();
        let plan = editor.save(&repo).await.unwrap();
        assert_eq!(plan.deletes.len(), 1);
        assert!(repo.is_empty());
        assert!(editor.baseline().is_empty());
    }

    #[test]
    fn test_document_keeps_globals() {
        let mut editor = FlowEditor::open(catalog(), TestCaseId(1), vec![]);
        editor.set_globals(Some("base = 1".to_string()));
        editor.add_loop(root(0)).unwrap();

        let document = editor.to_document();
        let reopened = FlowEditor::from_document(catalog(), TestCaseId(1), document.clone(), vec![]);
        assert_eq!(reopened.globals(), Some("base = 1"));
        assert_eq!(reopened.to_document(), document);
    }
}
