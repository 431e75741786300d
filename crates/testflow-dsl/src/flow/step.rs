use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::{ActionTemplate, Catalog};
use crate::types::{ActionId, AssignmentId, ElementId, StepId};

/// Parameter values of an action step, keyed by argument name
pub type ParameterMap = IndexMap<String, String>;

/// One node of a composed test flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Runs an action template against an element
    Action(ActionStep),

    /// Conditional with then/else branches
    If(IfStep),

    /// Repeats its body a fixed number of times
    Loop(LoopStep),
}

/// Discriminant of a [`Step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Action step
    Action,
    /// Conditional step
    If,
    /// Loop step
    Loop,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Action => write!(f, "action"),
            StepKind::If => write!(f, "if"),
            StepKind::Loop => write!(f, "loop"),
        }
    }
}

/// An element bound to an (optional) action and its parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStep {
    /// Step identifier
    #[serde(default = "StepId::generate")]
    pub id: StepId,

    /// Element the action operates on
    pub element_ref: ElementId,

    /// Bound action template; `None` while not yet configured
    #[serde(default)]
    pub action_ref: Option<ActionId>,

    /// Parameter values keyed by the bound action's argument names
    #[serde(default)]
    pub parameters: ParameterMap,

    /// Persisted assignment this step was loaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<AssignmentId>,
}

/// A conditional step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfStep {
    /// Step identifier
    #[serde(default = "StepId::generate")]
    pub id: StepId,

    /// Free-text boolean expression evaluated by the executor
    #[serde(default)]
    pub condition: String,

    /// Steps run when the condition holds
    #[serde(default)]
    pub then_branch: Vec<Step>,

    /// Steps run otherwise
    #[serde(default)]
    pub else_branch: Vec<Step>,
}

/// A counted loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStep {
    /// Step identifier
    #[serde(default = "StepId::generate")]
    pub id: StepId,

    /// Number of repetitions; values below 1 are only valid while editing
    #[serde(default = "default_repeat_count")]
    pub repeat_count: i64,

    /// Steps repeated on every iteration
    #[serde(default)]
    pub body: Vec<Step>,
}

fn default_repeat_count() -> i64 {
    1
}

impl ActionStep {
    /// Reset the parameter map to exactly the template's argument names
    pub fn bind(&mut self, action: Option<&ActionTemplate>) {
        self.action_ref = action.map(|a| a.id);
        self.parameters = match action {
            Some(action) => action
                .argument_names()
                .into_iter()
                .map(|name| (name, String::new()))
                .collect(),
            None => ParameterMap::new(),
        };
    }
}

impl Step {
    /// A fresh, unconfigured action step for `element`
    pub fn new_action(element: ElementId) -> Self {
        Step::Action(ActionStep {
            id: StepId::generate(),
            element_ref: element,
            action_ref: None,
            parameters: ParameterMap::new(),
            assignment_id: None,
        })
    }

    /// A fresh conditional with an empty condition and empty branches
    pub fn new_if() -> Self {
        Step::If(IfStep {
            id: StepId::generate(),
            condition: String::new(),
            then_branch: Vec::new(),
            else_branch: Vec::new(),
        })
    }

    /// A fresh loop repeating once with an empty body
    pub fn new_loop() -> Self {
        Step::Loop(LoopStep {
            id: StepId::generate(),
            repeat_count: default_repeat_count(),
            body: Vec::new(),
        })
    }

    /// The step's identifier
    pub fn id(&self) -> &StepId {
        match self {
            Step::Action(s) => &s.id,
            Step::If(s) => &s.id,
            Step::Loop(s) => &s.id,
        }
    }

    /// The step's kind
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Action(_) => StepKind::Action,
            Step::If(_) => StepKind::If,
            Step::Loop(_) => StepKind::Loop,
        }
    }

    /// Borrow as an action step
    pub fn as_action(&self) -> Option<&ActionStep> {
        match self {
            Step::Action(s) => Some(s),
            _ => None,
        }
    }

    /// Mutably borrow as an action step
    pub fn as_action_mut(&mut self) -> Option<&mut ActionStep> {
        match self {
            Step::Action(s) => Some(s),
            _ => None,
        }
    }

    /// Direct children in depth-first order (then before else)
    pub fn children(&self) -> impl Iterator<Item = &Step> {
        let (first, second): (&[Step], &[Step]) = match self {
            Step::Action(_) => (&[], &[]),
            Step::If(s) => (&s.then_branch, &s.else_branch),
            Step::Loop(s) => (&s.body, &[]),
        };
        first.iter().chain(second.iter())
    }

    /// Whether `id` names this step or one of its descendants
    pub fn contains(&self, id: &StepId) -> bool {
        self.id() == id || self.children().any(|child| child.contains(id))
    }

    /// Number of steps in this subtree, including this one
    pub fn subtree_len(&self) -> usize {
        1 + self.children().map(Step::subtree_len).sum::<usize>()
    }

    /// Short label for nested step lists
    pub fn display_label(&self, catalog: &Catalog) -> String {
        match self {
            Step::Action(s) => catalog
                .element(s.element_ref)
                .map(|e| e.name.clone())
                .unwrap_or_default(),
            Step::If(s) => format!("IF ({})", s.condition),
            Step::Loop(s) => format!("LOOP x{}", s.repeat_count),
        }
    }
}

/// All action steps under `steps`, depth-first.
///
/// Root order is kept; a conditional contributes its then-branch before its
/// else-branch and a loop its body.
pub fn leaf_actions(steps: &[Step]) -> Vec<&ActionStep> {
    let mut out = Vec::new();
    collect_actions(steps, &mut out);
    out
}

fn collect_actions<'a>(steps: &'a [Step], out: &mut Vec<&'a ActionStep>) {
    for step in steps {
        match step {
            Step::Action(action) => out.push(action),
            Step::If(s) => {
                collect_actions(&s.then_branch, out);
                collect_actions(&s.else_branch, out);
            }
            Step::Loop(s) => collect_actions(&s.body, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Element;
    use crate::types::PageId;
    use pretty_assertions::assert_eq;

    fn action_step(id: &str, element: i64) -> Step {
        Step::Action(ActionStep {
            id: StepId::from(id),
            element_ref: ElementId(element),
            action_ref: None,
            parameters: ParameterMap::new(),
            assignment_id: None,
        })
    }

    #[test]
    fn test_bind_resets_parameters() {
        let mut step = ActionStep {
            id: StepId::from("a"),
            element_ref: ElementId(1),
            action_ref: Some(ActionId(1)),
            parameters: [("old".to_string(), "x".to_string())].into_iter().collect(),
            assignment_id: None,
        };
        let template = ActionTemplate {
            id: ActionId(2),
            name: "Type".to_string(),
            action_type: String::new(),
            code: "type({selector}, {text})".to_string(),
            arguments: Some("selector,text".to_string()),
        };

        step.bind(Some(&template));
        assert_eq!(step.action_ref, Some(ActionId(2)));
        assert_eq!(step.parameters.keys().collect::<Vec<_>>(), vec!["selector", "text"]);
        assert!(step.parameters.values().all(String::is_empty));

        step.bind(None);
        assert_eq!(step.action_ref, None);
        assert!(step.parameters.is_empty());
    }

    #[test]
    fn test_leaf_actions_depth_first() {
        let tree = vec![
            action_step("a", 1),
            Step::If(IfStep {
                id: StepId::from("if"),
                condition: "x".to_string(),
                then_branch: vec![action_step("b", 2)],
                else_branch: vec![Step::Loop(LoopStep {
                    id: StepId::from("loop"),
                    repeat_count: 2,
                    body: vec![action_step("c", 3)],
                })],
            }),
            action_step("d", 4),
        ];

        let ids: Vec<_> = leaf_actions(&tree).iter().map(|a| a.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert!(tree[1].contains(&StepId::from("c")));
        assert!(!tree[1].contains(&StepId::from("d")));
        assert_eq!(tree[1].subtree_len(), 4);
    }

    #[test]
    fn test_serialized_shape_is_tagged() {
        let step = Step::new_loop();
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["kind"], "loop");
        assert_eq!(value["repeat_count"], 1);

        let parsed: Step = serde_json::from_str(r#"{"kind": "action", "element_ref": 5}"#).unwrap();
        let action = parsed.as_action().unwrap();
        assert_eq!(action.element_ref, ElementId(5));
        assert_eq!(action.action_ref, None);
        assert!(!action.id.0.is_empty());
    }

    #[test]
    fn test_display_labels() {
        let catalog = Catalog::new(
            vec![],
            vec![Element {
                id: ElementId(5),
                page_id: PageId(1),
                name: "Login Button".to_string(),
                element_type: String::new(),
                strategy: String::new(),
                value: String::new(),
                description: None,
            }],
            vec![],
        );
        assert_eq!(action_step("a", 5).display_label(&catalog), "Login Button");
        assert_eq!(action_step("a", 6).display_label(&catalog), "");
        assert_eq!(Step::new_if().display_label(&catalog), "IF ()");
        assert_eq!(Step::new_loop().display_label(&catalog), "LOOP x1");
    }
}
