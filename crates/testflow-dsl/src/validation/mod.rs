use std::fmt;
use std::error::Error;
use crate::catalog::Catalog;
use crate::flow::{FlowDocument, Step};
use crate::error::DslError;

mod parameters;
mod reference;
mod structure;

pub use parameters::ParameterValidator;
pub use reference::ReferenceValidator;
pub use structure::StructureValidator;

/// Represents a single problem that prevents a flow from being saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Error code (should be a constant identifier)
    pub code: &'static str,

    /// Human-readable error message
    pub message: String,

    /// Optional path to the offending step (e.g., "steps[0].then[2]")
    pub path: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl Error for ValidationError {}

/// Validation error codes
pub mod error_codes {
    /// Action step without a bound action
    pub const MISSING_ACTION: &str = "ERR_DSL_VALIDATION_MISSING_ACTION";

    /// Element reference not present in the catalog
    pub const UNKNOWN_ELEMENT: &str = "ERR_DSL_VALIDATION_UNKNOWN_ELEMENT";

    /// Action reference not present in the catalog
    pub const UNKNOWN_ACTION: &str = "ERR_DSL_VALIDATION_UNKNOWN_ACTION";

    /// Conditional with an empty condition
    pub const EMPTY_CONDITION: &str = "ERR_DSL_VALIDATION_EMPTY_CONDITION";

    /// Loop with a repeat count below one
    pub const INVALID_REPEAT_COUNT: &str = "ERR_DSL_VALIDATION_INVALID_REPEAT_COUNT";

    /// Parameter keys differ from the action's declared arguments
    pub const PARAMETER_MISMATCH: &str = "ERR_DSL_VALIDATION_PARAMETER_MISMATCH";

    /// Duplicate step ID found
    pub const DUPLICATE_ID: &str = "ERR_DSL_VALIDATION_DUPLICATE_ID";
}

/// A trait for validators that check specific aspects of a step tree
pub trait Validator {
    /// Validate the tree and return a list of validation errors (if any)
    fn validate(&self, steps: &[Step], catalog: &Catalog) -> Vec<ValidationError>;
}

/// Visit every step with its path, depth-first
pub(crate) fn walk<'a, F>(steps: &'a [Step], path: &str, visit: &mut F)
where
    F: FnMut(&'a Step, &str),
{
    for (idx, step) in steps.iter().enumerate() {
        let step_path = format!("{}[{}]", path, idx);
        visit(step, &step_path);
        match step {
            Step::Action(_) => {}
            Step::If(s) => {
                walk_container(&s.then_branch, &step_path, "then", visit);
                walk_container(&s.else_branch, &step_path, "else", visit);
            }
            Step::Loop(s) => walk_container(&s.body, &step_path, "body", visit),
        }
    }
}

fn walk_container<'a, F>(steps: &'a [Step], parent: &str, container: &str, visit: &mut F)
where
    F: FnMut(&'a Step, &str),
{
    let base = format!("{}.{}", parent, container);
    walk(steps, &base, visit);
}

/// Check a whole tree against the save-time rules.
///
/// Every validator runs and all violations are returned together; an empty
/// list means the tree may be saved.
pub fn validate_for_save(steps: &[Step], catalog: &Catalog) -> Vec<ValidationError> {
    let validators: Vec<Box<dyn Validator>> = vec![
        Box::new(StructureValidator::new()),
        Box::new(ReferenceValidator::new()),
        Box::new(ParameterValidator::new()),
    ];

    let mut errors = Vec::new();

    for validator in validators {
        errors.extend(validator.validate(steps, catalog));
    }

    tracing::debug!(violations = errors.len(), "Validated step tree");

    errors
}

/// Validate a parsed flow document
pub fn validate_document(document: &FlowDocument, catalog: &Catalog) -> Result<(), DslError> {
    let errors = validate_for_save(&document.steps, catalog);

    if !errors.is_empty() {
        return Err(DslError::from_validation_errors(errors));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_visits_nested_paths() {
        let mut outer = Step::new_if();
        if let Step::If(s) = &mut outer {
            s.else_branch.push(Step::new_loop());
        }
        let steps = vec![outer];

        let mut seen = Vec::new();
        walk(&steps, "steps", &mut |_, path| seen.push(path.to_string()));
        assert_eq!(seen, vec!["steps[0]", "steps[0].else[0]"]);
    }
}
