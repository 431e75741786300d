use crate::catalog::Catalog;
use crate::flow::Step;
use crate::validation::{walk, ValidationError, error_codes, Validator};

/// Validates catalog references of action steps:
/// - Every action step has a bound action
/// - Element references exist in the catalog
/// - Action references exist in the catalog
pub struct ReferenceValidator;

impl ReferenceValidator {
    /// Create a new reference validator
    pub fn new() -> Self {
        ReferenceValidator
    }
}

impl Default for ReferenceValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for ReferenceValidator {
    fn validate(&self, steps: &[Step], catalog: &Catalog) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        walk(steps, "steps", &mut |step, path| {
            let Step::Action(action) = step else {
                return;
            };

            if catalog.element(action.element_ref).is_none() {
                errors.push(ValidationError {
                    code: error_codes::UNKNOWN_ELEMENT,
                    message: format!(
                        "Element {} referenced by step '{}' not found in catalog",
                        action.element_ref, action.id
                    ),
                    path: Some(format!("{}.element_ref", path)),
                });
            }

            match action.action_ref {
                None => errors.push(ValidationError {
                    code: error_codes::MISSING_ACTION,
                    message: format!("Action step '{}' has no action selected", action.id),
                    path: Some(format!("{}.action_ref", path)),
                }),
                Some(action_id) if catalog.action(action_id).is_none() => {
                    errors.push(ValidationError {
                        code: error_codes::UNKNOWN_ACTION,
                        message: format!(
                            "Action {} referenced by step '{}' not found in catalog",
                            action_id, action.id
                        ),
                        path: Some(format!("{}.action_ref", path)),
                    })
                }
                Some(_) => {}
            }
        });

        errors
    }
}
