use std::collections::HashSet;
use crate::catalog::Catalog;
use crate::flow::Step;
use crate::types::StepId;
use crate::validation::{walk, ValidationError, error_codes, Validator};

/// Validates control-flow fields and step id uniqueness
pub struct StructureValidator {
    // Could hold configuration if needed
}

impl StructureValidator {
    /// Create a new structure validator
    pub fn new() -> Self {
        StructureValidator {}
    }

    /// Conditions must be non-empty and loops must repeat at least once
    fn validate_control_fields(&self, steps: &[Step]) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        walk(steps, "steps", &mut |step, path| match step {
            Step::If(s) if s.condition.trim().is_empty() => {
                errors.push(ValidationError {
                    code: error_codes::EMPTY_CONDITION,
                    message: format!("Conditional step '{}' has an empty condition", s.id),
                    path: Some(path.to_string()),
                });
            }
            Step::Loop(s) if s.repeat_count < 1 => {
                errors.push(ValidationError {
                    code: error_codes::INVALID_REPEAT_COUNT,
                    message: format!(
                        "Loop step '{}' must repeat at least once (got {})",
                        s.id, s.repeat_count
                    ),
                    path: Some(path.to_string()),
                });
            }
            _ => {}
        });

        errors
    }

    /// Validate that every step id in the tree is unique
    ///
    /// Trees built through the editor never alias steps; this catches
    /// hand-written or corrupted documents.
    fn validate_unique_step_ids(&self, steps: &[Step]) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut step_ids: HashSet<&StepId> = HashSet::new();
        let mut reported: HashSet<&StepId> = HashSet::new();

        walk(steps, "steps", &mut |step, path| {
            let id = step.id();
            if !step_ids.insert(id) && reported.insert(id) {
                errors.push(ValidationError {
                    code: error_codes::DUPLICATE_ID,
                    message: format!("Duplicate step ID: '{}' - step IDs must be unique within a flow", id),
                    path: Some(path.to_string()),
                });
            }
        });

        errors
    }
}

impl Default for StructureValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for StructureValidator {
    fn validate(&self, steps: &[Step], _catalog: &Catalog) -> Vec<ValidationError> {
        let mut errors = self.validate_control_fields(steps);
        errors.extend(self.validate_unique_step_ids(steps));
        errors
    }
}
