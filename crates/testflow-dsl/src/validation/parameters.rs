use crate::catalog::Catalog;
use crate::flow::Step;
use crate::validation::{walk, ValidationError, error_codes, Validator};

/// Checks that each bound action step carries exactly the parameter keys
/// its action declares.
///
/// Steps whose action is missing or unknown are skipped; the reference
/// validator reports those.
pub struct ParameterValidator;

impl ParameterValidator {
    /// Create a new parameter validator
    pub fn new() -> Self {
        ParameterValidator
    }
}

impl Default for ParameterValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for ParameterValidator {
    fn validate(&self, steps: &[Step], catalog: &Catalog) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        walk(steps, "steps", &mut |step, path| {
            let Some(action_step) = step.as_action() else {
                return;
            };
            let Some(template) = action_step.action_ref.and_then(|id| catalog.action(id)) else {
                return;
            };

            let declared = template.argument_names();
            let missing: Vec<&str> = declared
                .iter()
                .filter(|name| !action_step.parameters.contains_key(name.as_str()))
                .map(String::as_str)
                .collect();
            let orphaned: Vec<&str> = action_step
                .parameters
                .keys()
                .filter(|key| !declared.iter().any(|name| name == *key))
                .map(String::as_str)
                .collect();

            if missing.is_empty() && orphaned.is_empty() {
                return;
            }

            let mut details = Vec::new();
            if !missing.is_empty() {
                details.push(format!("missing: {}", missing.join(", ")));
            }
            if !orphaned.is_empty() {
                details.push(format!("not declared: {}", orphaned.join(", ")));
            }

            errors.push(ValidationError {
                code: error_codes::PARAMETER_MISMATCH,
                message: format!(
                    "Parameters of step '{}' do not match action '{}' ({})",
                    action_step.id,
                    template.name,
                    details.join("; ")
                ),
                path: Some(format!("{}.parameters", path)),
            });
        });

        errors
    }
}
