use testflow_dsl::ValidationError;
use thiserror::Error;

/// Core error type for step editing, saving and execution monitoring
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No step with the given id exists in the tree
    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// The addressed container does not exist
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// The addressed container does not exist on that kind of step
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// Position outside the container's valid range
    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    /// A move that would break the tree structure
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// A step id that is already present in the tree
    #[error("Duplicate step: {0}")]
    DuplicateStep(String),

    /// Element not present in the catalog
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Action template not present in the catalog
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// Parameter edit on a step with no action selected
    #[error("Action not bound: {0}")]
    ActionNotBound(String),

    /// Parameter key not declared by the bound action
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Action-only operation applied to a conditional or loop
    #[error("Not an action step: {0}")]
    NotAnActionStep(String),

    /// Operation applied to a step of the wrong kind
    #[error("Wrong step kind: {0}")]
    WrongStepKind(String),

    /// Save refused because the tree has violations
    #[error("Validation failed with {} violation(s)", .0.len())]
    ValidationFailed(Vec<ValidationError>),

    /// Backend persistence failure
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Execution command could not be delivered
    #[error("Command error: {0}")]
    CommandError(String),

    /// No monitor channel is open for the execution
    #[error("Monitor not found: {0}")]
    MonitorNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use testflow_dsl::validation::error_codes;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (CoreError::StepNotFound("s1".to_string()), "Step not found: s1"),
            (CoreError::InvalidContainer("then of loop".to_string()), "Invalid container: then of loop"),
            (CoreError::IndexOutOfRange("4 > 3".to_string()), "Index out of range: 4 > 3"),
            (CoreError::UnknownParameter("text".to_string()), "Unknown parameter: text"),
            (CoreError::PersistenceError("503".to_string()), "Persistence error: 503"),
            (CoreError::MonitorNotFound("7".to_string()), "Monitor not found: 7"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_validation_failed_counts_violations() {
        let error = CoreError::ValidationFailed(vec![ValidationError {
            code: error_codes::EMPTY_CONDITION,
            message: "empty".to_string(),
            path: None,
        }]);
        assert_eq!(error.to_string(), "Validation failed with 1 violation(s)");
    }
}
