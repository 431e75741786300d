use thiserror::Error;
use crate::validation::ValidationError;
use std::fmt;

/// All possible errors that can occur while loading or checking flow documents
#[derive(Error, Debug)]
pub enum DslError {
    /// Errors that occur during YAML parsing
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Errors that occur during JSON processing
    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A single validation error
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    /// Multiple validation errors
    #[error("{}", MultipleErrorsFormat(.0))]
    MultipleValidationErrors(Vec<ValidationError>),

    /// Unsupported document version
    #[error("Unsupported DSL version: {0}")]
    UnsupportedVersion(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

// Helper struct to format multiple errors
struct MultipleErrorsFormat<'a>(&'a [ValidationError]);

impl fmt::Display for MultipleErrorsFormat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiple validation errors ({} issues):", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, err)?;
        }
        Ok(())
    }
}

impl DslError {
    /// Create a DslError from a vector of validation errors
    pub fn from_validation_errors(errors: Vec<ValidationError>) -> Self {
        let mut errors = errors;
        match errors.len() {
            0 => DslError::InternalError("Called from_validation_errors with empty vector".to_string()),
            1 => match errors.pop() {
                Some(err) => DslError::ValidationError(err),
                None => DslError::InternalError("Validation error vanished".to_string()),
            },
            _ => DslError::MultipleValidationErrors(errors),
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DslError::YamlError(_) => "ERR_DSL_YAML_PARSE",
            DslError::JsonError(_) => "ERR_DSL_JSON_PARSE",
            DslError::ValidationError(err) => err.code,
            DslError::MultipleValidationErrors(_) => "ERR_DSL_VALIDATION_MULTIPLE",
            DslError::UnsupportedVersion(_) => "ERR_DSL_UNSUPPORTED_VERSION",
            DslError::InternalError(_) => "ERR_DSL_INTERNAL",
        }
    }

    /// All validation errors carried by this error, if any
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        match self {
            DslError::ValidationError(err) => vec![err.clone()],
            DslError::MultipleValidationErrors(errs) => errs.clone(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::error_codes;

    fn violation(code: &'static str) -> ValidationError {
        ValidationError {
            code,
            message: "bad".to_string(),
            path: None,
        }
    }

    #[test]
    fn test_single_error_is_unwrapped() {
        let err = DslError::from_validation_errors(vec![violation(error_codes::EMPTY_CONDITION)]);
        assert_eq!(err.error_code(), error_codes::EMPTY_CONDITION);
        assert_eq!(err.validation_errors().len(), 1);
    }

    #[test]
    fn test_multiple_errors_are_listed() {
        let err = DslError::from_validation_errors(vec![
            violation(error_codes::EMPTY_CONDITION),
            violation(error_codes::INVALID_REPEAT_COUNT),
        ]);
        assert_eq!(err.error_code(), "ERR_DSL_VALIDATION_MULTIPLE");
        let rendered = err.to_string();
        assert!(rendered.contains("2 issues"));
        assert!(rendered.contains("1. "));
        assert!(rendered.contains("2. "));
    }

    #[test]
    fn test_empty_vector_is_internal() {
        let err = DslError::from_validation_errors(Vec::new());
        assert_eq!(err.error_code(), "ERR_DSL_INTERNAL");
    }
}
