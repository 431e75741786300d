//! Error types for the Testflow CLI

use std::path::PathBuf;
use thiserror::Error;

use testflow_core::CoreError;
use testflow_dsl::DslError;

/// CLI error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input file could not be read
    #[error("Failed to read {path}: {source}")]
    ReadError {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Flow document or catalog error
    #[error(transparent)]
    Dsl(#[from] DslError),

    /// Editor or monitor error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invalid command input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Output or input serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::SerializationError(format!("YAML error: {}", err))
    }
}
