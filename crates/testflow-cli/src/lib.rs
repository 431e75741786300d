//!
//! Testflow CLI - validate, preview and plan composed test flows from files
//!
//! The binary is a thin wrapper over [`run`]; the commands are usable from
//! tests and other tools through [`commands`].

/// Command definitions and implementations
pub mod commands;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

use clap::Parser;
use std::path::PathBuf;

pub use commands::{Command, Outcome};
pub use config::TestflowConfig;
pub use error::{CliError, CliResult};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "testflow", version, about = "Compose, validate and monitor test flows")]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Run function
pub async fn run(command: Command, config: &TestflowConfig) -> CliResult<Outcome> {
    tracing::debug!(api_base_url = %config.api_base_url, "Running command");
    commands::execute(command, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_save_arguments() {
        let cli = Cli::try_parse_from([
            "testflow",
            "plan-save",
            "--catalog",
            "catalog.yaml",
            "--assignments",
            "stored.json",
            "--test-id",
            "3",
            "flow.yaml",
            "--config",
            "testflow.yaml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("testflow.yaml")));
        match cli.command {
            Command::PlanSave { test_id, flow, .. } => {
                assert_eq!(test_id, 3);
                assert_eq!(flow, PathBuf::from("flow.yaml"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_monitor_requires_events_file() {
        assert!(Cli::try_parse_from(["testflow", "monitor", "--execution-id", "4"]).is_err());
    }
}
