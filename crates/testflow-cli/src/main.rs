use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use testflow_cli::{Cli, TestflowConfig};
use testflow_monitoring::LogExt;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TestflowConfig::from_file(path),
        None => TestflowConfig::load(),
    }
    .context("Failed to load configuration")?;

    testflow_monitoring::init(config.monitoring_config())
        .context("Failed to initialize monitoring")?;

    let outcome = testflow_cli::run(cli.command, &config)
        .await
        .log_err("Command failed")
        .context("Command failed")?;
    println!("{}", outcome.output);

    testflow_monitoring::shutdown();
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
