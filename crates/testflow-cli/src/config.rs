//! Configuration for the Testflow CLI
//!
//! Defaults, then an optional YAML file, then `TESTFLOW_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use testflow_core::ExecutionId;
use testflow_monitoring::MonitoringConfig;

use crate::error::{CliError, CliResult};

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestflowConfig {
    /// Base URL of the test management API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL of the execution monitor websocket
    #[serde(default = "default_monitor_ws_url")]
    pub monitor_ws_url: String,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit JSON logs on the console
    #[serde(default)]
    pub json_logs: bool,

    /// Optional rolling log file
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Capacity of the inbound monitor channel
    #[serde(default = "default_monitor_buffer")]
    pub monitor_buffer: usize,

    /// Deployment environment reported in logs (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_monitor_ws_url() -> String {
    "ws://localhost:8000/ws/execution".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_monitor_buffer() -> usize {
    64
}

fn default_environment() -> String {
    "dev".to_string()
}

impl Default for TestflowConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            monitor_ws_url: default_monitor_ws_url(),
            log_filter: default_log_filter(),
            json_logs: false,
            log_file: None,
            monitor_buffer: default_monitor_buffer(),
            environment: default_environment(),
        }
    }
}

impl TestflowConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn load() -> CliResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;

        info!("Loaded configuration");
        Ok(config)
    }

    /// Load a YAML configuration file, then apply environment overrides
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_yaml::from_str(&content)
            .map_err(|e| CliError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply `TESTFLOW_*` overrides; invalid values are logged and ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TESTFLOW_API_URL") {
            self.api_base_url = url;
        }

        if let Some(url) = lookup("TESTFLOW_MONITOR_WS_URL") {
            self.monitor_ws_url = url;
        }

        if let Some(filter) = lookup("TESTFLOW_LOG") {
            self.log_filter = filter;
        }

        if let Some(json_logs) = lookup("TESTFLOW_JSON_LOGS") {
            match json_logs.to_lowercase().as_str() {
                "true" | "1" => self.json_logs = true,
                "false" | "0" => self.json_logs = false,
                _ => warn!("Invalid TESTFLOW_JSON_LOGS value: {}", json_logs),
            }
        }

        if let Some(log_file) = lookup("TESTFLOW_LOG_FILE") {
            self.log_file = (!log_file.is_empty()).then(|| PathBuf::from(log_file));
        }

        if let Some(buffer) = lookup("TESTFLOW_MONITOR_BUFFER") {
            if let Ok(buffer) = buffer.parse::<usize>() {
                self.monitor_buffer = buffer;
            } else {
                warn!("Invalid TESTFLOW_MONITOR_BUFFER value: {}", buffer);
            }
        }

        if let Some(environment) = lookup("TESTFLOW_ENV") {
            self.environment = environment;
        }
    }

    /// Reject settings the commands cannot run with
    pub fn validate(&self) -> CliResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(CliError::ConfigError("API base URL is required".to_string()));
        }

        if self.monitor_ws_url.trim().is_empty() {
            return Err(CliError::ConfigError("Monitor websocket URL is required".to_string()));
        }

        if self.monitor_buffer == 0 {
            return Err(CliError::ConfigError(
                "Monitor buffer must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Websocket URL of one execution's event stream
    pub fn monitor_url(&self, execution_id: ExecutionId) -> String {
        format!("{}/{}", self.monitor_ws_url.trim_end_matches('/'), execution_id)
    }

    /// Logging settings for `testflow_monitoring::init`
    pub fn monitoring_config(&self) -> MonitoringConfig {
        MonitoringConfig {
            service_name: "testflow".to_string(),
            log_filter: self.log_filter.clone(),
            enable_json_logging: self.json_logs,
            log_file: self.log_file.clone(),
            environment: self.environment.clone(),
        }
    }
}
