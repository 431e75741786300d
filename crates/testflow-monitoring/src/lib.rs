//! Monitoring for the Testflow tools.
//!
//! Installs the process-wide `tracing` subscriber and provides small metric
//! helpers that report editor and monitor activity as structured events.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_test_tracing, LogExt};
pub use metrics::{EditorMetrics, MonitorMetrics};

/// Configuration for initializing the monitoring system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Log level filter (e.g., "info,testflow_core=debug"), used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Emit JSON lines instead of the pretty format on stdout
    pub enable_json_logging: bool,
    /// Optional log file, rotated daily and always written as JSON
    pub log_file: Option<PathBuf>,
    /// Environment (dev, staging, prod)
    pub environment: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "testflow".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
            log_file: None,
            environment: "dev".to_string(),
        }
    }
}

/// Initialize monitoring system
///
/// Fails when a global subscriber is already installed.
pub fn init(config: MonitoringConfig) -> anyhow::Result<()> {
    logging::init_logging(&config)?;

    info!(
        service_name = %config.service_name,
        environment = %config.environment,
        "Monitoring initialized"
    );

    Ok(())
}

/// Shutdown the monitoring system
pub fn shutdown() {
    info!("Shutting down monitoring system");
}
