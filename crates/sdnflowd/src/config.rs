//! Configuration file support for sdnflowd
//!
//! Loads and validates the daemon configuration from a TOML file.
//! Default location: /etc/sdnflow/sdnflowd.toml

use crate::error::{DaemonError, Result};
use sdnflow_core::{ControllerConfig, HealthLimits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sdnflow/sdnflowd.toml";

/// Stats polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Poll interval in seconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Run the stats poller at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Health check configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Maximum time without events before the daemon is unhealthy
    #[serde(default = "default_max_stall_secs")]
    pub max_stall_secs: u64,

    /// Failed-event ratio (0.0-1.0) above which the daemon is degraded
    #[serde(default = "default_max_failure_rate")]
    pub max_failure_rate: f64,

    /// Number of recent events the failure rate covers
    #[serde(default = "default_window_events")]
    pub window_events: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Capacity of the queue between the feed reader and the event loop
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

/// Complete sdnflowd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

// Default functions
fn default_stats_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_stall_secs() -> u64 {
    300
}

fn default_max_failure_rate() -> f64 {
    0.05
}

fn default_window_events() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_queue_depth() -> usize {
    1024
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval(),
            enabled: true,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_stall_secs: default_max_stall_secs(),
            max_failure_rate: default_max_failure_rate(),
            window_events: default_window_events(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file, falling back to defaults if the file
    /// does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                DaemonError::Config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(DaemonError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DaemonError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.stats_interval_secs)
    }

    pub fn max_stall(&self) -> Duration {
        Duration::from_secs(self.health.max_stall_secs)
    }

    pub fn health_limits(&self) -> HealthLimits {
        HealthLimits {
            max_idle: self.max_stall(),
            max_failure_rate: self.health.max_failure_rate,
            window: self.health.window_events,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.controller.validate().map_err(DaemonError::Config)?;

        if self.monitor.enabled && self.monitor.stats_interval_secs == 0 {
            return Err(DaemonError::Config(
                "stats_interval_secs must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.health.max_failure_rate) {
            return Err(DaemonError::Config(
                "max_failure_rate must be 0.0-1.0".to_string(),
            ));
        }

        if self.health.max_stall_secs == 0 {
            return Err(DaemonError::Config(
                "max_stall_secs must be > 0".to_string(),
            ));
        }

        if self.health.window_events == 0 {
            return Err(DaemonError::Config(
                "window_events must be > 0".to_string(),
            ));
        }

        if self.events.queue_depth == 0 {
            return Err(DaemonError::Config("queue_depth must be > 0".to_string()));
        }

        Ok(())
    }
}
