//! sdnflow controller daemon
//!
//! Reads discovery and frame events as newline-delimited JSON, hands them
//! to the forwarding core one at a time and polls switch counters in the
//! background.

pub mod config;
pub mod daemon;
pub mod error;
pub mod feed;
pub mod logging_switch;

pub use config::{DaemonConfig, EventsConfig, HealthConfig, LoggingConfig, MonitorConfig};
pub use daemon::{Daemon, RunSummary};
pub use error::{DaemonError, Result};
pub use feed::FeedStats;
pub use logging_switch::LoggingSwitch;
