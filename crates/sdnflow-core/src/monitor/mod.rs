//! Stats/Health Monitor.
//!
//! Observation only: nothing here installs or deletes rules.

mod health;
mod metrics;
mod stats;

pub use health::{EventHealth, HealthLimits, HealthMonitor};
pub use metrics::{HealthStatus, MetricsCollector};
pub use stats::{PortRate, StatsMonitor};
