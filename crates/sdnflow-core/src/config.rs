//! Forwarding core configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the forwarding core.
///
/// Every field has a serde default so a partial `[controller]` table in the
/// daemon's TOML file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Priority of unicast forwarding rules.
    #[serde(default = "default_flow_priority")]
    pub flow_priority: u16,

    /// Priority of the send-to-controller rule installed on switch join.
    #[serde(default = "default_table_miss_priority")]
    pub table_miss_priority: u16,

    /// Idle timeout of unicast rules in seconds.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u16,

    /// Hard timeout of unicast rules in seconds (0 = none).
    #[serde(default)]
    pub hard_timeout_secs: u16,

    /// How long a broadcast dedup entry stays valid, in milliseconds.
    #[serde(default = "default_dedup_ttl_ms")]
    pub dedup_ttl_ms: u64,

    /// Maximum number of broadcast dedup entries.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Answer ARP requests for known addresses instead of flooding them.
    #[serde(default = "default_true")]
    pub proxy_arp: bool,

    /// Install a table-miss rule when a switch joins.
    #[serde(default = "default_true")]
    pub install_table_miss: bool,

    /// Delete rules toward a host on every switch when it moves.
    #[serde(default = "default_true")]
    pub flush_on_host_move: bool,

    /// Delete rules forwarding over a link when the link goes down.
    #[serde(default = "default_true")]
    pub flush_on_link_down: bool,
}

fn default_flow_priority() -> u16 {
    1
}

fn default_table_miss_priority() -> u16 {
    0
}

fn default_idle_timeout_secs() -> u16 {
    30
}

fn default_dedup_ttl_ms() -> u64 {
    5_000
}

fn default_dedup_capacity() -> usize {
    4_096
}

fn default_true() -> bool {
    true
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            flow_priority: default_flow_priority(),
            table_miss_priority: default_table_miss_priority(),
            idle_timeout_secs: default_idle_timeout_secs(),
            hard_timeout_secs: 0,
            dedup_ttl_ms: default_dedup_ttl_ms(),
            dedup_capacity: default_dedup_capacity(),
            proxy_arp: true,
            install_table_miss: true,
            flush_on_host_move: true,
            flush_on_link_down: true,
        }
    }
}

impl ControllerConfig {
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_millis(self.dedup_ttl_ms)
    }

    /// Checks the values that would make the core misbehave.
    pub fn validate(&self) -> Result<(), String> {
        if self.flow_priority <= self.table_miss_priority {
            return Err(format!(
                "flow_priority ({}) must be above table_miss_priority ({})",
                self.flow_priority, self.table_miss_priority
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err("idle_timeout_secs must be > 0".to_string());
        }
        if self.dedup_capacity == 0 {
            return Err("dedup_capacity must be > 0".to_string());
        }
        Ok(())
    }
}
