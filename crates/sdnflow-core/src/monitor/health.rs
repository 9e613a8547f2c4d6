//! Event-loop health.
//!
//! The failure rate covers a sliding window of the most recent events, so a
//! burst of failures stops counting once enough healthy events follow it.

use super::metrics::{HealthStatus, MetricsCollector};
use crate::controller::EventOutcome;
use crate::forwarding::{DropReason, ForwardingDecision};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Thresholds a [`HealthMonitor`] judges against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthLimits {
    /// Quiet time after which the event loop counts as stalled.
    pub max_idle: Duration,
    /// Failed share of the window above which the status degrades.
    pub max_failure_rate: f64,
    /// Number of recent events the failure rate is taken over.
    pub window: usize,
}

impl Default for HealthLimits {
    fn default() -> Self {
        Self {
            max_idle: Duration::from_secs(60),
            max_failure_rate: 0.05,
            window: 200,
        }
    }
}

/// How one event went, as far as health is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventHealth {
    Ok,
    /// At least one switch command was rejected.
    SwitchFailure,
    /// The frame was dropped on a topology inconsistency.
    Inconsistent,
}

impl EventHealth {
    pub fn of(outcome: &EventOutcome) -> Self {
        if outcome.commands_failed > 0 {
            EventHealth::SwitchFailure
        } else if outcome.decision
            == Some(ForwardingDecision::Drop(DropReason::TopologyInconsistency))
        {
            EventHealth::Inconsistent
        } else {
            EventHealth::Ok
        }
    }

    pub fn is_failure(self) -> bool {
        self != EventHealth::Ok
    }
}

fn assess(idle: Duration, failure_rate: f64, limits: &HealthLimits) -> HealthStatus {
    if idle > limits.max_idle {
        HealthStatus::Unhealthy
    } else if failure_rate > limits.max_failure_rate {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Folds event outcomes into a [`HealthStatus`] mirrored into the metrics.
pub struct HealthMonitor {
    metrics: MetricsCollector,
    limits: HealthLimits,
    recent: VecDeque<EventHealth>,
    failures: usize,
    last_event: Instant,
    status: HealthStatus,
}

impl HealthMonitor {
    pub fn new(metrics: MetricsCollector, limits: HealthLimits) -> Self {
        let limits = HealthLimits {
            window: limits.window.max(1),
            ..limits
        };
        metrics.set_health_status(HealthStatus::Healthy);
        Self {
            metrics,
            recent: VecDeque::with_capacity(limits.window),
            limits,
            failures: 0,
            last_event: Instant::now(),
            status: HealthStatus::Healthy,
        }
    }

    pub fn observe(&mut self, outcome: &EventOutcome) -> EventHealth {
        self.observe_at(outcome, Instant::now())
    }

    /// Records `outcome` as handled at `now` and re-evaluates.
    pub fn observe_at(&mut self, outcome: &EventOutcome, now: Instant) -> EventHealth {
        let health = EventHealth::of(outcome);
        if self.recent.len() == self.limits.window {
            if let Some(oldest) = self.recent.pop_front() {
                if oldest.is_failure() {
                    self.failures -= 1;
                }
            }
        }
        if health.is_failure() {
            self.failures += 1;
        }
        self.recent.push_back(health);
        self.last_event = now;
        self.evaluate_at(now);
        health
    }

    pub fn evaluate(&mut self) -> HealthStatus {
        self.evaluate_at(Instant::now())
    }

    /// Status as of `now`. Transitions are logged and published.
    pub fn evaluate_at(&mut self, now: Instant) -> HealthStatus {
        let idle = self.idle_for(now);
        let failure_rate = self.failure_rate();
        let status = assess(idle, failure_rate, &self.limits);
        if status == self.status {
            return status;
        }

        match status {
            HealthStatus::Unhealthy => warn!(
                idle_secs = idle.as_secs(),
                limit_secs = self.limits.max_idle.as_secs(),
                "no events within the stall limit"
            ),
            HealthStatus::Degraded => warn!(
                failure_rate,
                failures = self.failures,
                window = self.recent.len(),
                "recent events failing"
            ),
            HealthStatus::Healthy => info!(previous = ?self.status, "event loop healthy"),
        }
        self.status = status;
        self.metrics.set_health_status(status);
        status
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    /// Failed share of the events currently in the window.
    pub fn failure_rate(&self) -> f64 {
        if self.recent.is_empty() {
            0.0
        } else {
            self.failures as f64 / self.recent.len() as f64
        }
    }

    pub fn window_len(&self) -> usize {
        self.recent.len()
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_event)
    }
}
