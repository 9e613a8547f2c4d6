//! Periodic switch counter polling.

use super::metrics::MetricsCollector;
use crate::controller::SharedState;
use crate::switch::{SwitchInterface, SwitchStats};
use sdnflow_types::{DatapathId, PortNo};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bandwidth sample for one port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortRate {
    pub dpid: DatapathId,
    pub port: PortNo,
    pub tx_bps: f64,
    pub rx_bps: f64,
}

#[derive(Debug, Clone, Copy)]
struct ByteSample {
    tx_bytes: u64,
    rx_bytes: u64,
    at: Instant,
}

/// Polls every connected switch for counters on a fixed interval and turns
/// consecutive byte counters into per-port bit rates.
pub struct StatsMonitor {
    state: SharedState,
    switch: Arc<dyn SwitchInterface>,
    metrics: MetricsCollector,
    interval: Duration,
    previous: HashMap<(DatapathId, PortNo), ByteSample>,
}

impl StatsMonitor {
    pub fn new(
        state: SharedState,
        switch: Arc<dyn SwitchInterface>,
        metrics: MetricsCollector,
        interval: Duration,
    ) -> Self {
        Self {
            state,
            switch,
            metrics,
            interval,
            previous: HashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "stats monitor started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once(Instant::now()).await;
                }
            }
        }
        info!("stats monitor stopped");
    }

    /// Runs one polling round at `now` and returns the rates it could
    /// derive. The first round only records baselines.
    pub async fn poll_once(&mut self, now: Instant) -> Vec<PortRate> {
        let switches: Vec<DatapathId> = self.state.read().registry.iter().copied().collect();
        self.previous.retain(|(dpid, _), _| switches.contains(dpid));

        let mut rates = Vec::new();
        for dpid in switches {
            match self.switch.request_stats(dpid).await {
                Ok(stats) => rates.extend(self.ingest(dpid, &stats, now)),
                Err(err) => {
                    warn!(dpid = %dpid, error = %err, "stats request failed");
                    self.metrics.switch_errors_total.inc();
                }
            }
        }
        rates
    }

    fn ingest(&mut self, dpid: DatapathId, stats: &SwitchStats, now: Instant) -> Vec<PortRate> {
        let mut rates = Vec::new();
        for counters in &stats.ports {
            let key = (dpid, counters.port);
            let sample = ByteSample {
                tx_bytes: counters.tx_bytes,
                rx_bytes: counters.rx_bytes,
                at: now,
            };
            let Some(prev) = self.previous.insert(key, sample) else {
                continue;
            };

            let elapsed = now.saturating_duration_since(prev.at).as_secs_f64();
            if elapsed <= 0.0 {
                continue;
            }
            // A counter going backwards means the switch reset it.
            let (Some(tx_delta), Some(rx_delta)) = (
                counters.tx_bytes.checked_sub(prev.tx_bytes),
                counters.rx_bytes.checked_sub(prev.rx_bytes),
            ) else {
                debug!(dpid = %dpid, port = %counters.port, "port counters reset");
                continue;
            };

            let rate = PortRate {
                dpid,
                port: counters.port,
                tx_bps: tx_delta as f64 * 8.0 / elapsed,
                rx_bps: rx_delta as f64 * 8.0 / elapsed,
            };
            self.metrics
                .set_port_rate(dpid, rate.port, rate.tx_bps, rate.rx_bps);
            debug!(
                dpid = %dpid,
                port = %rate.port,
                tx_bps = rate.tx_bps,
                rx_bps = rate.rx_bps,
                "port bandwidth"
            );
            rates.push(rate);
        }
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::controller::NetworkState;
    use crate::switch::{FlowMatch, FlowRule, FrameRef, PortCounters, SwitchError};
    use async_trait::async_trait;
    use parking_lot::{Mutex, RwLock};

    /// Switch whose tx counters grow by a fixed step per request.
    struct CountingSwitch {
        step: u64,
        tx: Mutex<u64>,
        fail: bool,
    }

    #[async_trait]
    impl SwitchInterface for CountingSwitch {
        fn install_rule(&self, _rule: &FlowRule) -> Result<(), SwitchError> {
            panic!("stats monitor must not install rules");
        }

        fn delete_rule(&self, _dpid: DatapathId, _filter: &FlowMatch) -> Result<(), SwitchError> {
            panic!("stats monitor must not delete rules");
        }

        fn send_packet(
            &self,
            _dpid: DatapathId,
            _frame: &FrameRef,
            _in_port: Option<PortNo>,
            _out_ports: &[PortNo],
        ) -> Result<(), SwitchError> {
            panic!("stats monitor must not send packets");
        }

        async fn request_stats(&self, dpid: DatapathId) -> Result<SwitchStats, SwitchError> {
            if self.fail {
                return Err(SwitchError::Unreachable(dpid));
            }
            let mut tx = self.tx.lock();
            *tx += self.step;
            Ok(SwitchStats {
                flows: vec![],
                ports: vec![PortCounters {
                    port: PortNo::new(1),
                    tx_bytes: *tx,
                    ..PortCounters::default()
                }],
            })
        }
    }

    fn shared_state_with(dpid: DatapathId) -> SharedState {
        let mut state = NetworkState::new(&ControllerConfig::default());
        state.registry.insert(dpid);
        Arc::new(RwLock::new(state))
    }

    #[tokio::test]
    async fn test_bandwidth_from_deltas() {
        let dpid = DatapathId::new(1);
        let metrics = MetricsCollector::new().unwrap();
        let switch = Arc::new(CountingSwitch {
            step: 1_000,
            tx: Mutex::new(0),
            fail: false,
        });
        let mut monitor = StatsMonitor::new(
            shared_state_with(dpid),
            switch,
            metrics.clone(),
            Duration::from_secs(5),
        );

        let start = Instant::now();
        assert!(monitor.poll_once(start).await.is_empty());

        let rates = monitor.poll_once(start + Duration::from_secs(2)).await;
        assert_eq!(
            rates,
            vec![PortRate {
                dpid,
                port: PortNo::new(1),
                tx_bps: 4_000.0,
                rx_bps: 0.0,
            }]
        );
        assert_eq!(
            metrics
                .port_tx_bps
                .with_label_values(&["0000000000000001", "1"])
                .get(),
            4_000.0
        );
    }

    #[tokio::test]
    async fn test_counter_reset_yields_no_sample() {
        let dpid = DatapathId::new(1);
        let switch = Arc::new(CountingSwitch {
            step: 1_000,
            tx: Mutex::new(0),
            fail: false,
        });
        let mut monitor = StatsMonitor::new(
            shared_state_with(dpid),
            switch.clone(),
            MetricsCollector::new().unwrap(),
            Duration::from_secs(5),
        );
        let start = Instant::now();
        monitor.poll_once(start).await;
        assert_eq!(monitor.poll_once(start + Duration::from_secs(1)).await.len(), 1);

        // Counter restarts: 1000 after a baseline of 2000.
        *switch.tx.lock() = 0;
        let rates = monitor.poll_once(start + Duration::from_secs(2)).await;
        assert!(rates.is_empty());

        // The post-reset reading becomes the new baseline.
        let rates = monitor.poll_once(start + Duration::from_secs(3)).await;
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].tx_bps, 8_000.0);
    }

    #[tokio::test]
    async fn test_failed_request_counts_error() {
        let metrics = MetricsCollector::new().unwrap();
        let switch = Arc::new(CountingSwitch {
            step: 1,
            tx: Mutex::new(0),
            fail: true,
        });
        let mut monitor = StatsMonitor::new(
            shared_state_with(DatapathId::new(7)),
            switch,
            metrics.clone(),
            Duration::from_secs(5),
        );
        assert!(monitor.poll_once(Instant::now()).await.is_empty());
        assert_eq!(metrics.switch_errors_total.get(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let switch = Arc::new(CountingSwitch {
            step: 1,
            tx: Mutex::new(0),
            fail: false,
        });
        let monitor = StatsMonitor::new(
            shared_state_with(DatapathId::new(1)),
            switch.clone(),
            MetricsCollector::new().unwrap(),
            Duration::from_secs(5),
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(11)).await;
        shutdown.cancel();
        handle.await.unwrap();
        // Ticks at 0s, 5s and 10s.
        assert_eq!(*switch.tx.lock(), 3);
    }
}
