//! The daemon's task layout.
//!
//! ```text
//!  feed reader task ──mpsc──> event loop (owns Controller + HealthMonitor)
//!                                       │
//!  stats poller task ── read lock ──────┘ (shared NetworkState)
//! ```
//!
//! Every event is applied by the single event loop, so decisions never race
//! each other. The poller only ever takes the read lock.

use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};
use crate::feed::{self, FeedStats};
use crate::logging_switch::LoggingSwitch;
use sdnflow_core::{Controller, ControllerEvent, HealthMonitor, MetricsCollector, StatsMonitor};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// How often health is re-evaluated and stale dedup entries are dropped.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// What a daemon run processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events: u64,
    pub failed: u64,
    /// Reader counters, when the feed was read to the end.
    pub feed: Option<FeedStats>,
}

pub struct Daemon {
    config: DaemonConfig,
    controller: Controller,
    switch: Arc<LoggingSwitch>,
    metrics: MetricsCollector,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Result<Self> {
        config.validate()?;
        let metrics = MetricsCollector::new()
            .map_err(|e| DaemonError::Metrics(format!("Failed to register metrics: {}", e)))?;
        let switch = Arc::new(LoggingSwitch::new());
        let controller = Controller::new(config.controller.clone(), switch.clone(), metrics.clone());

        Ok(Self {
            config,
            controller,
            switch,
            metrics,
        })
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn switch(&self) -> &LoggingSwitch {
        &self.switch
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Processes events from `reader` until the feed ends or `shutdown` is
    /// cancelled.
    #[instrument(skip_all)]
    pub async fn run<R>(&self, reader: R, shutdown: CancellationToken) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(self.config.events.queue_depth);
        let mut feed_task = tokio::spawn(feed::pump(reader, tx));
        let poller_shutdown = shutdown.child_token();
        let poller = self.spawn_stats_poller(poller_shutdown.clone());

        let mut health = HealthMonitor::new(self.metrics.clone(), self.config.health_limits());
        let mut health_tick = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            queue_depth = self.config.events.queue_depth,
            proxy_arp = self.config.controller.proxy_arp,
            "event loop started"
        );

        let mut summary = RunSummary::default();
        let feed_ended = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break false;
                }
                event = rx.recv() => match event {
                    Some(event) => {
                        summary.events += 1;
                        if !self.dispatch(event, &mut health) {
                            summary.failed += 1;
                        }
                    }
                    None => break true,
                },
                _ = health_tick.tick() => {
                    self.housekeeping(&mut health, Instant::now());
                }
            }
        };

        poller_shutdown.cancel();
        if let Some(poller) = poller {
            if let Err(e) = poller.await {
                warn!(error = %e, "stats poller task failed");
            }
        }

        if feed_ended {
            summary.feed = Some(join_feed(&mut feed_task).await?);
        } else {
            feed_task.abort();
        }

        info!(
            events = summary.events,
            failed = summary.failed,
            health = ?health.status(),
            "event loop stopped"
        );
        Ok(summary)
    }

    /// Applies one event. Returns false if it counted as a failure.
    fn dispatch(&self, event: ControllerEvent, health: &mut HealthMonitor) -> bool {
        let leaving = match &event {
            ControllerEvent::SwitchJoin { dpid, .. } => {
                self.switch.connect(*dpid);
                None
            }
            ControllerEvent::SwitchLeave { dpid } => Some(*dpid),
            _ => None,
        };

        let outcome = self.controller.handle_event(event);
        if let Some(dpid) = leaving {
            self.switch.disconnect(dpid);
        }

        !health.observe(&outcome).is_failure()
    }

    /// Periodic upkeep while the loop is idle or busy. Returns the number
    /// of dedup entries dropped.
    fn housekeeping(&self, health: &mut HealthMonitor, now: Instant) -> usize {
        let expired = self.controller.expire_stale(now);
        health.evaluate_at(now);
        expired
    }

    fn spawn_stats_poller(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.config.monitor.enabled {
            info!("stats poller disabled");
            return None;
        }
        let monitor = StatsMonitor::new(
            self.controller.state(),
            self.controller.switch(),
            self.metrics.clone(),
            self.config.stats_interval(),
        );
        Some(tokio::spawn(monitor.run(shutdown)))
    }
}

async fn join_feed(task: &mut JoinHandle<Result<FeedStats>>) -> Result<FeedStats> {
    match task.await {
        Ok(result) => result,
        Err(e) => Err(DaemonError::Io(std::io::Error::other(format!(
            "event feed task failed: {}",
            e
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sdnflow_core::{
        ArpPacket, DatapathId, Frame, HealthLimits, HealthStatus, MacAddress, PortNo,
    };
    use std::net::Ipv4Addr;
    use tokio::io::{AsyncWriteExt, BufReader};

    const TWO_SWITCH_FEED: &str = r#"
# two switches, one link, two hosts
{"event":"switch_join","dpid":1,"ports":[1,2]}
{"event":"switch_join","dpid":2,"ports":[1,2]}
{"event":"link_up","src":1,"dst":2,"src_port":2,"dst_port":1}
{"event":"frame_arrived","dpid":1,"in_port":1,"src":"00:00:00:00:00:0a","dst":"00:00:00:00:00:0b"}
{"event":"frame_arrived","dpid":2,"in_port":2,"src":"00:00:00:00:00:0b","dst":"00:00:00:00:00:0a"}
"#;

    fn test_config() -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.monitor.stats_interval_secs = 1;
        config
    }

    #[tokio::test]
    async fn test_run_replays_feed() {
        let daemon = Daemon::new(test_config()).unwrap();
        let summary = daemon
            .run(TWO_SWITCH_FEED.as_bytes(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.events, 5);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.feed.unwrap().malformed, 0);

        // Table-miss on both, plus the unicast rule toward host a on switch 2.
        assert_eq!(daemon.switch().rule_count(DatapathId::new(1)), 1);
        assert_eq!(daemon.switch().rule_count(DatapathId::new(2)), 2);

        let state = daemon.controller().state();
        let state = state.read();
        assert_eq!(
            state
                .topology
                .graph()
                .host_attachment(MacAddress::from_u64(0x0b)),
            Some((DatapathId::new(2), PortNo::new(2)))
        );
    }

    #[tokio::test]
    async fn test_switch_leave_disconnects_backend() {
        let feed = concat!(
            "{\"event\":\"switch_join\",\"dpid\":1}\n",
            "{\"event\":\"switch_leave\",\"dpid\":1}\n",
        );
        let daemon = Daemon::new(test_config()).unwrap();
        daemon
            .run(feed.as_bytes(), CancellationToken::new())
            .await
            .unwrap();
        assert!(!daemon.switch().is_connected(DatapathId::new(1)));
        assert!(daemon.controller().state().read().registry.is_empty());
    }

    #[tokio::test]
    async fn test_commands_to_unjoined_switch_count_as_failures() {
        // Link discovery alone does not connect the backend.
        let feed = concat!(
            "{\"event\":\"link_up\",\"src\":5,\"dst\":6,\"src_port\":2,\"dst_port\":1}\n",
            "{\"event\":\"frame_arrived\",\"dpid\":5,\"in_port\":1,",
            "\"src\":\"00:00:00:00:00:01\",\"dst\":\"ff:ff:ff:ff:ff:ff\"}\n",
        );
        let daemon = Daemon::new(test_config()).unwrap();
        let summary = daemon
            .run(feed.as_bytes(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.events, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(daemon.metrics().switch_errors_total.get(), 1.0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_open_feed() {
        let (mut writer, reader) = tokio::io::duplex(256);
        let daemon = Daemon::new(test_config()).unwrap();
        let shutdown = CancellationToken::new();

        writer
            .write_all(b"{\"event\":\"switch_join\",\"dpid\":1}\n")
            .await
            .unwrap();
        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let summary = daemon.run(BufReader::new(reader), shutdown).await.unwrap();
        assert_eq!(summary.events, 1);
        assert!(summary.feed.is_none());
        drop(writer);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DaemonConfig::default();
        config.events.queue_depth = 0;
        assert!(matches!(Daemon::new(config), Err(DaemonError::Config(_))));
    }

    #[tokio::test]
    async fn test_health_tracks_failures() {
        let daemon = Daemon::new(test_config()).unwrap();
        let mut health = HealthMonitor::new(daemon.metrics().clone(), HealthLimits::default());
        let event = ControllerEvent::LinkDown {
            src: DatapathId::new(1),
            dst: DatapathId::new(2),
        };
        assert!(daemon.dispatch(event, &mut health));
        assert_eq!(health.status(), HealthStatus::Healthy);

        // Switch 5 never joined the backend, so the flood out of it fails.
        let event = ControllerEvent::LinkUp {
            src: DatapathId::new(5),
            dst: DatapathId::new(6),
            src_port: PortNo::new(2),
            dst_port: PortNo::new(1),
        };
        assert!(daemon.dispatch(event, &mut health));
        let event = ControllerEvent::FrameArrived(Frame::new(
            DatapathId::new(5),
            PortNo::new(1),
            MacAddress::from_u64(1),
            MacAddress::BROADCAST,
        ));
        assert!(!daemon.dispatch(event, &mut health));
        assert_eq!(health.window_len(), 3);
        assert_eq!(health.status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_housekeeping_expires_dedup_entries() {
        let mut config = test_config();
        config.controller.dedup_ttl_ms = 1_000;
        let daemon = Daemon::new(config).unwrap();
        let mut health = HealthMonitor::new(daemon.metrics().clone(), HealthLimits::default());
        let src = MacAddress::from_u64(1);
        let request = ArpPacket::request(src, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        let events = [
            ControllerEvent::SwitchJoin {
                dpid: DatapathId::new(1),
                ports: vec![PortNo::new(3), PortNo::new(4)],
            },
            ControllerEvent::FrameArrived(
                Frame::new(DatapathId::new(1), PortNo::new(3), src, MacAddress::BROADCAST)
                    .with_arp(request),
            ),
        ];
        let start = Instant::now();
        for event in events {
            assert!(daemon.dispatch(event, &mut health));
        }

        assert_eq!(daemon.housekeeping(&mut health, start), 0);
        assert_eq!(
            daemon.housekeeping(&mut health, start + Duration::from_secs(2)),
            1
        );
        assert!(daemon.controller().state().read().dedup.is_empty());
        assert_eq!(health.status(), HealthStatus::Healthy);
    }
}
