//! Event dispatch and the shared network state.

use crate::config::ControllerConfig;
use crate::discovery::DiscoveryAdapter;
use crate::error::CoreError;
use crate::event::ControllerEvent;
use crate::forwarding::{
    ArpTable, BroadcastDedup, ForwardingDecision, ForwardingEngine, InstalledRules,
    MacLocationTable,
};
use crate::monitor::{EventHealth, MetricsCollector};
use crate::spanning::SpanningCache;
use crate::switch::{SwitchCommand, SwitchError, SwitchInterface};
use crate::topology::{LearnOutcome, TopologyStore};
use parking_lot::RwLock;
use sdnflow_types::DatapathId;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Everything the controller knows about the network.
///
/// One event is applied as one unit under the write lock of
/// [`SharedState`], so readers never see a half-applied event (e.g. a host
/// edge added while the old one is still in place).
#[derive(Debug)]
pub struct NetworkState {
    /// Connected switches.
    pub registry: BTreeSet<DatapathId>,
    pub topology: TopologyStore,
    pub locations: MacLocationTable,
    pub dedup: BroadcastDedup,
    pub arp: ArpTable,
    pub rules: InstalledRules,
    pub spanning: SpanningCache,
}

impl NetworkState {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            registry: BTreeSet::new(),
            topology: TopologyStore::new(),
            locations: MacLocationTable::new(),
            dedup: BroadcastDedup::new(config.dedup_capacity, config.dedup_ttl()),
            arp: ArpTable::new(),
            rules: InstalledRules::new(),
            spanning: SpanningCache::new(),
        }
    }

    /// Forgets everything, as on controller restart.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.topology.reset();
        self.locations.clear();
        self.dedup.clear();
        self.arp.clear();
        self.rules.clear();
        self.spanning.invalidate();
    }
}

/// Network state shared between the event loop and the stats poller.
pub type SharedState = Arc<RwLock<NetworkState>>;

/// What handling one event amounted to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventOutcome {
    /// Set for frame arrivals.
    pub decision: Option<ForwardingDecision>,
    pub commands_sent: usize,
    pub commands_failed: usize,
}

impl EventOutcome {
    /// True if a switch command failed or the frame hit an internal
    /// inconsistency.
    pub fn is_failure(&self) -> bool {
        EventHealth::of(self).is_failure()
    }
}

/// Single dispatch point for [`ControllerEvent`]s.
///
/// Decisions are computed under the state write lock; the resulting switch
/// commands run after it is released and are best-effort: a failure is
/// logged and counted, never retried.
pub struct Controller {
    config: ControllerConfig,
    state: SharedState,
    switch: Arc<dyn SwitchInterface>,
    metrics: MetricsCollector,
    discovery: DiscoveryAdapter,
    engine: ForwardingEngine,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        switch: Arc<dyn SwitchInterface>,
        metrics: MetricsCollector,
    ) -> Self {
        let state = Arc::new(RwLock::new(NetworkState::new(&config)));
        Self {
            discovery: DiscoveryAdapter::new(config.clone()),
            engine: ForwardingEngine::new(config.clone()),
            config,
            state,
            switch,
            metrics,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn switch(&self) -> Arc<dyn SwitchInterface> {
        Arc::clone(&self.switch)
    }

    pub fn handle_event(&self, event: ControllerEvent) -> EventOutcome {
        self.handle_event_at(event, Instant::now())
    }

    /// Handles `event` as if it arrived at `now`.
    pub fn handle_event_at(&self, event: ControllerEvent, now: Instant) -> EventOutcome {
        let started = Instant::now();
        let kind = event.kind();

        let (decision, commands) = {
            let mut state = self.state.write();
            let result = self.apply(&mut state, event, now);
            let graph = state.topology.graph();
            self.metrics
                .set_topology_size(state.registry.len(), graph.host_count(), graph.link_count());
            result
        };

        let (commands_sent, commands_failed) = self.execute(&commands);
        self.metrics
            .observe_event_latency(started.elapsed().as_secs_f64());
        debug!(
            event = kind,
            commands = commands.len(),
            failed = commands_failed,
            "event handled"
        );

        EventOutcome {
            decision,
            commands_sent,
            commands_failed,
        }
    }

    fn apply(
        &self,
        state: &mut NetworkState,
        event: ControllerEvent,
        now: Instant,
    ) -> (Option<ForwardingDecision>, Vec<SwitchCommand>) {
        match event {
            ControllerEvent::SwitchJoin { dpid, ports } => {
                (None, self.discovery.switch_join(state, dpid, &ports))
            }
            ControllerEvent::SwitchLeave { dpid } => (None, self.discovery.switch_leave(state, dpid)),
            ControllerEvent::LinkUp {
                src,
                dst,
                src_port,
                dst_port,
            } => (
                None,
                self.discovery.link_up(state, src, dst, src_port, dst_port),
            ),
            ControllerEvent::LinkDown { src, dst } => {
                (None, self.discovery.link_down(state, src, dst))
            }
            ControllerEvent::PortStatus {
                dpid,
                port,
                state: port_state,
            } => (
                None,
                self.discovery.port_status(state, dpid, port, port_state),
            ),
            ControllerEvent::FrameArrived(frame) => {
                self.metrics.frames_total.inc();
                let verdict = self.engine.handle_frame(state, &frame, now);
                if let Some(LearnOutcome::Moved { .. }) = verdict.learned {
                    self.metrics.hosts_moved_total.inc();
                }
                match &verdict.decision {
                    ForwardingDecision::Drop(reason) => self.metrics.record_drop(reason.as_str()),
                    ForwardingDecision::Flood { .. } => self.metrics.floods_total.inc(),
                    ForwardingDecision::Unicast { .. } | ForwardingDecision::ProxyArp { .. } => {}
                }
                (Some(verdict.decision), verdict.commands)
            }
        }
    }

    /// Runs commands against the switch backend. Returns (sent, failed).
    fn execute(&self, commands: &[SwitchCommand]) -> (usize, usize) {
        let mut sent = 0;
        let mut failed = 0;
        for command in commands {
            match self.switch.execute(command) {
                Ok(()) => {
                    sent += 1;
                    match command {
                        SwitchCommand::InstallRule(_) => self.metrics.rules_installed_total.inc(),
                        SwitchCommand::DeleteRule { .. } => self.metrics.rules_deleted_total.inc(),
                        SwitchCommand::SendPacket { .. } => {}
                    }
                }
                Err(SwitchError::BufferExpired { dpid, buffer_id }) => {
                    debug!(dpid = %dpid, buffer_id, "buffered frame already released");
                }
                Err(err) => {
                    let dpid = err.dpid();
                    let err = CoreError::from(err);
                    warn!(dpid = %dpid, error = %err, "switch command failed");
                    self.metrics.switch_errors_total.inc();
                    failed += 1;
                }
            }
        }
        (sent, failed)
    }

    /// Drops broadcast dedup entries whose TTL ran out by `now`. Lookups
    /// already ignore them; this only reclaims the space.
    pub fn expire_stale(&self, now: Instant) -> usize {
        let expired = self.state.write().dedup.expire(now);
        if expired > 0 {
            debug!(expired, "expired broadcast dedup entries");
        }
        expired
    }

    /// Drops all learned state.
    pub fn reset(&self) {
        self.state.write().reset();
        self.metrics.set_topology_size(0, 0, 0);
    }
}
