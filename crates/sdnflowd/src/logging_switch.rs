//! Switch backend that logs commands instead of speaking a wire protocol.
//!
//! It keeps a per-switch view of the installed rules and synthesizes port
//! counters from the packets it is asked to send, so the stats poller has
//! something to report when the daemon replays a recorded feed.

use async_trait::async_trait;
use parking_lot::Mutex;
use sdnflow_core::{
    DatapathId, FlowCounters, FlowMatch, FlowRule, FrameRef, PortCounters, PortNo, SwitchError,
    SwitchInterface, SwitchStats,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Byte count charged per emitted frame. The feed carries headers only.
pub const NOMINAL_FRAME_BYTES: u64 = 64;

#[derive(Debug, Default)]
struct SwitchView {
    rules: HashMap<(u16, FlowMatch), FlowRule>,
    ports: BTreeMap<PortNo, PortCounters>,
}

impl SwitchView {
    fn port(&mut self, port: PortNo) -> &mut PortCounters {
        self.ports.entry(port).or_insert_with(|| PortCounters {
            port,
            ..PortCounters::default()
        })
    }
}

/// [`SwitchInterface`] that logs every command.
///
/// Only switches announced with [`connect`](Self::connect) accept
/// commands; anything else fails with [`SwitchError::Unreachable`].
#[derive(Debug, Default)]
pub struct LoggingSwitch {
    switches: Mutex<BTreeMap<DatapathId, SwitchView>>,
}

impl LoggingSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, dpid: DatapathId) {
        self.switches.lock().entry(dpid).or_default();
    }

    /// Forgets the switch along with its rules and counters.
    pub fn disconnect(&self, dpid: DatapathId) {
        self.switches.lock().remove(&dpid);
    }

    pub fn is_connected(&self, dpid: DatapathId) -> bool {
        self.switches.lock().contains_key(&dpid)
    }

    pub fn rule_count(&self, dpid: DatapathId) -> usize {
        self.switches
            .lock()
            .get(&dpid)
            .map_or(0, |view| view.rules.len())
    }

    fn with_switch<T>(
        &self,
        dpid: DatapathId,
        f: impl FnOnce(&mut SwitchView) -> T,
    ) -> Result<T, SwitchError> {
        let mut switches = self.switches.lock();
        let view = switches
            .get_mut(&dpid)
            .ok_or(SwitchError::Unreachable(dpid))?;
        Ok(f(view))
    }
}

#[async_trait]
impl SwitchInterface for LoggingSwitch {
    fn install_rule(&self, rule: &FlowRule) -> Result<(), SwitchError> {
        self.with_switch(rule.dpid, |view| {
            view.rules
                .insert((rule.priority, rule.matcher), rule.clone());
        })?;
        info!(
            dpid = %rule.dpid,
            priority = rule.priority,
            matcher = %rule.matcher,
            actions = ?rule.actions,
            idle_timeout = rule.idle_timeout,
            "install rule"
        );
        Ok(())
    }

    fn delete_rule(&self, dpid: DatapathId, filter: &FlowMatch) -> Result<(), SwitchError> {
        let removed = self.with_switch(dpid, |view| {
            let before = view.rules.len();
            view.rules.retain(|(_, matcher), _| !filter.covers(matcher));
            before - view.rules.len()
        })?;
        info!(dpid = %dpid, filter = %filter, removed, "delete rules");
        Ok(())
    }

    fn send_packet(
        &self,
        dpid: DatapathId,
        frame: &FrameRef,
        in_port: Option<PortNo>,
        out_ports: &[PortNo],
    ) -> Result<(), SwitchError> {
        self.with_switch(dpid, |view| {
            if let Some(port) = in_port {
                let counters = view.port(port);
                counters.rx_packets += 1;
                counters.rx_bytes += NOMINAL_FRAME_BYTES;
            }
            for port in out_ports {
                let counters = view.port(*port);
                counters.tx_packets += 1;
                counters.tx_bytes += NOMINAL_FRAME_BYTES;
            }
        })?;
        debug!(dpid = %dpid, frame = ?frame, out_ports = ?out_ports, "packet out");
        Ok(())
    }

    async fn request_stats(&self, dpid: DatapathId) -> Result<SwitchStats, SwitchError> {
        self.with_switch(dpid, |view| {
            let mut flows: Vec<FlowCounters> = view
                .rules
                .values()
                .map(|rule| FlowCounters {
                    priority: rule.priority,
                    matcher: rule.matcher,
                    packet_count: 0,
                    byte_count: 0,
                })
                .collect();
            flows.sort_by_key(|flow| std::cmp::Reverse(flow.priority));
            SwitchStats {
                flows,
                ports: view.ports.values().cloned().collect(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sdnflow_core::{FlowAction, MacAddress};

    fn rule(dpid: DatapathId, dst: u64) -> FlowRule {
        FlowRule {
            dpid,
            priority: 1,
            matcher: FlowMatch::unicast(PortNo::new(1), MacAddress::from_u64(dst)),
            actions: vec![FlowAction::Output(PortNo::new(2))],
            idle_timeout: 30,
            hard_timeout: 0,
        }
    }

    #[test]
    fn test_unknown_switch_is_unreachable() {
        let switch = LoggingSwitch::new();
        let dpid = DatapathId::new(9);
        assert_eq!(
            switch.install_rule(&rule(dpid, 1)),
            Err(SwitchError::Unreachable(dpid))
        );
    }

    #[test]
    fn test_delete_by_destination() {
        let switch = LoggingSwitch::new();
        let dpid = DatapathId::new(1);
        switch.connect(dpid);
        switch.install_rule(&rule(dpid, 1)).unwrap();
        switch.install_rule(&rule(dpid, 2)).unwrap();
        // Same key overwrites.
        switch.install_rule(&rule(dpid, 2)).unwrap();
        assert_eq!(switch.rule_count(dpid), 2);

        switch
            .delete_rule(dpid, &FlowMatch::to_dst(MacAddress::from_u64(1)))
            .unwrap();
        assert_eq!(switch.rule_count(dpid), 1);
    }

    #[test]
    fn test_disconnect_drops_state() {
        let switch = LoggingSwitch::new();
        let dpid = DatapathId::new(1);
        switch.connect(dpid);
        switch.install_rule(&rule(dpid, 1)).unwrap();
        switch.disconnect(dpid);
        assert!(!switch.is_connected(dpid));
        switch.connect(dpid);
        assert_eq!(switch.rule_count(dpid), 0);
    }

    #[tokio::test]
    async fn test_packets_feed_port_counters() {
        let switch = LoggingSwitch::new();
        let dpid = DatapathId::new(1);
        switch.connect(dpid);
        switch
            .send_packet(
                dpid,
                &FrameRef::Buffered(7),
                Some(PortNo::new(1)),
                &[PortNo::new(2), PortNo::new(3)],
            )
            .unwrap();

        let stats = switch.request_stats(dpid).await.unwrap();
        let tx: Vec<(PortNo, u64)> = stats.ports.iter().map(|p| (p.port, p.tx_bytes)).collect();
        assert_eq!(
            tx,
            vec![
                (PortNo::new(1), 0),
                (PortNo::new(2), NOMINAL_FRAME_BYTES),
                (PortNo::new(3), NOMINAL_FRAME_BYTES),
            ]
        );
        assert_eq!(stats.ports[0].rx_packets, 1);
    }
}
