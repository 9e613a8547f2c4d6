//! Discovery Adapter: switch, link and port events onto topology mutations.
//!
//! Every handler mutates [`NetworkState`] and returns the cleanup commands
//! the mutation calls for. Executing them is the caller's job.

use crate::config::ControllerConfig;
use crate::controller::NetworkState;
use crate::switch::{FlowAction, FlowMatch, FlowRule, SwitchCommand};
use sdnflow_types::{DatapathId, MacAddress, PortNo, PortState};
use tracing::{debug, info, warn};

/// Applies discovery events to the network state.
#[derive(Debug, Clone)]
pub struct DiscoveryAdapter {
    config: ControllerConfig,
}

impl DiscoveryAdapter {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    /// Registers the switch and installs its table-miss rule.
    pub fn switch_join(
        &self,
        state: &mut NetworkState,
        dpid: DatapathId,
        ports: &[PortNo],
    ) -> Vec<SwitchCommand> {
        let reconnect = !state.registry.insert(dpid);
        state.topology.add_switch(dpid);
        state.topology.add_ports(dpid, ports);
        info!(dpid = %dpid, ports = ports.len(), reconnect, "switch joined");

        if !self.config.install_table_miss {
            return Vec::new();
        }
        vec![SwitchCommand::InstallRule(FlowRule {
            dpid,
            priority: self.config.table_miss_priority,
            matcher: FlowMatch::any(),
            actions: vec![FlowAction::Output(PortNo::CONTROLLER)],
            idle_timeout: 0,
            hard_timeout: 0,
        })]
    }

    /// Removes the switch and everything learned through it. On the
    /// remaining switches this flushes rules toward its hosts and, unless
    /// disabled, rules that forwarded toward it.
    pub fn switch_leave(&self, state: &mut NetworkState, dpid: DatapathId) -> Vec<SwitchCommand> {
        let peers = state.topology.graph().peer_ports(dpid);
        state.registry.remove(&dpid);
        let hosts = state.topology.remove_switch(dpid);
        state.locations.remove_switch(dpid);
        state.rules.remove_switch(dpid);
        state.dedup.purge_switch(dpid);
        info!(dpid = %dpid, hosts = hosts.len(), peers = peers.len(), "switch left");

        let mut commands = Vec::new();
        if self.config.flush_on_link_down {
            let stale: Vec<FlowRule> = peers
                .into_iter()
                .flat_map(|(peer, port)| state.rules.take_by_output(peer, port))
                .collect();
            if !stale.is_empty() {
                info!(dpid = %dpid, rules = stale.len(), "flushing rules toward departed switch");
            }
            commands.extend(stale.into_iter().map(Self::delete_rule));
        }
        for mac in hosts {
            commands.extend(Self::forget_host(state, mac));
        }
        commands
    }

    /// Installs the link. Hosts learned on either link port were transit
    /// sightings and are forgotten.
    pub fn link_up(
        &self,
        state: &mut NetworkState,
        src: DatapathId,
        dst: DatapathId,
        src_port: PortNo,
        dst_port: PortNo,
    ) -> Vec<SwitchCommand> {
        if src == dst {
            debug!(dpid = %src, "ignoring self link");
            return Vec::new();
        }

        let graph = state.topology.graph();
        let mut stale_hosts = graph.hosts_at(src, src_port);
        stale_hosts.extend(graph.hosts_at(dst, dst_port));

        let mut commands = Vec::new();
        for mac in stale_hosts {
            info!(mac = %mac, src = %src, dst = %dst, "host edge replaced by link");
            commands.extend(Self::forget_host(state, mac));
        }
        state.topology.upsert_link(src, dst, src_port, dst_port);
        commands
    }

    /// Removes the link and flushes rules that forwarded over it.
    pub fn link_down(
        &self,
        state: &mut NetworkState,
        src: DatapathId,
        dst: DatapathId,
    ) -> Vec<SwitchCommand> {
        let graph = state.topology.graph();
        let src_port = graph.edge_port(&src.into(), &dst.into());
        let dst_port = graph.edge_port(&dst.into(), &src.into());
        if !state.topology.remove_link(src, dst) || !self.config.flush_on_link_down {
            return Vec::new();
        }

        let mut stale = Vec::new();
        if let Some(port) = src_port {
            stale.extend(state.rules.take_by_output(src, port));
        }
        if let Some(port) = dst_port {
            stale.extend(state.rules.take_by_output(dst, port));
        }
        if !stale.is_empty() {
            info!(src = %src, dst = %dst, rules = stale.len(), "flushing rules over removed link");
        }
        stale.into_iter().map(Self::delete_rule).collect()
    }

    pub fn port_status(
        &self,
        state: &mut NetworkState,
        dpid: DatapathId,
        port: PortNo,
        status: PortState,
    ) -> Vec<SwitchCommand> {
        if let Err(err) = state.topology.graph().require_switch(dpid) {
            warn!(port = %port, state = %status, error = %err, "ignoring port status");
            return Vec::new();
        }
        if !status.is_down() {
            if state.topology.add_port(dpid, port) {
                debug!(dpid = %dpid, port = %port, state = %status, "port added");
            }
            return Vec::new();
        }

        info!(dpid = %dpid, port = %port, state = %status, "port down");
        let mut commands = Vec::new();
        for mac in Self::hosts_behind(state, dpid, port) {
            commands.extend(Self::forget_host(state, mac));
        }
        if status == PortState::Deleted {
            state.topology.remove_port(dpid, port);
        }
        commands
    }

    /// Hosts attached at `(dpid, port)`: location-table candidates confirmed
    /// by the topology, plus any host edge the cache missed.
    fn hosts_behind(state: &NetworkState, dpid: DatapathId, port: PortNo) -> Vec<MacAddress> {
        let graph = state.topology.graph();
        let mut hosts: Vec<MacAddress> = state
            .locations
            .macs_at(dpid, port)
            .into_iter()
            .filter(|mac| graph.host_attachment(*mac) == Some((dpid, port)))
            .collect();
        for mac in graph.hosts_at(dpid, port) {
            if !hosts.contains(&mac) {
                hosts.push(mac);
            }
        }
        hosts
    }

    fn delete_rule(rule: FlowRule) -> SwitchCommand {
        SwitchCommand::DeleteRule {
            dpid: rule.dpid,
            filter: rule.matcher,
        }
    }

    /// Drops a host from every table and deletes rules toward it on every
    /// connected switch.
    fn forget_host(state: &mut NetworkState, mac: MacAddress) -> Vec<SwitchCommand> {
        state.topology.remove_host(mac);
        state.locations.purge_mac(mac);
        state.arp.remove_mac(mac);
        state.rules.remove_dst(mac);
        state
            .registry
            .iter()
            .map(|dpid| SwitchCommand::delete_dst(*dpid, mac))
            .collect()
    }
}
