//! Graph storage and the copy-on-write store wrapper.

use super::types::{Edge, Node, NodeId, NodeKind};
use crate::error::{CoreError, Result};
use sdnflow_types::{DatapathId, MacAddress, PortNo};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of [`Topology::learn_host`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    /// First sighting; the host node and both edges were created.
    Created,
    /// The host was attached elsewhere and has been moved.
    Moved {
        from_dpid: DatapathId,
        from_port: PortNo,
    },
    /// The host was already attached at this location.
    Refreshed,
}

/// Directed graph of switches and hosts.
///
/// Adjacency lists keep insertion order, which is the tie-break for path
/// resolution. `generation` changes whenever the switch-only subgraph
/// changes, so derived views (the spanning tree) can be cached against it.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: BTreeMap<NodeId, Node>,
    adjacency: BTreeMap<NodeId, Vec<Edge>>,
    generation: u64,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_switch(&self, dpid: DatapathId) -> bool {
        self.contains(&NodeId::Switch(dpid))
    }

    pub fn contains_host(&self, mac: MacAddress) -> bool {
        self.contains(&NodeId::Host(mac))
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// The switch node for `dpid`, or [`CoreError::UnknownSwitch`].
    pub fn require_switch(&self, dpid: DatapathId) -> Result<&Node> {
        self.nodes
            .get(&NodeId::Switch(dpid))
            .ok_or(CoreError::UnknownSwitch(dpid))
    }

    pub fn switches(&self) -> impl Iterator<Item = DatapathId> + '_ {
        self.nodes.keys().filter_map(NodeId::as_switch)
    }

    pub fn hosts(&self) -> impl Iterator<Item = MacAddress> + '_ {
        self.nodes.keys().filter_map(NodeId::as_host)
    }

    pub fn switch_count(&self) -> usize {
        self.switches().count()
    }

    pub fn host_count(&self) -> usize {
        self.hosts().count()
    }

    /// Outgoing edges of `id`, in insertion order.
    pub fn edges_from(&self, id: &NodeId) -> &[Edge] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Egress port on `src` of the edge `src -> dst`.
    pub fn edge_port(&self, src: &NodeId, dst: &NodeId) -> Option<PortNo> {
        self.edges_from(src)
            .iter()
            .find(|edge| edge.dst == *dst)
            .map(|edge| edge.port)
    }

    /// Where `mac` is currently attached.
    pub fn host_attachment(&self, mac: MacAddress) -> Option<(DatapathId, PortNo)> {
        self.edges_from(&NodeId::Host(mac))
            .iter()
            .find_map(|edge| edge.dst.as_switch().map(|dpid| (dpid, edge.port)))
    }

    /// Hosts attached to `dpid` through `port`.
    pub fn hosts_at(&self, dpid: DatapathId, port: PortNo) -> Vec<MacAddress> {
        self.edges_from(&NodeId::Switch(dpid))
            .iter()
            .filter(|edge| edge.port == port)
            .filter_map(|edge| edge.dst.as_host())
            .collect()
    }

    /// Switch-facing neighbors of `dpid` with the local egress port.
    pub fn switch_neighbors(&self, dpid: DatapathId) -> impl Iterator<Item = (DatapathId, PortNo)> + '_ {
        self.edges_from(&NodeId::Switch(dpid))
            .iter()
            .filter_map(|edge| edge.dst.as_switch().map(|peer| (peer, edge.port)))
    }

    /// Ports of `dpid` that face an attached host.
    pub fn host_ports(&self, dpid: DatapathId) -> BTreeSet<PortNo> {
        self.edges_from(&NodeId::Switch(dpid))
            .iter()
            .filter(|edge| edge.dst.kind() == NodeKind::Host)
            .map(|edge| edge.port)
            .collect()
    }

    /// Neighbors of `dpid` with their own egress port toward `dpid`.
    pub fn peer_ports(&self, dpid: DatapathId) -> Vec<(DatapathId, PortNo)> {
        let id = NodeId::Switch(dpid);
        self.switch_neighbors(dpid)
            .filter_map(|(peer, _)| {
                self.edge_port(&NodeId::Switch(peer), &id)
                    .map(|port| (peer, port))
            })
            .collect()
    }

    /// True if `port` on `dpid` carries a switch-to-switch link.
    pub fn is_link_port(&self, dpid: DatapathId, port: PortNo) -> bool {
        self.switch_neighbors(dpid).any(|(_, p)| p == port)
    }

    /// Physical port inventory of `dpid`.
    pub fn ports(&self, dpid: DatapathId) -> Option<&BTreeSet<PortNo>> {
        self.nodes
            .get(&NodeId::Switch(dpid))
            .map(|node| &node.attributes.ports)
    }

    /// Undirected switch links as `(a, a_port, b, b_port)` with `a < b`.
    pub fn switch_links(&self) -> Vec<(DatapathId, PortNo, DatapathId, PortNo)> {
        let mut links = Vec::new();
        for a in self.switches() {
            for (b, a_port) in self.switch_neighbors(a) {
                if a >= b {
                    continue;
                }
                if let Some(b_port) = self.edge_port(&NodeId::Switch(b), &NodeId::Switch(a)) {
                    links.push((a, a_port, b, b_port));
                }
            }
        }
        links
    }

    pub fn link_count(&self) -> usize {
        self.switch_links().len()
    }

    /// Adds a switch node. Returns false if it was already present.
    pub fn add_switch(&mut self, dpid: DatapathId) -> bool {
        let id = NodeId::Switch(dpid);
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(id, Node::new(id));
        self.adjacency.entry(id).or_default();
        self.generation += 1;
        true
    }

    /// Removes a switch, every edge touching it, and the hosts attached to
    /// it. Neighbor ports that faced it leave their inventories. Returns the
    /// removed hosts.
    pub fn remove_switch(&mut self, dpid: DatapathId) -> Vec<MacAddress> {
        let id = NodeId::Switch(dpid);
        if !self.nodes.contains_key(&id) {
            return Vec::new();
        }
        let peers = self.peer_ports(dpid);
        self.nodes.remove(&id);

        let hosts: Vec<MacAddress> = self
            .adjacency
            .remove(&id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|edge| edge.dst.as_host())
            .collect();
        for mac in &hosts {
            let host = NodeId::Host(*mac);
            self.nodes.remove(&host);
            self.adjacency.remove(&host);
        }
        for edges in self.adjacency.values_mut() {
            edges.retain(|edge| edge.dst != id);
        }
        for (peer, port) in peers {
            self.release_port(peer, port);
        }
        self.generation += 1;
        hosts
    }

    /// Installs or refreshes both directions of a switch link.
    ///
    /// Missing switches are created. Re-discovery updates ports in place.
    pub fn upsert_link(&mut self, src: DatapathId, dst: DatapathId, src_port: PortNo, dst_port: PortNo) {
        self.add_switch(src);
        self.add_switch(dst);
        let a = NodeId::Switch(src);
        let b = NodeId::Switch(dst);
        let changed = self.set_edge(a, b, src_port) | self.set_edge(b, a, dst_port);
        self.add_port(src, src_port);
        self.add_port(dst, dst_port);
        if changed {
            self.generation += 1;
        }
    }

    /// Removes both directions of a switch link and drops the link ports
    /// from both inventories. Returns false if neither direction existed.
    pub fn remove_link(&mut self, src: DatapathId, dst: DatapathId) -> bool {
        let a = NodeId::Switch(src);
        let b = NodeId::Switch(dst);
        let src_port = self.edge_port(&a, &b);
        let dst_port = self.edge_port(&b, &a);
        let removed = self.remove_edge(&a, &b) | self.remove_edge(&b, &a);
        if !removed {
            return false;
        }
        if let Some(port) = src_port {
            self.release_port(src, port);
        }
        if let Some(port) = dst_port {
            self.release_port(dst, port);
        }
        self.generation += 1;
        true
    }

    /// Records `mac` as attached at `(dpid, port)`, creating or moving it.
    pub fn learn_host(&mut self, dpid: DatapathId, mac: MacAddress, port: PortNo) -> LearnOutcome {
        self.add_switch(dpid);
        self.add_port(dpid, port);
        let host = NodeId::Host(mac);
        let switch = NodeId::Switch(dpid);

        let outcome = match self.host_attachment(mac) {
            Some((old_dpid, old_port)) if old_dpid == dpid && old_port == port => {
                return LearnOutcome::Refreshed;
            }
            Some((old_dpid, old_port)) => {
                self.remove_edge(&NodeId::Switch(old_dpid), &host);
                self.refresh_has_host(old_dpid);
                LearnOutcome::Moved {
                    from_dpid: old_dpid,
                    from_port: old_port,
                }
            }
            None => {
                self.nodes.insert(host, Node::new(host));
                LearnOutcome::Created
            }
        };

        self.adjacency.insert(host, vec![Edge { dst: switch, port }]);
        self.set_edge(switch, host, port);
        self.refresh_has_host(dpid);
        outcome
    }

    /// Removes a host and its edges. Returns where it was attached.
    pub fn remove_host(&mut self, mac: MacAddress) -> Option<(DatapathId, PortNo)> {
        let host = NodeId::Host(mac);
        let attachment = self.host_attachment(mac);
        self.nodes.remove(&host)?;
        self.adjacency.remove(&host);
        if let Some((dpid, _)) = attachment {
            self.remove_edge(&NodeId::Switch(dpid), &host);
            self.refresh_has_host(dpid);
        }
        attachment
    }

    /// Adds `port` to the inventory of a known switch. Reserved ports are
    /// ignored.
    pub fn add_port(&mut self, dpid: DatapathId, port: PortNo) -> bool {
        if port.is_reserved() {
            return false;
        }
        match self.nodes.get_mut(&NodeId::Switch(dpid)) {
            Some(node) => node.attributes.ports.insert(port),
            None => false,
        }
    }

    pub fn remove_port(&mut self, dpid: DatapathId, port: PortNo) -> bool {
        match self.nodes.get_mut(&NodeId::Switch(dpid)) {
            Some(node) => node.attributes.ports.remove(&port),
            None => false,
        }
    }

    /// Drops a former link port from the inventory. A port still carrying
    /// a host or another link stays. It comes back on the next port-up or
    /// host sighting.
    fn release_port(&mut self, dpid: DatapathId, port: PortNo) {
        if self.is_link_port(dpid, port) || !self.hosts_at(dpid, port).is_empty() {
            return;
        }
        self.remove_port(dpid, port);
    }

    fn set_edge(&mut self, src: NodeId, dst: NodeId, port: PortNo) -> bool {
        let edges = self.adjacency.entry(src).or_default();
        match edges.iter_mut().find(|edge| edge.dst == dst) {
            Some(edge) if edge.port == port => false,
            Some(edge) => {
                edge.port = port;
                true
            }
            None => {
                edges.push(Edge { dst, port });
                true
            }
        }
    }

    fn remove_edge(&mut self, src: &NodeId, dst: &NodeId) -> bool {
        match self.adjacency.get_mut(src) {
            Some(edges) => {
                let before = edges.len();
                edges.retain(|edge| edge.dst != *dst);
                edges.len() != before
            }
            None => false,
        }
    }

    fn refresh_has_host(&mut self, dpid: DatapathId) {
        let has_host = !self.host_ports(dpid).is_empty();
        if let Some(node) = self.nodes.get_mut(&NodeId::Switch(dpid)) {
            node.attributes.has_host = has_host;
        }
    }
}

/// Owner of the live topology.
///
/// Mutations go through [`Arc::make_mut`], so a [`snapshot`](Self::snapshot)
/// taken before a mutation keeps seeing the old graph while the store moves
/// on. Callers hold the store behind the controller's state lock; the
/// snapshot is what read-only algorithms run against.
#[derive(Debug, Clone, Default)]
pub struct TopologyStore {
    graph: Arc<Topology>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable view of the current graph.
    pub fn snapshot(&self) -> Arc<Topology> {
        Arc::clone(&self.graph)
    }

    pub fn graph(&self) -> &Topology {
        &self.graph
    }

    /// Drops every node and edge. The generation keeps increasing so cached
    /// views never match a reset graph.
    pub fn reset(&mut self) {
        let generation = self.graph.generation() + 1;
        self.graph = Arc::new(Topology {
            generation,
            ..Topology::default()
        });
    }

    pub fn add_switch(&mut self, dpid: DatapathId) -> bool {
        let added = Arc::make_mut(&mut self.graph).add_switch(dpid);
        if added {
            info!(dpid = %dpid, "switch added to topology");
        }
        added
    }

    pub fn add_ports(&mut self, dpid: DatapathId, ports: &[PortNo]) {
        let graph = Arc::make_mut(&mut self.graph);
        for port in ports {
            graph.add_port(dpid, *port);
        }
    }

    pub fn add_port(&mut self, dpid: DatapathId, port: PortNo) -> bool {
        Arc::make_mut(&mut self.graph).add_port(dpid, port)
    }

    pub fn remove_port(&mut self, dpid: DatapathId, port: PortNo) -> bool {
        Arc::make_mut(&mut self.graph).remove_port(dpid, port)
    }

    pub fn remove_switch(&mut self, dpid: DatapathId) -> Vec<MacAddress> {
        if !self.graph.contains_switch(dpid) {
            return Vec::new();
        }
        let hosts = Arc::make_mut(&mut self.graph).remove_switch(dpid);
        info!(dpid = %dpid, hosts = hosts.len(), "switch removed from topology");
        hosts
    }

    pub fn upsert_link(&mut self, src: DatapathId, dst: DatapathId, src_port: PortNo, dst_port: PortNo) {
        let before = self.graph.generation();
        Arc::make_mut(&mut self.graph).upsert_link(src, dst, src_port, dst_port);
        if self.graph.generation() != before {
            info!(
                src = %src,
                dst = %dst,
                src_port = %src_port,
                dst_port = %dst_port,
                "link up"
            );
        }
    }

    pub fn remove_link(&mut self, src: DatapathId, dst: DatapathId) -> bool {
        let removed = Arc::make_mut(&mut self.graph).remove_link(src, dst);
        if removed {
            info!(src = %src, dst = %dst, "link down");
        } else {
            debug!(src = %src, dst = %dst, "link down for unknown link");
        }
        removed
    }

    pub fn learn_host(&mut self, dpid: DatapathId, mac: MacAddress, port: PortNo) -> LearnOutcome {
        let outcome = Arc::make_mut(&mut self.graph).learn_host(dpid, mac, port);
        match outcome {
            LearnOutcome::Created => {
                info!(mac = %mac, dpid = %dpid, port = %port, "host learned");
            }
            LearnOutcome::Moved { from_dpid, from_port } => {
                info!(
                    mac = %mac,
                    from_dpid = %from_dpid,
                    from_port = %from_port,
                    dpid = %dpid,
                    port = %port,
                    "host moved"
                );
            }
            LearnOutcome::Refreshed => {}
        }
        outcome
    }

    pub fn remove_host(&mut self, mac: MacAddress) -> Option<(DatapathId, PortNo)> {
        if !self.graph.contains_host(mac) {
            return None;
        }
        let attachment = Arc::make_mut(&mut self.graph).remove_host(mac);
        info!(mac = %mac, "host removed from topology");
        attachment
    }
}
