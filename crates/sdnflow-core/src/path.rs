//! Path Resolver: fewest-hop paths over the directed topology graph.

use crate::error::{CoreError, Result};
use crate::topology::{NodeId, Topology};
use sdnflow_types::{DatapathId, PortNo};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Ordered node sequence from source to destination, both included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path(Vec<NodeId>);

impl Path {
    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Node following `dpid` on the path.
    pub fn next_hop(&self, dpid: DatapathId) -> Result<NodeId> {
        let current = NodeId::Switch(dpid);
        let position = self
            .0
            .iter()
            .position(|node| *node == current)
            .ok_or_else(|| CoreError::inconsistency(dpid, format!("switch not on path {}", self)))?;
        self.0
            .get(position + 1)
            .copied()
            .ok_or_else(|| CoreError::inconsistency(dpid, format!("switch ends path {}", self)))
    }

    /// Port on which `dpid` must emit traffic following this path.
    pub fn egress_port(&self, topology: &Topology, dpid: DatapathId) -> Result<PortNo> {
        let next = self.next_hop(dpid)?;
        topology
            .edge_port(&NodeId::Switch(dpid), &next)
            .ok_or_else(|| CoreError::inconsistency(dpid, format!("no edge toward {}", next)))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", node)?;
        }
        write!(f, "]")
    }
}

/// Breadth-first search from `src` to `dst`.
///
/// Returns `None` when either endpoint is absent or no path exists. Ties
/// go to the edge enumerated first in adjacency order.
pub fn resolve(topology: &Topology, src: NodeId, dst: NodeId) -> Option<Path> {
    if !topology.contains(&src) || !topology.contains(&dst) {
        return None;
    }
    if src == dst {
        return Some(Path(vec![src]));
    }

    let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
    let mut queue = VecDeque::from([src]);
    parent.insert(src, src);

    while let Some(node) = queue.pop_front() {
        for edge in topology.edges_from(&node) {
            if parent.contains_key(&edge.dst) {
                continue;
            }
            parent.insert(edge.dst, node);
            if edge.dst == dst {
                return Some(Path(unwind(&parent, src, dst)));
            }
            queue.push_back(edge.dst);
        }
    }
    None
}

fn unwind(parent: &HashMap<NodeId, NodeId>, src: NodeId, dst: NodeId) -> Vec<NodeId> {
    let mut nodes = vec![dst];
    let mut cursor = dst;
    while cursor != src {
        match parent.get(&cursor) {
            Some(prev) => {
                cursor = *prev;
                nodes.push(cursor);
            }
            None => break,
        }
    }
    nodes.reverse();
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sdnflow_types::MacAddress;

    fn sw(id: u64) -> NodeId {
        NodeId::Switch(DatapathId::new(id))
    }

    fn host(n: u64) -> NodeId {
        NodeId::Host(MacAddress::from_u64(n))
    }

    fn line() -> Topology {
        let mut topo = Topology::new();
        topo.upsert_link(DatapathId::new(1), DatapathId::new(2), PortNo::new(2), PortNo::new(1));
        topo.upsert_link(DatapathId::new(2), DatapathId::new(3), PortNo::new(2), PortNo::new(1));
        topo.learn_host(DatapathId::new(1), MacAddress::from_u64(1), PortNo::new(1));
        topo.learn_host(DatapathId::new(3), MacAddress::from_u64(2), PortNo::new(2));
        topo
    }

    #[test]
    fn test_line_shortest_path() {
        let topo = line();
        let path = resolve(&topo, host(1), host(2)).unwrap();
        assert_eq!(path.nodes(), &[host(1), sw(1), sw(2), sw(3), host(2)]);
        assert_eq!(path.hops(), 4);
    }

    #[test]
    fn test_egress_ports_along_path() {
        let topo = line();
        let path = resolve(&topo, host(1), host(2)).unwrap();
        assert_eq!(path.egress_port(&topo, DatapathId::new(1)).unwrap(), PortNo::new(2));
        assert_eq!(path.egress_port(&topo, DatapathId::new(2)).unwrap(), PortNo::new(2));
        assert_eq!(path.egress_port(&topo, DatapathId::new(3)).unwrap(), PortNo::new(2));

        let back = resolve(&topo, host(2), host(1)).unwrap();
        assert_eq!(back.egress_port(&topo, DatapathId::new(2)).unwrap(), PortNo::new(1));
        assert_eq!(back.egress_port(&topo, DatapathId::new(1)).unwrap(), PortNo::new(1));
    }

    #[test]
    fn test_switch_off_path_is_inconsistency() {
        let mut topo = line();
        topo.add_switch(DatapathId::new(9));
        let path = resolve(&topo, host(1), host(2)).unwrap();
        let err = path.next_hop(DatapathId::new(9)).unwrap_err();
        assert!(matches!(err, CoreError::TopologyInconsistency { .. }));
    }

    #[test]
    fn test_missing_endpoint() {
        let topo = line();
        assert_eq!(resolve(&topo, host(1), host(7)), None);
        assert_eq!(resolve(&topo, host(7), host(1)), None);
    }

    #[test]
    fn test_disconnected() {
        let mut topo = line();
        topo.remove_link(DatapathId::new(2), DatapathId::new(3));
        assert_eq!(resolve(&topo, host(1), host(2)), None);
        assert!(resolve(&topo, host(1), sw(2)).is_some());
    }

    #[test]
    fn test_tie_break_follows_adjacency_order() {
        let mut topo = Topology::new();
        // 1 -> {3, 2} -> 4: both paths have two hops.
        topo.upsert_link(DatapathId::new(1), DatapathId::new(3), PortNo::new(1), PortNo::new(1));
        topo.upsert_link(DatapathId::new(1), DatapathId::new(2), PortNo::new(2), PortNo::new(1));
        topo.upsert_link(DatapathId::new(2), DatapathId::new(4), PortNo::new(2), PortNo::new(1));
        topo.upsert_link(DatapathId::new(3), DatapathId::new(4), PortNo::new(2), PortNo::new(2));
        let path = resolve(&topo, sw(1), sw(4)).unwrap();
        assert_eq!(path.nodes(), &[sw(1), sw(3), sw(4)]);
    }
}
