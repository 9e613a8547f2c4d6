//! Graph node and edge types.

use sdnflow_types::{DatapathId, MacAddress, PortNo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identity of a graph node.
///
/// Switches order before hosts, which keeps listings and spanning-tree
/// edge order stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Switch(DatapathId),
    Host(MacAddress),
}

impl NodeId {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Switch(_) => NodeKind::Switch,
            NodeId::Host(_) => NodeKind::Host,
        }
    }

    pub fn as_switch(&self) -> Option<DatapathId> {
        match self {
            NodeId::Switch(dpid) => Some(*dpid),
            NodeId::Host(_) => None,
        }
    }

    pub fn as_host(&self) -> Option<MacAddress> {
        match self {
            NodeId::Host(mac) => Some(*mac),
            NodeId::Switch(_) => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Switch(dpid) => write!(f, "switch {}", dpid),
            NodeId::Host(mac) => write!(f, "host {}", mac),
        }
    }
}

impl From<DatapathId> for NodeId {
    fn from(dpid: DatapathId) -> Self {
        NodeId::Switch(dpid)
    }
}

impl From<MacAddress> for NodeId {
    fn from(mac: MacAddress) -> Self {
        NodeId::Host(mac)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Switch,
    Host,
}

/// Free-form node attributes. Only switches populate them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// At least one host is attached to this switch.
    pub has_host: bool,
    /// Physical port inventory.
    pub ports: BTreeSet<PortNo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub attributes: NodeAttributes,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            attributes: NodeAttributes::default(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.id.kind()
    }
}

/// Directed adjacency toward `dst`, leaving the source node through `port`.
///
/// Host-to-switch edges carry the host's attachment port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub dst: NodeId,
    pub port: PortNo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches_order_before_hosts() {
        let switch = NodeId::Switch(DatapathId::new(u64::MAX));
        let host = NodeId::Host(MacAddress::from_u64(0));
        assert!(switch < host);
        assert_eq!(switch.kind(), NodeKind::Switch);
        assert_eq!(host.as_host(), Some(MacAddress::from_u64(0)));
        assert_eq!(host.as_switch(), None);
    }

    #[test]
    fn test_node_display() {
        assert_eq!(
            NodeId::from(DatapathId::new(3)).to_string(),
            "switch 0000000000000003"
        );
        assert_eq!(
            NodeId::from(MacAddress::from_u64(1)).to_string(),
            "host 00:00:00:00:00:01"
        );
    }
}
