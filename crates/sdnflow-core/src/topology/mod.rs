//! Topology Store: the directed graph of switches, hosts and links.

mod store;
mod types;

pub use store::{LearnOutcome, Topology, TopologyStore};
pub use types::{Edge, Node, NodeAttributes, NodeId, NodeKind};
