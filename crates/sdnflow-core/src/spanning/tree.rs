//! Kruskal spanning tree over the switch graph.

use crate::topology::Topology;
use sdnflow_types::{DatapathId, PortNo};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Disjoint-set forest with path halving and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merges the sets of `a` and `b`. Returns false if already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Loop-free subset of switch links covering every switch.
///
/// On a disconnected switch graph this is a spanning forest: one tree per
/// component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanningTree {
    generation: u64,
    /// Tree links as `(a, b)` with `a < b`.
    links: BTreeSet<(DatapathId, DatapathId)>,
    tree_ports: BTreeMap<DatapathId, BTreeSet<PortNo>>,
    blocked_ports: BTreeMap<DatapathId, BTreeSet<PortNo>>,
}

impl SpanningTree {
    /// Runs Kruskal over the undirected switch links of `topology`.
    ///
    /// All links weigh 1 and are considered in `(min dpid, max dpid)` order,
    /// so identical inputs always yield the same tree.
    pub fn compute(topology: &Topology) -> Self {
        let index: HashMap<DatapathId, usize> = topology
            .switches()
            .enumerate()
            .map(|(i, dpid)| (dpid, i))
            .collect();

        let mut candidates = topology.switch_links();
        candidates.sort_by_key(|(a, _, b, _)| (*a, *b));

        let mut sets = UnionFind::new(index.len());
        let mut links = BTreeSet::new();
        for (a, _, b, _) in &candidates {
            let (Some(&ia), Some(&ib)) = (index.get(a), index.get(b)) else {
                continue;
            };
            if sets.union(ia, ib) {
                links.insert((*a, *b));
            }
        }

        let mut tree_ports: BTreeMap<DatapathId, BTreeSet<PortNo>> = BTreeMap::new();
        let mut blocked_ports: BTreeMap<DatapathId, BTreeSet<PortNo>> = BTreeMap::new();
        for dpid in topology.switches() {
            for (peer, port) in topology.switch_neighbors(dpid) {
                let key = if dpid < peer { (dpid, peer) } else { (peer, dpid) };
                let bucket = if links.contains(&key) {
                    &mut tree_ports
                } else {
                    &mut blocked_ports
                };
                bucket.entry(dpid).or_default().insert(port);
            }
        }

        debug!(
            generation = topology.generation(),
            switches = index.len(),
            candidate_links = candidates.len(),
            tree_links = links.len(),
            "spanning tree computed"
        );

        Self {
            generation: topology.generation(),
            links,
            tree_ports,
            blocked_ports,
        }
    }

    /// Topology generation this tree was computed from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn links(&self) -> &BTreeSet<(DatapathId, DatapathId)> {
        &self.links
    }

    pub fn is_tree_link(&self, a: DatapathId, b: DatapathId) -> bool {
        let key = if a < b { (a, b) } else { (b, a) };
        self.links.contains(&key)
    }

    /// Ports of `dpid` that carry tree links.
    pub fn tree_ports(&self, dpid: DatapathId) -> BTreeSet<PortNo> {
        self.tree_ports.get(&dpid).cloned().unwrap_or_default()
    }

    /// Ports of `dpid` that carry switch links outside the tree.
    pub fn blocked_ports(&self, dpid: DatapathId) -> BTreeSet<PortNo> {
        self.blocked_ports.get(&dpid).cloned().unwrap_or_default()
    }
}

/// Ports of `dpid` on which a frame that entered through `in_port` may be
/// flooded, in ascending order.
///
/// The set is the switch's known ports plus its tree ports plus its
/// host-facing ports, minus non-tree link ports, the ingress port and any
/// reserved port.
pub fn flood_ports(
    topology: &Topology,
    tree: &SpanningTree,
    dpid: DatapathId,
    in_port: PortNo,
) -> Vec<PortNo> {
    let mut ports: BTreeSet<PortNo> = topology.ports(dpid).cloned().unwrap_or_default();
    ports.extend(tree.tree_ports(dpid));
    ports.extend(topology.host_ports(dpid));

    let blocked = tree.blocked_ports(dpid);
    ports
        .into_iter()
        .filter(|port| *port != in_port && !port.is_reserved() && !blocked.contains(port))
        .collect()
}

/// Caches the spanning tree for the topology generation it was built from.
#[derive(Debug, Default)]
pub struct SpanningCache {
    current: Option<Arc<SpanningTree>>,
}

impl SpanningCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tree for `topology`, recomputing it if the switch graph
    /// changed since the last call.
    pub fn get(&mut self, topology: &Topology) -> Arc<SpanningTree> {
        match &self.current {
            Some(tree) if tree.generation() == topology.generation() => Arc::clone(tree),
            _ => {
                let tree = Arc::new(SpanningTree::compute(topology));
                self.current = Some(Arc::clone(&tree));
                tree
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }
}
