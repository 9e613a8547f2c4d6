//! Decision types produced for each frame.

use crate::switch::SwitchCommand;
use crate::topology::LearnOutcome;
use sdnflow_types::PortNo;
use std::fmt;
use std::net::Ipv4Addr;

/// Why a frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Topology-discovery or bridge-protocol frame.
    DiscoveryFrame,
    /// Second copy of a broadcast, arriving on another port.
    DuplicateBroadcast,
    /// Known destination with no path to it.
    Unreachable,
    /// The current switch is not where the resolved path says it should be.
    TopologyInconsistency,
    /// Nothing left to flood on after filtering.
    NoFloodPorts,
}

impl DropReason {
    /// Label value used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::DiscoveryFrame => "discovery_frame",
            DropReason::DuplicateBroadcast => "duplicate_broadcast",
            DropReason::Unreachable => "unreachable",
            DropReason::TopologyInconsistency => "topology_inconsistency",
            DropReason::NoFloodPorts => "no_flood_ports",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine decided to do with one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingDecision {
    /// A rule toward `out_port` was installed and the frame sent there.
    Unicast { out_port: PortNo },
    /// The frame was sent out of every loop-safe port in `ports`.
    Flood { ports: Vec<PortNo> },
    /// An ARP reply for `target_ip` was sent back to the requester.
    ProxyArp { target_ip: Ipv4Addr },
    Drop(DropReason),
}

/// Decision plus the switch commands that carry it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameVerdict {
    pub decision: ForwardingDecision,
    pub commands: Vec<SwitchCommand>,
    /// Result of learning the frame's source, when it was learned.
    pub learned: Option<LearnOutcome>,
}

impl FrameVerdict {
    pub(crate) fn new(
        decision: ForwardingDecision,
        commands: Vec<SwitchCommand>,
        learned: Option<LearnOutcome>,
    ) -> Self {
        Self {
            decision,
            commands,
            learned,
        }
    }
}
