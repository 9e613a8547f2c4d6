//! Flow rule, packet-out and counter types.

use sdnflow_types::{DatapathId, MacAddress, PortNo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Switch-side handle of a frame buffered while the controller decides.
pub type BufferId = u32;

/// Buffer id meaning "the switch did not buffer this frame".
pub const NO_BUFFER: BufferId = 0xffff_ffff;

/// Match part of a flow rule. Unset fields are wildcards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortNo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_dst: Option<MacAddress>,
}

impl FlowMatch {
    /// Matches every frame; used by the table-miss rule.
    pub const fn any() -> Self {
        Self {
            in_port: None,
            eth_dst: None,
        }
    }

    /// Matches frames toward `dst` arriving on `in_port`.
    pub const fn unicast(in_port: PortNo, dst: MacAddress) -> Self {
        Self {
            in_port: Some(in_port),
            eth_dst: Some(dst),
        }
    }

    /// Delete filter for every rule toward `dst`, whatever the ingress.
    pub const fn to_dst(dst: MacAddress) -> Self {
        Self {
            in_port: None,
            eth_dst: Some(dst),
        }
    }

    /// Returns true if a rule installed with `other` falls under this
    /// filter (non-strict matching: unset fields match anything).
    pub fn covers(&self, other: &FlowMatch) -> bool {
        let port_ok = self.in_port.is_none() || self.in_port == other.in_port;
        let dst_ok = self.eth_dst.is_none() || self.eth_dst == other.eth_dst;
        port_ok && dst_ok
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.in_port, self.eth_dst) {
            (None, None) => write!(f, "*"),
            (Some(port), None) => write!(f, "in_port={}", port),
            (None, Some(dst)) => write!(f, "eth_dst={}", dst),
            (Some(port), Some(dst)) => write!(f, "in_port={},eth_dst={}", port, dst),
        }
    }
}

/// Action part of a flow rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    Output(PortNo),
}

/// A forwarding instruction installed on one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRule {
    pub dpid: DatapathId,
    pub priority: u16,
    pub matcher: FlowMatch,
    pub actions: Vec<FlowAction>,
    /// Seconds without traffic before the switch expires the rule (0 = never).
    pub idle_timeout: u16,
    /// Seconds before the switch expires the rule regardless of traffic (0 = never).
    pub hard_timeout: u16,
}

impl FlowRule {
    /// Returns the output port of a single-output rule.
    pub fn output_port(&self) -> Option<PortNo> {
        self.actions.iter().map(|FlowAction::Output(port)| *port).next()
    }
}

/// Proxy ARP reply synthesized by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpReply {
    /// Resolved address, used as Ethernet and ARP sender.
    pub src_mac: MacAddress,
    pub src_ip: Ipv4Addr,
    /// Requester, used as Ethernet and ARP target.
    pub dst_mac: MacAddress,
    pub dst_ip: Ipv4Addr,
}

/// Frame carried by a packet-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRef {
    /// Frame held by the switch (or by the switch layer when the id is
    /// [`NO_BUFFER`]).
    Buffered(BufferId),
    /// Frame generated by the controller.
    ArpReply(ArpReply),
}

/// A command the core wants executed against a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchCommand {
    InstallRule(FlowRule),
    DeleteRule {
        dpid: DatapathId,
        filter: FlowMatch,
    },
    SendPacket {
        dpid: DatapathId,
        frame: FrameRef,
        /// Ingress port of the frame; `None` for controller-generated frames.
        in_port: Option<PortNo>,
        out_ports: Vec<PortNo>,
    },
}

impl SwitchCommand {
    pub fn dpid(&self) -> DatapathId {
        match self {
            SwitchCommand::InstallRule(rule) => rule.dpid,
            SwitchCommand::DeleteRule { dpid, .. } => *dpid,
            SwitchCommand::SendPacket { dpid, .. } => *dpid,
        }
    }

    pub(crate) fn delete_dst(dpid: DatapathId, dst: MacAddress) -> Self {
        SwitchCommand::DeleteRule {
            dpid,
            filter: FlowMatch::to_dst(dst),
        }
    }
}

/// Per-port counters returned by a stats request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCounters {
    pub port: PortNo,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

/// Per-rule counters returned by a stats request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCounters {
    pub priority: u16,
    pub matcher: FlowMatch,
    pub packet_count: u64,
    pub byte_count: u64,
}

/// Reply to [`SwitchInterface::request_stats`](super::SwitchInterface::request_stats).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchStats {
    pub flows: Vec<FlowCounters>,
    pub ports: Vec<PortCounters>,
}
