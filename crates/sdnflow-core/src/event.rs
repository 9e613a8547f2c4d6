//! Events delivered into the core.
//!
//! The set is closed: every producer (discovery layer, packet-in path, the
//! daemon's JSON feed) speaks [`ControllerEvent`] and the controller
//! dispatches it with one exhaustive match.

use crate::switch::{BufferId, NO_BUFFER};
use sdnflow_types::{DatapathId, EtherType, MacAddress, PortNo, PortState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// A discovery or data-plane event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A switch connected. `ports` lists its physical ports when known.
    SwitchJoin {
        dpid: DatapathId,
        #[serde(default)]
        ports: Vec<PortNo>,
    },
    /// A switch disconnected.
    SwitchLeave { dpid: DatapathId },
    /// A bidirectional switch-to-switch link was discovered.
    LinkUp {
        src: DatapathId,
        dst: DatapathId,
        src_port: PortNo,
        dst_port: PortNo,
    },
    /// A switch-to-switch link disappeared.
    LinkDown { src: DatapathId, dst: DatapathId },
    /// A port changed state.
    PortStatus {
        dpid: DatapathId,
        port: PortNo,
        state: PortState,
    },
    /// A frame reached the controller because no rule matched it.
    FrameArrived(Frame),
}

impl ControllerEvent {
    /// Short name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerEvent::SwitchJoin { .. } => "switch_join",
            ControllerEvent::SwitchLeave { .. } => "switch_leave",
            ControllerEvent::LinkUp { .. } => "link_up",
            ControllerEvent::LinkDown { .. } => "link_down",
            ControllerEvent::PortStatus { .. } => "port_status",
            ControllerEvent::FrameArrived(_) => "frame_arrived",
        }
    }
}

/// Headers of a frame sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub dpid: DatapathId,
    pub in_port: PortNo,
    pub src: MacAddress,
    pub dst: MacAddress,
    #[serde(default)]
    pub meta: FrameMeta,
}

impl Frame {
    pub fn new(dpid: DatapathId, in_port: PortNo, src: MacAddress, dst: MacAddress) -> Self {
        Self {
            dpid,
            in_port,
            src,
            dst,
            meta: FrameMeta::default(),
        }
    }

    /// Attaches an ARP payload and sets the ethertype accordingly.
    pub fn with_arp(mut self, arp: ArpPacket) -> Self {
        self.meta.ethertype = EtherType::ARP;
        self.meta.arp = Some(arp);
        self
    }

    pub fn with_ethertype(mut self, ethertype: EtherType) -> Self {
        self.meta.ethertype = ethertype;
        self
    }

    pub fn with_buffer(mut self, buffer_id: BufferId) -> Self {
        self.meta.buffer_id = buffer_id;
        self
    }

    /// True for topology-discovery and bridge-protocol frames.
    pub fn is_control_plane(&self) -> bool {
        self.meta.ethertype.is_discovery() || self.dst == MacAddress::BRIDGE_GROUP
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} -> {} ({})",
            self.dpid, self.in_port, self.src, self.dst, self.meta.ethertype
        )
    }
}

/// What the switch layer parsed out of the frame beyond the Ethernet
/// addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    #[serde(default = "default_ethertype")]
    pub ethertype: EtherType,
    #[serde(default = "default_buffer_id")]
    pub buffer_id: BufferId,
    /// The switch sent fewer bytes than the frame carried.
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arp: Option<ArpPacket>,
}

fn default_ethertype() -> EtherType {
    EtherType::IPV4
}

fn default_buffer_id() -> BufferId {
    NO_BUFFER
}

impl Default for FrameMeta {
    fn default() -> Self {
        Self {
            ethertype: default_ethertype(),
            buffer_id: default_buffer_id(),
            truncated: false,
            arp: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArpOp {
    Request,
    Reply,
}

/// The fields of an ARP payload the core acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Addr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub fn request(sender_mac: MacAddress, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            op: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_ip,
        }
    }

    pub fn reply(sender_mac: MacAddress, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            op: ArpOp::Reply,
            sender_mac,
            sender_ip,
            target_ip,
        }
    }
}
