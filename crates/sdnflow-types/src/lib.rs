//! Network primitives shared by the sdnflow control plane.
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses (host identity)
//! - [`DatapathId`]: 64-bit switch datapath identifiers
//! - [`PortNo`]: switch port numbers, including the reserved logical ports
//! - [`PortState`]: port status transitions reported by switches
//! - [`EtherType`]: the Ethernet payload types the forwarding core cares about

mod datapath;
mod ethertype;
mod mac;
mod port;

pub use datapath::DatapathId;
pub use ethertype::EtherType;
pub use mac::MacAddress;
pub use port::{PortNo, PortState};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid datapath id: {0}")]
    InvalidDatapathId(String),

    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("invalid port state: {0}")]
    InvalidPortState(String),
}
