//! Ethernet payload types relevant to forwarding decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ethernet type field of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EtherType(u16);

impl EtherType {
    pub const IPV4: EtherType = EtherType(0x0800);
    pub const ARP: EtherType = EtherType(0x0806);
    pub const IPV6: EtherType = EtherType(0x86dd);
    /// Link Layer Discovery Protocol, sent by topology discovery.
    pub const LLDP: EtherType = EtherType(0x88cc);

    pub const fn new(value: u16) -> Self {
        EtherType(value)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true for frames emitted by the discovery layer itself.
    pub const fn is_discovery(&self) -> bool {
        self.0 == Self::LLDP.0
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EtherType::IPV4 => write!(f, "ipv4"),
            EtherType::ARP => write!(f, "arp"),
            EtherType::IPV6 => write!(f, "ipv6"),
            EtherType::LLDP => write!(f, "lldp"),
            EtherType(other) => write!(f, "0x{:04x}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(EtherType::ARP.to_string(), "arp");
        assert_eq!(EtherType::new(0x8100).to_string(), "0x8100");
    }

    #[test]
    fn test_discovery() {
        assert!(EtherType::LLDP.is_discovery());
        assert!(!EtherType::IPV4.is_discovery());
    }
}
