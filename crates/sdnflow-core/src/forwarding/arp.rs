//! IPv4 to MAC bindings learned from ARP traffic.

use sdnflow_types::MacAddress;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Global ARP table. The last writer wins.
#[derive(Debug, Clone, Default)]
pub struct ArpTable {
    entries: HashMap<Ipv4Addr, MacAddress>,
}

impl ArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `ip` to `mac`. Returns the previous binding if it differed.
    pub fn learn(&mut self, ip: Ipv4Addr, mac: MacAddress) -> Option<MacAddress> {
        if ip.is_unspecified() || !mac.is_learnable() {
            return None;
        }
        match self.entries.insert(ip, mac) {
            Some(previous) if previous != mac => Some(previous),
            _ => None,
        }
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<MacAddress> {
        self.entries.get(&ip).copied()
    }

    /// Drops every binding pointing at `mac`.
    pub fn remove_mac(&mut self, mac: MacAddress) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, bound| *bound != mac);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
