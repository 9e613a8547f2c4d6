//! Per-switch MAC learning cache.

use sdnflow_types::{DatapathId, MacAddress, PortNo};
use std::collections::{BTreeMap, HashMap};

/// `switch -> (mac -> port)` lookup kept alongside the topology's host edges.
#[derive(Debug, Clone, Default)]
pub struct MacLocationTable {
    switches: BTreeMap<DatapathId, HashMap<MacAddress, PortNo>>,
}

impl MacLocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `mac` behind `port` on `dpid`. Returns the previous port if
    /// it changed.
    pub fn record(&mut self, dpid: DatapathId, mac: MacAddress, port: PortNo) -> Option<PortNo> {
        match self.switches.entry(dpid).or_default().insert(mac, port) {
            Some(previous) if previous != port => Some(previous),
            _ => None,
        }
    }

    pub fn lookup(&self, dpid: DatapathId, mac: MacAddress) -> Option<PortNo> {
        self.switches.get(&dpid)?.get(&mac).copied()
    }

    /// MACs recorded behind `port` on `dpid`, sorted.
    pub fn macs_at(&self, dpid: DatapathId, port: PortNo) -> Vec<MacAddress> {
        let mut macs: Vec<MacAddress> = self
            .switches
            .get(&dpid)
            .map(|table| {
                table
                    .iter()
                    .filter(|(_, p)| **p == port)
                    .map(|(mac, _)| *mac)
                    .collect()
            })
            .unwrap_or_default();
        macs.sort();
        macs
    }

    /// Forgets `mac` on every switch.
    pub fn purge_mac(&mut self, mac: MacAddress) -> usize {
        self.switches
            .values_mut()
            .filter_map(|table| table.remove(&mac))
            .count()
    }

    pub fn remove_switch(&mut self, dpid: DatapathId) -> usize {
        self.switches.remove(&dpid).map(|table| table.len()).unwrap_or(0)
    }

    /// Total number of entries across switches.
    pub fn len(&self) -> usize {
        self.switches.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.switches.clear();
    }
}
