//! Rules the controller believes are installed.

use crate::switch::{FlowMatch, FlowRule};
use sdnflow_types::{DatapathId, MacAddress, PortNo};
use std::collections::HashMap;

/// At most one rule per `(switch, match)`; installing again overwrites.
#[derive(Debug, Clone, Default)]
pub struct InstalledRules {
    rules: HashMap<(DatapathId, FlowMatch), FlowRule>,
}

impl InstalledRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `rule`, returning the rule it replaced.
    pub fn insert(&mut self, rule: FlowRule) -> Option<FlowRule> {
        self.rules.insert((rule.dpid, rule.matcher), rule)
    }

    pub fn get(&self, dpid: DatapathId, matcher: &FlowMatch) -> Option<&FlowRule> {
        self.rules.get(&(dpid, *matcher))
    }

    /// Untracks every rule on every switch that forwards toward `dst`.
    pub fn remove_dst(&mut self, dst: MacAddress) -> Vec<FlowRule> {
        self.take_where(|rule| rule.matcher.eth_dst == Some(dst))
    }

    /// Untracks the rules on `dpid` that output through `port`.
    pub fn take_by_output(&mut self, dpid: DatapathId, port: PortNo) -> Vec<FlowRule> {
        self.take_where(|rule| rule.dpid == dpid && rule.output_port() == Some(port))
    }

    pub fn remove_switch(&mut self, dpid: DatapathId) -> usize {
        self.take_where(|rule| rule.dpid == dpid).len()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    fn take_where(&mut self, mut predicate: impl FnMut(&FlowRule) -> bool) -> Vec<FlowRule> {
        let keys: Vec<(DatapathId, FlowMatch)> = self
            .rules
            .iter()
            .filter(|(_, rule)| predicate(*rule))
            .map(|(key, _)| *key)
            .collect();
        let mut taken: Vec<FlowRule> = keys
            .iter()
            .filter_map(|key| self.rules.remove(key))
            .collect();
        taken.sort_by_key(|rule| (rule.dpid, rule.matcher.in_port, rule.matcher.eth_dst));
        taken
    }
}
