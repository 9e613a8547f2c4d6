//! The frame-arrival handler.

use super::dedup::{DedupKey, DedupVerdict};
use super::types::{DropReason, ForwardingDecision, FrameVerdict};
use crate::config::ControllerConfig;
use crate::controller::NetworkState;
use crate::event::{ArpOp, ArpPacket, Frame};
use crate::path;
use crate::spanning::flood_ports;
use crate::switch::{ArpReply, FlowAction, FlowMatch, FlowRule, FrameRef, SwitchCommand};
use crate::topology::{LearnOutcome, NodeId};
use std::time::Instant;
use tracing::{debug, error, warn};

/// Decides, for each frame sent to the controller, whether to forward it
/// along a path, flood it over the spanning tree, answer it, or drop it.
///
/// The engine holds no state of its own; everything it learns goes into the
/// [`NetworkState`] it is handed, so one frame's failure never affects the
/// next.
#[derive(Debug, Clone)]
pub struct ForwardingEngine {
    config: ControllerConfig,
}

impl ForwardingEngine {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Handles one frame. Must be called with exclusive access to `state`
    /// so learning and lookups see one consistent graph.
    pub fn handle_frame(&self, state: &mut NetworkState, frame: &Frame, now: Instant) -> FrameVerdict {
        let mut commands = Vec::new();

        if frame.is_control_plane() {
            debug!(frame = %frame, "dropping control-plane frame");
            return FrameVerdict::new(
                ForwardingDecision::Drop(DropReason::DiscoveryFrame),
                commands,
                None,
            );
        }
        if frame.meta.truncated {
            warn!(frame = %frame, "frame truncated by switch");
        }

        let learned = self.learn_source(state, frame, &mut commands);

        if let Some(arp) = frame.meta.arp {
            state.arp.learn(arp.sender_ip, arp.sender_mac);

            if frame.dst.is_broadcast() {
                let key = DedupKey {
                    dpid: frame.dpid,
                    src: frame.src,
                    target: arp.target_ip,
                };
                if let DedupVerdict::Duplicate { first_port } =
                    state.dedup.observe(key, frame.in_port, now)
                {
                    debug!(
                        dpid = %frame.dpid,
                        src = %frame.src,
                        target = %arp.target_ip,
                        port = %frame.in_port,
                        first_port = %first_port,
                        "dropping duplicate broadcast"
                    );
                    return FrameVerdict::new(
                        ForwardingDecision::Drop(DropReason::DuplicateBroadcast),
                        commands,
                        learned,
                    );
                }

                // Requests already addressed to a host go to it unanswered.
                if let Some(decision) = self.proxy_arp(state, frame, &arp, &mut commands) {
                    return FrameVerdict::new(decision, commands, learned);
                }
            }
        }

        let decision = if state.topology.graph().contains_host(frame.dst) {
            self.unicast(state, frame, &mut commands)
        } else {
            Self::flood(state, frame, &mut commands)
        };
        FrameVerdict::new(decision, commands, learned)
    }

    /// Learns or moves the frame's source. Frames entering through a
    /// switch-link port are transit traffic: only the location cache
    /// records them.
    fn learn_source(
        &self,
        state: &mut NetworkState,
        frame: &Frame,
        commands: &mut Vec<SwitchCommand>,
    ) -> Option<LearnOutcome> {
        let (dpid, port, mac) = (frame.dpid, frame.in_port, frame.src);
        if !mac.is_learnable() {
            debug!(dpid = %dpid, src = %mac, "source not learnable");
            return None;
        }
        if state.topology.graph().is_link_port(dpid, port) {
            state.locations.record(dpid, mac, port);
            return None;
        }

        let outcome = state.topology.learn_host(dpid, mac, port);
        if let LearnOutcome::Moved { .. } = outcome {
            state.locations.purge_mac(mac);
            if self.config.flush_on_host_move {
                state.rules.remove_dst(mac);
                commands.extend(
                    state
                        .registry
                        .iter()
                        .map(|sw| SwitchCommand::delete_dst(*sw, mac)),
                );
            }
        }
        state.locations.record(dpid, mac, port);
        Some(outcome)
    }

    fn proxy_arp(
        &self,
        state: &NetworkState,
        frame: &Frame,
        arp: &ArpPacket,
        commands: &mut Vec<SwitchCommand>,
    ) -> Option<ForwardingDecision> {
        if !self.config.proxy_arp || arp.op != ArpOp::Request || arp.target_ip == arp.sender_ip {
            return None;
        }
        let target_mac = state.arp.lookup(arp.target_ip)?;
        if target_mac == arp.sender_mac {
            return None;
        }

        debug!(
            dpid = %frame.dpid,
            target = %arp.target_ip,
            answer = %target_mac,
            requester = %arp.sender_mac,
            "answering ARP request"
        );
        commands.push(SwitchCommand::SendPacket {
            dpid: frame.dpid,
            frame: FrameRef::ArpReply(ArpReply {
                src_mac: target_mac,
                src_ip: arp.target_ip,
                dst_mac: arp.sender_mac,
                dst_ip: arp.sender_ip,
            }),
            in_port: None,
            out_ports: vec![frame.in_port],
        });
        Some(ForwardingDecision::ProxyArp {
            target_ip: arp.target_ip,
        })
    }

    fn unicast(
        &self,
        state: &mut NetworkState,
        frame: &Frame,
        commands: &mut Vec<SwitchCommand>,
    ) -> ForwardingDecision {
        let topology = state.topology.graph();
        let origin = if topology.contains_host(frame.src) {
            NodeId::Host(frame.src)
        } else {
            NodeId::Switch(frame.dpid)
        };

        let Some(path) = path::resolve(topology, origin, NodeId::Host(frame.dst)) else {
            debug!(
                dpid = %frame.dpid,
                src = %frame.src,
                dst = %frame.dst,
                "destination unreachable"
            );
            return ForwardingDecision::Drop(DropReason::Unreachable);
        };

        let out_port = match path.egress_port(topology, frame.dpid) {
            Ok(port) => port,
            Err(err) => {
                error!(
                    error = %err,
                    src = %frame.src,
                    dst = %frame.dst,
                    in_port = %frame.in_port,
                    "cannot forward along resolved path"
                );
                return ForwardingDecision::Drop(DropReason::TopologyInconsistency);
            }
        };

        let rule = FlowRule {
            dpid: frame.dpid,
            priority: self.config.flow_priority,
            matcher: FlowMatch::unicast(frame.in_port, frame.dst),
            actions: vec![FlowAction::Output(out_port)],
            idle_timeout: self.config.idle_timeout_secs,
            hard_timeout: self.config.hard_timeout_secs,
        };
        debug!(
            dpid = %frame.dpid,
            matcher = %rule.matcher,
            out_port = %out_port,
            hops = path.hops(),
            "installing unicast rule"
        );
        state.rules.insert(rule.clone());
        commands.push(SwitchCommand::InstallRule(rule));
        commands.push(SwitchCommand::SendPacket {
            dpid: frame.dpid,
            frame: FrameRef::Buffered(frame.meta.buffer_id),
            in_port: Some(frame.in_port),
            out_ports: vec![out_port],
        });
        ForwardingDecision::Unicast { out_port }
    }

    fn flood(
        state: &mut NetworkState,
        frame: &Frame,
        commands: &mut Vec<SwitchCommand>,
    ) -> ForwardingDecision {
        let tree = state.spanning.get(state.topology.graph());
        let ports = flood_ports(state.topology.graph(), &tree, frame.dpid, frame.in_port);
        if ports.is_empty() {
            debug!(dpid = %frame.dpid, in_port = %frame.in_port, "no port to flood on");
            return ForwardingDecision::Drop(DropReason::NoFloodPorts);
        }

        debug!(dpid = %frame.dpid, dst = %frame.dst, ports = ?ports, "flooding");
        commands.push(SwitchCommand::SendPacket {
            dpid: frame.dpid,
            frame: FrameRef::Buffered(frame.meta.buffer_id),
            in_port: Some(frame.in_port),
            out_ports: ports.clone(),
        });
        ForwardingDecision::Flood { ports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ArpPacket;
    use pretty_assertions::assert_eq;
    use sdnflow_types::{DatapathId, EtherType, MacAddress, PortNo};
    use std::net::Ipv4Addr;

    fn dp(id: u64) -> DatapathId {
        DatapathId::new(id)
    }

    fn port(n: u32) -> PortNo {
        PortNo::new(n)
    }

    fn mac(n: u64) -> MacAddress {
        MacAddress::from_u64(n)
    }

    fn two_switches() -> NetworkState {
        let config = ControllerConfig::default();
        let mut state = NetworkState::new(&config);
        state.registry.insert(dp(1));
        state.registry.insert(dp(2));
        state.topology.upsert_link(dp(1), dp(2), port(2), port(1));
        state
    }

    #[test]
    fn test_discovery_frames_are_not_learned() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        let frame = Frame::new(dp(1), port(1), mac(1), mac(2)).with_ethertype(EtherType::LLDP);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());
        assert_eq!(
            verdict.decision,
            ForwardingDecision::Drop(DropReason::DiscoveryFrame)
        );
        assert!(verdict.commands.is_empty());
        assert!(!state.topology.graph().contains_host(mac(1)));
    }

    #[test]
    fn test_unknown_destination_floods() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        let frame = Frame::new(dp(1), port(1), mac(1), mac(2));
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());
        assert_eq!(verdict.decision, ForwardingDecision::Flood { ports: vec![port(2)] });
        assert_eq!(verdict.learned, Some(LearnOutcome::Created));
        assert_eq!(state.locations.lookup(dp(1), mac(1)), Some(port(1)));
        assert!(state.rules.is_empty());
    }

    #[test]
    fn test_known_destination_installs_rule() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        state.topology.learn_host(dp(1), mac(1), port(1));
        let frame = Frame::new(dp(2), port(2), mac(2), mac(1)).with_buffer(7);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());

        assert_eq!(verdict.decision, ForwardingDecision::Unicast { out_port: port(1) });
        let rule = FlowRule {
            dpid: dp(2),
            priority: 1,
            matcher: FlowMatch::unicast(port(2), mac(1)),
            actions: vec![FlowAction::Output(port(1))],
            idle_timeout: 30,
            hard_timeout: 0,
        };
        assert_eq!(
            verdict.commands,
            vec![
                SwitchCommand::InstallRule(rule.clone()),
                SwitchCommand::SendPacket {
                    dpid: dp(2),
                    frame: FrameRef::Buffered(7),
                    in_port: Some(port(2)),
                    out_ports: vec![port(1)],
                },
            ]
        );
        assert_eq!(state.rules.get(dp(2), &rule.matcher), Some(&rule));
    }

    #[test]
    fn test_transit_port_does_not_move_host() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        state.topology.learn_host(dp(1), mac(1), port(1));
        let frame = Frame::new(dp(2), port(1), mac(1), MacAddress::BROADCAST);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());
        assert_eq!(verdict.learned, None);
        assert_eq!(state.topology.graph().host_attachment(mac(1)), Some((dp(1), port(1))));
        assert_eq!(state.locations.lookup(dp(2), mac(1)), Some(port(1)));
    }

    #[test]
    fn test_host_move_flushes_rules() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        state.topology.learn_host(dp(1), mac(1), port(1));
        state.locations.record(dp(1), mac(1), port(1));

        let frame = Frame::new(dp(2), port(3), mac(1), mac(9));
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());
        assert!(matches!(verdict.learned, Some(LearnOutcome::Moved { .. })));
        assert_eq!(state.locations.lookup(dp(1), mac(1)), None);
        assert_eq!(state.locations.lookup(dp(2), mac(1)), Some(port(3)));
        assert!(verdict
            .commands
            .contains(&SwitchCommand::delete_dst(dp(1), mac(1))));
        assert!(verdict
            .commands
            .contains(&SwitchCommand::delete_dst(dp(2), mac(1))));
    }

    #[test]
    fn test_multicast_source_not_learned() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        let source = MacAddress::new([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);
        let frame = Frame::new(dp(1), port(1), source, MacAddress::BROADCAST);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());
        assert_eq!(verdict.learned, None);
        assert_eq!(state.topology.graph().host_count(), 0);
    }

    #[test]
    fn test_proxy_arp_answers_known_target() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        state.arp.learn(Ipv4Addr::new(10, 0, 0, 2), mac(2));

        let request = ArpPacket::request(mac(1), Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        let frame = Frame::new(dp(1), port(1), mac(1), MacAddress::BROADCAST).with_arp(request);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());

        assert_eq!(
            verdict.decision,
            ForwardingDecision::ProxyArp {
                target_ip: Ipv4Addr::new(10, 0, 0, 2)
            }
        );
        assert_eq!(
            verdict.commands,
            vec![SwitchCommand::SendPacket {
                dpid: dp(1),
                frame: FrameRef::ArpReply(ArpReply {
                    src_mac: mac(2),
                    src_ip: Ipv4Addr::new(10, 0, 0, 2),
                    dst_mac: mac(1),
                    dst_ip: Ipv4Addr::new(10, 0, 0, 1),
                }),
                in_port: None,
                out_ports: vec![port(1)],
            }]
        );
        assert_eq!(state.arp.lookup(Ipv4Addr::new(10, 0, 0, 1)), Some(mac(1)));
    }

    #[test]
    fn test_unicast_arp_request_is_forwarded() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        state.topology.learn_host(dp(2), mac(2), port(3));
        state.arp.learn(Ipv4Addr::new(10, 0, 0, 2), mac(2));

        let request = ArpPacket::request(mac(1), Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        let frame = Frame::new(dp(1), port(1), mac(1), mac(2)).with_arp(request);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());

        assert_eq!(verdict.decision, ForwardingDecision::Unicast { out_port: port(2) });
        assert!(verdict
            .commands
            .iter()
            .all(|command| !matches!(command, SwitchCommand::SendPacket { frame: FrameRef::ArpReply(_), .. })));
        assert!(state.dedup.is_empty());
    }

    #[test]
    fn test_proxy_arp_disabled_floods() {
        let config = ControllerConfig {
            proxy_arp: false,
            ..ControllerConfig::default()
        };
        let engine = ForwardingEngine::new(config);
        let mut state = two_switches();
        state.arp.learn(Ipv4Addr::new(10, 0, 0, 2), mac(2));

        let request = ArpPacket::request(mac(1), Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        let frame = Frame::new(dp(1), port(1), mac(1), MacAddress::BROADCAST).with_arp(request);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());
        assert_eq!(verdict.decision, ForwardingDecision::Flood { ports: vec![port(2)] });
    }

    #[test]
    fn test_gratuitous_arp_is_not_answered() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let mut state = two_switches();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        let announce = ArpPacket::request(mac(1), ip, ip);
        let frame = Frame::new(dp(1), port(1), mac(1), MacAddress::BROADCAST).with_arp(announce);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());
        assert!(matches!(verdict.decision, ForwardingDecision::Flood { .. }));
    }

    #[test]
    fn test_no_flood_ports_drops() {
        let engine = ForwardingEngine::new(ControllerConfig::default());
        let config = ControllerConfig::default();
        let mut state = NetworkState::new(&config);
        state.topology.add_switch(dp(1));
        let frame = Frame::new(dp(1), port(1), mac(1), MacAddress::BROADCAST);
        let verdict = engine.handle_frame(&mut state, &frame, Instant::now());
        assert_eq!(verdict.decision, ForwardingDecision::Drop(DropReason::NoFloodPorts));
        assert!(verdict.commands.is_empty());
    }
}
