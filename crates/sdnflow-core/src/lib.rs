//! Topology-aware forwarding core for the sdnflow SDN controller.
//!
//! The core ingests discovery and data-plane events, keeps a live model of
//! the network graph, and emits forwarding-rule install/delete commands and
//! packet-out instructions through an abstract [`SwitchInterface`].
//!
//! # Architecture
//!
//! ```text
//!  discovery events ─┐                          ┌─> install / delete rule
//!                    ├─> [Controller] ─> cmds ──┤
//!  frame arrivals ───┘        │                 └─> packet out
//!                             │
//!              ┌──────────────┴───────────────┐
//!              │ NetworkState (one RwLock)    │
//!              │  TopologyStore  MacLocations │
//!              │  BroadcastDedup ArpTable     │
//!              │  InstalledRules registry     │
//!              └──────────────────────────────┘
//!                 ▲                    ▲
//!   spanning::SpanningTree     path::resolve        (pure views of a snapshot)
//!
//!  [StatsMonitor] ── read lock + request_stats ──> metrics (observation only)
//! ```
//!
//! # Key Components
//!
//! - [`topology`]: directed graph of switches, hosts and links
//! - [`discovery`]: maps switch/link/port events onto topology mutations
//! - [`spanning`]: minimum spanning tree and loop-safe flood ports
//! - [`path`]: shortest-path resolution and next-hop lookup
//! - [`forwarding`]: the frame-arrival handler
//! - [`monitor`]: periodic stats polling, health tracking and metrics

pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod event;
pub mod forwarding;
pub mod monitor;
pub mod path;
pub mod spanning;
pub mod switch;
pub mod topology;

pub use config::ControllerConfig;
pub use controller::{Controller, EventOutcome, NetworkState, SharedState};
pub use discovery::DiscoveryAdapter;
pub use error::{CoreError, Result};
pub use event::{ArpOp, ArpPacket, ControllerEvent, Frame, FrameMeta};
pub use forwarding::{
    ArpTable, BroadcastDedup, DedupKey, DedupVerdict, DropReason, ForwardingDecision,
    ForwardingEngine, FrameVerdict, InstalledRules, MacLocationTable,
};
pub use monitor::{
    EventHealth, HealthLimits, HealthMonitor, HealthStatus, MetricsCollector, PortRate, StatsMonitor,
};
pub use path::Path;
pub use spanning::{flood_ports, SpanningCache, SpanningTree};
pub use switch::{
    ArpReply, BufferId, FlowAction, FlowCounters, FlowMatch, FlowRule, FrameRef, PortCounters,
    SwitchCommand, SwitchError, SwitchInterface, SwitchStats, NO_BUFFER,
};
pub use topology::{
    Edge, LearnOutcome, Node, NodeAttributes, NodeId, NodeKind, Topology, TopologyStore,
};

pub use sdnflow_types::{DatapathId, EtherType, MacAddress, PortNo, PortState};
