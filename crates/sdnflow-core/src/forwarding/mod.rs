//! Forwarding Decision Engine and the per-controller caches it maintains.

mod arp;
mod dedup;
mod engine;
mod location;
mod rules;
mod types;

pub use arp::ArpTable;
pub use dedup::{BroadcastDedup, DedupKey, DedupVerdict};
pub use engine::ForwardingEngine;
pub use location::MacLocationTable;
pub use rules::InstalledRules;
pub use types::{DropReason, ForwardingDecision, FrameVerdict};
