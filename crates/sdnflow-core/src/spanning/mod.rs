//! Loop-Safety Engine.
//!
//! Derives, from the switch-only subgraph, a minimum spanning tree and the
//! per-switch set of ports on which flooding cannot loop.

mod tree;

pub use tree::{flood_ports, SpanningCache, SpanningTree};
