//! Abstract switch interface.
//!
//! The core never speaks a wire protocol. It drives switches through the
//! [`SwitchInterface`] trait and describes what it wants done as
//! [`SwitchCommand`] values, so decisions can be computed under the state
//! lock and executed after it is released.

mod interface;
mod types;

pub use interface::{SwitchError, SwitchInterface};
pub use types::{
    ArpReply, BufferId, FlowAction, FlowCounters, FlowMatch, FlowRule, FrameRef, PortCounters,
    SwitchCommand, SwitchStats, NO_BUFFER,
};
