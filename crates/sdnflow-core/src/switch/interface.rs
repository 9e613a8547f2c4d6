//! The trait the core uses to drive switches.

use super::types::{BufferId, FlowMatch, FlowRule, FrameRef, SwitchCommand, SwitchStats};
use async_trait::async_trait;
use sdnflow_types::{DatapathId, PortNo};
use thiserror::Error;

/// Failures reported by a switch backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    /// The switch is not (or no longer) connected.
    #[error("switch {0} unreachable")]
    Unreachable(DatapathId),

    /// The switch already released the buffered frame.
    #[error("switch {dpid} no longer holds buffer {buffer_id}")]
    BufferExpired { dpid: DatapathId, buffer_id: BufferId },

    /// The switch refused the command.
    #[error("switch {dpid} rejected command: {reason}")]
    Rejected { dpid: DatapathId, reason: String },
}

impl SwitchError {
    pub fn dpid(&self) -> DatapathId {
        match self {
            SwitchError::Unreachable(dpid) => *dpid,
            SwitchError::BufferExpired { dpid, .. } => *dpid,
            SwitchError::Rejected { dpid, .. } => *dpid,
        }
    }
}

/// Backend that carries commands to switches.
///
/// Rule and packet commands are fire-and-forget from the core's point of
/// view: an error is logged and counted, never retried. Only stats requests
/// wait for an answer.
#[async_trait]
pub trait SwitchInterface: Send + Sync {
    /// Installs (or overwrites) a rule identified by `(dpid, priority, matcher)`.
    fn install_rule(&self, rule: &FlowRule) -> Result<(), SwitchError>;

    /// Deletes every rule on `dpid` covered by `filter`.
    fn delete_rule(&self, dpid: DatapathId, filter: &FlowMatch) -> Result<(), SwitchError>;

    /// Emits `frame` out of each of `out_ports`.
    fn send_packet(
        &self,
        dpid: DatapathId,
        frame: &FrameRef,
        in_port: Option<PortNo>,
        out_ports: &[PortNo],
    ) -> Result<(), SwitchError>;

    /// Fetches flow and port counters.
    async fn request_stats(&self, dpid: DatapathId) -> Result<SwitchStats, SwitchError>;

    /// Executes one queued command.
    fn execute(&self, command: &SwitchCommand) -> Result<(), SwitchError> {
        match command {
            SwitchCommand::InstallRule(rule) => self.install_rule(rule),
            SwitchCommand::DeleteRule { dpid, filter } => self.delete_rule(*dpid, filter),
            SwitchCommand::SendPacket {
                dpid,
                frame,
                in_port,
                out_ports,
            } => self.send_packet(*dpid, frame, *in_port, out_ports),
        }
    }
}
