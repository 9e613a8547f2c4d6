//! Error types for the forwarding core.

use crate::switch::SwitchError;
use sdnflow_types::DatapathId;
use thiserror::Error;

/// Errors raised inside the forwarding core.
///
/// None of these escape [`Controller::handle_event`](crate::Controller::handle_event):
/// per-frame failures are turned into a drop decision and a log line.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Internal invariant violation, e.g. the switch handling a frame does
    /// not appear on the path resolved for it.
    #[error("topology inconsistency at {dpid}: {reason}")]
    TopologyInconsistency { dpid: DatapathId, reason: String },

    /// A switch command failed.
    #[error(transparent)]
    Switch(#[from] SwitchError),

    /// An operation named a switch that is not in the topology.
    #[error("unknown switch {0}")]
    UnknownSwitch(DatapathId),
}

impl CoreError {
    pub(crate) fn inconsistency(dpid: DatapathId, reason: impl Into<String>) -> Self {
        CoreError::TopologyInconsistency {
            dpid,
            reason: reason.into(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistency_message() {
        let err = CoreError::inconsistency(DatapathId::new(2), "not on path");
        assert_eq!(
            err.to_string(),
            "topology inconsistency at 0000000000000002: not on path"
        );
    }

    #[test]
    fn test_switch_error_is_transparent() {
        let err: CoreError = SwitchError::Unreachable(DatapathId::new(1)).into();
        assert!(matches!(err, CoreError::Switch(SwitchError::Unreachable(_))));
        assert_eq!(err.to_string(), "switch 0000000000000001 unreachable");
    }
}
