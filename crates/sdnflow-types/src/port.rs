//! Switch port numbers and port status.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A switch port number.
///
/// Physical ports are numbered from 1. Values at or above [`PortNo::MAX`]
/// are reserved logical ports (controller, flood, local, ...) and never
/// identify a cable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PortNo(u32);

impl PortNo {
    /// Highest physical port number.
    pub const MAX: PortNo = PortNo(0xffff_ff00);
    /// Send the packet back out the port it arrived on.
    pub const IN_PORT: PortNo = PortNo(0xffff_fff8);
    /// Flood using the switch's own (non-loop-safe) flooding.
    pub const FLOOD: PortNo = PortNo(0xffff_fffb);
    /// All physical ports except the ingress port.
    pub const ALL: PortNo = PortNo(0xffff_fffc);
    /// Send to the controller.
    pub const CONTROLLER: PortNo = PortNo(0xffff_fffd);
    /// Local switch network stack.
    pub const LOCAL: PortNo = PortNo(0xffff_fffe);
    /// Wildcard, used in delete filters.
    pub const ANY: PortNo = PortNo(0xffff_ffff);

    pub const fn new(port: u32) -> Self {
        PortNo(port)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns true for reserved logical ports.
    pub const fn is_reserved(&self) -> bool {
        self.0 >= Self::MAX.0
    }

    /// Returns true for ports that can carry a cable.
    pub const fn is_physical(&self) -> bool {
        self.0 != 0 && !self.is_reserved()
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PortNo::IN_PORT => write!(f, "in_port"),
            PortNo::FLOOD => write!(f, "flood"),
            PortNo::ALL => write!(f, "all"),
            PortNo::CONTROLLER => write!(f, "controller"),
            PortNo::LOCAL => write!(f, "local"),
            PortNo::ANY => write!(f, "any"),
            PortNo(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for PortNo {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_port" => Ok(PortNo::IN_PORT),
            "flood" => Ok(PortNo::FLOOD),
            "all" => Ok(PortNo::ALL),
            "controller" => Ok(PortNo::CONTROLLER),
            "local" => Ok(PortNo::LOCAL),
            "any" => Ok(PortNo::ANY),
            other => other
                .parse::<u32>()
                .map(PortNo)
                .map_err(|_| ParseError::InvalidPort(s.to_string())),
        }
    }
}

impl From<u32> for PortNo {
    fn from(port: u32) -> Self {
        PortNo(port)
    }
}

/// Port status transition reported by a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Port was added to the switch.
    Added,
    /// Port link came up.
    Up,
    /// Port link went down.
    Down,
    /// Port was removed from the switch.
    Deleted,
}

impl PortState {
    /// Returns true if the port can no longer carry traffic.
    pub const fn is_down(&self) -> bool {
        matches!(self, PortState::Down | PortState::Deleted)
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortState::Added => "added",
            PortState::Up => "up",
            PortState::Down => "down",
            PortState::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PortState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "added" | "add" => Ok(PortState::Added),
            "up" => Ok(PortState::Up),
            "down" => Ok(PortState::Down),
            "deleted" | "delete" => Ok(PortState::Deleted),
            _ => Err(ParseError::InvalidPortState(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ports() {
        assert!(PortNo::CONTROLLER.is_reserved());
        assert!(PortNo::FLOOD.is_reserved());
        assert!(!PortNo::new(1).is_reserved());
        assert!(PortNo::new(1).is_physical());
        assert!(!PortNo::new(0).is_physical());
    }

    #[test]
    fn test_port_display_and_parse() {
        assert_eq!(PortNo::new(7).to_string(), "7");
        assert_eq!(PortNo::CONTROLLER.to_string(), "controller");
        assert_eq!("controller".parse::<PortNo>().unwrap(), PortNo::CONTROLLER);
        assert_eq!("12".parse::<PortNo>().unwrap(), PortNo::new(12));
        assert!("eth0".parse::<PortNo>().is_err());
    }

    #[test]
    fn test_port_state() {
        assert!(PortState::Down.is_down());
        assert!(PortState::Deleted.is_down());
        assert!(!PortState::Up.is_down());
        assert_eq!("delete".parse::<PortState>().unwrap(), PortState::Deleted);
        assert!("flapping".parse::<PortState>().is_err());
    }
}
