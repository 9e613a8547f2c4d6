//! Switch datapath identifier.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 64-bit switch datapath identifier.
///
/// Displayed as 16 zero-padded hex digits, the form switches report it in.
/// Parsing accepts that form, a `0x` prefixed hex string, or a decimal number.
///
/// ```
/// use sdnflow_types::DatapathId;
///
/// let dpid = DatapathId::new(0x1009);
/// assert_eq!(dpid.to_string(), "0000000000001009");
/// assert_eq!("0000000000001009".parse::<DatapathId>().unwrap(), dpid);
/// assert_eq!("4105".parse::<DatapathId>().unwrap(), dpid);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapathId(u64);

impl DatapathId {
    pub const fn new(id: u64) -> Self {
        DatapathId(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for DatapathId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidDatapathId(s.to_string());
        let value = if let Some(hex) = s.strip_prefix("0x") {
            u64::from_str_radix(hex, 16).map_err(|_| invalid())?
        } else if s.len() == 16 {
            u64::from_str_radix(s, 16).map_err(|_| invalid())?
        } else {
            s.parse::<u64>().map_err(|_| invalid())?
        };
        Ok(DatapathId(value))
    }
}

impl From<u64> for DatapathId {
    fn from(id: u64) -> Self {
        DatapathId(id)
    }
}

impl From<DatapathId> for u64 {
    fn from(dpid: DatapathId) -> u64 {
        dpid.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_zero_padded_hex() {
        assert_eq!(DatapathId::new(1).to_string(), "0000000000000001");
        assert_eq!(DatapathId::new(0xabcdef).to_string(), "0000000000abcdef");
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("0x10".parse::<DatapathId>().unwrap(), DatapathId::new(16));
        assert_eq!("16".parse::<DatapathId>().unwrap(), DatapathId::new(16));
        assert_eq!(
            "0000000000000010".parse::<DatapathId>().unwrap(),
            DatapathId::new(16)
        );
        assert!("switch-1".parse::<DatapathId>().is_err());
        assert!("0xzz".parse::<DatapathId>().is_err());
    }

    #[test]
    fn test_ordering_follows_numeric_value() {
        let mut ids = vec![DatapathId::new(3), DatapathId::new(1), DatapathId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![DatapathId::new(1), DatapathId::new(2), DatapathId::new(3)]);
    }
}
