//! Port types and the port specification grammar.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! A specification is a comma-separated list of tokens, each either a single
//! port (`"22"`) or an inclusive ascending range (`"8000-8010"`).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| ConfigError::InvalidPortSpec(value.to_string()))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl FromStr for Port {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u16 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPortSpec(s.to_string()))?;
        Self::try_from(value)
    }
}

/// Expand a port specification into an ordered list of ports.
///
/// Tokens are expanded in the order given and duplicates are kept. Empty
/// tokens (`"22,,80"`) are skipped, so an empty string yields an empty list;
/// rejecting an empty port set is left to configuration validation.
///
/// A range must have both bounds and `start <= end`: `"1-"`, `"-5"`,
/// `"1-2-3"` and `"10-5"` are all rejected.
pub fn enumerate_ports(spec: &str) -> Result<Vec<Port>, ConfigError> {
    let mut ports = Vec::new();

    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            None => ports.push(token.parse()?),
            Some((start, end)) => {
                let invalid = || ConfigError::InvalidPortSpec(token.to_string());
                if start.trim().is_empty() || end.trim().is_empty() || end.contains('-') {
                    return Err(invalid());
                }
                let start: Port = start.parse().map_err(|_| invalid())?;
                let end: Port = end.parse().map_err(|_| invalid())?;
                if start > end {
                    return Err(invalid());
                }
                ports.extend((start.as_u16()..=end.as_u16()).map(Port));
            }
        }
    }

    Ok(ports)
}

/// Expand several specifications (one per `-p` flag), concatenated in order.
pub fn enumerate_port_specs<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Port>, ConfigError> {
    let mut ports = Vec::new();
    for spec in specs {
        ports.extend(enumerate_ports(spec.as_ref())?);
    }
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ports: &[Port]) -> Vec<u16> {
        ports.iter().map(|p| p.as_u16()).collect()
    }

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_none());
        assert!(Port::new(1).is_some());
        assert!(Port::new(65535).is_some());
        assert!("0".parse::<Port>().is_err());
        assert!("65536".parse::<Port>().is_err());
    }

    #[test]
    fn test_single_port() {
        assert_eq!(raw(&enumerate_ports("22").unwrap()), vec![22]);
    }

    #[test]
    fn test_comma_list() {
        assert_eq!(raw(&enumerate_ports("22,80,443").unwrap()), vec![22, 80, 443]);
    }

    #[test]
    fn test_range_and_list() {
        assert_eq!(
            raw(&enumerate_ports("1-5,443").unwrap()),
            vec![1, 2, 3, 4, 5, 443]
        );
    }

    #[test]
    fn test_half_open_range_rejected() {
        assert!(enumerate_ports("1-").is_err());
        assert!(enumerate_ports("1-,443").is_err());
        assert!(enumerate_ports("-5").is_err());
        assert!(enumerate_ports("-").is_err());
        assert!(enumerate_ports("1-2-3").is_err());
    }

    #[test]
    fn test_descending_range_rejected() {
        assert!(matches!(
            enumerate_ports("10-5"),
            Err(ConfigError::InvalidPortSpec(t)) if t == "10-5"
        ));
    }

    #[test]
    fn test_non_numeric_rejected() {
        assert!(enumerate_ports("ssh").is_err());
        assert!(enumerate_ports("22,http").is_err());
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        assert_eq!(
            raw(&enumerate_ports("80,22,80").unwrap()),
            vec![80, 22, 80]
        );
    }

    #[test]
    fn test_empty_tokens_skipped() {
        assert_eq!(raw(&enumerate_ports("22,,80,").unwrap()), vec![22, 80]);
        assert!(enumerate_ports("").unwrap().is_empty());
    }

    #[test]
    fn test_multiple_specs_concatenate() {
        let ports = enumerate_port_specs(&["443", "20-22", "443"]).unwrap();
        assert_eq!(raw(&ports), vec![443, 20, 21, 22, 443]);
    }

    #[test]
    fn test_enumeration_is_repeatable() {
        let spec = "1-3,8080,22";
        assert_eq!(enumerate_ports(spec).unwrap(), enumerate_ports(spec).unwrap());
    }
}
