//! CIDR expansion and host enumeration.
//!
//! Blocks are enumerated exhaustively in ascending numeric order, network and
//! broadcast addresses included. Addresses are stepped by treating the octet
//! buffer as a big-endian counter, so IPv4 and IPv6 share one code path.

use crate::error::ConfigError;
use ipnetwork::IpNetwork;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Parse one CIDR block. A bare address is accepted as a single-host block.
pub fn parse_block(block: &str) -> Result<IpNetwork, ConfigError> {
    let block = block.trim();
    block
        .parse::<IpNetwork>()
        .map_err(|e| ConfigError::InvalidRange {
            block: block.to_string(),
            reason: e.to_string(),
        })
}

/// Parse every block, failing on the first malformed one.
pub fn parse_blocks<S: AsRef<str>>(blocks: &[S]) -> Result<Vec<IpNetwork>, ConfigError> {
    blocks.iter().map(|b| parse_block(b.as_ref())).collect()
}

/// Number of addresses in a block, saturating for an IPv6 `/0`.
pub fn address_count(network: &IpNetwork) -> u128 {
    let bits: u32 = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    1u128
        .checked_shl(bits - u32::from(network.prefix()))
        .unwrap_or(u128::MAX)
}

/// Increment an address buffer in place as a big-endian counter.
///
/// Returns `false` when the counter wraps past all-ones, leaving the buffer
/// at all-zeros.
pub fn increment_address(octets: &mut [u8]) -> bool {
    for byte in octets.iter_mut().rev() {
        let (value, carry) = byte.overflowing_add(1);
        *byte = value;
        if !carry {
            return true;
        }
    }
    false
}

fn successor(ip: IpAddr) -> Option<IpAddr> {
    match ip {
        IpAddr::V4(v4) => {
            let mut octets = v4.octets();
            increment_address(&mut octets).then(|| IpAddr::V4(Ipv4Addr::from(octets)))
        }
        IpAddr::V6(v6) => {
            let mut octets = v6.octets();
            increment_address(&mut octets).then(|| IpAddr::V6(Ipv6Addr::from(octets)))
        }
    }
}

/// Lazy iterator over every address of a block.
#[derive(Debug, Clone)]
pub struct CidrHosts {
    network: IpNetwork,
    next: Option<IpAddr>,
}

impl CidrHosts {
    pub fn new(network: IpNetwork) -> Self {
        Self {
            network,
            next: Some(network.network()),
        }
    }
}

impl Iterator for CidrHosts {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        let current = self.next?;
        self.next = successor(current).filter(|ip| self.network.contains(*ip));
        Some(current)
    }
}

/// Expand CIDR blocks into their addresses, block by block.
///
/// Either every block parses and the full expansion is returned, or the
/// first parse failure is returned with no partial result.
pub fn expand_cidrs<S: AsRef<str>>(blocks: &[S]) -> Result<Vec<IpAddr>, ConfigError> {
    let networks = parse_blocks(blocks)?;
    Ok(networks.into_iter().flat_map(CidrHosts::new).collect())
}

/// Expand `include` and drop every address covered by an `exclude` block.
///
/// Order follows the include expansion. Exclude blocks that do not overlap
/// the include set have no effect.
pub fn enumerate_hosts<S: AsRef<str>, T: AsRef<str>>(
    include: &[S],
    exclude: &[T],
) -> Result<Vec<IpAddr>, ConfigError> {
    let networks = parse_blocks(include)?;
    let excluded = parse_blocks(exclude)?;

    Ok(networks
        .into_iter()
        .flat_map(CidrHosts::new)
        .filter(|ip| !excluded.iter().any(|net| net.contains(*ip)))
        .collect())
}
