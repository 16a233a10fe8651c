//! Core target types: validated ports and CIDR host enumeration.
//!
//! Both expanders are pure functions; identical input always yields the
//! same ordered output.

mod port;
mod target;

pub use port::{enumerate_port_specs, enumerate_ports, Port};
pub use target::{
    address_count, enumerate_hosts, expand_cidrs, increment_address, parse_block, parse_blocks,
    CidrHosts,
};
