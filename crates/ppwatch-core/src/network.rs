//! Target network parsing and membership
//!
//! Addresses reported by the router carry their prefix length
//! (`58.32.1.5/32`), so both the target and the observed address are
//! represented as [`Ipv4Net`].

use crate::error::{Error, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Parse an address with optional prefix length.
///
/// A bare address is treated as a host route (`/32`).
pub fn parse_address(s: &str) -> Option<Ipv4Net> {
    let s = s.trim();
    if let Ok(net) = s.parse::<Ipv4Net>() {
        return Some(net);
    }
    s.parse::<Ipv4Addr>().ok().map(Ipv4Net::from)
}

/// Parse the configured target network.
///
/// The target must be in canonical form: `58.32.0.0/16` is accepted,
/// `58.32.1.0/16` is rejected because host bits are set.
pub fn parse_target_network(s: &str) -> Result<Ipv4Net> {
    let net = parse_address(s)
        .ok_or_else(|| Error::config(format!("Invalid target network: '{}'", s)))?;

    if net.network() != net.addr() {
        return Err(Error::config(format!(
            "Target network {} has host bits set (did you mean {}?)",
            net,
            net.trunc()
        )));
    }

    Ok(net)
}

/// Whether `address` lies within `target`.
///
/// The address' prefix must be at least as long as the target's and its
/// network masked to the target prefix must equal the target base.
pub fn in_target(address: &Ipv4Net, target: &Ipv4Net) -> bool {
    target.contains(address)
}
