// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal IPv4/IPv6 CIDR allow-list matcher, used by the HTTP gateway's
//! authorization check (§4.10). No CIDR-matching crate is present anywhere
//! in the dependency stack this crate is built from; this is hand-rolled
//! directly against `std::net` rather than adding an unlisted dependency.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// One parsed CIDR block.
#[derive(Debug, Clone)]
pub enum CidrBlock {
    V4 { network: Ipv4Addr, prefix: u32 },
    V6 { network: Ipv6Addr, prefix: u32 },
}

impl CidrBlock {
    pub fn parse(spec: &str) -> Option<Self> {
        let (addr_str, prefix_str) = match spec.split_once('/') {
            Some(parts) => parts,
            None => (spec, ""),
        };
        let addr: IpAddr = addr_str.trim().parse().ok()?;
        match addr {
            IpAddr::V4(network) => {
                let prefix = if prefix_str.is_empty() { 32 } else { prefix_str.parse().ok()? };
                if prefix > 32 {
                    return None;
                }
                Some(Self::V4 { network, prefix })
            }
            IpAddr::V6(network) => {
                let prefix = if prefix_str.is_empty() { 128 } else { prefix_str.parse().ok()? };
                if prefix > 128 {
                    return None;
                }
                Some(Self::V6 { network, prefix })
            }
        }
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self, ip) {
            (Self::V4 { network, prefix }, IpAddr::V4(ip)) => {
                mask_v4(u32::from(*network), *prefix) == mask_v4(u32::from(*ip), *prefix)
            }
            (Self::V6 { network, prefix }, IpAddr::V6(ip)) => {
                mask_v6(u128::from(*network), *prefix) == mask_v6(u128::from(*ip), *prefix)
            }
            _ => false,
        }
    }
}

fn mask_v4(addr: u32, prefix: u32) -> u32 {
    if prefix == 0 {
        0
    } else {
        addr & (u32::MAX << (32 - prefix))
    }
}

fn mask_v6(addr: u128, prefix: u32) -> u128 {
    if prefix == 0 {
        0
    } else {
        addr & (u128::MAX << (128 - prefix))
    }
}

/// An allow-list of CIDR blocks. An empty list means "allow all" per §4.10.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    blocks: Vec<CidrBlock>,
}

impl AllowList {
    /// Parse a comma-separated list of CIDR specs. Malformed entries are
    /// dropped silently, consistent with the rest of the daemon's
    /// isolate-and-degrade error policy.
    pub fn parse(csv: &str) -> Self {
        let blocks = csv.split(',').map(str::trim).filter(|s| !s.is_empty()).filter_map(CidrBlock::parse).collect();
        Self { blocks }
    }

    pub fn allows(&self, ip: &IpAddr) -> bool {
        self.blocks.is_empty() || self.blocks.iter().any(|b| b.contains(ip))
    }
}

#[cfg(test)]
#[path = "cidr_tests.rs"]
mod tests;
