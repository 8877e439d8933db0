//! Subnet layout for cluster VPCs

use std::net::Ipv4Addr;

use apppack_core::{EngineError, EngineResult};

pub const DEFAULT_CIDR: &str = "10.100.0.0/16";

/// Size of one /20 block
const BLOCK: u32 = 1 << 12;
const PUBLIC_BLOCKS: [u32; 3] = [0, 1, 2];
const PRIVATE_BLOCKS: [u32; 3] = [6, 7, 8];

/// Three public and three private /20 subnets carved from a VPC block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetLayout {
    pub public: Vec<String>,
    pub private: Vec<String>,
}

/// Split a /16 (or larger) block into the cluster subnet layout
pub fn split_cidr(cidr: &str) -> EngineResult<SubnetLayout> {
    let invalid = |why: &str| EngineError::user_input(format!("invalid CIDR {}: {}", cidr, why));

    let (addr, prefix) = cidr
        .trim()
        .split_once('/')
        .ok_or_else(|| invalid("expected <address>/<prefix>"))?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid("bad address"))?;
    let prefix: u32 = prefix.parse().map_err(|_| invalid("bad prefix"))?;
    if prefix > 16 {
        return Err(invalid("prefix must be /16 or larger"));
    }

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let base = u32::from(addr) & mask;
    let subnet = |index: u32| format!("{}/20", Ipv4Addr::from(base + index * BLOCK));

    Ok(SubnetLayout {
        public: PUBLIC_BLOCKS.iter().map(|i| subnet(*i)).collect(),
        private: PRIVATE_BLOCKS.iter().map(|i| subnet(*i)).collect(),
    })
}

/// The three availability zones used by a cluster
pub fn availability_zones(region: &str) -> Vec<String> {
    ["a", "b", "c"]
        .iter()
        .map(|suffix| format!("{}{}", region, suffix))
        .collect()
}
