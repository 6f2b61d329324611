//! Addressing plan: one /24 subnet per service class.
//!
//! Class *i* (declaration order) owns `10.0.(i+1).0/24`, so with the default
//! class order Web hosts live in `10.0.1.x`, Video in `10.0.2.x` and IoT in
//! `10.0.3.x`.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::qos::ServiceClass;

pub const SUBNET_PREFIX_LEN: u8 = 24;
pub const MAX_HOSTS_PER_SUBNET: usize = 254;

const BASE: [u8; 2] = [10, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Subnet {
    pub class: ServiceClass,
    pub network: Ipv4Addr,
    pub prefix_len: u8,
}

impl Subnet {
    fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix_len.min(32)))
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask() == u32::from(self.network) & self.mask()
    }

    /// Address of the `index`-th host (0-based), `None` once the pool is exhausted.
    pub fn host(&self, index: usize) -> Option<Ipv4Addr> {
        if index >= MAX_HOSTS_PER_SUBNET {
            return None;
        }
        Some(Ipv4Addr::from(u32::from(self.network) + index as u32 + 1))
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.network, self.prefix_len, self.class)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPlan {
    subnets: Vec<Subnet>,
}

impl AddressPlan {
    pub fn new(classes: &[ServiceClass]) -> Self {
        let subnets = classes
            .iter()
            .enumerate()
            .map(|(i, &class)| Subnet {
                class,
                network: Ipv4Addr::new(BASE[0], BASE[1], (i + 1) as u8, 0),
                prefix_len: SUBNET_PREFIX_LEN,
            })
            .collect();
        Self { subnets }
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn subnet(&self, class: ServiceClass) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.class == class)
    }

    /// Service class owning `addr`, if any.
    pub fn classify(&self, addr: Ipv4Addr) -> Option<ServiceClass> {
        self.subnets
            .iter()
            .find(|s| s.contains(addr))
            .map(|s| s.class)
    }
}
