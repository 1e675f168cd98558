pub mod arp;

use crate::error::DiscoveryError;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub use arp::ArpScanner;

pub const MIN_PREFIX_LEN: u8 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub ip: Ipv4Addr,
    pub mac: String,
}

pub trait Discovery {
    /// Probe `range` through `interface` and return responders in reply order.
    fn discover(
        &self,
        range: &Ipv4Cidr,
        interface: &str,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, DiscoveryError> {
        if !(MIN_PREFIX_LEN..=32).contains(&prefix_len) {
            return Err(DiscoveryError::InvalidRange(format!(
                "{address}/{prefix_len} (prefix must be between /{MIN_PREFIX_LEN} and /32)"
            )));
        }

        let network = Ipv4Addr::from(u32::from(address) & Self::mask(prefix_len));
        Ok(Self {
            network,
            prefix_len,
        })
    }

    fn mask(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            !0u32 << (32 - u32::from(prefix_len))
        }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & Self::mask(self.prefix_len) == u32::from(self.network)
    }

    /// Probe targets. Network and broadcast addresses are skipped unless the
    /// range is a /31 or /32.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let network = u32::from(self.network);
        let broadcast = network | !Self::mask(self.prefix_len);
        let (first, last) = if self.prefix_len >= 31 {
            (network, broadcast)
        } else {
            (network + 1, broadcast - 1)
        };

        (first..=last).map(Ipv4Addr::from)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = DiscoveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DiscoveryError::InvalidRange(value.to_string());
        let (address, prefix) = value.trim().split_once('/').ok_or_else(invalid)?;
        let address = address.parse::<Ipv4Addr>().map_err(|_| invalid())?;
        let prefix_len = prefix.parse::<u8>().map_err(|_| invalid())?;

        Self::new(address, prefix_len)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::Ipv4Cidr;
    use std::net::Ipv4Addr;

    #[test]
    fn host_bits_are_masked_off() {
        let cidr = "192.168.0.1/24".parse::<Ipv4Cidr>().expect("cidr");

        assert!(cidr.contains(Ipv4Addr::new(192, 168, 0, 0)));
        assert_eq!(cidr.to_string(), "192.168.0.0/24");
    }

    #[test]
    fn hosts_skip_network_and_broadcast() {
        let cidr = "192.168.0.1/24".parse::<Ipv4Cidr>().expect("cidr");
        let hosts = cidr.hosts().collect::<Vec<_>>();

        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts.first(), Some(&Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(hosts.last(), Some(&Ipv4Addr::new(192, 168, 0, 254)));
    }

    #[test]
    fn single_host_range_targets_itself() {
        let cidr = "10.0.0.7/32".parse::<Ipv4Cidr>().expect("cidr");

        assert_eq!(cidr.hosts().collect::<Vec<_>>(), vec![Ipv4Addr::new(10, 0, 0, 7)]);
    }

    #[test]
    fn contains_checks_prefix() {
        let cidr = "10.1.0.0/16".parse::<Ipv4Cidr>().expect("cidr");

        assert!(cidr.contains(Ipv4Addr::new(10, 1, 200, 3)));
        assert!(!cidr.contains(Ipv4Addr::new(10, 2, 0, 1)));
    }

    #[test]
    fn rejects_malformed_and_oversized_ranges() {
        assert!("192.168.0.1".parse::<Ipv4Cidr>().is_err());
        assert!("300.1.1.1/24".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/8".parse::<Ipv4Cidr>().is_err());
    }
}
