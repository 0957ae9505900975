use ipnetwork::{IpNetwork, Ipv4Network};
use std::net::IpAddr;

/*-------------------------------------------------------------------------------------------------
  Address Family
-------------------------------------------------------------------------------------------------*/

/// IP address family (IPv4 or IPv6); each family has its own bit width and its own trie.
#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    /// Number of address bits in the family.
    pub fn bits(&self) -> u8 {
        match self {
            AddressFamily::IPv4 => 32,
            AddressFamily::IPv6 => 128,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        match self {
            AddressFamily::IPv4 => true,
            AddressFamily::IPv6 => false,
        }
    }

    pub fn is_ipv6(&self) -> bool {
        match self {
            AddressFamily::IPv4 => false,
            AddressFamily::IPv6 => true,
        }
    }

    /// Family an address is routed to. IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) belong
    /// to the IPv4 family.
    pub fn of(address: &IpAddr) -> AddressFamily {
        match canonical(address) {
            IpAddr::V4(_) => AddressFamily::IPv4,
            IpAddr::V6(_) => AddressFamily::IPv6,
        }
    }
}

/// Reduce an IPv4-mapped IPv6 address to its IPv4 form; other addresses are returned as-is.
pub(crate) fn canonical(address: &IpAddr) -> IpAddr {
    match address {
        IpAddr::V6(ipv6) => ipv6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(*address),
        IpAddr::V4(_) => *address,
    }
}

/// Reduce a block inside `::ffff:0:0/96` to the IPv4 block it maps. Shorter IPv6 blocks
/// also cover non-mapped addresses and are returned as-is.
pub(crate) fn canonical_network(network: &IpNetwork) -> IpNetwork {
    match network {
        IpNetwork::V6(ipv6) if ipv6.prefix() >= 96 => ipv6
            .ip()
            .to_ipv4_mapped()
            .and_then(|ipv4| Ipv4Network::new(ipv4, ipv6.prefix() - 96).ok())
            .map(IpNetwork::V4)
            .unwrap_or(*network),
        _ => *network,
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;

    /*----------------------------------------------------------------------------------
      AddressFamily
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_address_family_is_ipv4() {
        let ipv4 = AddressFamily::IPv4;
        assert!(ipv4.is_ipv4());
        assert!(!ipv4.is_ipv6());
        assert_eq!(ipv4.bits(), 32);
    }

    #[test]
    fn test_address_family_is_ipv6() {
        let ipv6 = AddressFamily::IPv6;
        assert!(!ipv6.is_ipv4());
        assert!(ipv6.is_ipv6());
        assert_eq!(ipv6.bits(), 128);
    }

    #[test]
    fn test_address_family_of_mapped_address() {
        let mapped: IpAddr = "::ffff:192.168.1.1".parse().unwrap();
        assert_eq!(AddressFamily::of(&mapped), AddressFamily::IPv4);
        assert_eq!(canonical(&mapped), "192.168.1.1".parse::<IpAddr>().unwrap());

        let native: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(AddressFamily::of(&native), AddressFamily::IPv6);
        assert_eq!(canonical(&native), native);
    }

    #[test]
    fn test_canonical_network_of_mapped_block() {
        let mapped: IpNetwork = "::ffff:10.0.0.0/104".parse().unwrap();
        assert_eq!(canonical_network(&mapped), "10.0.0.0/8".parse::<IpNetwork>().unwrap());

        let whole: IpNetwork = "::ffff:0:0/96".parse().unwrap();
        assert_eq!(canonical_network(&whole), "0.0.0.0/0".parse::<IpNetwork>().unwrap());

        let wider: IpNetwork = "::/80".parse().unwrap();
        assert_eq!(canonical_network(&wider), wider);
    }
}
