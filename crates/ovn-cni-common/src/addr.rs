//! IPv4 and hardware address literals.

use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::CniError;

/// An IPv4 address with its prefix length, e.g. `10.100.1.2/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    /// The host address.
    pub addr: Ipv4Addr,
    /// Prefix length (0-32).
    pub prefix_len: u8,
}

impl Ipv4Cidr {
    /// Create a new address, rejecting prefixes longer than 32 bits.
    ///
    /// # Errors
    ///
    /// Returns [`CniError::AddressParse`] for an out-of-range prefix.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, CniError> {
        if prefix_len > 32 {
            return Err(CniError::AddressParse {
                value: format!("{addr}/{prefix_len}"),
            });
        }
        Ok(Self { addr, prefix_len })
    }
}

impl FromStr for Ipv4Cidr {
    type Err = CniError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CniError::AddressParse {
            value: s.to_string(),
        };

        let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix.parse().map_err(|_| invalid())?;
        Self::new(addr, prefix_len).map_err(|_| invalid())
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A 48-bit Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create from raw octets.
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw octets.
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Parse from the raw bytes of a netlink address attribute.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        <[u8; 6]>::try_from(bytes).ok().map(Self)
    }
}

impl FromStr for MacAddress {
    type Err = CniError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CniError::MacParse {
            value: s.to_string(),
        };

        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cidr() {
        let cidr: Ipv4Cidr = "10.100.1.2/24".parse().unwrap();
        assert_eq!(cidr.addr, Ipv4Addr::new(10, 100, 1, 2));
        assert_eq!(cidr.prefix_len, 24);
        assert_eq!(cidr.to_string(), "10.100.1.2/24");
    }

    #[test]
    fn reject_bad_cidr() {
        for value in ["10.100.1.2", "10.100.1/24", "10.100.1.2/33", "10.100.1.2/x", ""] {
            let err = value.parse::<Ipv4Cidr>().unwrap_err();
            assert!(matches!(err, CniError::AddressParse { .. }), "{value}");
        }
    }

    #[test]
    fn parse_mac() {
        let mac: MacAddress = "00:02:00:00:00:01".parse().unwrap();
        assert_eq!(mac.octets(), [0, 2, 0, 0, 0, 1]);
        assert_eq!(mac.to_string(), "00:02:00:00:00:01");

        let upper: MacAddress = "AA:bb:0C:00:00:FF".parse().unwrap();
        assert_eq!(upper.to_string(), "aa:bb:0c:00:00:ff");
    }

    #[test]
    fn reject_bad_mac() {
        for value in ["00:02:00:00:00", "00:02:00:00:00:01:02", "0:2:0:0:0:1", "zz:02:00:00:00:01"] {
            let err = value.parse::<MacAddress>().unwrap_err();
            assert!(matches!(err, CniError::MacParse { .. }), "{value}");
        }
    }

    #[test]
    fn mac_from_netlink_bytes() {
        assert_eq!(
            MacAddress::from_bytes(&[0, 2, 0, 0, 0, 1]),
            Some(MacAddress::new([0, 2, 0, 0, 0, 1]))
        );
        assert_eq!(MacAddress::from_bytes(&[0, 2, 0]), None);
    }

    #[test]
    fn serializes_as_string() {
        let cidr: Ipv4Cidr = "10.100.1.2/24".parse().unwrap();
        assert_eq!(serde_json::to_string(&cidr).unwrap(), "\"10.100.1.2/24\"");
    }
}
