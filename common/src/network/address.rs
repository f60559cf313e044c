//! # Claimable Address Model
//!
//! A [`NetworkAddress`] is an IP literal together with its prefix length, the
//! unit in which addresses are claimed on an interface and matched in firewall
//! rules.
//!
//! Accepted input forms:
//! * A bare literal (`10.0.0.1`, `fe80::123`), which receives a default prefix.
//! * CIDR notation (`10.0.0.1/16`, `fe80::123/64`).
//! * A scoped IPv6 literal (`fe80::123%eth0/64`); the zone is dropped.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::FormatError;

const DEFAULT_V4_PREFIX: u8 = 24;
const DEFAULT_V6_PREFIX: u8 = 64;
const MAX_V4_PREFIX: u8 = 32;
const MAX_V6_PREFIX: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    pub fn max_prefix(self) -> u8 {
        match self {
            AddressFamily::V4 => MAX_V4_PREFIX,
            AddressFamily::V6 => MAX_V6_PREFIX,
        }
    }
}

/// An address plus prefix length, always within the family's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkAddress {
    ip: IpAddr,
    prefix: u8,
}

impl NetworkAddress {
    pub fn new(ip: IpAddr, prefix: u8) -> Result<Self, FormatError> {
        let max = AddressFamily::of(&ip).max_prefix();
        if prefix > max {
            return Err(FormatError::PrefixOutOfRange {
                address: ip.to_string(),
                prefix: u32::from(prefix),
                max,
            });
        }
        Ok(Self { ip, prefix })
    }

    /// Wraps a literal with the prefix a bare literal is normalized to:
    /// `/24` for IPv4, `/64` for IPv6 and `/128` for the IPv6 loopback.
    pub fn with_default_prefix(ip: IpAddr) -> Self {
        let prefix = match ip {
            IpAddr::V4(_) => DEFAULT_V4_PREFIX,
            IpAddr::V6(v6) if v6 == Ipv6Addr::LOCALHOST => MAX_V6_PREFIX,
            IpAddr::V6(_) => DEFAULT_V6_PREFIX,
        };
        Self { ip, prefix }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.ip)
    }

    pub fn is_ipv6(&self) -> bool {
        self.family() == AddressFamily::V6
    }

    /// `fe80::/10`, the only scope that needs an interface suffix when pinged.
    pub fn is_link_local(&self) -> bool {
        match self.ip {
            IpAddr::V6(v6) => v6.is_unicast_link_local(),
            IpAddr::V4(_) => false,
        }
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix)
    }
}

impl From<Ipv4Addr> for NetworkAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self::with_default_prefix(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for NetworkAddress {
    fn from(ip: Ipv6Addr) -> Self {
        Self::with_default_prefix(IpAddr::V6(ip))
    }
}

impl FromStr for NetworkAddress {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.matches('/').count() > 1 {
            return Err(FormatError::TooManySeparators(s.to_string()));
        }

        let Some((ip_str, prefix_str)) = s.split_once('/') else {
            return Ok(Self::with_default_prefix(parse_pure_ip(s)?));
        };

        let ip = parse_pure_ip(ip_str)?;
        let prefix: u32 = prefix_str
            .parse()
            .map_err(|_| FormatError::InvalidPrefix(s.to_string()))?;
        let max = AddressFamily::of(&ip).max_prefix();
        if prefix > u32::from(max) {
            return Err(FormatError::PrefixOutOfRange {
                address: ip.to_string(),
                prefix,
                max,
            });
        }

        Ok(Self {
            ip,
            prefix: prefix as u8,
        })
    }
}

/// Parses a comma-separated list such as `10.0.0.1/16,fe80::123/64`.
pub fn parse_list(s: &str) -> Result<Vec<NetworkAddress>, FormatError> {
    let addresses = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(NetworkAddress::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if addresses.is_empty() {
        return Err(FormatError::NoAddress);
    }
    ensure_distinct(&addresses)?;
    Ok(addresses)
}

/// Rejects lists that name the same IP twice, whatever the prefixes.
pub fn ensure_distinct(addresses: &[NetworkAddress]) -> Result<(), FormatError> {
    for (idx, address) in addresses.iter().enumerate() {
        if addresses[..idx].iter().any(|earlier| earlier.ip() == address.ip()) {
            return Err(FormatError::DuplicateAddress(address.ip()));
        }
    }
    Ok(())
}

fn parse_pure_ip(s: &str) -> Result<IpAddr, FormatError> {
    let without_zone = s.split('%').next().unwrap_or(s);
    without_zone
        .parse::<IpAddr>()
        .map_err(|_| FormatError::InvalidAddress(s.to_string()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
