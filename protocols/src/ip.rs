//! # IP Header Decoding
//!
//! The version nibble of the first byte selects the header layout:
//! * IPv4: header length is the low nibble times four, addresses at 12..16
//!   and 16..20.
//! * IPv6: fixed 40 byte header, addresses at 8..24 and 24..40. Extension
//!   headers are not followed.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;

use crate::error::{DecodeError, ensure_len};

pub const IPV4_MIN_HDR_LEN: usize = 20;
pub const IPV6_HDR_LEN: usize = 40;
const IPV4_ADDR_LEN: usize = 4;
const IPV6_ADDR_LEN: usize = 16;

/// Common view over decoded IPv4 and IPv6 headers.
pub trait PacketHeader {
    fn version(&self) -> u8;

    /// Length of the header in bytes, i.e. where the payload starts.
    fn header_length(&self) -> usize;

    fn source_ip(&self) -> IpAddr;

    fn destination_ip(&self) -> IpAddr;

    /// IPv4 protocol field or IPv6 next-header field.
    fn payload_protocol(&self) -> u8;

    fn source(&self) -> String {
        format_address(self.source_ip())
    }

    fn destination(&self) -> String {
        format_address(self.destination_ip())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    header_length: usize,
    protocol: u8,
    source: Ipv4Addr,
    destination: Ipv4Addr,
}

impl PacketHeader for Ipv4Header {
    fn version(&self) -> u8 {
        4
    }

    fn header_length(&self) -> usize {
        self.header_length
    }

    fn source_ip(&self) -> IpAddr {
        IpAddr::V4(self.source)
    }

    fn destination_ip(&self) -> IpAddr {
        IpAddr::V4(self.destination)
    }

    fn payload_protocol(&self) -> u8 {
        self.protocol
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    next_header: u8,
    source: Ipv6Addr,
    destination: Ipv6Addr,
}

impl PacketHeader for Ipv6Header {
    fn version(&self) -> u8 {
        6
    }

    fn header_length(&self) -> usize {
        IPV6_HDR_LEN
    }

    fn source_ip(&self) -> IpAddr {
        IpAddr::V6(self.source)
    }

    fn destination_ip(&self) -> IpAddr {
        IpAddr::V6(self.destination)
    }

    fn payload_protocol(&self) -> u8 {
        self.next_header
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpHeader {
    V4(Ipv4Header),
    V6(Ipv6Header),
}

impl IpHeader {
    fn inner(&self) -> &dyn PacketHeader {
        match self {
            IpHeader::V4(header) => header,
            IpHeader::V6(header) => header,
        }
    }
}

impl PacketHeader for IpHeader {
    fn version(&self) -> u8 {
        self.inner().version()
    }

    fn header_length(&self) -> usize {
        self.inner().header_length()
    }

    fn source_ip(&self) -> IpAddr {
        self.inner().source_ip()
    }

    fn destination_ip(&self) -> IpAddr {
        self.inner().destination_ip()
    }

    fn payload_protocol(&self) -> u8 {
        self.inner().payload_protocol()
    }
}

/// Splits `bytes` into the decoded IP header and the bytes that follow it.
pub fn decode_ip_header(bytes: &[u8]) -> Result<(IpHeader, &[u8]), DecodeError> {
    ensure_len("ip header", bytes, 1)?;
    match bytes[0] >> 4 {
        4 => decode_ipv4(bytes),
        6 => decode_ipv6(bytes),
        version => Err(DecodeError::UnknownIpVersion(version)),
    }
}

fn decode_ipv4(bytes: &[u8]) -> Result<(IpHeader, &[u8]), DecodeError> {
    let header_length = usize::from(bytes[0] & 0x0f) * 4;
    if header_length < IPV4_MIN_HDR_LEN {
        return Err(DecodeError::InvalidHeaderLength {
            what: "ipv4",
            length: header_length,
        });
    }
    ensure_len("ipv4 header", bytes, header_length)?;

    let (raw, rest) = bytes.split_at(header_length);
    let packet = Ipv4Packet::new(raw).ok_or(DecodeError::Truncated {
        what: "ipv4 header",
        needed: IPV4_MIN_HDR_LEN,
        available: raw.len(),
    })?;
    let header = Ipv4Header {
        header_length,
        protocol: packet.get_next_level_protocol().0,
        source: packet.get_source(),
        destination: packet.get_destination(),
    };
    Ok((IpHeader::V4(header), rest))
}

fn decode_ipv6(bytes: &[u8]) -> Result<(IpHeader, &[u8]), DecodeError> {
    ensure_len("ipv6 header", bytes, IPV6_HDR_LEN)?;

    let (raw, rest) = bytes.split_at(IPV6_HDR_LEN);
    let packet = Ipv6Packet::new(raw).ok_or(DecodeError::Truncated {
        what: "ipv6 header",
        needed: IPV6_HDR_LEN,
        available: raw.len(),
    })?;
    let header = Ipv6Header {
        next_header: packet.get_next_header().0,
        source: packet.get_source(),
        destination: packet.get_destination(),
    };
    Ok((IpHeader::V6(header), rest))
}

/// Formats four raw bytes in dotted-decimal form.
pub fn decode_ipv4_address(bytes: &[u8]) -> Result<String, DecodeError> {
    let octets: [u8; IPV4_ADDR_LEN] = bytes.try_into().map_err(|_| DecodeError::AddressLength {
        expected: IPV4_ADDR_LEN,
        actual: bytes.len(),
    })?;
    Ok(Ipv4Addr::from(octets).to_string())
}

/// Formats sixteen raw bytes as eight colon-separated groups of four
/// lowercase hex digits. Zero groups are not compressed.
pub fn decode_ipv6_address(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.len() != IPV6_ADDR_LEN {
        return Err(DecodeError::AddressLength {
            expected: IPV6_ADDR_LEN,
            actual: bytes.len(),
        });
    }
    let groups: Vec<String> = bytes
        .chunks_exact(2)
        .map(|pair| format!("{:02x}{:02x}", pair[0], pair[1]))
        .collect();
    Ok(groups.join(":"))
}

fn format_address(ip: IpAddr) -> String {
    let formatted = match ip {
        IpAddr::V4(v4) => decode_ipv4_address(&v4.octets()),
        IpAddr::V6(v6) => decode_ipv6_address(&v6.octets()),
    };
    // Both arms pass correctly sized arrays.
    formatted.unwrap_or_else(|_| ip.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
