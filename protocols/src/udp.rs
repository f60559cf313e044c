use pnet::packet::udp::UdpPacket;

use crate::error::DecodeError;

pub const UDP_HDR_LEN: usize = 8;
pub const IP_PROTOCOL_UDP: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
}

/// Splits `bytes` into the UDP header and the datagram payload.
pub fn decode_udp_header(bytes: &[u8]) -> Result<(UdpHeader, &[u8]), DecodeError> {
    let packet = UdpPacket::new(bytes).ok_or(DecodeError::Truncated {
        what: "udp header",
        needed: UDP_HDR_LEN,
        available: bytes.len(),
    })?;
    let header = UdpHeader {
        source_port: packet.get_source(),
        destination_port: packet.get_destination(),
    };
    Ok((header, &bytes[UDP_HDR_LEN..]))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
