use pnet::packet::tcp::TcpPacket;

use crate::error::{DecodeError, ensure_len};

pub const TCP_MIN_HDR_LEN: usize = 20;
pub const IP_PROTOCOL_TCP: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub header_length: usize,
    pub flags: u8,
}

impl TcpHeader {
    pub fn is_syn(&self) -> bool {
        self.flags & 0x02 != 0
    }
}

/// Splits `bytes` into the decoded TCP header and the segment payload.
///
/// The header length comes from the data offset in the top nibble of byte 12.
pub fn decode_tcp_header(bytes: &[u8]) -> Result<(TcpHeader, &[u8]), DecodeError> {
    ensure_len("tcp header", bytes, TCP_MIN_HDR_LEN)?;
    let header_length = usize::from(bytes[12] >> 4) * 4;
    if header_length < TCP_MIN_HDR_LEN {
        return Err(DecodeError::InvalidHeaderLength {
            what: "tcp",
            length: header_length,
        });
    }
    ensure_len("tcp header", bytes, header_length)?;

    let (raw, rest) = bytes.split_at(header_length);
    let packet = TcpPacket::new(raw).ok_or(DecodeError::Truncated {
        what: "tcp header",
        needed: TCP_MIN_HDR_LEN,
        available: raw.len(),
    })?;
    let header = TcpHeader {
        source_port: packet.get_source(),
        destination_port: packet.get_destination(),
        header_length,
        flags: bytes[13],
    };
    Ok((header, rest))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
