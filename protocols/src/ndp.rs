//! # Neighbor Discovery
//!
//! Only solicitations and advertisements are read, and of those only the
//! target address: that is enough to notice another node using or checking
//! an IPv6 address.

use std::net::Ipv6Addr;

use crate::error::{DecodeError, ensure_len};

pub const IP_PROTOCOL_ICMPV6: u8 = 58;
pub const NEIGHBOR_SOLICITATION: u8 = 135;
pub const NEIGHBOR_ADVERTISEMENT: u8 = 136;
const NDP_MIN_LEN: usize = 24;
const TARGET_OFFSET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborMessage {
    Solicitation { target: Ipv6Addr },
    Advertisement { target: Ipv6Addr },
}

impl NeighborMessage {
    pub fn target(&self) -> Ipv6Addr {
        match self {
            NeighborMessage::Solicitation { target } | NeighborMessage::Advertisement { target } => *target,
        }
    }
}

/// Reads the ICMPv6 message in `bytes`. Other ICMPv6 types give `Ok(None)`.
pub fn decode_neighbor_message(bytes: &[u8]) -> Result<Option<NeighborMessage>, DecodeError> {
    ensure_len("icmpv6 header", bytes, 1)?;
    let kind = bytes[0];
    if kind != NEIGHBOR_SOLICITATION && kind != NEIGHBOR_ADVERTISEMENT {
        return Ok(None);
    }
    ensure_len("neighbor discovery message", bytes, NDP_MIN_LEN)?;
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&bytes[TARGET_OFFSET..NDP_MIN_LEN]);
    let target = Ipv6Addr::from(octets);
    Ok(Some(if kind == NEIGHBOR_SOLICITATION {
        NeighborMessage::Solicitation { target }
    } else {
        NeighborMessage::Advertisement { target }
    }))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
