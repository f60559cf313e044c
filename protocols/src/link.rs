use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use sleep_proxy_common::network::HardwareAddress;

use crate::error::{DecodeError, ensure_len};

pub const ETH_HDR_LEN: usize = 14;
pub const VLAN_TAG_LEN: usize = 4;
const PROVIDER_BRIDGE: EtherType = EtherType(0x88a8);
const LEGACY_QINQ: EtherType = EtherType(0x9100);

/// Framing of captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Ethernet II, optionally with 802.1Q tags.
    Ethernet,
    /// Bare IP packets (tun devices).
    RawIp,
}

/// A frame with its link layer taken apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkFrame<'a> {
    /// Innermost EtherType, after any VLAN tags.
    pub ethertype: EtherType,
    /// Sender hardware address, if the link has one.
    pub source: Option<HardwareAddress>,
    pub payload: &'a [u8],
}

/// Splits `frame` into its link header fields and payload. Raw IP frames
/// get their EtherType from the IP version nibble.
pub fn split_link_layer(link: LinkType, frame: &[u8]) -> Result<LinkFrame<'_>, DecodeError> {
    match link {
        LinkType::RawIp => {
            ensure_len("ip version", frame, 1)?;
            let ethertype = match frame[0] >> 4 {
                4 => EtherTypes::Ipv4,
                6 => EtherTypes::Ipv6,
                version => return Err(DecodeError::UnknownIpVersion(version)),
            };
            Ok(LinkFrame {
                ethertype,
                source: None,
                payload: frame,
            })
        }
        LinkType::Ethernet => split_ethernet(frame),
    }
}

/// Returns the IP packet carried by `frame`.
///
/// Only IPv4 and IPv6 payloads are accepted.
pub fn strip_link_layer(link: LinkType, frame: &[u8]) -> Result<&[u8], DecodeError> {
    let split = split_link_layer(link, frame)?;
    accept_ip(split.ethertype)?;
    Ok(split.payload)
}

fn split_ethernet(frame: &[u8]) -> Result<LinkFrame<'_>, DecodeError> {
    let ethernet = EthernetPacket::new(frame).ok_or(DecodeError::Truncated {
        what: "ethernet header",
        needed: ETH_HDR_LEN,
        available: frame.len(),
    })?;

    let mut ethertype = ethernet.get_ethertype();
    let mut offset = ETH_HDR_LEN;
    while is_vlan_tag(ethertype) {
        ensure_len("vlan tag", frame, offset + VLAN_TAG_LEN)?;
        ethertype = EtherType(u16::from_be_bytes([frame[offset + 2], frame[offset + 3]]));
        offset += VLAN_TAG_LEN;
    }
    Ok(LinkFrame {
        ethertype,
        source: Some(HardwareAddress::from(ethernet.get_source())),
        payload: &frame[offset..],
    })
}

fn is_vlan_tag(ethertype: EtherType) -> bool {
    ethertype == EtherTypes::Vlan || ethertype == PROVIDER_BRIDGE || ethertype == LEGACY_QINQ
}

fn accept_ip(ethertype: EtherType) -> Result<(), DecodeError> {
    if ethertype == EtherTypes::Ipv4 || ethertype == EtherTypes::Ipv6 {
        Ok(())
    } else {
        Err(DecodeError::UnsupportedEtherType(ethertype.0))
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
