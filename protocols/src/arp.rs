//! # ARP
//!
//! Builds the duplicate address request used to find out whether a claimed
//! IPv4 address is still in use elsewhere, and reads the fields that tell who
//! answered.

use std::net::Ipv4Addr;

use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet::util::MacAddr;
use sleep_proxy_common::network::HardwareAddress;

use crate::error::{DecodeError, PacketError};
use crate::link::ETH_HDR_LEN;

pub const ARP_LEN: usize = 28;
pub const MIN_ETH_FRAME_NO_FCS: usize = 60;

/// The parts of an ARP packet that identify its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpMessage {
    pub sender_hardware: HardwareAddress,
    pub sender_ip: Ipv4Addr,
    pub target_ip: Ipv4Addr,
}

impl ArpMessage {
    /// An RFC 5227 address check: the sender has no address yet.
    pub fn is_address_check(&self) -> bool {
        self.sender_ip.is_unspecified()
    }
}

/// Broadcast request for `target` with an unspecified sender address, the
/// way `arping -D` asks. Any host using `target` answers it.
pub fn duplicate_address_request(local: &HardwareAddress, target: Ipv4Addr) -> Result<Vec<u8>, PacketError> {
    let mut buffer = vec![0u8; MIN_ETH_FRAME_NO_FCS];
    {
        let mut eth = MutableEthernetPacket::new(&mut buffer).ok_or(PacketError::EthernetBuffer)?;
        eth.set_destination(MacAddr::broadcast());
        eth.set_source(MacAddr::from(*local));
        eth.set_ethertype(EtherTypes::Arp);
    }
    let mut arp = MutableArpPacket::new(&mut buffer[ETH_HDR_LEN..ETH_HDR_LEN + ARP_LEN])
        .ok_or(PacketError::ArpBuffer)?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(MacAddr::from(*local));
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_sender_proto_addr(Ipv4Addr::UNSPECIFIED);
    arp.set_target_proto_addr(target);
    Ok(buffer)
}

/// Reads an Ethernet/IPv4 ARP packet; other hardware or protocol types are
/// rejected.
pub fn decode_arp(payload: &[u8]) -> Result<ArpMessage, DecodeError> {
    let arp = ArpPacket::new(payload).ok_or(DecodeError::Truncated {
        what: "arp packet",
        needed: ARP_LEN,
        available: payload.len(),
    })?;
    if arp.get_hardware_type() != ArpHardwareTypes::Ethernet
        || arp.get_protocol_type() != EtherTypes::Ipv4
        || arp.get_hw_addr_len() != 6
        || arp.get_proto_addr_len() != 4
    {
        return Err(DecodeError::UnsupportedEtherType(arp.get_protocol_type().0));
    }
    Ok(ArpMessage {
        sender_hardware: HardwareAddress::from(arp.get_sender_hw_addr()),
        sender_ip: arp.get_sender_proto_addr(),
        target_ip: arp.get_target_proto_addr(),
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::Packet;
    use pnet::packet::ethernet::EthernetPacket;

    const LOCAL: HardwareAddress = HardwareAddress::new([0x02, 0, 0, 0, 0, 1]);

    /// ARP reply from 01:23:45:67:89:ab claiming `sender`.
    fn reply_from(sender: Ipv4Addr) -> Vec<u8> {
        let mut buffer = vec![0u8; ARP_LEN];
        let mut arp = MutableArpPacket::new(&mut buffer).unwrap();
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(ArpOperations::Reply);
        arp.set_sender_hw_addr(MacAddr::new(0x01, 0x23, 0x45, 0x67, 0x89, 0xab));
        arp.set_sender_proto_addr(sender);
        arp.set_target_hw_addr(MacAddr::new(0x02, 0, 0, 0, 0, 1));
        arp.set_target_proto_addr(Ipv4Addr::UNSPECIFIED);
        buffer
    }

    #[test]
    fn duplicate_address_request_layout() {
        let frame = duplicate_address_request(&LOCAL, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert_eq!(frame.len(), MIN_ETH_FRAME_NO_FCS);

        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        assert_eq!(eth.get_source(), MacAddr::from(LOCAL));
        assert_eq!(eth.get_ethertype(), EtherTypes::Arp);

        let arp = ArpPacket::new(&eth.payload()[..ARP_LEN]).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_sender_proto_addr(), Ipv4Addr::UNSPECIFIED);
        assert_eq!(arp.get_target_proto_addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(arp.get_target_hw_addr(), MacAddr::zero());

        let message = decode_arp(eth.payload()).unwrap();
        assert!(message.is_address_check());
        assert_eq!(message.sender_hardware, LOCAL);
    }

    #[test]
    fn decode_reads_sender() {
        let message = decode_arp(&reply_from(Ipv4Addr::new(10, 0, 0, 1))).unwrap();
        assert_eq!(message.sender_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(
            message.sender_hardware,
            HardwareAddress::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xab])
        );
        assert!(!message.is_address_check());
    }

    #[test]
    fn decode_rejects_short_and_foreign_packets() {
        assert!(matches!(decode_arp(&[0; 10]), Err(DecodeError::Truncated { .. })));

        let mut ipv6_over_arp = reply_from(Ipv4Addr::new(10, 0, 0, 1));
        ipv6_over_arp[2..4].copy_from_slice(&[0x86, 0xdd]);
        assert_eq!(decode_arp(&ipv6_over_arp), Err(DecodeError::UnsupportedEtherType(0x86dd)));
    }
}
