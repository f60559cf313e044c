//! # Magic Wake Packet
//!
//! Six `0xff` sync bytes followed by the target hardware address repeated
//! sixteen times. The payload is either broadcast as a UDP datagram or sent as
//! a raw Ethernet frame with EtherType `0x0842`.

use pnet::packet::ethernet::{EtherType, MutableEthernetPacket};
use pnet::util::MacAddr;

use sleep_proxy_common::network::HardwareAddress;

use crate::error::PacketError;
use crate::link::ETH_HDR_LEN;

pub const SYNC_LEN: usize = 6;
pub const REPETITIONS: usize = 16;
pub const MAGIC_PACKET_LEN: usize = SYNC_LEN + REPETITIONS * 6;
pub const WAKE_ON_LAN: EtherType = EtherType(0x0842);
/// UDP ports wake utilities commonly send to.
pub const WAKE_PORTS: [u16; 3] = [0, 7, 9];

pub fn magic_packet(mac: &HardwareAddress) -> Vec<u8> {
    let mut packet = Vec::with_capacity(MAGIC_PACKET_LEN);
    packet.extend_from_slice(&[0xff; SYNC_LEN]);
    for _ in 0..REPETITIONS {
        packet.extend_from_slice(&mac.octets());
    }
    packet
}

/// Whether `data` holds a magic packet for `mac` anywhere, e.g. after a
/// password or other prefix.
pub fn contains_magic_packet(data: &[u8], mac: &HardwareAddress) -> bool {
    let packet = magic_packet(mac);
    data.windows(packet.len()).any(|window| window == packet.as_slice())
}

/// Ethernet frame carrying the magic packet, addressed to `mac` with the
/// broadcast address as source.
pub fn ethernet_frame(mac: &HardwareAddress) -> Result<Vec<u8>, PacketError> {
    let payload = magic_packet(mac);
    let mut buffer = vec![0u8; ETH_HDR_LEN + payload.len()];
    {
        let mut eth = MutableEthernetPacket::new(&mut buffer).ok_or(PacketError::EthernetBuffer)?;
        eth.set_destination(MacAddr::from(*mac));
        eth.set_source(MacAddr::broadcast());
        eth.set_ethertype(WAKE_ON_LAN);
        eth.set_payload(&payload);
    }
    Ok(buffer)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
