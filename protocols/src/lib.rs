//! Wire formats used by the sleep proxy.
//!
//! Decoding covers only what is needed to learn who tried to reach a claimed
//! address and whether the host came back: the link layer is split off, the
//! IPv4/IPv6 header yields the addresses, TCP and UDP headers yield the
//! ports, and ARP and neighbor discovery messages tell who uses an address.
//! Encoding covers the magic wake packet and the duplicate address request.

pub mod arp;
pub mod error;
pub mod ip;
pub mod link;
pub mod ndp;
pub mod tcp;
pub mod udp;
pub mod wol;

pub use arp::{ArpMessage, decode_arp};
pub use error::{DecodeError, PacketError};
pub use ip::{IpHeader, Ipv4Header, Ipv6Header, PacketHeader, decode_ip_header};
pub use link::{LinkFrame, LinkType, split_link_layer, strip_link_layer};
pub use ndp::{NeighborMessage, decode_neighbor_message};
pub use tcp::{TcpHeader, decode_tcp_header};
pub use udp::{UdpHeader, decode_udp_header};
