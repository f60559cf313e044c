//! # Trigger Capture
//!
//! Waits until something ends the emulation of a host:
//! * a connection attempt to a claimed address on a protected port,
//! * another machine using a claimed address, seen in its ARP or neighbor
//!   discovery traffic or in its answer to the duplicate address requests
//!   sent every second for each claimed IPv4 address,
//! * a magic packet for the host sent by someone else.
//!
//! The connection filter matches on destination host and port only: SYN-only
//! matching behaved differently for IPv6 in the capture backends this was
//! first written against, so a few non-SYN segments may also count as a
//! trigger.
//!
//! The wait blocks a thread until a frame matches and cannot be cancelled.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use pnet::datalink::{self, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::packet::ethernet::EtherTypes;
use sleep_proxy_common::network::{HardwareAddress, NetworkAddress, PortSet, interface};
use sleep_proxy_protocols::arp::{self, decode_arp};
use sleep_proxy_protocols::ip::{IpHeader, PacketHeader, decode_ip_header};
use sleep_proxy_protocols::ndp::{IP_PROTOCOL_ICMPV6, NeighborMessage, decode_neighbor_message};
use sleep_proxy_protocols::tcp::{IP_PROTOCOL_TCP, decode_tcp_header};
use sleep_proxy_protocols::udp::{IP_PROTOCOL_UDP, decode_udp_header};
use sleep_proxy_protocols::wol::{WAKE_ON_LAN, WAKE_PORTS, contains_magic_packet};
use sleep_proxy_protocols::{DecodeError, LinkType, split_link_layer};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::channel::{ChannelError, open_eth_channel};

pub const ADDRESS_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("interface {0} not found")]
    InterfaceNotFound(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("receiving on {interface}: {source}")]
    Receive {
        interface: String,
        #[source]
        source: io::Error,
    },
    #[error("capture task failed: {0}")]
    Join(String),
}

/// "TCP to one of these hosts on one of these ports", plus the frames that
/// show the host is back or being woken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFilter {
    hosts: Vec<IpAddr>,
    ports: PortSet,
    wake_target: Option<HardwareAddress>,
    local: Option<HardwareAddress>,
}

impl CaptureFilter {
    pub fn new(addresses: &[NetworkAddress], ports: &PortSet) -> Self {
        Self {
            hosts: addresses.iter().map(NetworkAddress::ip).collect(),
            ports: ports.clone(),
            wake_target: None,
            local: None,
        }
    }

    /// Also end the wait when a magic packet for `mac` goes by.
    pub fn with_wake_target(mut self, mac: HardwareAddress) -> Self {
        self.wake_target = Some(mac);
        self
    }

    /// Frames sent from `mac` are this machine's own and never show an
    /// address in use.
    pub fn with_local_hardware(mut self, mac: Option<HardwareAddress>) -> Self {
        self.local = mac;
        self
    }

    pub fn ipv4_hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.hosts.iter().filter_map(|host| match host {
            IpAddr::V4(ip) => Some(*ip),
            IpAddr::V6(_) => None,
        })
    }

    /// The connection filter in pcap syntax.
    pub fn expression(&self) -> String {
        let hosts: Vec<String> = self.hosts.iter().map(IpAddr::to_string).collect();
        let ports: Vec<String> = self.ports.iter().map(|port| port.to_string()).collect();
        format!(
            "tcp and dst host ({}) and dst port ({})",
            hosts.join(" or "),
            ports.join(" or ")
        )
    }

    /// Decodes `frame` and returns how it ends the wait. Frames that do not
    /// end it give `Ok(None)`.
    pub fn inspect(&self, link: LinkType, frame: &[u8]) -> Result<Option<WaitOutcome>, DecodeError> {
        let split = split_link_layer(link, frame)?;
        if split.ethertype == EtherTypes::Arp {
            return self.inspect_arp(split.payload);
        }
        if split.ethertype == WAKE_ON_LAN {
            return Ok(self.magic_packet_in(split.payload, split.source));
        }
        if split.ethertype != EtherTypes::Ipv4 && split.ethertype != EtherTypes::Ipv6 {
            return Err(DecodeError::UnsupportedEtherType(split.ethertype.0));
        }

        let (ip, rest) = decode_ip_header(split.payload)?;
        match ip.payload_protocol() {
            IP_PROTOCOL_TCP => self.inspect_tcp(frame, &ip, rest),
            IP_PROTOCOL_UDP => {
                let (udp, payload) = decode_udp_header(rest)?;
                if !WAKE_PORTS.contains(&udp.destination_port) {
                    return Ok(None);
                }
                Ok(self.magic_packet_in(payload, split.source))
            }
            IP_PROTOCOL_ICMPV6 => self.inspect_neighbor(&ip, rest, split.source),
            _ => Ok(None),
        }
    }

    fn inspect_tcp(&self, frame: &[u8], ip: &IpHeader, segment: &[u8]) -> Result<Option<WaitOutcome>, DecodeError> {
        if !self.hosts.contains(&ip.destination_ip()) {
            return Ok(None);
        }
        let (tcp, _) = decode_tcp_header(segment)?;
        if !self.ports.contains(tcp.destination_port) {
            return Ok(None);
        }
        if !tcp.is_syn() {
            trace!(flags = tcp.flags, "accepting segment without SYN as trigger");
        }
        Ok(Some(WaitOutcome::Connection(Trigger {
            frame: frame.to_vec(),
            source: ip.source_ip(),
            destination: ip.destination_ip(),
            source_port: tcp.source_port,
            destination_port: tcp.destination_port,
        })))
    }

    /// Replies, announcements and requests sent from a claimed address, and
    /// address checks for one, all come from a machine that uses it.
    fn inspect_arp(&self, payload: &[u8]) -> Result<Option<WaitOutcome>, DecodeError> {
        let message = decode_arp(payload)?;
        if self.is_local(message.sender_hardware) {
            return Ok(None);
        }
        let address = IpAddr::V4(if message.is_address_check() {
            message.target_ip
        } else {
            message.sender_ip
        });
        Ok(self.in_use(address, message.sender_hardware))
    }

    /// Advertisements for a claimed address and duplicate address detection
    /// solicitations (unspecified source) for one.
    fn inspect_neighbor(
        &self,
        ip: &IpHeader,
        icmp: &[u8],
        source: Option<HardwareAddress>,
    ) -> Result<Option<WaitOutcome>, DecodeError> {
        let Some(message) = decode_neighbor_message(icmp)? else {
            return Ok(None);
        };
        let Some(owner) = source.filter(|mac| !self.is_local(*mac)) else {
            return Ok(None);
        };
        let claims_address = match message {
            NeighborMessage::Advertisement { .. } => true,
            NeighborMessage::Solicitation { .. } => ip.source_ip().is_unspecified(),
        };
        if !claims_address {
            return Ok(None);
        }
        Ok(self.in_use(IpAddr::V6(message.target()), owner))
    }

    fn in_use(&self, address: IpAddr, owner: HardwareAddress) -> Option<WaitOutcome> {
        self.hosts
            .contains(&address)
            .then_some(WaitOutcome::AddressInUse { address, owner })
    }

    fn magic_packet_in(&self, data: &[u8], sender: Option<HardwareAddress>) -> Option<WaitOutcome> {
        let target = self.wake_target?;
        contains_magic_packet(data, &target).then_some(WaitOutcome::WokenElsewhere { sender })
    }

    fn is_local(&self, mac: HardwareAddress) -> bool {
        self.local == Some(mac)
    }
}

impl fmt::Display for CaptureFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

/// A connection attempt to a claimed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub frame: Vec<u8>,
    pub source: IpAddr,
    pub destination: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} port {} -> {} port {}",
            self.source, self.source_port, self.destination, self.destination_port
        )
    }
}

/// What ended a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A client tried to connect; the host has to be woken.
    Connection(Trigger),
    /// Another machine uses a claimed address, most likely the host itself.
    AddressInUse { address: IpAddr, owner: HardwareAddress },
    /// Someone else sent a magic packet for the host.
    WokenElsewhere { sender: Option<HardwareAddress> },
}

impl WaitOutcome {
    pub fn trigger(&self) -> Option<&Trigger> {
        match self {
            WaitOutcome::Connection(trigger) => Some(trigger),
            _ => None,
        }
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitOutcome::Connection(trigger) => write!(f, "connection attempt {trigger}"),
            WaitOutcome::AddressInUse { address, owner } => write!(f, "{address} is in use by {owner}"),
            WaitOutcome::WokenElsewhere { sender: Some(sender) } => write!(f, "magic packet from {sender}"),
            WaitOutcome::WokenElsewhere { sender: None } => f.write_str("magic packet"),
        }
    }
}

/// Ethernet unless the interface has no hardware address (tun devices).
pub fn link_type(interface: &NetworkInterface) -> LinkType {
    match interface.mac {
        Some(_) => LinkType::Ethernet,
        None => LinkType::RawIp,
    }
}

/// Blocks until a frame on `interface` ends the wait. While waiting, a
/// duplicate address request goes out for every claimed IPv4 address each
/// [`ADDRESS_CHECK_INTERVAL`] if the link is Ethernet.
pub fn wait_for_trigger_with<F>(
    interface: &NetworkInterface,
    filter: &CaptureFilter,
    channel_opener: F,
) -> Result<WaitOutcome, CaptureError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<datalink::Channel>,
{
    let (tx, rx) = open_eth_channel(interface, Config::default(), channel_opener)?;
    let local = interface.mac.map(HardwareAddress::from);
    let filter = filter.clone().with_local_hardware(local);
    info!(interface = %interface.name, "waiting for {filter}");

    let targets: Vec<Ipv4Addr> = filter.ipv4_hosts().collect();
    let (stop, stopped) = mpsc::channel::<()>();
    thread::scope(|scope| {
        if let Some(local) = local.filter(|_| !targets.is_empty()) {
            scope.spawn(move || request_addresses(tx, local, &targets, stopped));
        }
        let outcome = receive_outcome(rx, link_type(interface), &interface.name, &filter);
        drop(stop);
        outcome
    })
}

fn request_addresses(
    mut tx: Box<dyn DataLinkSender>,
    local: HardwareAddress,
    targets: &[Ipv4Addr],
    stopped: Receiver<()>,
) {
    loop {
        for target in targets {
            let sent = arp::duplicate_address_request(&local, *target)
                .map_err(io::Error::other)
                .and_then(|frame| tx.send_to(&frame, None).unwrap_or(Ok(())));
            if let Err(err) = sent {
                debug!("duplicate address request for {target}: {err}");
            }
        }
        if !matches!(stopped.recv_timeout(ADDRESS_CHECK_INTERVAL), Err(RecvTimeoutError::Timeout)) {
            return;
        }
    }
}

fn receive_outcome(
    mut rx: Box<dyn DataLinkReceiver>,
    link: LinkType,
    interface: &str,
    filter: &CaptureFilter,
) -> Result<WaitOutcome, CaptureError> {
    loop {
        let frame = match rx.next() {
            Ok(frame) => frame,
            Err(err) if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                continue;
            }
            Err(source) => {
                return Err(CaptureError::Receive {
                    interface: interface.to_string(),
                    source,
                });
            }
        };
        match filter.inspect(link, frame) {
            Ok(Some(outcome)) => {
                debug!("captured {outcome}");
                return Ok(outcome);
            }
            Ok(None) => {}
            Err(err) => trace!("skipping frame: {err}"),
        }
    }
}

/// Produces whatever ends the emulation of a host.
#[async_trait]
pub trait TriggerSource: Send + Sync {
    async fn wait(&self, interface: &str, filter: &CaptureFilter) -> Result<WaitOutcome, CaptureError>;
}

/// Captures on a pnet datalink channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PnetCapture;

#[async_trait]
impl TriggerSource for PnetCapture {
    async fn wait(&self, interface: &str, filter: &CaptureFilter) -> Result<WaitOutcome, CaptureError> {
        let intf = interface::find_by_name(interface)
            .ok_or_else(|| CaptureError::InterfaceNotFound(interface.to_string()))?;
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || wait_for_trigger_with(&intf, &filter, datalink::channel))
            .await
            .map_err(|err| CaptureError::Join(err.to_string()))?
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
