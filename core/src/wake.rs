use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use pnet::datalink::{self, Config, NetworkInterface};
use sleep_proxy_common::network::{HardwareAddress, interface};
use sleep_proxy_protocols::PacketError;
use sleep_proxy_protocols::wol::{ethernet_frame, magic_packet};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::info;

use crate::channel::{ChannelError, open_eth_channel};

#[derive(Debug, Error)]
pub enum WakeError {
    #[error("opening wake socket: {0}")]
    Socket(#[source] io::Error),
    #[error("sending magic packet to {mac}: {source}")]
    Send {
        mac: HardwareAddress,
        #[source]
        source: io::Error,
    },
    #[error("interface {0} not found")]
    InterfaceNotFound(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("wake task failed: {0}")]
    Join(String),
}

/// Hands a magic packet for `mac` to the network. Success does not mean the
/// host woke up.
#[async_trait]
pub trait WakeSender: Send + Sync {
    async fn wake(&self, mac: &HardwareAddress) -> Result<(), WakeError>;
}

/// Broadcasts the magic packet as a UDP datagram.
#[derive(Debug, Clone, Copy)]
pub struct UdpWaker {
    port: u16,
}

impl UdpWaker {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn target(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::BROADCAST, self.port))
    }
}

#[async_trait]
impl WakeSender for UdpWaker {
    async fn wake(&self, mac: &HardwareAddress) -> Result<(), WakeError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(WakeError::Socket)?;
        socket.set_broadcast(true).map_err(WakeError::Socket)?;
        socket
            .send_to(&magic_packet(mac), self.target())
            .await
            .map_err(|source| WakeError::Send { mac: *mac, source })?;
        info!("sent magic packet for {mac} to {}", self.target());
        Ok(())
    }
}

/// Sends the magic packet as a raw Ethernet frame on one interface.
#[derive(Debug, Clone)]
pub struct EthernetWaker {
    interface: String,
}

impl EthernetWaker {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }
}

#[async_trait]
impl WakeSender for EthernetWaker {
    async fn wake(&self, mac: &HardwareAddress) -> Result<(), WakeError> {
        let intf = interface::find_by_name(&self.interface)
            .ok_or_else(|| WakeError::InterfaceNotFound(self.interface.clone()))?;
        let mac = *mac;
        tokio::task::spawn_blocking(move || send_frame_with(&intf, &mac, datalink::channel))
            .await
            .map_err(|err| WakeError::Join(err.to_string()))??;
        info!("sent magic frame for {mac} on {}", self.interface);
        Ok(())
    }
}

pub fn send_frame_with<F>(
    intf: &NetworkInterface,
    mac: &HardwareAddress,
    channel_opener: F,
) -> Result<(), WakeError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<datalink::Channel>,
{
    let frame = ethernet_frame(mac)?;
    let (mut tx, _rx) = open_eth_channel(intf, Config::default(), channel_opener)?;
    let sent = tx
        .send_to(&frame, None)
        .unwrap_or_else(|| Err(io::Error::other("frame does not fit the write buffer")));
    sent.map_err(|source| WakeError::Send { mac: *mac, source })
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
    use pnet::datalink::dummy;
    use sleep_proxy_protocols::wol::MAGIC_PACKET_LEN;

    const MAC: HardwareAddress = HardwareAddress::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xab]);

    #[test]
    fn udp_waker_targets_broadcast() {
        assert_eq!(UdpWaker::new(7).target().to_string(), "255.255.255.255:7");
        assert_eq!(UdpWaker::new(9).target().port(), 9);
    }

    #[test]
    fn ethernet_frame_is_written_to_channel() {
        let intf = dummy::dummy_interface(0);
        let mut cfg = dummy::Config::default();
        let written = cfg.read_handle().unwrap();

        let opener = move |i: &NetworkInterface, _: Config| dummy::channel(i, cfg);
        send_frame_with(&intf, &MAC, opener).unwrap();

        let frame = written.recv().unwrap();
        assert_eq!(frame.len(), 14 + MAGIC_PACKET_LEN);
        assert_eq!(&frame[..6], &MAC.octets());
        assert_eq!(&frame[6..12], &[0xff; 6]);
        assert_eq!(&frame[12..14], &[0x08, 0x42]);
    }

    #[test]
    fn open_failure_is_reported() {
        let intf = dummy::dummy_interface(0);
        let opener = |_: &NetworkInterface, _: Config| -> io::Result<datalink::Channel> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "Mock I/O Error"))
        };
        let err = send_frame_with(&intf, &MAC, opener).unwrap_err();
        assert!(matches!(err, WakeError::Channel(ChannelError::Open { .. })));
    }

    #[tokio::test]
    #[ignore]
    async fn udp_waker_sends_broadcast() {
        UdpWaker::new(9).wake(&MAC).await.unwrap();
    }
}
