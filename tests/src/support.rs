use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pnet::datalink::{dummy, Config, NetworkInterface};
use pnet::util::MacAddr;
use sleep_proxy_common::config::HostConfig;
use sleep_proxy_common::network::{address, HardwareAddress, NetworkAddress};
use sleep_proxy_core::capture::{wait_for_trigger_with, CaptureError, CaptureFilter, TriggerSource, WaitOutcome};
use sleep_proxy_core::firewall::{Firewall, RecordingFirewall};
use sleep_proxy_core::probe::Pinger;
use sleep_proxy_core::session::Backends;
use sleep_proxy_core::wake::{WakeError, WakeSender};
use tokio_util::sync::CancellationToken;

pub const MAC: HardwareAddress = HardwareAddress::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xab]);

/// IPv4 + TCP SYN from 192.168.1.198:48552 to 192.168.1.1:22.
const SSH_SYN: &str = concat!(
    "450000280000400040060000c0a801c6c0a80101",
    "bda8001600000000000000005002ffff00000000",
);

const ARP_REPLY: &str = concat!(
    "0001080006040002",
    "0123456789abc0a80101",
    "02000000000100000000",
);

pub fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

pub fn ethernet(ethertype: [u8; 2], payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x02, 0, 0, 0, 0, 1, 0x02, 0, 0, 0, 0, 2];
    frame.extend_from_slice(&ethertype);
    frame.extend_from_slice(payload);
    frame
}

pub fn ssh_syn_frame() -> Vec<u8> {
    ethernet([0x08, 0x00], &hex(SSH_SYN))
}

/// ARP reply from 01:23:45:67:89:ab saying it holds 192.168.1.1.
pub fn arp_reply_frame() -> Vec<u8> {
    ethernet([0x08, 0x06], &hex(ARP_REPLY))
}

/// Raw Wake-on-LAN frame for `mac`.
pub fn magic_frame(mac: &HardwareAddress) -> Vec<u8> {
    let mut payload = vec![0xff; 6];
    for _ in 0..16 {
        payload.extend_from_slice(&mac.octets());
    }
    ethernet([0x08, 0x42], &payload)
}

pub fn ethernet_interface() -> NetworkInterface {
    let mut intf = dummy::dummy_interface(0);
    intf.mac = Some(MacAddr::new(0x02, 0, 0, 0, 0, 1));
    intf
}

pub fn host(addresses: &str, ports: &str) -> HostConfig {
    HostConfig::new("eth0", address::parse_list(addresses).unwrap(), ports.parse().unwrap())
        .unwrap()
        .with_mac(MAC)
        .with_ping_tries(3)
}

/// Runs the real capture loop over a dummy channel fed with `frames`. Once
/// they are used up the channel reports an error.
pub struct ReplayCapture {
    frames: Vec<Vec<u8>>,
}

impl ReplayCapture {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self { frames }
    }
}

#[async_trait]
impl TriggerSource for ReplayCapture {
    async fn wait(&self, _: &str, filter: &CaptureFilter) -> Result<WaitOutcome, CaptureError> {
        let mut cfg = dummy::Config::default();
        let inject = cfg.inject_handle().unwrap();
        for frame in &self.frames {
            inject.send(Ok(frame.clone().into_boxed_slice())).unwrap();
        }
        inject.send(Err(io::Error::other("replay exhausted"))).unwrap();

        let filter = filter.clone();
        tokio::task::spawn_blocking(move || {
            let opener = move |i: &NetworkInterface, _: Config| dummy::channel(i, cfg);
            wait_for_trigger_with(&ethernet_interface(), &filter, opener)
        })
        .await
        .unwrap()
    }
}

#[derive(Default)]
pub struct RecordingWaker {
    woken: Mutex<Vec<HardwareAddress>>,
}

impl RecordingWaker {
    pub fn woken(&self) -> Vec<HardwareAddress> {
        self.woken.lock().unwrap().clone()
    }
}

#[async_trait]
impl WakeSender for RecordingWaker {
    async fn wake(&self, mac: &HardwareAddress) -> Result<(), WakeError> {
        self.woken.lock().unwrap().push(*mac);
        Ok(())
    }
}

/// Answers pings with `alive` until `limit` pings were sent, then cancels
/// `token`.
pub struct ScriptedPinger {
    alive: bool,
    limit: u32,
    calls: AtomicU32,
    token: CancellationToken,
}

impl ScriptedPinger {
    pub fn new(alive: bool, limit: u32, token: CancellationToken) -> Self {
        Self {
            alive,
            limit,
            calls: AtomicU32::new(0),
            token,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pinger for ScriptedPinger {
    async fn ping(&self, _: &str, _: &NetworkAddress) -> bool {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.token.cancel();
        }
        self.alive
    }
}

pub fn backends(
    firewall: Arc<RecordingFirewall>,
    capture: ReplayCapture,
    waker: Arc<RecordingWaker>,
    pinger: Arc<ScriptedPinger>,
) -> Backends {
    let firewall: Arc<dyn Firewall> = firewall;
    Backends {
        firewall,
        capture: Arc::new(capture),
        waker,
        pinger,
    }
}
