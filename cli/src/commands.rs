pub mod emulate;
pub mod wake;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use is_root::is_root;
use sleep_proxy_common::config::{
    self, DEFAULT_ADDRESSES, DEFAULT_INTERFACE, DEFAULT_PING_TRIES, DEFAULT_PORTS, DEFAULT_WAKE_PORT,
    HostConfig,
};
use sleep_proxy_common::network::{HardwareAddress, PortSet, address, interface};
use sleep_proxy_core::capture::PnetCapture;
use sleep_proxy_core::firewall::IptablesFirewall;
use sleep_proxy_core::probe::SystemPinger;
use sleep_proxy_core::session::Backends;
use sleep_proxy_core::wake::{EthernetWaker, UdpWaker, WakeSender};
use sleep_proxy_core::{neighbor, resolve};
use tracing::{debug, info, warn};

use crate::terminal::print;

#[derive(Parser)]
#[command(name = "sleep-proxy")]
#[command(about = "Stands in for sleeping hosts and wakes them when someone connects.")]
pub struct CommandLine {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch hosts and take over their addresses while they sleep
    #[command(alias = "w")]
    Watch {
        #[command(flatten)]
        host: HostArgs,
        #[command(flatten)]
        wake: WakeArgs,
        /// Milliseconds between liveness probes
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
    /// Take over a host once without checking whether it is alive
    #[command(alias = "e")]
    Emulate {
        #[command(flatten)]
        host: HostArgs,
        #[command(flatten)]
        wake: WakeArgs,
    },
    /// Send a magic packet
    #[command(alias = "k")]
    Wake {
        mac: HardwareAddress,
        /// Send a raw Ethernet frame on this interface instead of a UDP broadcast
        #[arg(short, long)]
        interface: Option<String>,
        #[arg(long, default_value_t = DEFAULT_WAKE_PORT)]
        wake_port: u16,
    },
}

#[derive(Args)]
pub struct HostArgs {
    /// Read the hosts from a config file; the other host options are ignored
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long, default_value = DEFAULT_INTERFACE)]
    pub interface: String,
    /// Comma separated addresses, CIDR prefix optional
    #[arg(short, long)]
    pub address: Option<String>,
    #[arg(short, long, default_value = DEFAULT_PORTS)]
    pub ports: PortSet,
    /// Hardware address to wake; looked up in the neighbour table if omitted
    #[arg(short, long)]
    pub mac: Option<HardwareAddress>,
    /// Host name, resolved when no address is given
    #[arg(short = 'n', long)]
    pub hostname: Option<String>,
    /// Pings sent after waking before giving up
    #[arg(short = 't', long, default_value_t = DEFAULT_PING_TRIES)]
    pub ping_tries: u32,
}

#[derive(Args)]
pub struct WakeArgs {
    #[arg(long, value_enum, default_value_t = WakeMethod::Udp)]
    pub wake_method: WakeMethod,
    /// Port of the UDP broadcast
    #[arg(long, default_value_t = DEFAULT_WAKE_PORT)]
    pub wake_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WakeMethod {
    Udp,
    Ethernet,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl HostArgs {
    /// The hosts to work on, from the config file or the command line.
    pub async fn hosts(&self) -> anyhow::Result<Vec<HostConfig>> {
        if let Some(path) = &self.config {
            let hosts = config::load(path)?;
            anyhow::ensure!(!hosts.is_empty(), "{} describes no host", path.display());
            return Ok(hosts);
        }

        let addresses = match (&self.address, &self.hostname) {
            (Some(list), _) => address::parse_list(list)?,
            (None, Some(name)) => resolve::resolve_host(name).await?,
            (None, None) => address::parse_list(DEFAULT_ADDRESSES)?,
        };
        let mut host = HostConfig::new(&self.interface, addresses, self.ports.clone())?
            .with_ping_tries(self.ping_tries);
        if let Some(name) = &self.hostname {
            host = host.with_name(name);
        }
        if let Some(mac) = self.mac {
            host = host.with_mac(mac);
        }
        Ok(vec![host])
    }
}

impl WakeArgs {
    pub fn waker(&self, interface: &str) -> Arc<dyn WakeSender> {
        match self.wake_method {
            WakeMethod::Udp => Arc::new(UdpWaker::new(self.wake_port)),
            WakeMethod::Ethernet => Arc::new(EthernetWaker::new(interface)),
        }
    }

    /// The real system backends for a host on `interface`.
    pub fn backends(&self, interface: &str) -> Backends {
        Backends {
            firewall: Arc::new(IptablesFirewall::new()),
            capture: Arc::new(PnetCapture),
            waker: self.waker(interface),
            pinger: Arc::new(SystemPinger::default()),
        }
    }
}

pub fn ensure_root() -> anyhow::Result<()> {
    if !is_root() {
        anyhow::bail!("claiming addresses and changing firewall rules requires root privileges");
    }
    debug!("running as root");
    Ok(())
}

/// The configured hardware address, or the neighbour table's entry for one of
/// the host's addresses.
pub async fn hardware_address(host: &HostConfig) -> anyhow::Result<HardwareAddress> {
    if let Some(mac) = host.mac {
        return Ok(mac);
    }
    let mac = neighbor::lookup(host.addresses())
        .await?
        .with_context(|| format!("no hardware address known for {}, pass one with --mac", host.label()))?;
    info!(host = %host.label(), "found hardware address {mac} in the neighbour table");
    Ok(mac)
}

/// Warns about addresses of `host` that are already bound locally; claiming
/// them would take them away from this machine when the claim is released.
pub fn check_interface(host: &HostConfig) {
    let Some(intf) = interface::find_by_name(host.interface()) else {
        warn!("interface {} not found", host.interface());
        return;
    };
    for address in host.addresses() {
        if interface::has_address(&intf, address.ip()) {
            warn!("{} is already bound on {}", address.ip(), host.interface());
        }
    }
}

pub fn describe(host: &HostConfig, mac: &HardwareAddress) {
    print::header(&host.label());
    print::aligned_line("interface", host.interface());
    let addresses: Vec<String> = host.addresses().iter().map(ToString::to_string).collect();
    print::aligned_line("addresses", addresses.join(", "));
    print::aligned_line("ports", &host.ports);
    print::aligned_line("mac", mac);
    print::aligned_line("ping tries", host.ping_tries);
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
