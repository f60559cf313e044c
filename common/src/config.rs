//! # Host Configuration
//!
//! Everything the proxy needs to know about one watched host, plus the parser
//! for config files that describe several hosts.
//!
//! File format: everything before the first `host` line is ignored. Each
//! `host` line opens a block of `key value` lines:
//!
//! ```text
//! host
//! name nas
//! interface eth0
//! address 192.168.1.20/24
//! address fe80::20/64
//! port 22,445
//! mac 01:23:45:67:89:ab
//! ping_tries 5
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

use crate::error::FormatError;
use crate::network::address::{self, NetworkAddress};
use crate::network::interface;
use crate::network::mac::HardwareAddress;
use crate::network::ports::PortSet;

pub const DEFAULT_INTERFACE: &str = "lo";
pub const DEFAULT_ADDRESSES: &str = "10.0.0.1/16,fe80::123/64";
pub const DEFAULT_PORTS: &str = "12345,23456";
pub const DEFAULT_PING_TRIES: u32 = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Port of the broadcast wake datagram. Most tools use 9; this proxy has
/// always sent to 7.
pub const DEFAULT_WAKE_PORT: u16 = 7;

/// The settings for one watched host.
///
/// The interface name is validated and the address list is non-empty and
/// free of repeated IPs; both can only be set through [`HostConfig::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Display name, also used for hostname resolution when no address is given.
    pub name: String,
    interface: String,
    addresses: Vec<NetworkAddress>,
    /// Ports that trigger a wake-up.
    pub ports: PortSet,
    /// Hardware address to wake. `None` means look it up in the neighbour table.
    pub mac: Option<HardwareAddress>,
    /// How often the primary address is pinged after waking.
    pub ping_tries: u32,
}

impl HostConfig {
    pub fn new(
        interface: impl Into<String>,
        addresses: Vec<NetworkAddress>,
        ports: PortSet,
    ) -> Result<Self, FormatError> {
        let interface = interface.into();
        interface::validate_name(&interface)?;
        if addresses.is_empty() {
            return Err(FormatError::NoAddress);
        }
        address::ensure_distinct(&addresses)?;
        Ok(Self {
            name: String::new(),
            interface,
            addresses,
            ports,
            mac: None,
            ping_tries: DEFAULT_PING_TRIES,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_mac(mut self, mac: HardwareAddress) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn with_ping_tries(mut self, ping_tries: u32) -> Self {
        self.ping_tries = ping_tries;
        self
    }

    /// Interface the addresses are claimed on and frames are captured from.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn addresses(&self) -> &[NetworkAddress] {
        &self.addresses
    }

    /// The address pinged after a wake packet was sent: the first one given.
    pub fn primary_address(&self) -> &NetworkAddress {
        &self.addresses[0]
    }

    /// Name for log lines: the configured name, or the primary address.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.primary_address().to_string()
        } else {
            self.name.clone()
        }
    }
}

/// Reads and parses a config file.
pub fn load(path: &Path) -> anyhow::Result<Vec<HostConfig>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing config file {}", path.display()))
}

/// Parses the text of a config file into one [`HostConfig`] per `host` block.
/// No IP may belong to more than one host.
pub fn parse(text: &str) -> Result<Vec<HostConfig>, FormatError> {
    let mut hosts = Vec::new();
    let mut owners = HashMap::new();
    let mut current: Option<HostBlock> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.split_whitespace().next() == Some("host") {
            if let Some(block) = current.take() {
                hosts.push(block.finish(&mut owners)?);
            }
            current = Some(HostBlock::new(line_no));
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };
        if line.is_empty() {
            continue;
        }
        block
            .apply(line)
            .map_err(|source| FormatError::ConfigLine {
                line: line_no,
                source: Box::new(source),
            })?;
    }

    if let Some(block) = current.take() {
        hosts.push(block.finish(&mut owners)?);
    }
    Ok(hosts)
}

/// Raw values collected for one host block before validation.
struct HostBlock {
    line: usize,
    name: String,
    interface: String,
    addresses: Vec<NetworkAddress>,
    ports: Vec<String>,
    mac: Option<HardwareAddress>,
    ping_tries: u32,
}

impl HostBlock {
    fn new(line: usize) -> Self {
        Self {
            line,
            name: String::new(),
            interface: DEFAULT_INTERFACE.to_string(),
            addresses: Vec::new(),
            ports: Vec::new(),
            mac: None,
            ping_tries: DEFAULT_PING_TRIES,
        }
    }

    fn apply(&mut self, line: &str) -> Result<(), FormatError> {
        let tokens: Vec<&str> = line.split(' ').collect();
        let [key, value] = tokens.as_slice() else {
            warn!("skipping line \"{line}\": needs to be a pair of name and value separated by space");
            return Ok(());
        };

        match *key {
            "interface" => {
                interface::validate_name(value)?;
                self.interface = value.to_string();
            }
            "address" => self.addresses.extend(address::parse_list(value)?),
            "port" => self.ports.push(value.to_string()),
            "mac" => self.mac = Some(value.parse()?),
            "name" => self.name = value.to_string(),
            "ping_tries" => {
                self.ping_tries = value.parse().map_err(|_| FormatError::InvalidNumber {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
            }
            unknown => warn!("unknown name \"{unknown}\": skipping"),
        }
        Ok(())
    }

    /// Validates the block. `owners` maps every IP of the hosts finished so
    /// far to the line of their `host` line.
    fn finish(self, owners: &mut HashMap<IpAddr, usize>) -> Result<HostConfig, FormatError> {
        let at_line = |source: FormatError| FormatError::ConfigLine {
            line: self.line,
            source: Box::new(source),
        };

        let addresses = if self.addresses.is_empty() {
            address::parse_list(DEFAULT_ADDRESSES).map_err(at_line)?
        } else {
            self.addresses.clone()
        };
        let ports: PortSet = if self.ports.is_empty() {
            DEFAULT_PORTS.parse().map_err(at_line)?
        } else {
            self.ports.join(",").parse().map_err(at_line)?
        };

        let mut host = HostConfig::new(self.interface.clone(), addresses, ports)
            .map_err(at_line)?
            .with_name(self.name.clone())
            .with_ping_tries(self.ping_tries);
        host.mac = self.mac;

        for address in host.addresses() {
            if let Some(&owner) = owners.get(&address.ip()) {
                return Err(at_line(FormatError::SharedAddress {
                    address: address.ip(),
                    owner,
                }));
            }
        }
        owners.extend(host.addresses().iter().map(|address| (address.ip(), self.line)));
        Ok(host)
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
