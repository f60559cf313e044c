//! # Firewall Control
//!
//! Every change the proxy makes to the host's network state is a
//! [`FirewallRule`] that is either inserted or deleted. A [`Firewall`]
//! executes one such pair; [`Claims`] groups the rules of an emulated host
//! and takes them back on release or drop.
//!
//! Claiming an address has to make it look reachable before it exists:
//! 1. Open the protected ports, reject everything else.
//! 2. Drop the RST+ACK our own stack would send for unknown connections.
//! 3. Add the address to the interface.
//!
//! Releasing runs the same steps backwards.

use std::fmt;
use std::net::IpAddr;

use sleep_proxy_common::network::{NetworkAddress, PortSet};
use thiserror::Error;

mod claims;
mod iptables;
mod recording;

pub use claims::Claims;
pub use iptables::IptablesFirewall;
pub use recording::RecordingFirewall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert => write!(f, "insert"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FirewallRule {
    /// The address bound on an interface.
    Address {
        interface: String,
        address: NetworkAddress,
    },
    /// Outgoing RST+ACK segments from `source` are dropped.
    DropTcpReset { source: IpAddr },
    /// SYNs to each port are accepted, all other TCP and UDP to `destination`
    /// is rejected.
    OpenPorts { destination: IpAddr, ports: PortSet },
    /// Outgoing ICMP destination-unreachable to `destination` is dropped.
    BlockIcmpUnreachable { destination: IpAddr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Address,
    DropTcpReset,
    OpenPorts,
    BlockIcmpUnreachable,
}

impl FirewallRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            FirewallRule::Address { .. } => RuleKind::Address,
            FirewallRule::DropTcpReset { .. } => RuleKind::DropTcpReset,
            FirewallRule::OpenPorts { .. } => RuleKind::OpenPorts,
            FirewallRule::BlockIcmpUnreachable { .. } => RuleKind::BlockIcmpUnreachable,
        }
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirewallRule::Address { interface, address } => write!(f, "address {address} on {interface}"),
            FirewallRule::DropTcpReset { source } => write!(f, "drop tcp resets from {source}"),
            FirewallRule::OpenPorts { destination, ports } => {
                write!(f, "open ports {ports} on {destination}")
            }
            FirewallRule::BlockIcmpUnreachable { destination } => {
                write!(f, "block icmp unreachable to {destination}")
            }
        }
    }
}

/// The rules claiming `address`, in the order they have to be inserted.
pub fn claim_rules(interface: &str, address: &NetworkAddress, ports: &PortSet) -> [FirewallRule; 3] {
    [
        FirewallRule::OpenPorts {
            destination: address.ip(),
            ports: ports.clone(),
        },
        FirewallRule::DropTcpReset { source: address.ip() },
        FirewallRule::Address {
            interface: interface.to_string(),
            address: *address,
        },
    ]
}

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("{action} of {rule} rejected")]
    Rejected { action: Action, rule: FirewallRule },
}

/// Applies single rule changes to the system.
///
/// Implementations run each call to completion before returning; callers rely
/// on the order of calls being the order of effects.
pub trait Firewall: Send + Sync {
    fn execute(&self, action: Action, rule: &FirewallRule) -> Result<(), FirewallError>;
}
