use std::net::IpAddr;

use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::IpNetwork;

use crate::error::FormatError;
use crate::network::address::NetworkAddress;

/// Interface names end up as arguments of `ip` and `ping`, so only a
/// conservative character set is allowed.
pub fn validate_name(name: &str) -> Result<(), FormatError> {
    let is_allowed = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_');
    if name.is_empty() || !name.chars().all(is_allowed) {
        return Err(FormatError::InvalidInterface(name.to_string()));
    }
    Ok(())
}

/// Looks up a local interface by its exact name.
pub fn find_by_name(name: &str) -> Option<NetworkInterface> {
    find_in(datalink::interfaces(), name)
}

fn find_in(interfaces: Vec<NetworkInterface>, name: &str) -> Option<NetworkInterface> {
    interfaces.into_iter().find(|interface| interface.name == name)
}

/// Whether `ip` is currently bound on `interface`.
///
/// Used to warn before claiming an address the proxy already owns.
pub fn has_address(interface: &NetworkInterface, ip: IpAddr) -> bool {
    interface.ips.iter().any(|net: &IpNetwork| net.ip() == ip)
}

/// Renders an address in the form a probe can target from `interface`.
///
/// Link-local IPv6 addresses are ambiguous without a scope, so they get a
/// `%iface` suffix; everything else is the bare literal.
pub fn scoped_target(interface: &str, address: &NetworkAddress) -> String {
    if address.is_link_local() {
        format!("{}%{}", address.ip(), interface)
    } else {
        address.ip().to_string()
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
