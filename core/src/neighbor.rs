//! Hardware address lookup in the kernel's neighbour table (`ip neigh show`).

use std::net::IpAddr;

use sleep_proxy_common::network::{HardwareAddress, NetworkAddress};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NeighborError {
    #[error("failed to run `ip neigh show`: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("`ip neigh show` failed with {0}")]
    Failed(String),
}

/// One line of `ip neigh show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub ip: IpAddr,
    pub interface: Option<String>,
    pub mac: Option<HardwareAddress>,
    pub state: String,
}

/// Parses lines like
/// `192.168.1.20 dev eth0 lladdr 01:23:45:67:89:ab REACHABLE`.
/// Lines without a parsable address are skipped.
pub fn parse_neighbors(output: &str) -> Vec<Neighbor> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let ip: IpAddr = fields.next()?.parse().ok()?;
            let mut neighbor = Neighbor {
                ip,
                interface: None,
                mac: None,
                state: String::new(),
            };
            while let Some(field) = fields.next() {
                match field {
                    "dev" => neighbor.interface = fields.next().map(str::to_string),
                    "lladdr" => neighbor.mac = fields.next().and_then(|mac| mac.parse().ok()),
                    other => neighbor.state = other.to_string(),
                }
            }
            Some(neighbor)
        })
        .collect()
}

/// The hardware address of the first of `addresses` with a usable entry.
pub fn find_mac(neighbors: &[Neighbor], addresses: &[NetworkAddress]) -> Option<HardwareAddress> {
    addresses.iter().find_map(|address| {
        neighbors
            .iter()
            .filter(|neighbor| neighbor.ip == address.ip() && neighbor.state != "FAILED")
            .find_map(|neighbor| neighbor.mac)
    })
}

/// Asks the kernel for the hardware address of any of `addresses`.
pub async fn lookup(addresses: &[NetworkAddress]) -> Result<Option<HardwareAddress>, NeighborError> {
    let output = Command::new("ip").args(["neigh", "show"]).output().await?;
    if !output.status.success() {
        return Err(NeighborError::Failed(output.status.to_string()));
    }
    let neighbors = parse_neighbors(&String::from_utf8_lossy(&output.stdout));
    debug!("{} neighbour entries", neighbors.len());
    Ok(find_mac(&neighbors, addresses))
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
    use sleep_proxy_common::network::address;

    const TABLE: &str = "\
192.168.1.1 dev eth0 lladdr 00:11:22:33:44:55 REACHABLE
192.168.1.20 dev eth0  FAILED
fe80::20 dev eth0 lladdr 01:23:45:67:89:ab router STALE
garbage line
10.0.0.7 dev wlan0 lladdr 02:00:00:00:00:07 DELAY
";

    #[test]
    fn parses_entries() {
        let neighbors = parse_neighbors(TABLE);
        assert_eq!(neighbors.len(), 4);
        assert_eq!(neighbors[0].interface.as_deref(), Some("eth0"));
        assert_eq!(neighbors[0].mac.map(|m| m.to_string()).as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(neighbors[0].state, "REACHABLE");
        assert_eq!(neighbors[1].mac, None);
        assert_eq!(neighbors[1].state, "FAILED");
        assert_eq!(neighbors[2].state, "STALE");
    }

    #[test]
    fn find_mac_skips_failed_entries() {
        let neighbors = parse_neighbors(TABLE);
        let addresses = address::parse_list("192.168.1.20,fe80::20").unwrap();
        assert_eq!(
            find_mac(&neighbors, &addresses),
            Some(HardwareAddress::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xab]))
        );
        let unknown = address::parse_list("192.168.1.99").unwrap();
        assert_eq!(find_mac(&neighbors, &unknown), None);
    }
}
