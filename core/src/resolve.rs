use std::net::IpAddr;

use sleep_proxy_common::network::NetworkAddress;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resolving {name}: {source}")]
    Lookup {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} did not resolve to any address")]
    NoAddress(String),
}

/// Every address `name` resolves to, in resolver order without duplicates,
/// each with its default prefix.
pub async fn resolve_host(name: &str) -> Result<Vec<NetworkAddress>, ResolveError> {
    let resolved = tokio::net::lookup_host((name, 0))
        .await
        .map_err(|source| ResolveError::Lookup {
            name: name.to_string(),
            source,
        })?;
    let addresses = dedup(resolved.map(|socket| socket.ip()));
    if addresses.is_empty() {
        return Err(ResolveError::NoAddress(name.to_string()));
    }
    debug!("{name} resolved to {} address(es)", addresses.len());
    Ok(addresses)
}

fn dedup(ips: impl Iterator<Item = IpAddr>) -> Vec<NetworkAddress> {
    let mut seen: Vec<IpAddr> = Vec::new();
    for ip in ips {
        if !seen.contains(&ip) {
            seen.push(ip);
        }
    }
    seen.into_iter().map(NetworkAddress::with_default_prefix).collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
