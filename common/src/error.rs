use std::net::IpAddr;

use thiserror::Error;

/// Raised while normalizing addresses, ports, MAC addresses or configuration.
///
/// These errors only ever surface before a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("too many '/' in address: {0}")]
    TooManySeparators(String),
    #[error("invalid ip address: {0}")]
    InvalidAddress(String),
    #[error("invalid prefix length in '{0}'")]
    InvalidPrefix(String),
    #[error("prefix length {prefix} of {address} exceeds {max}")]
    PrefixOutOfRange { address: String, prefix: u32, max: u8 },
    #[error("no ip address given")]
    NoAddress,
    #[error("address {0} given more than once")]
    DuplicateAddress(IpAddr),
    #[error("address {address} already belongs to the host at line {owner}")]
    SharedAddress { address: IpAddr, owner: usize },
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("port {0} given more than once")]
    DuplicatePort(u16),
    #[error("no port given")]
    EmptyPortSet,
    #[error("incorrect MAC address format: {0}")]
    InvalidHardwareAddress(String),
    #[error("invalid interface name: {0:?}")]
    InvalidInterface(String),
    #[error("invalid number for '{key}': {value}")]
    InvalidNumber { key: String, value: String },
    #[error("line {line}: {source}")]
    ConfigLine {
        line: usize,
        #[source]
        source: Box<FormatError>,
    },
}
