use std::fmt;
use std::str::FromStr;

use crate::error::FormatError;

/// The TCP ports protected while a host is emulated.
///
/// Never empty, never contains port 0, no duplicates. Order is preserved
/// because it determines the order of the firewall accept rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortSet(Vec<u16>);

impl PortSet {
    pub fn new(ports: Vec<u16>) -> Result<Self, FormatError> {
        if ports.is_empty() {
            return Err(FormatError::EmptyPortSet);
        }
        for (idx, port) in ports.iter().enumerate() {
            if *port == 0 {
                return Err(FormatError::InvalidPort(port.to_string()));
            }
            if ports[..idx].contains(port) {
                return Err(FormatError::DuplicatePort(*port));
            }
        }
        Ok(Self(ports))
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.0.contains(&port)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(u16::to_string).collect();
        write!(f, "{}", joined.join(","))
    }
}

impl FromStr for PortSet {
    type Err = FormatError;

    /// Parses a comma-separated list like `22,80,443`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ports = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u16>()
                    .map_err(|_| FormatError::InvalidPort(part.to_string()))
            })
            .collect::<Result<Vec<u16>, _>>()?;

        Self::new(ports)
    }
}
