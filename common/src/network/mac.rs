use std::fmt;
use std::str::FromStr;

use pnet::util::MacAddr;

use crate::error::FormatError;

const BARE_LEN: usize = 12;
const SEPARATED_LEN: usize = 17;

/// The 48-bit hardware address of the host to wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<HardwareAddress> for MacAddr {
    fn from(mac: HardwareAddress) -> Self {
        let [a, b, c, d, e, f] = mac.0;
        MacAddr::new(a, b, c, d, e, f)
    }
}

impl From<MacAddr> for HardwareAddress {
    fn from(mac: MacAddr) -> Self {
        Self(mac.octets())
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for HardwareAddress {
    type Err = FormatError;

    /// Accepts exactly two forms:
    /// * 12 hex digits without separators (`0123456789ab`).
    /// * 17 characters where one separator character sits between every pair
    ///   of digits (`01:23:45:67:89:ab`, `01-23-45-67-89-ab`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FormatError::InvalidHardwareAddress(s.to_string());
        if !s.is_ascii() {
            return Err(invalid());
        }

        let digits: String = match s.len() {
            BARE_LEN => s.to_string(),
            SEPARATED_LEN => strip_separator(s).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };

        let mut octets = [0u8; 6];
        for (idx, octet) in octets.iter_mut().enumerate() {
            let pair = &digits[idx * 2..idx * 2 + 2];
            *octet = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }
}

/// The separator is whatever sits at index 2; it must recur at every third
/// position and must not itself be a hex digit.
fn strip_separator(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let sep = bytes[2];
    if sep.is_ascii_hexdigit() {
        return None;
    }

    let mut digits = String::with_capacity(BARE_LEN);
    for (idx, byte) in bytes.iter().enumerate() {
        if idx % 3 == 2 {
            if *byte != sep {
                return None;
            }
        } else {
            digits.push(*byte as char);
        }
    }
    Some(digits)
}
