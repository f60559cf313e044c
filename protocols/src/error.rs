use thiserror::Error;

/// Raised for frames that cannot be decoded. Never fatal: the capture loop
/// drops the frame and keeps waiting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unrecognized ip version {0}")]
    UnknownIpVersion(u8),
    #[error("{what} truncated: need {needed} bytes, got {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("invalid {what} header length of {length} bytes")]
    InvalidHeaderLength { what: &'static str, length: usize },
    #[error("address must be {expected} bytes, got {actual}")]
    AddressLength { expected: usize, actual: usize },
    #[error("unsupported ethertype 0x{0:04x}")]
    UnsupportedEtherType(u16),
}

/// Raised while building outgoing frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("buffer too small for ethernet frame")]
    EthernetBuffer,
    #[error("buffer too small for arp packet")]
    ArpBuffer,
}

pub(crate) fn ensure_len(
    what: &'static str,
    bytes: &[u8],
    needed: usize,
) -> Result<(), DecodeError> {
    if bytes.len() < needed {
        return Err(DecodeError::Truncated {
            what,
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}
