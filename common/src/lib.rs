//! Shared building blocks for the sleep proxy.
//!
//! * [`network`]: the validated address, port and hardware-address model.
//! * [`config`]: per-host settings and the config-file format.
//! * [`error`]: the [`FormatError`] raised while normalizing user input.

pub mod config;
pub mod error;
pub mod network;

pub use error::FormatError;
