//! The sleep proxy engine.
//!
//! A [`watch::WatchLoop`] polls a host with the [`probe`] module. Once the host
//! stops answering it runs one [`session`]: the host's addresses are claimed
//! through a [`firewall::Firewall`], the [`capture`] module waits for a
//! connection attempt, the [`wake`] module sends the magic packet and the
//! claims are given back.

pub mod announce;
pub mod capture;
pub mod channel;
pub mod firewall;
pub mod neighbor;
pub mod probe;
pub mod resolve;
pub mod session;
pub mod wake;
pub mod watch;
