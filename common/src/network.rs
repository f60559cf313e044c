pub mod address;
pub mod interface;
pub mod mac;
pub mod ports;

pub use address::{AddressFamily, NetworkAddress};
pub use mac::HardwareAddress;
pub use ports::PortSet;
