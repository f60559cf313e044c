use std::io;

use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("opening on {interface}: {source}")]
    Open {
        interface: String,
        #[source]
        source: io::Error,
    },
    #[error("non-ethernet channel for {0}")]
    NotEthernet(String),
}

pub type EthernetChannel = (Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>);

/// Opens a layer 2 channel on `intf`. `channel_opener` is
/// [`datalink::channel`] outside of tests.
pub fn open_eth_channel<F>(
    intf: &NetworkInterface,
    cfg: Config,
    channel_opener: F,
) -> Result<EthernetChannel, ChannelError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<datalink::Channel>,
{
    let ch: Channel = channel_opener(intf, cfg).map_err(|source| ChannelError::Open {
        interface: intf.name.clone(),
        source,
    })?;
    match ch {
        Channel::Ethernet(tx, rx) => {
            debug!(interface = %intf.name, "datalink channel open");
            Ok((tx, rx))
        }
        _ => Err(ChannelError::NotEthernet(intf.name.clone())),
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
