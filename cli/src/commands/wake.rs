use anyhow::Context;
use sleep_proxy_common::network::HardwareAddress;
use sleep_proxy_core::wake::{EthernetWaker, UdpWaker, WakeSender};
use tracing::info;

use crate::commands;

pub async fn wake(mac: HardwareAddress, interface: Option<String>, port: u16) -> anyhow::Result<()> {
    let waker: Box<dyn WakeSender> = match interface {
        Some(interface) => {
            commands::ensure_root()?;
            Box::new(EthernetWaker::new(interface))
        }
        None => Box::new(UdpWaker::new(port)),
    };
    waker
        .wake(&mac)
        .await
        .with_context(|| format!("could not wake {mac}"))?;
    info!("magic packet for {mac} sent");
    Ok(())
}
