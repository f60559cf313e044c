use std::sync::Arc;

use anyhow::Context;
use sleep_proxy_core::announce::{Announcement, LogAnnouncer};
use sleep_proxy_core::session::EmulationSession;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::{self, HostArgs, WakeArgs};

/// One emulation cycle for the first configured host.
pub async fn emulate(host_args: &HostArgs, wake: &WakeArgs, token: CancellationToken) -> anyhow::Result<()> {
    commands::ensure_root()?;
    let hosts = host_args.hosts().await?;
    if hosts.len() > 1 {
        warn!("{} hosts configured, emulating only the first", hosts.len());
    }
    let host = hosts.into_iter().next().context("no host configured")?;
    let mac = commands::hardware_address(&host).await?;
    commands::describe(&host, &mac);
    commands::check_interface(&host);

    let backends = wake.backends(host.interface());
    let mut announcement = Announcement::new(Arc::new(LogAnnouncer), host.clone());
    announcement.publish()?;
    let mut session = EmulationSession::new(host, mac, backends);
    let result = session.run(&token).await;
    announcement.unpublish();

    let outcome = result?;
    if outcome.host_woke {
        info!("{} is awake", session.host().label());
    } else {
        warn!("{} did not answer after waking", session.host().label());
    }
    Ok(())
}
