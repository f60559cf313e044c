use std::time::Duration;

use anyhow::Context;
use sleep_proxy_core::watch::{WatchLoop, WatchStats};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commands::{self, HostArgs, WakeArgs};

/// Runs one watch loop per host until `token` is cancelled.
pub async fn watch(
    host_args: &HostArgs,
    wake: &WakeArgs,
    poll_interval: Duration,
    token: CancellationToken,
) -> anyhow::Result<()> {
    commands::ensure_root()?;
    let hosts = host_args.hosts().await?;

    let mut loops = Vec::with_capacity(hosts.len());
    for host in hosts {
        let mac = commands::hardware_address(&host).await?;
        commands::describe(&host, &mac);
        commands::check_interface(&host);
        let backends = wake.backends(host.interface());
        loops.push(WatchLoop::new(host, mac, backends).with_poll_interval(poll_interval));
    }

    let mut tasks = JoinSet::new();
    for watch in loops {
        tasks.spawn(watch.run(token.clone()));
    }

    let mut total = WatchStats::default();
    while let Some(joined) = tasks.join_next().await {
        let stats = joined.context("watch task failed")?;
        total.cycles += stats.cycles;
        total.failed_cycles += stats.failed_cycles;
    }
    info!("{} emulation cycles, {} failed", total.cycles, total.failed_cycles);
    Ok(())
}
