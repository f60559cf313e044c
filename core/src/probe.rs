//! # Liveness Probing
//!
//! A host is alive if any of its addresses answers a ping. All addresses are
//! probed concurrently and every probe runs to completion.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sleep_proxy_common::network::{NetworkAddress, interface};
use tokio::process::Command;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Sends a single echo request and reports whether it was answered.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, interface: &str, address: &NetworkAddress) -> bool;
}

/// Runs the system `ping` binary.
#[derive(Debug, Clone, Copy)]
pub struct SystemPinger {
    reply_timeout: Duration,
}

impl SystemPinger {
    pub fn new(reply_timeout: Duration) -> Self {
        Self { reply_timeout }
    }

    /// Arguments for one `ping` run; link-local targets get a `%iface` scope.
    pub fn args(&self, interface: &str, address: &NetworkAddress) -> Vec<String> {
        let mut args = Vec::new();
        if address.is_ipv6() {
            args.push("-6".to_string());
        }
        let wait_secs = self.reply_timeout.as_secs().max(1);
        args.extend(["-c".to_string(), "1".to_string(), "-W".to_string(), wait_secs.to_string()]);
        args.push(interface::scoped_target(interface, address));
        args
    }
}

impl Default for SystemPinger {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    async fn ping(&self, interface: &str, address: &NetworkAddress) -> bool {
        let mut command = Command::new("ping");
        command
            .args(self.args(interface, address))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // ping enforces -W itself; this only catches a hanging binary.
        let hard_limit = self.reply_timeout + Duration::from_secs(2);
        match tokio::time::timeout(hard_limit, command.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(err)) => {
                warn!("could not run ping for {address}: {err}");
                false
            }
            Err(_) => {
                debug!("ping for {address} did not exit in time");
                false
            }
        }
    }
}

/// Pings every address concurrently; `true` if any of them answered.
pub async fn probe(pinger: Arc<dyn Pinger>, interface: &str, addresses: &[NetworkAddress]) -> bool {
    let mut probes = JoinSet::new();
    for address in addresses {
        let pinger = Arc::clone(&pinger);
        let interface = interface.to_string();
        let address = *address;
        probes.spawn(async move { pinger.ping(&interface, &address).await });
    }

    let mut alive = false;
    while let Some(result) = probes.join_next().await {
        match result {
            Ok(answered) => alive |= answered,
            Err(err) => warn!("probe task failed: {err}"),
        }
    }
    alive
}

/// Pings `address` up to `tries` times and stops at the first answer.
pub async fn ping_and_wait(
    pinger: &dyn Pinger,
    interface: &str,
    address: &NetworkAddress,
    tries: u32,
    token: &CancellationToken,
) -> bool {
    for attempt in 1..=tries {
        if token.is_cancelled() {
            debug!("stopped waiting for {address}: cancelled");
            return false;
        }
        if pinger.ping(interface, address).await {
            debug!(attempt, "{address} answered");
            return true;
        }
        debug!(attempt, tries, "no answer from {address}");
    }
    false
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
