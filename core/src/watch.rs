use std::sync::Arc;
use std::time::Duration;

use sleep_proxy_common::config::{DEFAULT_POLL_INTERVAL, HostConfig};
use sleep_proxy_common::network::HardwareAddress;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::announce::{Announcement, Announcer, LogAnnouncer};
use crate::probe::{Pinger, probe};
use crate::session::{Backends, EmulationSession};

/// Counters reported when a loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub cycles: u32,
    pub failed_cycles: u32,
}

/// Polls one host and emulates it whenever it stops answering.
///
/// Owns the host's only [`EmulationSession`], so cycles never overlap. The
/// host is announced for the duration of each cycle.
pub struct WatchLoop {
    session: EmulationSession,
    announcement: Announcement,
    pinger: Arc<dyn Pinger>,
    poll_interval: Duration,
}

impl WatchLoop {
    pub fn new(host: HostConfig, mac: HardwareAddress, backends: Backends) -> Self {
        let pinger = Arc::clone(&backends.pinger);
        Self {
            announcement: Announcement::new(Arc::new(LogAnnouncer), host.clone()),
            session: EmulationSession::new(host, mac, backends),
            pinger,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_announcer(mut self, announcer: Arc<dyn Announcer>) -> Self {
        self.announcement = Announcement::new(announcer, self.session.host().clone());
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs until `token` is cancelled. Cancellation is checked between polls
    /// and between cycles, never inside one.
    pub async fn run(mut self, token: CancellationToken) -> WatchStats {
        let mut stats = WatchStats::default();
        let label = self.session.host().label();
        info!(host = %label, "watching {}", self.session.host().interface());

        while !token.is_cancelled() {
            let host = self.session.host();
            if probe(Arc::clone(&self.pinger), host.interface(), host.addresses()).await {
                debug!(host = %label, "alive");
                if !self.pause(&token).await {
                    break;
                }
                continue;
            }
            if token.is_cancelled() {
                break;
            }

            info!(host = %label, "not answering, taking over its addresses");
            stats.cycles += 1;
            if let Err(err) = self.announcement.publish() {
                warn!("{err}");
            }
            let result = self.session.run(&token).await;
            self.announcement.unpublish();
            match result {
                Ok(outcome) if outcome.host_woke => {
                    info!(host = %label, "host is up after {}", outcome.ended_by)
                }
                Ok(_) => info!(host = %label, "cycle finished, host still silent"),
                Err(err) => {
                    stats.failed_cycles += 1;
                    error!(host = %label, "cycle failed: {err}");
                    if !self.pause(&token).await {
                        break;
                    }
                }
            }
        }

        info!(host = %label, "stopped watching");
        stats
    }

    /// Sleeps for one poll interval; `false` if cancelled meanwhile.
    async fn pause(&self, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
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
