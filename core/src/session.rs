//! # Emulation Session
//!
//! One claim, capture, wake and restore cycle for a host that stopped
//! answering:
//!
//! ```text
//! Idle -> Claimed -> Captured -> IcmpBlocked -> Waking -> Restoring -> Idle
//! ```
//!
//! The wait can also end because the host reappeared on its own, in which
//! case the claims are dropped and nothing is woken
//! (`Claimed -> Restoring`), or because someone else woke it, in which case
//! the session only waits for it to answer (`Claimed -> Waking`).
//!
//! Any error moves the session through `Aborting` back to `Idle`. Firewall
//! rules are held in [`Claims`] so that every exit path, early returns
//! included, deletes exactly the rules that were inserted.

use std::fmt;
use std::sync::Arc;

use sleep_proxy_common::config::HostConfig;
use sleep_proxy_common::network::HardwareAddress;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::capture::{CaptureError, CaptureFilter, TriggerSource, WaitOutcome};
use crate::firewall::{Claims, Firewall, FirewallError, FirewallRule};
use crate::probe::{Pinger, ping_and_wait};
use crate::wake::{WakeError, WakeSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Claimed,
    Captured,
    IcmpBlocked,
    Waking,
    Restoring,
    Aborting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Claimed => "claimed",
            SessionState::Captured => "captured",
            SessionState::IcmpBlocked => "icmp blocked",
            SessionState::Waking => "waking",
            SessionState::Restoring => "restoring",
            SessionState::Aborting => "aborting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("firewall: {0}")]
    Firewall(#[from] FirewallError),
    #[error("capture: {0}")]
    Capture(#[from] CaptureError),
    #[error("wake: {0}")]
    Wake(#[from] WakeError),
}

/// How a completed cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub ended_by: WaitOutcome,
    /// Whether the host is up: it answered within the ping budget, or it was
    /// found using its address again.
    pub host_woke: bool,
}

/// The collaborators a session drives.
#[derive(Clone)]
pub struct Backends {
    pub firewall: Arc<dyn Firewall>,
    pub capture: Arc<dyn TriggerSource>,
    pub waker: Arc<dyn WakeSender>,
    pub pinger: Arc<dyn Pinger>,
}

pub struct EmulationSession {
    host: HostConfig,
    mac: HardwareAddress,
    backends: Backends,
    history: Vec<SessionState>,
}

impl EmulationSession {
    pub fn new(host: HostConfig, mac: HardwareAddress, backends: Backends) -> Self {
        Self {
            host,
            mac,
            backends,
            history: vec![SessionState::Idle],
        }
    }

    pub fn host(&self) -> &HostConfig {
        &self.host
    }

    pub fn state(&self) -> SessionState {
        self.history.last().copied().unwrap_or(SessionState::Idle)
    }

    /// States visited by the last [`run`](Self::run), starting and ending with `Idle`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Runs one full cycle. All rules are deleted again when this returns.
    ///
    /// `token` only shortens the wait for the host to answer after waking;
    /// the capture wait is not interrupted.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<CycleOutcome, SessionError> {
        self.history = vec![SessionState::Idle];
        let result = self.cycle(token).await;
        if let Err(err) = &result {
            warn!(host = %self.host.label(), "cycle aborted: {err}");
            self.enter(SessionState::Aborting);
        }
        self.enter(SessionState::Idle);
        result
    }

    async fn cycle(&mut self, token: &CancellationToken) -> Result<CycleOutcome, SessionError> {
        let claims = Claims::acquire(
            Arc::clone(&self.backends.firewall),
            self.host.interface(),
            self.host.addresses(),
            &self.host.ports,
        )?;
        self.enter(SessionState::Claimed);

        let filter = CaptureFilter::new(self.host.addresses(), &self.host.ports).with_wake_target(self.mac);
        let ended_by = self.backends.capture.wait(self.host.interface(), &filter).await?;
        info!(host = %self.host.label(), "{ended_by}");

        let trigger = match &ended_by {
            WaitOutcome::Connection(trigger) => trigger.clone(),
            WaitOutcome::AddressInUse { .. } => {
                claims.release();
                self.enter(SessionState::Restoring);
                return Ok(CycleOutcome {
                    ended_by,
                    host_woke: true,
                });
            }
            WaitOutcome::WokenElsewhere { .. } => {
                claims.release();
                self.enter(SessionState::Waking);
                let host_woke = self.wait_until_up(token).await;
                self.enter(SessionState::Restoring);
                return Ok(CycleOutcome { ended_by, host_woke });
            }
        };
        self.enter(SessionState::Captured);

        let mut icmp_block = Claims::new(Arc::clone(&self.backends.firewall));
        let block = FirewallRule::BlockIcmpUnreachable {
            destination: trigger.source,
        };
        if let Err(err) = icmp_block.insert(block) {
            warn!("continuing without icmp block: {err}");
        }
        claims.release();
        self.enter(SessionState::IcmpBlocked);

        self.enter(SessionState::Waking);
        self.backends.waker.wake(&self.mac).await?;
        let host_woke = self.wait_until_up(token).await;

        self.enter(SessionState::Restoring);
        icmp_block.release();
        Ok(CycleOutcome { ended_by, host_woke })
    }

    async fn wait_until_up(&self, token: &CancellationToken) -> bool {
        let primary = self.host.primary_address();
        let host_woke = ping_and_wait(
            self.backends.pinger.as_ref(),
            self.host.interface(),
            primary,
            self.host.ping_tries,
            token,
        )
        .await;
        if host_woke {
            info!(host = %self.host.label(), "host is back");
        } else {
            warn!(
                host = %self.host.label(),
                "no answer from {primary} after {} tries",
                self.host.ping_tries
            );
        }
        host_woke
    }

    fn enter(&mut self, state: SessionState) {
        info!(host = %self.host.label(), "session {state}");
        self.history.push(state);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Trigger;
    use crate::firewall::{Action, RecordingFirewall, RuleKind};
    use async_trait::async_trait;
    use sleep_proxy_common::network::{NetworkAddress, address};
    use std::net::IpAddr;
    use std::sync::Mutex;

    struct FixedTrigger(Option<WaitOutcome>);

    #[async_trait]
    impl TriggerSource for FixedTrigger {
        async fn wait(&self, interface: &str, _: &CaptureFilter) -> Result<WaitOutcome, CaptureError> {
            self.0
                .clone()
                .ok_or_else(|| CaptureError::InterfaceNotFound(interface.to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingWaker(Mutex<Vec<HardwareAddress>>);

    #[async_trait]
    impl WakeSender for RecordingWaker {
        async fn wake(&self, mac: &HardwareAddress) -> Result<(), WakeError> {
            self.0.lock().unwrap().push(*mac);
            Ok(())
        }
    }

    struct Answers(bool);

    #[async_trait]
    impl Pinger for Answers {
        async fn ping(&self, _: &str, _: &NetworkAddress) -> bool {
            self.0
        }
    }

    const MAC: HardwareAddress = HardwareAddress::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xab]);

    fn host() -> HostConfig {
        HostConfig::new(
            "eth0",
            address::parse_list("10.0.0.1/16,fe80::123/64").unwrap(),
            "22".parse().unwrap(),
        )
        .unwrap()
        .with_ping_tries(2)
    }

    fn trigger() -> WaitOutcome {
        WaitOutcome::Connection(Trigger {
            frame: vec![],
            source: "10.0.0.99".parse().unwrap(),
            destination: "10.0.0.1".parse().unwrap(),
            source_port: 40000,
            destination_port: 22,
        })
    }

    fn session(
        firewall: Arc<RecordingFirewall>,
        capture: Option<WaitOutcome>,
        waker: Arc<RecordingWaker>,
        answers: bool,
    ) -> EmulationSession {
        let backends = Backends {
            firewall,
            capture: Arc::new(FixedTrigger(capture)),
            waker,
            pinger: Arc::new(Answers(answers)),
        };
        EmulationSession::new(host(), MAC, backends)
    }

    #[tokio::test]
    async fn full_cycle_visits_every_state_and_cleans_up() {
        let firewall = Arc::new(RecordingFirewall::new());
        let waker = Arc::new(RecordingWaker::default());
        let mut session = session(firewall.clone(), Some(trigger()), waker.clone(), true);

        let outcome = session.run(&CancellationToken::new()).await.unwrap();
        assert!(outcome.host_woke);
        assert_eq!(
            outcome.ended_by.trigger().unwrap().source,
            "10.0.0.99".parse::<IpAddr>().unwrap()
        );

        use SessionState::*;
        assert_eq!(
            session.history(),
            &[Idle, Claimed, Captured, IcmpBlocked, Waking, Restoring, Idle]
        );
        assert_eq!(session.state(), Idle);
        assert!(firewall.applied().is_empty());
        assert_eq!(*waker.0.lock().unwrap(), vec![MAC]);
    }

    #[tokio::test]
    async fn icmp_block_targets_trigger_source_and_outlives_claims() {
        let firewall = Arc::new(RecordingFirewall::new());
        let mut session = session(firewall.clone(), Some(trigger()), Arc::default(), false);
        let outcome = session.run(&CancellationToken::new()).await.unwrap();
        assert!(!outcome.host_woke);

        let calls = firewall.calls();
        let icmp: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, (_, rule))| rule.kind() == RuleKind::BlockIcmpUnreachable)
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(icmp.len(), 2);
        assert_eq!(
            calls[icmp[0]].1,
            FirewallRule::BlockIcmpUnreachable {
                destination: "10.0.0.99".parse().unwrap()
            }
        );
        // Inserted before the claims go away and deleted last.
        assert_eq!(calls[icmp[0] + 1].0, Action::Delete);
        assert_eq!(icmp[1], calls.len() - 1);
    }

    #[tokio::test]
    async fn failed_address_add_rolls_back_and_reports_once() {
        let firewall = Arc::new(RecordingFirewall::failing_on(Action::Insert, RuleKind::Address));
        let waker = Arc::new(RecordingWaker::default());
        let mut session = session(firewall.clone(), Some(trigger()), waker.clone(), true);

        let err = session.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::Firewall(FirewallError::Rejected { .. })));
        assert!(firewall.applied().is_empty());
        assert!(waker.0.lock().unwrap().is_empty());
        assert_eq!(
            session.history(),
            &[SessionState::Idle, SessionState::Aborting, SessionState::Idle]
        );
    }

    #[tokio::test]
    async fn capture_error_releases_claims() {
        let firewall = Arc::new(RecordingFirewall::new());
        let mut session = session(firewall.clone(), None, Arc::default(), true);

        let err = session.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::Capture(_)));
        assert!(firewall.applied().is_empty());
        assert_eq!(firewall.calls().len(), 12);
    }

    #[tokio::test]
    async fn failed_icmp_block_still_wakes() {
        let firewall = Arc::new(RecordingFirewall::failing_on(
            Action::Insert,
            RuleKind::BlockIcmpUnreachable,
        ));
        let waker = Arc::new(RecordingWaker::default());
        let mut session = session(firewall.clone(), Some(trigger()), waker.clone(), true);

        assert!(session.run(&CancellationToken::new()).await.is_ok());
        assert_eq!(waker.0.lock().unwrap().len(), 1);
        assert!(firewall.applied().is_empty());
    }

    #[tokio::test]
    async fn host_reappearing_ends_the_cycle_without_waking() {
        let firewall = Arc::new(RecordingFirewall::new());
        let waker = Arc::new(RecordingWaker::default());
        let reappeared = WaitOutcome::AddressInUse {
            address: "10.0.0.1".parse().unwrap(),
            owner: MAC,
        };
        let mut session = session(firewall.clone(), Some(reappeared.clone()), waker.clone(), false);

        let outcome = session.run(&CancellationToken::new()).await.unwrap();
        assert!(outcome.host_woke);
        assert_eq!(outcome.ended_by, reappeared);

        use SessionState::*;
        assert_eq!(session.history(), &[Idle, Claimed, Restoring, Idle]);
        assert!(firewall.applied().is_empty());
        assert!(waker.0.lock().unwrap().is_empty());
        assert!(
            firewall
                .calls()
                .iter()
                .all(|(_, rule)| rule.kind() != RuleKind::BlockIcmpUnreachable)
        );
    }

    #[tokio::test]
    async fn foreign_wake_skips_the_magic_packet_and_waits_for_the_host() {
        let firewall = Arc::new(RecordingFirewall::new());
        let waker = Arc::new(RecordingWaker::default());
        let woken = WaitOutcome::WokenElsewhere { sender: None };
        let mut session = session(firewall.clone(), Some(woken), waker.clone(), true);

        let outcome = session.run(&CancellationToken::new()).await.unwrap();
        assert!(outcome.host_woke);
        assert!(outcome.ended_by.trigger().is_none());

        use SessionState::*;
        assert_eq!(session.history(), &[Idle, Claimed, Waking, Restoring, Idle]);
        assert!(firewall.applied().is_empty());
        assert!(waker.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_wake_reports_a_host_that_stays_down() {
        let firewall = Arc::new(RecordingFirewall::new());
        let woken = WaitOutcome::WokenElsewhere {
            sender: Some(HardwareAddress::new([0x02, 0, 0, 0, 0, 9])),
        };
        let mut session = session(firewall, Some(woken), Arc::default(), false);

        let outcome = session.run(&CancellationToken::new()).await.unwrap();
        assert!(!outcome.host_woke);
    }
}
