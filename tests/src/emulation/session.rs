use std::net::IpAddr;
use std::sync::Arc;

use sleep_proxy_core::capture::{CaptureError, WaitOutcome};
use sleep_proxy_core::firewall::{Action, FirewallError, FirewallRule, RecordingFirewall, RuleKind};
use sleep_proxy_core::session::{EmulationSession, SessionError, SessionState};
use tokio_util::sync::CancellationToken;

use crate::support::{self, ReplayCapture, RecordingWaker, ScriptedPinger, MAC};

/// A connection attempt to 192.168.1.1:22 ends the emulation and wakes the host.
#[tokio::test]
async fn captured_ssh_connection_wakes_host() {
    let firewall = Arc::new(RecordingFirewall::new());
    let waker = Arc::new(RecordingWaker::default());
    let pinger = Arc::new(ScriptedPinger::new(true, u32::MAX, CancellationToken::new()));
    let capture = ReplayCapture::new(vec![vec![0xff; 8], support::ssh_syn_frame()]);
    let backends = support::backends(firewall.clone(), capture, waker.clone(), pinger.clone());
    let mut session = EmulationSession::new(support::host("192.168.1.1/24", "22"), MAC, backends);

    let outcome = session.run(&CancellationToken::new()).await.unwrap();

    let trigger = outcome.ended_by.trigger().unwrap();
    assert_eq!(trigger.source, "192.168.1.198".parse::<IpAddr>().unwrap());
    assert_eq!(trigger.source_port, 48552);
    assert_eq!(trigger.destination_port, 22);
    assert!(outcome.host_woke);
    assert_eq!(waker.woken(), vec![MAC]);
    assert_eq!(pinger.calls(), 1);

    use SessionState::*;
    assert_eq!(
        session.history(),
        &[Idle, Claimed, Captured, IcmpBlocked, Waking, Restoring, Idle]
    );

    let calls = firewall.calls();
    let kinds: Vec<(Action, RuleKind)> = calls.iter().map(|(action, rule)| (*action, rule.kind())).collect();
    assert_eq!(
        &kinds[..3],
        &[
            (Action::Insert, RuleKind::OpenPorts),
            (Action::Insert, RuleKind::DropTcpReset),
            (Action::Insert, RuleKind::Address),
        ]
    );
    assert!(calls.contains(&(
        Action::Insert,
        FirewallRule::BlockIcmpUnreachable {
            destination: "192.168.1.198".parse().unwrap()
        }
    )));
    assert!(firewall.applied().is_empty());
}

#[tokio::test]
async fn failed_address_add_leaves_no_rules() {
    let firewall = Arc::new(RecordingFirewall::failing_on(Action::Insert, RuleKind::Address));
    let waker = Arc::new(RecordingWaker::default());
    let pinger = Arc::new(ScriptedPinger::new(true, u32::MAX, CancellationToken::new()));
    let capture = ReplayCapture::new(vec![support::ssh_syn_frame()]);
    let backends = support::backends(firewall.clone(), capture, waker.clone(), pinger.clone());
    let mut session = EmulationSession::new(support::host("192.168.1.1/24", "22"), MAC, backends);

    let err = session.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, SessionError::Firewall(FirewallError::Rejected { .. })), "{err}");
    assert!(firewall.applied().is_empty());
    assert!(waker.woken().is_empty());
    assert_eq!(pinger.calls(), 0);
    assert_eq!(
        session.history(),
        &[SessionState::Idle, SessionState::Aborting, SessionState::Idle]
    );
    // Ports and reset rules went in, the address did not, both rules came out.
    let deletes = firewall
        .calls()
        .iter()
        .filter(|(action, _)| *action == Action::Delete)
        .count();
    assert_eq!(deletes, 2);
}

#[tokio::test]
async fn capture_failure_releases_every_claim_in_reverse() {
    let firewall = Arc::new(RecordingFirewall::new());
    let waker = Arc::new(RecordingWaker::default());
    let pinger = Arc::new(ScriptedPinger::new(true, u32::MAX, CancellationToken::new()));
    // Only traffic to another port arrives before the link fails.
    let capture = ReplayCapture::new(vec![support::ssh_syn_frame()]);
    let backends = support::backends(firewall.clone(), capture, waker.clone(), pinger);
    let host = support::host("192.168.1.1/24,fe80::1/64", "80");
    let mut session = EmulationSession::new(host, MAC, backends);

    let err = session.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, SessionError::Capture(CaptureError::Receive { .. })), "{err}");
    assert!(firewall.applied().is_empty());
    assert!(waker.woken().is_empty());

    let calls = firewall.calls();
    assert_eq!(calls.len(), 12);
    let (inserts, deletes) = calls.split_at(6);
    for ((insert, inserted), (delete, deleted)) in inserts.iter().zip(deletes.iter().rev()) {
        assert_eq!(*insert, Action::Insert);
        assert_eq!(*delete, Action::Delete);
        assert_eq!(inserted, deleted);
    }
}

/// The host answering ARP for its own address ends the emulation without a
/// wake, and nothing it triggered after that is acted on.
#[tokio::test]
async fn host_back_on_its_address_ends_emulation_quietly() {
    let firewall = Arc::new(RecordingFirewall::new());
    let waker = Arc::new(RecordingWaker::default());
    let pinger = Arc::new(ScriptedPinger::new(true, u32::MAX, CancellationToken::new()));
    let capture = ReplayCapture::new(vec![support::arp_reply_frame(), support::ssh_syn_frame()]);
    let backends = support::backends(firewall.clone(), capture, waker.clone(), pinger.clone());
    let mut session = EmulationSession::new(support::host("192.168.1.1/24", "22"), MAC, backends);

    let outcome = session.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        outcome.ended_by,
        WaitOutcome::AddressInUse {
            address: "192.168.1.1".parse().unwrap(),
            owner: MAC,
        }
    );
    assert!(outcome.host_woke);
    assert!(waker.woken().is_empty());
    assert_eq!(pinger.calls(), 0);

    use SessionState::*;
    assert_eq!(session.history(), &[Idle, Claimed, Restoring, Idle]);
    assert!(firewall.applied().is_empty());
    assert!(!firewall
        .calls()
        .iter()
        .any(|(_, rule)| rule.kind() == RuleKind::BlockIcmpUnreachable));
}

/// A magic packet for the host from someone else means it is already waking.
#[tokio::test]
async fn foreign_magic_packet_skips_own_wake() {
    let firewall = Arc::new(RecordingFirewall::new());
    let waker = Arc::new(RecordingWaker::default());
    let pinger = Arc::new(ScriptedPinger::new(true, u32::MAX, CancellationToken::new()));
    let capture = ReplayCapture::new(vec![support::magic_frame(&MAC), support::ssh_syn_frame()]);
    let backends = support::backends(firewall.clone(), capture, waker.clone(), pinger.clone());
    let mut session = EmulationSession::new(support::host("192.168.1.1/24", "22"), MAC, backends);

    let outcome = session.run(&CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome.ended_by, WaitOutcome::WokenElsewhere { .. }));
    assert!(outcome.host_woke);
    assert!(waker.woken().is_empty());
    assert_eq!(pinger.calls(), 1);

    use SessionState::*;
    assert_eq!(session.history(), &[Idle, Claimed, Waking, Restoring, Idle]);
    assert!(firewall.applied().is_empty());
}
