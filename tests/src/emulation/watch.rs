use std::sync::Arc;
use std::time::Duration;

use sleep_proxy_core::firewall::RecordingFirewall;
use sleep_proxy_core::watch::{WatchLoop, WatchStats};
use tokio_util::sync::CancellationToken;

use crate::support::{self, ReplayCapture, RecordingWaker, ScriptedPinger, MAC};

fn watch_loop(
    firewall: Arc<RecordingFirewall>,
    capture: ReplayCapture,
    waker: Arc<RecordingWaker>,
    pinger: Arc<ScriptedPinger>,
) -> WatchLoop {
    let backends = support::backends(firewall, capture, waker, pinger);
    WatchLoop::new(support::host("192.168.1.1/24", "22"), MAC, backends)
        .with_poll_interval(Duration::from_millis(1))
}

/// Silent host: one probe, one cycle with three wake-up pings, then the next
/// probe cancels the loop.
#[tokio::test]
async fn silent_host_is_emulated_until_cancelled() {
    let token = CancellationToken::new();
    let pinger = Arc::new(ScriptedPinger::new(false, 5, token.clone()));
    let firewall = Arc::new(RecordingFirewall::new());
    let waker = Arc::new(RecordingWaker::default());
    let capture = ReplayCapture::new(vec![support::ssh_syn_frame()]);

    let stats = watch_loop(firewall.clone(), capture, waker.clone(), pinger.clone())
        .run(token)
        .await;

    assert_eq!(stats, WatchStats { cycles: 1, failed_cycles: 0 });
    assert_eq!(pinger.calls(), 5);
    assert_eq!(waker.woken(), vec![MAC]);
    assert!(firewall.applied().is_empty());
}

#[tokio::test]
async fn failed_cycle_does_not_stop_the_loop() {
    let token = CancellationToken::new();
    // probe, cycle fails in capture, probe, cycle fails, probe cancels
    let pinger = Arc::new(ScriptedPinger::new(false, 3, token.clone()));
    let firewall = Arc::new(RecordingFirewall::new());
    let waker = Arc::new(RecordingWaker::default());
    let capture = ReplayCapture::new(vec![]);

    let stats = watch_loop(firewall.clone(), capture, waker.clone(), pinger)
        .run(token)
        .await;

    assert_eq!(stats, WatchStats { cycles: 2, failed_cycles: 2 });
    assert!(waker.woken().is_empty());
    assert!(firewall.applied().is_empty());
}

#[tokio::test]
async fn cancellation_during_pause_stops_promptly() {
    let token = CancellationToken::new();
    let pinger = Arc::new(ScriptedPinger::new(true, u32::MAX, token.clone()));
    let backends = support::backends(
        Arc::new(RecordingFirewall::new()),
        ReplayCapture::new(vec![]),
        Arc::new(RecordingWaker::default()),
        pinger.clone(),
    );
    let watch = WatchLoop::new(support::host("192.168.1.1/24", "22"), MAC, backends)
        .with_poll_interval(Duration::from_secs(3600));

    let handle = tokio::spawn(watch.run(token.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats, WatchStats::default());
    assert_eq!(pinger.calls(), 1);
}
