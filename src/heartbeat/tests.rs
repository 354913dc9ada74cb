use std::time::Duration;

use super::*;
use crate::shutdown::abort_channel;

#[test]
fn untouched_session_is_not_alive() {
    let mut monitor = HeartbeatMonitor::new(Duration::from_secs(3));
    assert!(!monitor.is_alive("ghost"));
    assert!(!monitor.seen("ghost"));
}

#[test]
fn touched_session_is_alive_within_timeout() {
    let mut monitor = HeartbeatMonitor::new(Duration::from_secs(3));
    monitor.touch("s1");
    assert!(monitor.is_alive("s1"));
    assert!(monitor.seen("s1"));
}

#[test]
fn session_expires_after_timeout() {
    let mut monitor = HeartbeatMonitor::new(Duration::from_millis(20));
    monitor.touch("s1");
    std::thread::sleep(Duration::from_millis(40));
    assert!(!monitor.is_alive("s1"));
    assert!(monitor.seen("s1"));
}

#[test]
fn forget_removes_the_session() {
    let mut monitor = HeartbeatMonitor::new(Duration::from_secs(3));
    monitor.touch("s1");
    monitor.forget("s1");
    assert!(!monitor.seen("s1"));
}

#[test]
fn clones_share_the_last_seen_map() {
    let mut monitor = HeartbeatMonitor::new(Duration::from_secs(3));
    let mut clone = monitor.clone();
    monitor.touch("s1");
    assert!(clone.is_alive("s1"));
}

#[test]
fn check_interval_is_half_the_timeout() {
    assert_eq!(
        heartbeat_check_interval(Duration::from_secs(3)),
        Duration::from_millis(1500)
    );
    // Tiny timeouts fall back to the timeout itself.
    assert_eq!(
        heartbeat_check_interval(Duration::from_millis(60)),
        Duration::from_millis(60)
    );
}

#[tokio::test]
async fn watchdog_signals_heartbeat_lost_within_one_interval() {
    let monitor = HeartbeatMonitor::new(Duration::from_millis(60));
    let (abort_tx, mut abort_rx) = abort_channel();
    let watchdog = spawn_watchdog(monitor, "s1".to_owned(), abort_tx, true);

    let reason = tokio::time::timeout(Duration::from_millis(500), abort_rx.recv())
        .await
        .expect("watchdog should fire")
        .expect("abort channel open");
    assert_eq!(reason, AbortReason::HeartbeatLost);
    watchdog.await.unwrap();
}

#[tokio::test]
async fn watchdog_stays_quiet_while_touched() {
    let mut monitor = HeartbeatMonitor::new(Duration::from_millis(80));
    let (abort_tx, mut abort_rx) = abort_channel();
    let watchdog = spawn_watchdog(monitor.clone(), "s1".to_owned(), abort_tx, true);

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.touch("s1");
        assert!(abort_rx.try_recv().is_err());
    }
    watchdog.abort();
}

#[tokio::test]
async fn unarmed_watchdog_does_not_fire_without_traffic() {
    let monitor = HeartbeatMonitor::new(Duration::from_millis(40));
    let (abort_tx, mut abort_rx) = abort_channel();
    let watchdog = spawn_watchdog(monitor, "s1".to_owned(), abort_tx, false);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(abort_rx.try_recv().is_err());
    watchdog.abort();
}
