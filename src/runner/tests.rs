use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use super::*;
use crate::pki::{DirectPkiConnection, PkiStore};
use crate::script::ActionCommand;
use crate::shutdown::abort_channel;

/// Line server for tests: replies "OK <line>" to every received line,
/// counting them, unless the line is "fail" ("ERR rejected") or "stall"
/// (no reply at all).
async fn spawn_line_server(received: Arc<AtomicUsize>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let received = Arc::clone(&received);
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                let mut line = String::new();
                loop {
                    line.clear();
                    let Ok(bytes) = reader.read_line(&mut line).await else {
                        break;
                    };
                    if bytes == 0 {
                        break;
                    }
                    received.fetch_add(1, Ordering::SeqCst);
                    let trimmed = line.trim_end();
                    let reply = match trimmed {
                        "fail" => "ERR rejected\n".to_owned(),
                        "stall" => continue,
                        "double" => "OK double\nEXTRA\n".to_owned(),
                        other => format!("OK {}\n", other),
                    };
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

fn direct_pki() -> Arc<dyn PkiConnection> {
    Arc::new(DirectPkiConnection::new(Arc::new(PkiStore::new())))
}

fn runner(
    addr: String,
    actions: Vec<ActionCommand>,
    action_timeout: Duration,
    pki: Arc<dyn PkiConnection>,
) -> ClientRunner {
    let (_abort_tx, abort_rx) = abort_channel();
    ClientRunner::new(
        0,
        addr,
        actions,
        action_timeout,
        TimeoutPolicy::PerAction,
        pki,
        abort_rx,
    )
}

#[tokio::test]
async fn script_of_sends_succeeds() {
    let received = Arc::new(AtomicUsize::new(0));
    let addr = spawn_line_server(Arc::clone(&received)).await;
    let actions = vec![
        ActionCommand::Send { payload: "hello".to_owned() },
        ActionCommand::Send { payload: "world".to_owned() },
    ];
    let report = runner(addr, actions, Duration::from_secs(2), direct_pki())
        .run()
        .await;
    assert_eq!(report.status, ClientStatus::Succeeded);
    assert_eq!(report.failed_action, None);
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn err_reply_aborts_remaining_actions() {
    let received = Arc::new(AtomicUsize::new(0));
    let addr = spawn_line_server(Arc::clone(&received)).await;
    let actions = vec![
        ActionCommand::Send { payload: "fail".to_owned() },
        ActionCommand::Send { payload: "never".to_owned() },
    ];
    let report = runner(addr, actions, Duration::from_secs(2), direct_pki())
        .run()
        .await;
    assert_eq!(report.status, ClientStatus::Failed);
    assert_eq!(report.failed_action, Some(0));
    // The second action must never reach the target.
    assert_eq!(received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stalled_reply_times_out_and_skips_the_rest() {
    let received = Arc::new(AtomicUsize::new(0));
    let addr = spawn_line_server(Arc::clone(&received)).await;
    let actions = vec![
        ActionCommand::Send { payload: "stall".to_owned() },
        ActionCommand::Send { payload: "never".to_owned() },
    ];
    let started = tokio::time::Instant::now();
    let report = runner(addr, actions, Duration::from_millis(200), direct_pki())
        .run()
        .await;
    assert_eq!(report.status, ClientStatus::Failed);
    assert_eq!(report.failed_action, Some(0));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_target_fails_the_action() {
    // Nothing listens on this address after the listener is dropped.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let actions = vec![ActionCommand::Send { payload: "hello".to_owned() }];
    let report = runner(addr, actions, Duration::from_secs(2), direct_pki())
        .run()
        .await;
    assert_eq!(report.status, ClientStatus::Failed);
    assert_eq!(report.failed_action, Some(0));
}

#[tokio::test]
async fn expect_matches_a_pushed_line() {
    let received = Arc::new(AtomicUsize::new(0));
    let addr = spawn_line_server(Arc::clone(&received)).await;
    let actions = vec![
        ActionCommand::Send { payload: "double".to_owned() },
        ActionCommand::Expect { payload: "EXTRA".to_owned() },
    ];
    let report = runner(addr, actions, Duration::from_secs(2), direct_pki())
        .run()
        .await;
    assert_eq!(report.status, ClientStatus::Succeeded);
}

#[tokio::test]
async fn expect_mismatch_fails() {
    let received = Arc::new(AtomicUsize::new(0));
    let addr = spawn_line_server(Arc::clone(&received)).await;
    let actions = vec![
        ActionCommand::Send { payload: "double".to_owned() },
        ActionCommand::Expect { payload: "BONUS".to_owned() },
        ActionCommand::Send { payload: "never".to_owned() },
    ];
    let report = runner(addr, actions, Duration::from_secs(2), direct_pki())
        .run()
        .await;
    assert_eq!(report.status, ClientStatus::Failed);
    assert_eq!(report.failed_action, Some(1));
    assert_eq!(received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn abort_signal_stops_before_next_action() {
    let received = Arc::new(AtomicUsize::new(0));
    let addr = spawn_line_server(Arc::clone(&received)).await;
    let (abort_tx, abort_rx) = abort_channel();
    abort_tx.send(crate::shutdown::AbortReason::HeartbeatLost).unwrap();

    let actions = vec![ActionCommand::Send { payload: "hello".to_owned() }];
    let report = ClientRunner::new(
        0,
        addr,
        actions,
        Duration::from_secs(2),
        TimeoutPolicy::PerAction,
        direct_pki(),
        abort_rx,
    )
    .run()
    .await;
    assert_eq!(report.status, ClientStatus::Failed);
    assert_eq!(report.failed_action, Some(0));
    assert!(report.reason.unwrap().contains("heartbeat lost"));
    assert_eq!(received.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn publish_key_conflict_fails_the_action() {
    let received = Arc::new(AtomicUsize::new(0));
    let addr = spawn_line_server(Arc::clone(&received)).await;
    let store = Arc::new(PkiStore::new());
    store.set("alice", "pk-1").unwrap();
    let pki: Arc<dyn PkiConnection> = Arc::new(DirectPkiConnection::new(store));

    let actions = vec![ActionCommand::PublishKey {
        key: "alice".to_owned(),
        value: "pk-2".to_owned(),
    }];
    let report = runner(addr, actions, Duration::from_secs(2), pki)
        .run()
        .await;
    assert_eq!(report.status, ClientStatus::Failed);
    assert!(report.reason.unwrap().contains("already set"));
}

#[tokio::test]
async fn per_script_policy_bounds_the_whole_subsequence() {
    let received = Arc::new(AtomicUsize::new(0));
    let addr = spawn_line_server(Arc::clone(&received)).await;
    let (_abort_tx, abort_rx) = abort_channel();
    let actions = vec![
        ActionCommand::Send { payload: "stall".to_owned() },
        ActionCommand::Send { payload: "never".to_owned() },
    ];
    let started = tokio::time::Instant::now();
    let report = ClientRunner::new(
        0,
        addr,
        actions,
        Duration::from_millis(150),
        TimeoutPolicy::PerScript,
        direct_pki(),
        abort_rx,
    )
    .run()
    .await;
    assert_eq!(report.status, ClientStatus::Failed);
    assert!(started.elapsed() < Duration::from_secs(1));
}
