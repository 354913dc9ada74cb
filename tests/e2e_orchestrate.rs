
use std::time::Duration;

use tokio::net::TcpListener;

use protodrill::bridge::{SessionRegistry, client::BridgeClient, run_bridge_listener};
use protodrill::orchestrate::{ExecutionStatus, Orchestrator};
use protodrill::runner::ClientStatus;
use protodrill::script::{ActionCommand, ClientAction};

use support_orchestrate::{limits, request, spawn_line_server};

fn send(client_index: usize, payload: &str) -> ClientAction {
    ClientAction {
        client_index,
        command: ActionCommand::Send {
            payload: payload.to_owned(),
        },
    }
}

#[tokio::test]
async fn scripted_clients_run_to_success_and_the_report_serializes() {
    let port = spawn_line_server().await;
    let script = vec![
        send(0, "login alice"),
        send(1, "login bob"),
        send(0, "msg hi"),
        send(1, "msg yo"),
    ];
    let orchestrator = Orchestrator::new(limits(), SessionRegistry::new());
    let report = orchestrator
        .start_execution(request(port, 2, script), None)
        .await
        .unwrap();

    assert_eq!(report.status, ExecutionStatus::Succeeded);
    assert_eq!(report.flag.as_deref(), Some("FLAG{e2e}"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["clients"].as_array().unwrap().len(), 2);
    assert_eq!(json["flag"], "FLAG{e2e}");
}

#[tokio::test]
async fn stalled_target_times_out_the_action_and_fails_the_run() {
    let port = spawn_line_server().await;
    let mut tight = limits();
    tight.action_timeout = Duration::from_millis(300);
    let script = vec![send(0, "hello"), send(0, "stall"), send(0, "never")];

    let orchestrator = Orchestrator::new(tight, SessionRegistry::new());
    let report = orchestrator
        .start_execution(request(port, 1, script), None)
        .await
        .unwrap();

    assert_eq!(report.status, ExecutionStatus::Failed);
    assert_eq!(report.flag, None);
    let failure = report.first_failure.unwrap();
    assert_eq!(failure.client_index, 0);
    assert_eq!(failure.action_index, Some(1));
    assert!(failure.reason.contains("timed out"));
}

#[tokio::test]
async fn concurrent_publishers_of_one_key_produce_exactly_one_winner() {
    let port = spawn_line_server().await;
    let publish = |client_index| ClientAction {
        client_index,
        command: ActionCommand::PublishKey {
            key: "shared".to_owned(),
            value: format!("pk-{}", client_index),
        },
    };
    let script = vec![publish(0), publish(1)];

    let orchestrator = Orchestrator::new(limits(), SessionRegistry::new());
    let report = orchestrator
        .start_execution(request(port, 2, script), None)
        .await
        .unwrap();

    assert_eq!(report.status, ExecutionStatus::Failed);
    let failed: Vec<_> = report
        .clients
        .iter()
        .filter(|client| client.status == ClientStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reason.as_deref().unwrap().contains("already set"));
}

#[tokio::test]
async fn server_script_reads_a_client_published_key_over_the_bridge() {
    let target_port = spawn_line_server().await;

    let registry = SessionRegistry::new();
    let bridge_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge_addr = bridge_listener.local_addr().unwrap().to_string();
    tokio::spawn(run_bridge_listener(
        bridge_listener,
        registry.clone(),
        Duration::from_secs(2),
    ));

    let token = "sess-e2e";
    let mut req = request(
        target_port,
        1,
        vec![
            ClientAction {
                client_index: 0,
                command: ActionCommand::PublishKey {
                    key: "client-pub".to_owned(),
                    value: "pk-client".to_owned(),
                },
            },
            // Holds the execution open long enough for the server script
            // to observe the key before the session is torn down.
            send(0, "wait"),
        ],
    );
    req.session_token = Some(token.to_owned());

    let orchestrator = Orchestrator::new(limits(), registry);
    let execution = tokio::spawn(async move { orchestrator.start_execution(req, None).await });

    // Server script side: poll the bridge until the session exists and the
    // key has been published, heartbeating along the way.
    let value = tokio::time::timeout(Duration::from_secs(4), async {
        loop {
            let Ok(mut client) = BridgeClient::connect(&bridge_addr, token).await else {
                tokio::time::sleep(Duration::from_millis(20)).await;
                continue;
            };
            loop {
                match client.get_pki_entry("client-pub").await {
                    Ok(value) => return value,
                    Err(_not_yet) => {
                        if client.heartbeat().await.is_err() {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(value, "pk-client");

    let report = execution.await.unwrap().unwrap();
    assert_eq!(report.status, ExecutionStatus::Succeeded);
}
