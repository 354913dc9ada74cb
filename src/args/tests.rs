use std::time::Duration;

use clap::Parser;

use super::parsers::parse_duration_arg;
use super::*;
use crate::script::ActionKind;

#[test]
fn defaults_match_the_documented_knobs() {
    let args = OrchestratorArgs::try_parse_from(["protodrill"]).unwrap();
    let limits = args.limits();
    assert_eq!(limits.max_client_workers, 8);
    assert_eq!(limits.max_clients_per_user, 10);
    assert_eq!(limits.max_actions, 100);
    assert_eq!(limits.action_timeout, Duration::from_secs(10));
    assert_eq!(limits.server_script_response_timeout, Duration::from_secs(5));
    assert_eq!(limits.heartbeat_timeout, Duration::from_secs(3));
    assert_eq!(limits.run_timeout, None);
    assert_eq!(args.orchestrator_addr(), "127.0.0.1:7077");
    assert_eq!(args.webapp_addr(), "127.0.0.1:5000");
}

#[test]
fn target_shortcut_parses_host_and_port() {
    let args = OrchestratorArgs::try_parse_from(["protodrill", "--target", "10.0.0.5:2525"])
        .unwrap();
    let endpoint = args.target.unwrap();
    assert_eq!(endpoint.host, "10.0.0.5");
    assert_eq!(endpoint.port, 2525);
}

#[test]
fn bad_endpoint_is_rejected() {
    assert!(OrchestratorArgs::try_parse_from(["protodrill", "--target", "no-port"]).is_err());
    assert!(OrchestratorArgs::try_parse_from(["protodrill", "--target", ":2525"]).is_err());
    assert!(OrchestratorArgs::try_parse_from(["protodrill", "--target", "h:notaport"]).is_err());
}

#[test]
fn allowed_actions_are_repeatable() {
    let args = OrchestratorArgs::try_parse_from([
        "protodrill",
        "--allow",
        "send",
        "--allow",
        "publish-key",
    ])
    .unwrap();
    assert_eq!(
        args.allowed_actions,
        vec![ActionKind::Send, ActionKind::PublishKey]
    );
}

#[test]
fn duration_arg_supports_units_and_rejects_zero() {
    assert_eq!(parse_duration_arg("500ms").unwrap(), Duration::from_millis(500));
    assert_eq!(parse_duration_arg("2m").unwrap(), Duration::from_secs(120));
    assert_eq!(parse_duration_arg("15").unwrap(), Duration::from_secs(15));
    assert!(parse_duration_arg("0s").is_err());
    assert!(parse_duration_arg("5 parsecs").is_err());
}

#[test]
fn zero_ceilings_are_rejected() {
    assert!(OrchestratorArgs::try_parse_from(["protodrill", "--max-actions", "0"]).is_err());
    assert!(OrchestratorArgs::try_parse_from(["protodrill", "--clients", "0"]).is_err());
}
