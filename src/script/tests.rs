use std::collections::HashSet;

use super::*;

fn send(client_index: usize, payload: &str) -> ClientAction {
    ClientAction {
        client_index,
        command: ActionCommand::Send {
            payload: payload.to_owned(),
        },
    }
}

#[test]
fn partition_preserves_per_client_order() {
    let script = vec![
        send(0, "a"),
        send(1, "x"),
        send(0, "b"),
        send(2, "m"),
        send(0, "c"),
        send(1, "y"),
    ];
    let partitions = partition_by_client(&script, 3);
    assert_eq!(
        partitions[0],
        vec![
            ActionCommand::Send { payload: "a".to_owned() },
            ActionCommand::Send { payload: "b".to_owned() },
            ActionCommand::Send { payload: "c".to_owned() },
        ]
    );
    assert_eq!(partitions[1].len(), 2);
    assert_eq!(partitions[2].len(), 1);
}

#[test]
fn partition_yields_empty_subsequence_for_idle_client() {
    let script = vec![send(0, "a")];
    let partitions = partition_by_client(&script, 2);
    assert!(partitions[1].is_empty());
}

#[test]
fn client_index_out_of_range_is_rejected() {
    let script = vec![send(3, "a")];
    let err = ensure_client_indices(&script, 2).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::ClientIndexOutOfRange {
            client_index: 3,
            client_count: 2,
        }
    ));
}

#[test]
fn disallowed_action_is_rejected() {
    let script = vec![ClientAction {
        client_index: 0,
        command: ActionCommand::PublishKey {
            key: "k".to_owned(),
            value: "v".to_owned(),
        },
    }];
    let allowed: HashSet<ActionKind> = [ActionKind::Send, ActionKind::Expect].into();
    let err = ensure_allowed(&script, &allowed).unwrap_err();
    assert!(matches!(
        err,
        OrchestrateError::ActionNotAllowed {
            kind: ActionKind::PublishKey,
        }
    ));
}

#[test]
fn action_command_deserializes_from_tagged_toml() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        actions: Vec<ClientAction>,
    }
    let raw = r#"
        [[actions]]
        client = 0
        command = "send"
        payload = "LOGIN alice"

        [[actions]]
        client = 1
        command = "publish_key"
        key = "alice"
        value = "pk-1"
    "#;
    let parsed: Wrapper = toml::from_str(raw).unwrap();
    assert_eq!(parsed.actions[0].client_index, 0);
    assert_eq!(parsed.actions[0].command.kind(), ActionKind::Send);
    assert_eq!(parsed.actions[1].command.kind(), ActionKind::PublishKey);
}

#[test]
fn action_kind_parses_aliases() {
    assert_eq!(
        "publish_key".parse::<ActionKind>().unwrap(),
        ActionKind::PublishKey
    );
    assert_eq!(
        " Fetch-Key ".parse::<ActionKind>().unwrap(),
        ActionKind::FetchKey
    );
    assert!("steal-key".parse::<ActionKind>().is_err());
}
