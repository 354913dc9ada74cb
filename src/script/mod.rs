//! Action script model: a closed command vocabulary, per-client ordering,
//! and admission-time filtering against an allowed set.
use std::collections::HashSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, OrchestrateError, ValidationError};

#[cfg(test)]
mod tests;

/// Discriminant of an [`ActionCommand`], used for allowed-action filtering.
#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Connect,
    Disconnect,
    Send,
    Expect,
    PublishKey,
    FetchKey,
}

impl ActionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ActionKind::Connect => "connect",
            ActionKind::Disconnect => "disconnect",
            ActionKind::Send => "send",
            ActionKind::Expect => "expect",
            ActionKind::PublishKey => "publish-key",
            ActionKind::FetchKey => "fetch-key",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "connect" => Ok(ActionKind::Connect),
            "disconnect" => Ok(ActionKind::Disconnect),
            "send" => Ok(ActionKind::Send),
            "expect" => Ok(ActionKind::Expect),
            "publish-key" | "publish_key" => Ok(ActionKind::PublishKey),
            "fetch-key" | "fetch_key" => Ok(ActionKind::FetchKey),
            _ => Err(AppError::validation(ValidationError::InvalidActionKind {
                value: s.to_owned(),
            })),
        }
    }
}

/// One scripted command, resolved to a closed variant at load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ActionCommand {
    /// Open a fresh connection to the target, replacing any existing one.
    Connect,
    /// Close the current connection, if any.
    Disconnect,
    /// Write `payload` as one line and await one reply line.
    Send { payload: String },
    /// Await one line from the target and compare it against `payload`.
    Expect { payload: String },
    /// Publish a key into the execution's write-once PKI store.
    PublishKey { key: String, value: String },
    /// Read a previously published key from the PKI store.
    FetchKey { key: String },
}

impl ActionCommand {
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            ActionCommand::Connect => ActionKind::Connect,
            ActionCommand::Disconnect => ActionKind::Disconnect,
            ActionCommand::Send { .. } => ActionKind::Send,
            ActionCommand::Expect { .. } => ActionKind::Expect,
            ActionCommand::PublishKey { .. } => ActionKind::PublishKey,
            ActionCommand::FetchKey { .. } => ActionKind::FetchKey,
        }
    }
}

/// One scripted command targeted at a specific simulated client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientAction {
    #[serde(alias = "client")]
    pub client_index: usize,
    #[serde(flatten)]
    pub command: ActionCommand,
}

/// Splits a script into per-client sub-sequences, preserving script order
/// within each client.
#[must_use]
pub fn partition_by_client(script: &[ClientAction], client_count: usize) -> Vec<Vec<ActionCommand>> {
    let mut partitions: Vec<Vec<ActionCommand>> = vec![Vec::new(); client_count];
    for action in script {
        if let Some(partition) = partitions.get_mut(action.client_index) {
            partition.push(action.command.clone());
        }
    }
    partitions
}

/// Rejects any action whose client index does not fit the client count.
pub fn ensure_client_indices(
    script: &[ClientAction],
    client_count: usize,
) -> Result<(), ValidationError> {
    for action in script {
        if action.client_index >= client_count {
            return Err(ValidationError::ClientIndexOutOfRange {
                client_index: action.client_index,
                client_count,
            });
        }
    }
    Ok(())
}

/// Rejects any action outside the allowed vocabulary for this exercise.
pub fn ensure_allowed(
    script: &[ClientAction],
    allowed: &HashSet<ActionKind>,
) -> Result<(), OrchestrateError> {
    for action in script {
        let kind = action.command.kind();
        if !allowed.contains(&kind) {
            return Err(OrchestrateError::ActionNotAllowed { kind });
        }
    }
    Ok(())
}
