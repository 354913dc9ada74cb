//! Drives one simulated client through its action sub-sequence.
//!
//! Actions run strictly in script order. The first failing action (target
//! rejection, connection loss, timeout, or PKI conflict) moves the runner
//! to `Failed` and the rest of the sub-sequence is never executed.
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, OrchestrateError};
use crate::pki::PkiConnection;
use crate::script::ActionCommand;
use crate::shutdown::{AbortReason, AbortReceiver};

#[cfg(test)]
mod tests;

/// Whether the configured action timeout bounds each action or the whole
/// sub-sequence of one client.
#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutPolicy {
    #[default]
    PerAction,
    PerScript,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl ClientStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ClientStatus::Pending => "pending",
            ClientStatus::Running => "running",
            ClientStatus::Succeeded => "succeeded",
            ClientStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal report of one client runner.
#[derive(Debug, Clone, Serialize)]
pub struct ClientReport {
    pub client_index: usize,
    pub status: ClientStatus,
    pub failed_action: Option<usize>,
    pub reason: Option<String>,
}

impl ClientReport {
    fn succeeded(client_index: usize) -> Self {
        Self {
            client_index,
            status: ClientStatus::Succeeded,
            failed_action: None,
            reason: None,
        }
    }

    fn failed(client_index: usize, action_index: usize, reason: String) -> Self {
        Self {
            client_index,
            status: ClientStatus::Failed,
            failed_action: Some(action_index),
            reason: Some(reason),
        }
    }
}

pub struct ClientRunner {
    client_index: usize,
    target_addr: String,
    actions: Vec<ActionCommand>,
    action_timeout: Duration,
    policy: TimeoutPolicy,
    pki: Arc<dyn PkiConnection>,
    abort_rx: AbortReceiver,
}

impl ClientRunner {
    #[must_use]
    pub fn new(
        client_index: usize,
        target_addr: String,
        actions: Vec<ActionCommand>,
        action_timeout: Duration,
        policy: TimeoutPolicy,
        pki: Arc<dyn PkiConnection>,
        abort_rx: AbortReceiver,
    ) -> Self {
        Self {
            client_index,
            target_addr,
            actions,
            action_timeout,
            policy,
            pki,
            abort_rx,
        }
    }

    pub async fn run(mut self) -> ClientReport {
        debug!(
            "Client {} running {} actions against {}",
            self.client_index,
            self.actions.len(),
            self.target_addr
        );
        let script_deadline = Instant::now() + self.action_timeout;
        let mut connection: Option<Connection> = None;

        for (action_index, action) in self.actions.iter().enumerate() {
            if let Some(reason) = poll_abort(&mut self.abort_rx) {
                return ClientReport::failed(
                    self.client_index,
                    action_index,
                    format!("Execution aborted: {}", reason.as_str()),
                );
            }

            let budget = match self.policy {
                TimeoutPolicy::PerAction => self.action_timeout,
                TimeoutPolicy::PerScript => {
                    script_deadline.saturating_duration_since(Instant::now())
                }
            };
            if budget.is_zero() {
                return ClientReport::failed(
                    self.client_index,
                    action_index,
                    AppError::orchestrate(OrchestrateError::ActionTimeout {
                        timeout_secs: self.action_timeout.as_secs(),
                    })
                    .to_string(),
                );
            }

            let result = tokio::select! {
                reason = self.abort_rx.recv() => {
                    let reason = reason.map_or("cancelled", AbortReason::as_str);
                    Err(format!("Execution aborted: {}", reason))
                }
                timed = tokio::time::timeout(
                    budget,
                    execute_action(&mut connection, &self.target_addr, action, self.pki.as_ref()),
                ) => match timed {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(_elapsed) => Err(AppError::orchestrate(OrchestrateError::ActionTimeout {
                        timeout_secs: budget.as_secs(),
                    })
                    .to_string()),
                },
            };

            if let Err(reason) = result {
                info!(
                    "Client {} failed at action {}: {}",
                    self.client_index, action_index, reason
                );
                return ClientReport::failed(self.client_index, action_index, reason);
            }
        }

        debug!("Client {} finished its script", self.client_index);
        ClientReport::succeeded(self.client_index)
    }
}

fn poll_abort(abort_rx: &mut AbortReceiver) -> Option<AbortReason> {
    use tokio::sync::broadcast::error::TryRecvError;
    match abort_rx.try_recv() {
        Ok(reason) => Some(reason),
        Err(TryRecvError::Lagged(_)) => Some(AbortReason::Cancelled),
        Err(TryRecvError::Empty | TryRecvError::Closed) => None,
    }
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(target_addr: &str) -> Result<Self, OrchestrateError> {
        let stream = TcpStream::connect(target_addr).await.map_err(|err| {
            OrchestrateError::Connection {
                addr: target_addr.to_owned(),
                source: err,
            }
        })?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    async fn send_line(&mut self, payload: &str) -> Result<(), OrchestrateError> {
        let mut line = payload.to_owned();
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|_err| OrchestrateError::TargetClosed)
    }

    async fn read_line(&mut self) -> Result<String, OrchestrateError> {
        let mut line = String::new();
        let bytes = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|_err| OrchestrateError::TargetClosed)?;
        if bytes == 0 {
            return Err(OrchestrateError::TargetClosed);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

async fn ensure_connection<'conn>(
    connection: &'conn mut Option<Connection>,
    target_addr: &str,
) -> Result<&'conn mut Connection, OrchestrateError> {
    if connection.is_none() {
        *connection = Some(Connection::open(target_addr).await?);
    }
    connection
        .as_mut()
        .ok_or(OrchestrateError::TargetClosed)
}

async fn execute_action(
    connection: &mut Option<Connection>,
    target_addr: &str,
    action: &ActionCommand,
    pki: &dyn PkiConnection,
) -> AppResult<()> {
    match action {
        ActionCommand::Connect => {
            *connection = Some(Connection::open(target_addr).await?);
            Ok(())
        }
        ActionCommand::Disconnect => {
            connection.take();
            Ok(())
        }
        ActionCommand::Send { payload } => {
            let conn = ensure_connection(connection, target_addr).await?;
            conn.send_line(payload).await?;
            let reply = conn.read_line().await?;
            if reply.starts_with("ERR") {
                return Err(AppError::orchestrate(OrchestrateError::TargetRejected {
                    reply,
                }));
            }
            Ok(())
        }
        ActionCommand::Expect { payload } => {
            let conn = ensure_connection(connection, target_addr).await?;
            let reply = conn.read_line().await?;
            if reply != *payload {
                return Err(AppError::orchestrate(OrchestrateError::UnexpectedReply {
                    expected: payload.clone(),
                    actual: reply,
                }));
            }
            Ok(())
        }
        ActionCommand::PublishKey { key, value } => pki.set(key, value).await,
        ActionCommand::FetchKey { key } => pki.get(key).await.map(|_value| ()),
    }
}
