use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::runner::{ClientReport, TimeoutPolicy};
use crate::script::{ActionKind, ClientAction};

/// Immutable ceilings and timeouts collected once at startup and passed
/// into the orchestrator.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_client_workers: usize,
    pub max_clients_per_user: usize,
    pub max_actions: usize,
    pub action_timeout: Duration,
    pub server_script_response_timeout: Duration,
    pub heartbeat_timeout: Duration,
    pub run_timeout: Option<Duration>,
}

/// One orchestration request, validated at admission time.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub owner_user_id: String,
    pub target_host: String,
    pub target_port: u16,
    pub client_count: usize,
    pub script: Vec<ClientAction>,
    pub flag: String,
    /// When present, every scripted command must fall inside this set.
    pub allowed_actions: Option<HashSet<ActionKind>>,
    pub timeout_policy: TimeoutPolicy,
    /// Arms the heartbeat watchdog immediately, for exercises where an
    /// external server script session is required to stay alive.
    pub require_server_script: bool,
    /// When set, runners publish and fetch PKI keys through this remote
    /// PKI HTTP endpoint instead of the in-process store.
    pub pki_base_url: Option<String>,
    /// Pre-agreed bridge session token handed to the external server
    /// script; generated when absent.
    pub session_token: Option<String>,
}

impl ExecutionRequest {
    #[must_use]
    pub fn target_addr(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the first client failure, in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct FirstFailure {
    pub client_index: usize,
    pub action_index: Option<usize>,
    pub reason: String,
}

/// Terminal report of one execution. `flag` is revealed only on success.
#[derive(Debug, Serialize)]
pub struct ExecutionReport {
    pub execution_id: String,
    pub owner_user_id: String,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub clients: Vec<ClientReport>,
    pub first_failure: Option<FirstFailure>,
    /// Execution-level abort reason (heartbeat loss, run budget, cancel),
    /// absent when clients simply failed on their own.
    pub aborted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}
