use std::time::Duration;

use serde::Deserialize;

use crate::args::OutputFormat;
use crate::error::{AppError, AppResult, ValidationError};
use crate::runner::TimeoutPolicy;
use crate::script::{ActionKind, ClientAction};

/// One exercise definition loaded from `protodrill.toml` / `.json`.
#[derive(Debug, Default, Deserialize)]
pub struct ExerciseFile {
    /// Target endpoint as `host:port` (alternative to `target_host`/`target_port`).
    pub target: Option<String>,
    pub target_host: Option<String>,
    pub target_port: Option<u16>,
    pub clients: Option<usize>,
    pub flag: Option<String>,
    pub owner: Option<String>,
    pub action_timeout: Option<DurationValue>,
    pub timeout_policy: Option<TimeoutPolicy>,
    pub server_script_response_timeout: Option<DurationValue>,
    pub heartbeat_timeout: Option<DurationValue>,
    pub run_timeout: Option<DurationValue>,
    pub max_client_workers: Option<usize>,
    pub max_clients_per_user: Option<usize>,
    pub max_actions: Option<usize>,
    pub allowed_actions: Option<Vec<ActionKind>>,
    pub require_server_script: Option<bool>,
    pub output: Option<OutputFormat>,
    /// Ordered action script; `[[actions]]` tables in TOML.
    pub actions: Option<Vec<ClientAction>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> AppResult<Duration> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(AppError::validation(ValidationError::DurationZero))
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => crate::args::parsers::parse_duration_arg(text),
        }
    }
}
