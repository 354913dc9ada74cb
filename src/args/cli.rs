use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::orchestrate::Limits;
use crate::runner::TimeoutPolicy;
use crate::script::ActionKind;

use super::defaults::{
    DEFAULT_ACTION_TIMEOUT, DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_MAX_ACTIONS,
    DEFAULT_MAX_CLIENT_WORKERS, DEFAULT_MAX_CLIENTS_PER_USER, DEFAULT_ORCHESTRATOR_HOST,
    DEFAULT_ORCHESTRATOR_PORT, DEFAULT_SERVER_SCRIPT_RESPONSE_TIMEOUT, DEFAULT_WEBAPP_HOST,
    DEFAULT_WEBAPP_PORT,
};
use super::parsers::{parse_duration_arg, parse_endpoint, parse_positive_usize};
use super::types::{Endpoint, OutputFormat, PositiveUsize};

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the long-lived bridge and PKI HTTP listeners
    Serve,
}

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Orchestrator for scripted multi-client protocol exercises - bounded concurrent client runners, write-once PKI exchange, heartbeat-monitored bridge sessions."
)]
pub struct OrchestratorArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Target endpoint as host:port (shortcut for --target-host/--target-port)
    #[arg(long, short = 'T', value_parser = parse_endpoint)]
    pub target: Option<Endpoint>,

    /// Target service host
    #[arg(long = "target-host")]
    pub target_host: Option<String>,

    /// Target service port
    #[arg(long = "target-port")]
    pub target_port: Option<u16>,

    /// Number of simulated clients to spawn
    #[arg(long, short = 'c', value_parser = parse_positive_usize)]
    pub clients: Option<PositiveUsize>,

    /// Flag revealed when the execution succeeds
    #[arg(long, env = "FLAG")]
    pub flag: Option<String>,

    /// Owner identity counted against the per-user client ceiling
    #[arg(long, default_value = "local")]
    pub owner: String,

    /// Timeout budget per action (supports ms/s/m/h)
    #[arg(
        long = "action-timeout",
        env = "ACTION_TIMEOUT",
        default_value = DEFAULT_ACTION_TIMEOUT,
        value_parser = parse_duration_arg
    )]
    pub action_timeout: Duration,

    /// Whether the action timeout bounds each action or the whole script
    #[arg(long = "timeout-policy", default_value = "per-action", value_enum)]
    pub timeout_policy: TimeoutPolicy,

    /// Timeout for one forwarded server-script request (supports ms/s/m/h)
    #[arg(
        long = "server-script-response-timeout",
        env = "SERVER_SCRIPT_RESPONSE_TIMEOUT",
        default_value = DEFAULT_SERVER_SCRIPT_RESPONSE_TIMEOUT,
        value_parser = parse_duration_arg
    )]
    pub server_script_response_timeout: Duration,

    /// Heartbeat liveness window for bridge sessions (supports ms/s/m/h)
    #[arg(
        long = "heartbeat-timeout",
        env = "HEARTBEAT_TIMEOUT",
        default_value = DEFAULT_HEARTBEAT_TIMEOUT,
        value_parser = parse_duration_arg
    )]
    pub heartbeat_timeout: Duration,

    /// Overall budget for one execution (supports ms/s/m/h, optional)
    #[arg(long = "run-timeout", value_parser = parse_duration_arg)]
    pub run_timeout: Option<Duration>,

    /// Global ceiling on concurrently running client workers
    #[arg(
        long = "max-client-workers",
        env = "MAX_ORCHESTRATED_CLIENT_WORKERS",
        default_value = DEFAULT_MAX_CLIENT_WORKERS,
        value_parser = parse_positive_usize
    )]
    pub max_client_workers: PositiveUsize,

    /// Ceiling on concurrently running clients per owner
    #[arg(
        long = "max-clients-per-user",
        env = "MAX_ORCHESTRATED_CLIENTS_PER_USER",
        default_value = DEFAULT_MAX_CLIENTS_PER_USER,
        value_parser = parse_positive_usize
    )]
    pub max_clients_per_user: PositiveUsize,

    /// Ceiling on the number of actions in one script
    #[arg(
        long = "max-actions",
        env = "MAX_ACTIONS",
        default_value = DEFAULT_MAX_ACTIONS,
        value_parser = parse_positive_usize
    )]
    pub max_actions: PositiveUsize,

    /// Bridge (server-script) listen host
    #[arg(
        long = "orchestrator-host",
        env = "TCP_ORCHESTRATOR_HOST",
        default_value = DEFAULT_ORCHESTRATOR_HOST
    )]
    pub orchestrator_host: String,

    /// Bridge (server-script) listen port
    #[arg(
        long = "orchestrator-port",
        env = "TCP_ORCHESTRATOR_PORT",
        default_value = DEFAULT_ORCHESTRATOR_PORT
    )]
    pub orchestrator_port: u16,

    /// PKI HTTP API listen host
    #[arg(
        long = "webapp-host",
        env = "ORCHESTRATOR_WEBAPP_HOST",
        default_value = DEFAULT_WEBAPP_HOST
    )]
    pub webapp_host: String,

    /// PKI HTTP API listen port
    #[arg(
        long = "webapp-port",
        env = "ORCHESTRATOR_WEBAPP_PORT",
        default_value = DEFAULT_WEBAPP_PORT
    )]
    pub webapp_port: u16,

    /// Remote PKI HTTP base URL; when set, runners publish and fetch keys
    /// through it instead of the in-process store
    #[arg(long = "webapp-url", env = "ORCHESTRATOR_WEBAPP_URL")]
    pub webapp_url: Option<String>,

    /// Pre-agreed bridge session token handed to the external server
    /// script; generated when absent
    #[arg(long = "session-token")]
    pub session_token: Option<String>,

    /// Restrict scripts to these actions (repeatable; default: all allowed)
    #[arg(long = "allow", value_enum)]
    pub allowed_actions: Vec<ActionKind>,

    /// Abort the execution when the server-script session misses heartbeats
    #[arg(long = "require-server-script")]
    pub require_server_script: bool,

    /// Report output format
    #[arg(long, short = 'o', default_value = "text", value_enum)]
    pub output: OutputFormat,

    /// Path to exercise file (TOML/JSON). Defaults to ./protodrill.toml or
    /// ./protodrill.json if present.
    #[arg(long)]
    pub config: Option<String>,

    /// Enable verbose logging (debug level unless overridden by PROTODRILL_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl OrchestratorArgs {
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            max_client_workers: self.max_client_workers.get(),
            max_clients_per_user: self.max_clients_per_user.get(),
            max_actions: self.max_actions.get(),
            action_timeout: self.action_timeout,
            server_script_response_timeout: self.server_script_response_timeout,
            heartbeat_timeout: self.heartbeat_timeout,
            run_timeout: self.run_timeout,
        }
    }

    #[must_use]
    pub fn orchestrator_addr(&self) -> String {
        format!("{}:{}", self.orchestrator_host, self.orchestrator_port)
    }

    #[must_use]
    pub fn webapp_addr(&self) -> String {
        format!("{}:{}", self.webapp_host, self.webapp_port)
    }
}
