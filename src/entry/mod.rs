//! CLI dispatch: argument parsing, logging setup, runtime construction,
//! and the one-shot / serve execution paths.
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::Path;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tokio::net::TcpListener;
use tracing::info;

use crate::args::{Command, OrchestratorArgs, OutputFormat};
use crate::bridge::{SessionRegistry, run_bridge_listener, run_pki_http_listener};
use crate::error::{AppError, AppResult, BridgeError, ValidationError};
use crate::orchestrate::{ExecutionReport, ExecutionRequest, Orchestrator};
use crate::script::ClientAction;

/// Default exercise filenames checked when no CLI args are provided.
const DEFAULT_CONFIG_FILES: [&str; 2] = ["protodrill.toml", "protodrill.json"];

/// Binary entry point: parses arguments, initializes logging, builds the
/// runtime, and dispatches the selected mode.
///
/// # Errors
///
/// Returns an error when argument parsing, listener binding, or the
/// execution itself fails.
pub fn run() -> AppResult<()> {
    let (args, matches) = match parse_args()? {
        Some(parsed) => parsed,
        None => return Ok(()),
    };

    crate::logger::init_logging(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(args, &matches))
}

fn parse_args() -> AppResult<Option<(OrchestratorArgs, ArgMatches)>> {
    let mut cmd = OrchestratorArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    let args = OrchestratorArgs::from_arg_matches(&matches)?;

    Ok(Some((args, matches)))
}

fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    if !treat_as_empty {
        return false;
    }

    !has_default_config()
}

fn has_default_config() -> bool {
    DEFAULT_CONFIG_FILES
        .iter()
        .any(|path| Path::new(path).exists())
}

async fn run_async(mut args: OrchestratorArgs, matches: &ArgMatches) -> AppResult<()> {
    let mut script: Option<Vec<ClientAction>> = None;
    let mut loaded = crate::config::load_exercise(args.config.as_deref())?;
    if let Some(config) = loaded.as_mut() {
        script = config.actions.take();
        crate::config::apply_config(&mut args, matches, config)?;
    }

    match args.command.take() {
        Some(Command::Serve) => run_serve(&args).await,
        None => run_once(args, script).await,
    }
}

async fn bind(addr: &str) -> AppResult<TcpListener> {
    TcpListener::bind(addr).await.map_err(|err| {
        AppError::bridge(BridgeError::Bind {
            addr: addr.to_owned(),
            source: err,
        })
    })
}

/// Long-lived mode: only the bridge and PKI HTTP listeners run; sessions
/// are registered by executions admitted elsewhere against the shared
/// registry.
async fn run_serve(args: &OrchestratorArgs) -> AppResult<()> {
    let registry = SessionRegistry::new();
    let bridge_listener = bind(&args.orchestrator_addr()).await?;
    let http_listener = bind(&args.webapp_addr()).await?;
    info!(
        "Serving bridge on {} and PKI HTTP on {}",
        args.orchestrator_addr(),
        args.webapp_addr()
    );

    let response_timeout = args.server_script_response_timeout;
    tokio::select! {
        () = run_bridge_listener(bridge_listener, registry.clone(), response_timeout) => {}
        () = run_pki_http_listener(http_listener, registry, response_timeout) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down");
        }
    }
    Ok(())
}

/// One-shot mode: the listeners run for the lifetime of a single
/// execution driven by the exercise file and CLI.
async fn run_once(args: OrchestratorArgs, script: Option<Vec<ClientAction>>) -> AppResult<()> {
    let request = build_request(&args, script)?;

    let registry = SessionRegistry::new();
    let orchestrator = Orchestrator::new(args.limits(), registry.clone());

    let bridge_listener = bind(&args.orchestrator_addr()).await?;
    let http_listener = bind(&args.webapp_addr()).await?;
    let response_timeout = args.server_script_response_timeout;
    let bridge_task = tokio::spawn(run_bridge_listener(
        bridge_listener,
        registry.clone(),
        response_timeout,
    ));
    let http_task = tokio::spawn(run_pki_http_listener(
        http_listener,
        registry,
        response_timeout,
    ));

    let report = orchestrator.start_execution(request, None).await?;
    bridge_task.abort();
    http_task.abort();

    print_report(&report, args.output)
}

fn build_request(
    args: &OrchestratorArgs,
    script: Option<Vec<ClientAction>>,
) -> AppResult<ExecutionRequest> {
    let script = script.ok_or_else(|| AppError::validation(ValidationError::MissingScript))?;

    let (target_host, target_port) = match (&args.target, &args.target_host, args.target_port) {
        (Some(endpoint), _, _) => (endpoint.host.clone(), endpoint.port),
        (None, Some(host), Some(port)) => (host.clone(), port),
        _ => return Err(AppError::validation(ValidationError::MissingTarget)),
    };
    let flag = args
        .flag
        .clone()
        .ok_or_else(|| AppError::validation(ValidationError::MissingFlag))?;

    // When unset, the client count is inferred from the script.
    let client_count = match args.clients {
        Some(clients) => clients.get(),
        None => script
            .iter()
            .map(|action| action.client_index)
            .max()
            .map_or(0, |highest| highest + 1),
    };

    let allowed_actions = if args.allowed_actions.is_empty() {
        None
    } else {
        Some(args.allowed_actions.iter().copied().collect::<HashSet<_>>())
    };

    Ok(ExecutionRequest {
        owner_user_id: args.owner.clone(),
        target_host,
        target_port,
        client_count,
        script,
        flag,
        allowed_actions,
        timeout_policy: args.timeout_policy,
        require_server_script: args.require_server_script,
        pki_base_url: args.webapp_url.clone(),
        session_token: args.session_token.clone(),
    })
}

fn print_report(report: &ExecutionReport, output: OutputFormat) -> AppResult<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            println!("Execution {}: {}", report.execution_id, report.status);
            for client in &report.clients {
                match (&client.failed_action, &client.reason) {
                    (Some(action_index), Some(reason)) => println!(
                        "  client {}: {} at action {}: {}",
                        client.client_index, client.status, action_index, reason
                    ),
                    _ => println!("  client {}: {}", client.client_index, client.status),
                }
            }
            if let Some(aborted) = &report.aborted {
                println!("Aborted: {}", aborted);
            }
            if let Some(flag) = &report.flag {
                println!("Flag: {}", flag);
            }
        }
    }
    Ok(())
}
