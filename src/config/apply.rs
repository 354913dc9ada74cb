use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{Endpoint, OrchestratorArgs, PositiveUsize};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ExerciseFile;

/// Applies exercise-file values to CLI arguments. Values given explicitly
/// on the command line or through their environment variable win.
///
/// # Errors
///
/// Returns an error when config values are invalid.
pub fn apply_config(
    args: &mut OrchestratorArgs,
    matches: &ArgMatches,
    config: &ExerciseFile,
) -> AppResult<()> {
    if !is_explicit(matches, "target")
        && let Some(target) = config.target.as_deref()
    {
        args.target = Some(target.parse::<Endpoint>().map_err(AppError::validation)?);
    }

    if !is_explicit(matches, "target_host")
        && let Some(host) = config.target_host.clone()
    {
        args.target_host = Some(host);
    }

    if !is_explicit(matches, "target_port")
        && let Some(port) = config.target_port
    {
        args.target_port = Some(port);
    }

    if !is_explicit(matches, "clients")
        && let Some(clients) = config.clients
    {
        args.clients = Some(ensure_positive(clients, "clients")?);
    }

    if !is_explicit(matches, "flag")
        && let Some(flag) = config.flag.clone()
    {
        args.flag = Some(flag);
    }

    if !is_explicit(matches, "owner")
        && let Some(owner) = config.owner.clone()
    {
        args.owner = owner;
    }

    if !is_explicit(matches, "action_timeout")
        && let Some(timeout) = config.action_timeout.as_ref()
    {
        args.action_timeout = timeout.to_duration()?;
    }

    if !is_explicit(matches, "timeout_policy")
        && let Some(policy) = config.timeout_policy
    {
        args.timeout_policy = policy;
    }

    if !is_explicit(matches, "server_script_response_timeout")
        && let Some(timeout) = config.server_script_response_timeout.as_ref()
    {
        args.server_script_response_timeout = timeout.to_duration()?;
    }

    if !is_explicit(matches, "heartbeat_timeout")
        && let Some(timeout) = config.heartbeat_timeout.as_ref()
    {
        args.heartbeat_timeout = timeout.to_duration()?;
    }

    if !is_explicit(matches, "run_timeout")
        && let Some(timeout) = config.run_timeout.as_ref()
    {
        args.run_timeout = Some(timeout.to_duration()?);
    }

    if !is_explicit(matches, "max_client_workers")
        && let Some(workers) = config.max_client_workers
    {
        args.max_client_workers = ensure_positive(workers, "max_client_workers")?;
    }

    if !is_explicit(matches, "max_clients_per_user")
        && let Some(clients) = config.max_clients_per_user
    {
        args.max_clients_per_user = ensure_positive(clients, "max_clients_per_user")?;
    }

    if !is_explicit(matches, "max_actions")
        && let Some(actions) = config.max_actions
    {
        args.max_actions = ensure_positive(actions, "max_actions")?;
    }

    if !is_explicit(matches, "allowed_actions")
        && let Some(allowed) = config.allowed_actions.clone()
    {
        args.allowed_actions = allowed;
    }

    if !is_explicit(matches, "require_server_script")
        && let Some(required) = config.require_server_script
    {
        args.require_server_script = required;
    }

    if !is_explicit(matches, "output")
        && let Some(output) = config.output
    {
        args.output = output;
    }

    Ok(())
}

fn is_explicit(matches: &ArgMatches, id: &str) -> bool {
    matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

fn ensure_positive(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}
