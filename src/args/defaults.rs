pub(crate) const DEFAULT_ORCHESTRATOR_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_ORCHESTRATOR_PORT: &str = "7077";
pub(crate) const DEFAULT_WEBAPP_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_WEBAPP_PORT: &str = "5000";

pub(crate) const DEFAULT_ACTION_TIMEOUT: &str = "10s";
pub(crate) const DEFAULT_SERVER_SCRIPT_RESPONSE_TIMEOUT: &str = "5s";
pub(crate) const DEFAULT_HEARTBEAT_TIMEOUT: &str = "3s";
pub(crate) const DEFAULT_MAX_CLIENT_WORKERS: &str = "8";
pub(crate) const DEFAULT_MAX_CLIENTS_PER_USER: &str = "10";
pub(crate) const DEFAULT_MAX_ACTIONS: &str = "100";
