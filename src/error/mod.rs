mod app;
mod bridge;
mod config;
mod orchestrate;
mod pki;
mod validation;

pub use app::{AppError, AppResult};
pub use bridge::BridgeError;
pub use config::ConfigError;
pub use orchestrate::{LimitKind, OrchestrateError};
pub use pki::PkiError;
pub use validation::ValidationError;
