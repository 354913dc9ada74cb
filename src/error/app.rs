use thiserror::Error;

use super::{BridgeError, ConfigError, OrchestrateError, PkiError, ValidationError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("CLI error: {source}")]
    Clap {
        #[from]
        source: clap::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
    #[error("HTTP client error: {source}")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("PKI error: {0}")]
    Pki(#[from] PkiError),
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
    #[error("Orchestration error: {0}")]
    Orchestrate(#[from] OrchestrateError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation<E>(error: E) -> Self
    where
        E: Into<ValidationError>,
    {
        error.into().into()
    }

    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn pki<E>(error: E) -> Self
    where
        E: Into<PkiError>,
    {
        error.into().into()
    }

    pub fn bridge<E>(error: E) -> Self
    where
        E: Into<BridgeError>,
    {
        error.into().into()
    }

    pub fn orchestrate<E>(error: E) -> Self
    where
        E: Into<OrchestrateError>,
    {
        error.into().into()
    }
}
