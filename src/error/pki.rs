use thiserror::Error;

#[derive(Debug, Error)]
pub enum PkiError {
    #[error("PKI entry '{key}' not found.")]
    NotFound { key: String },
    #[error("PKI entry '{key}' is already set.")]
    AlreadySet { key: String },
    #[error("PKI endpoint returned unexpected status {status} for '{key}'.")]
    UnexpectedStatus { key: String, status: u16 },
}
