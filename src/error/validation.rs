use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Duration is too large.")]
    DurationOverflow,
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid action '{value}'. Use connect, disconnect, send, expect, publish-key, or fetch-key.")]
    InvalidActionKind { value: String },
    #[error("Invalid endpoint '{value}'. Expected 'host:port'.")]
    InvalidEndpoint { value: String },
    #[error("Invalid port in '{value}': {source}")]
    InvalidEndpointPort {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Missing target (set --target-host/--target-port or provide in config).")]
    MissingTarget,
    #[error("Missing flag (set --flag or the FLAG environment variable).")]
    MissingFlag,
    #[error("Missing action script (provide [[actions]] in config).")]
    MissingScript,
    #[error("Action for client {client_index} is out of range (client count {client_count}).")]
    ClientIndexOutOfRange {
        client_index: usize,
        client_count: usize,
    },
}
