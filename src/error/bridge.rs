use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Unknown or terminated session '{server_id}'.")]
    SessionNotFound { server_id: String },
    #[error("Timed out waiting for a reply to a forwarded request.")]
    ResponseTimeout,
    #[error("I/O error during {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Connection closed.")]
    ConnectionClosed,
    #[error("Wire message exceeded max size ({max_bytes} bytes).")]
    MessageTooLarge { max_bytes: usize },
    #[error("Wire message was not valid UTF-8: {source}")]
    MessageInvalidUtf8 {
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("Serialization error during {context}: {source}")]
    Serialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Deserialization error during {context}: {source}")]
    Deserialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Remote error: {message}")]
    Remote { message: String },
}
