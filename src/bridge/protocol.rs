//! JSON-lines wire protocol between external server-script sessions and
//! the orchestrator.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use crate::error::{AppError, AppResult, BridgeError};

const MAX_MESSAGE_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireRequest {
    GetPkiEntry { server_id: String, key: String },
    SetPkiEntry {
        server_id: String,
        key: String,
        value: String,
    },
    Heartbeat { server_id: String },
}

impl WireRequest {
    #[must_use]
    pub fn server_id(&self) -> &str {
        match self {
            WireRequest::GetPkiEntry { server_id, .. }
            | WireRequest::SetPkiEntry { server_id, .. }
            | WireRequest::Heartbeat { server_id } => server_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireResponse {
    PkiValue { value: String },
    Ok,
    Error { message: String },
}

pub async fn read_message<TMessage>(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
) -> AppResult<TMessage>
where
    TMessage: DeserializeOwned,
{
    let mut buffer: Vec<u8> = Vec::with_capacity(256);
    // The reader is capped so a newline-free stream cannot grow the
    // buffer past the message limit.
    let limit = u64::try_from(MAX_MESSAGE_BYTES).map_or(u64::MAX, |max| max.saturating_add(1));
    let bytes = (&mut *reader)
        .take(limit)
        .read_until(b'\n', &mut buffer)
        .await
        .map_err(|err| {
            AppError::bridge(BridgeError::Io {
                context: "read wire message",
                source: err,
            })
        })?;
    if bytes == 0 {
        return Err(AppError::bridge(BridgeError::ConnectionClosed));
    }
    if buffer.len() > MAX_MESSAGE_BYTES {
        return Err(AppError::bridge(BridgeError::MessageTooLarge {
            max_bytes: MAX_MESSAGE_BYTES,
        }));
    }
    if buffer.ends_with(b"\n") {
        buffer.pop();
        if buffer.ends_with(b"\r") {
            buffer.pop();
        }
    }
    let line = std::str::from_utf8(&buffer)
        .map_err(|err| AppError::bridge(BridgeError::MessageInvalidUtf8 { source: err }))?;
    serde_json::from_str::<TMessage>(line).map_err(|err| {
        AppError::bridge(BridgeError::Deserialize {
            context: "wire message",
            source: err,
        })
    })
}

pub async fn send_message<TMessage>(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    message: &TMessage,
) -> AppResult<()>
where
    TMessage: Serialize,
{
    let mut payload = serde_json::to_string(message).map_err(|err| {
        AppError::bridge(BridgeError::Serialize {
            context: "wire message",
            source: err,
        })
    })?;
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await.map_err(|err| {
        AppError::bridge(BridgeError::Io {
            context: "send wire message",
            source: err,
        })
    })
}
