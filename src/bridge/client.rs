//! Client side of the JSON-lines bridge protocol, for server scripts that
//! run in-process (and for exercising the listener in tests).
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{AppError, AppResult, BridgeError};

use super::protocol::{self, WireRequest, WireResponse};

pub struct BridgeClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    token: String,
}

impl BridgeClient {
    /// # Errors
    ///
    /// Returns an error when the bridge endpoint cannot be reached.
    pub async fn connect(addr: &str, token: &str) -> AppResult<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|err| {
            AppError::bridge(BridgeError::Io {
                context: "connect to bridge",
                source: err,
            })
        })?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            token: token.to_owned(),
        })
    }

    async fn round_trip(&mut self, request: &WireRequest) -> AppResult<WireResponse> {
        protocol::send_message(&mut self.writer, request).await?;
        protocol::read_message(&mut self.reader).await
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::Remote`] when the orchestrator rejects the
    /// request, including for unknown keys.
    pub async fn get_pki_entry(&mut self, key: &str) -> AppResult<String> {
        let request = WireRequest::GetPkiEntry {
            server_id: self.token.clone(),
            key: key.to_owned(),
        };
        match self.round_trip(&request).await? {
            WireResponse::PkiValue { value } => Ok(value),
            WireResponse::Error { message } => {
                Err(AppError::bridge(BridgeError::Remote { message }))
            }
            WireResponse::Ok => Err(AppError::bridge(BridgeError::Remote {
                message: "Expected a PKI value, got an acknowledgement.".to_owned(),
            })),
        }
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::Remote`] when the orchestrator rejects the
    /// request, including write-once conflicts.
    pub async fn set_pki_entry(&mut self, key: &str, value: &str) -> AppResult<()> {
        let request = WireRequest::SetPkiEntry {
            server_id: self.token.clone(),
            key: key.to_owned(),
            value: value.to_owned(),
        };
        match self.round_trip(&request).await? {
            WireResponse::Ok => Ok(()),
            WireResponse::Error { message } => {
                Err(AppError::bridge(BridgeError::Remote { message }))
            }
            WireResponse::PkiValue { .. } => Err(AppError::bridge(BridgeError::Remote {
                message: "Expected an acknowledgement, got a PKI value.".to_owned(),
            })),
        }
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::Remote`] when the session is unknown or
    /// terminated.
    pub async fn heartbeat(&mut self) -> AppResult<()> {
        let request = WireRequest::Heartbeat {
            server_id: self.token.clone(),
        };
        match self.round_trip(&request).await? {
            WireResponse::Ok => Ok(()),
            WireResponse::Error { message } => {
                Err(AppError::bridge(BridgeError::Remote { message }))
            }
            WireResponse::PkiValue { .. } => Err(AppError::bridge(BridgeError::Remote {
                message: "Expected an acknowledgement, got a PKI value.".to_owned(),
            })),
        }
    }
}
