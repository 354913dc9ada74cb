//! Bridge between external server-script sessions and in-flight
//! executions.
//!
//! Two listeners share one [`SessionRegistry`]: a JSON-lines TCP listener
//! speaking [`WireRequest`]/[`WireResponse`], and an HTTP listener exposing
//! the PKI entries as `GET`/`POST /pki/{key}`. Every routed request counts
//! as a heartbeat for its session; unknown tokens are rejected without
//! touching any execution state.
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::error::{AppError, BridgeError, PkiError};

pub mod client;
mod http;
pub mod protocol;
mod session;


pub use http::run_pki_http_listener;
pub use protocol::{WireRequest, WireResponse};
pub use session::{SessionHandle, SessionRegistry};

pub async fn run_bridge_listener(
    listener: TcpListener,
    registry: SessionRegistry,
    response_timeout: Duration,
) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(result) => result,
            Err(err) => {
                warn!("Failed to accept bridge connection: {}", err);
                continue;
            }
        };
        debug!("Bridge connection from {}", peer);
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_bridge_connection(socket, registry, response_timeout).await {
                match err {
                    AppError::Bridge(BridgeError::ConnectionClosed) => {
                        debug!("Bridge connection from {} closed", peer);
                    }
                    other => warn!("Bridge connection from {} failed: {}", peer, other),
                }
            }
        });
    }
}

async fn handle_bridge_connection(
    socket: TcpStream,
    mut registry: SessionRegistry,
    response_timeout: Duration,
) -> Result<(), AppError> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    loop {
        let request: WireRequest = protocol::read_message(&mut reader).await?;
        let response = route_request(&request, &mut registry, response_timeout).await;
        protocol::send_message(&mut write_half, &response).await?;
    }
}

async fn route_request(
    request: &WireRequest,
    registry: &mut SessionRegistry,
    response_timeout: Duration,
) -> WireResponse {
    let token = request.server_id();
    let mut handle = match registry.resolve(token) {
        Ok(handle) => handle,
        // Stale tokens get an error without touching any session state.
        Err(err) => return WireResponse::Error { message: err.to_string() },
    };

    // Any routed request keeps the session alive.
    handle.heartbeat.touch(token);

    match request {
        WireRequest::Heartbeat { .. } => WireResponse::Ok,
        WireRequest::GetPkiEntry { key, .. } => {
            match tokio::time::timeout(response_timeout, handle.pki.get(key)).await {
                Ok(Ok(value)) => WireResponse::PkiValue { value },
                Ok(Err(AppError::Pki(PkiError::NotFound { key }))) => WireResponse::Error {
                    message: format!("PKI entry '{}' not found.", key),
                },
                Ok(Err(err)) => WireResponse::Error { message: err.to_string() },
                Err(_elapsed) => WireResponse::Error {
                    message: BridgeError::ResponseTimeout.to_string(),
                },
            }
        }
        WireRequest::SetPkiEntry { key, value, .. } => {
            match tokio::time::timeout(response_timeout, handle.pki.set(key, value)).await {
                Ok(Ok(())) => WireResponse::Ok,
                Ok(Err(AppError::Pki(PkiError::AlreadySet { key }))) => WireResponse::Error {
                    message: format!("PKI entry '{}' is already set.", key),
                },
                Ok(Err(err)) => WireResponse::Error { message: err.to_string() },
                Err(_elapsed) => WireResponse::Error {
                    message: BridgeError::ResponseTimeout.to_string(),
                },
            }
        }
    }
}
