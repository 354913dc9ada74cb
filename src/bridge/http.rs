//! Minimal HTTP/1.1 surface for the companion web API: `GET /pki/{key}`
//! and `POST /pki/{key}`, authenticated by the execution's session token
//! (`session` cookie or `X-Session-Token` header).
use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, BridgeError, PkiError};

use super::session::SessionRegistry;

pub(super) struct HttpRequest {
    pub(super) method: String,
    pub(super) path: String,
    pub(super) headers: HashMap<String, String>,
    pub(super) body: Vec<u8>,
}

pub(super) struct HttpError {
    pub(super) status: u16,
    pub(super) message: String,
}

impl HttpError {
    pub(super) fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

pub(super) async fn read_http_request(socket: &mut TcpStream) -> Result<HttpRequest, HttpError> {
    const MAX_REQUEST_BYTES: usize = 64 * 1024;
    let mut buffer: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let header_end;

    loop {
        let bytes = socket
            .read(&mut chunk)
            .await
            .map_err(|err| HttpError::new(400, format!("Failed to read request: {}", err)))?;
        if bytes == 0 {
            return Err(HttpError::new(400, "Empty request"));
        }
        let read_slice = chunk
            .get(..bytes)
            .ok_or_else(|| HttpError::new(400, "Invalid read length"))?;
        buffer.extend_from_slice(read_slice);
        if buffer.len() > MAX_REQUEST_BYTES {
            return Err(HttpError::new(413, "Request too large"));
        }
        if let Some(pos) = find_header_end(&buffer) {
            header_end = pos;
            break;
        }
    }

    let header_bytes = buffer
        .get(..header_end)
        .ok_or_else(|| HttpError::new(400, "Malformed request headers"))?;
    let header_text = std::str::from_utf8(header_bytes)
        .map_err(|err| HttpError::new(400, format!("Invalid request encoding: {}", err)))?;
    let mut lines = header_text.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| HttpError::new(400, "Missing request line"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| HttpError::new(400, "Missing HTTP method"))?;
    let path = parts
        .next()
        .ok_or_else(|| HttpError::new(400, "Missing request path"))?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(HttpError::new(400, "Malformed header"));
        };
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    let content_length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let body_start = header_end
        .checked_add(4)
        .ok_or_else(|| HttpError::new(400, "Malformed request headers"))?;
    let mut body = buffer.get(body_start..).unwrap_or_default().to_vec();
    while body.len() < content_length {
        let bytes = socket
            .read(&mut chunk)
            .await
            .map_err(|err| HttpError::new(400, format!("Failed to read body: {}", err)))?;
        if bytes == 0 {
            break;
        }
        let read_slice = chunk
            .get(..bytes)
            .ok_or_else(|| HttpError::new(400, "Invalid read length"))?;
        body.extend_from_slice(read_slice);
        if body.len() > MAX_REQUEST_BYTES {
            return Err(HttpError::new(413, "Request body too large"));
        }
    }
    body.truncate(content_length);

    Ok(HttpRequest {
        method: method.to_owned(),
        path: path.to_owned(),
        headers,
        body,
    })
}

pub(super) fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

const fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        504 => "Gateway Timeout",
        _ => "OK",
    }
}

#[derive(Serialize)]
struct ResultResponse<'v> {
    result: &'v str,
}

#[derive(Serialize)]
struct ErrorResponse<'msg> {
    error: &'msg str,
}

#[derive(Deserialize)]
struct SetRequestBody {
    value: String,
}

async fn write_json_response<TBody>(
    socket: &mut TcpStream,
    status: u16,
    body: &TBody,
) -> AppResult<()>
where
    TBody: Serialize,
{
    let body = serde_json::to_vec(body).map_err(|err| {
        AppError::bridge(BridgeError::Serialize {
            context: "http response",
            source: err,
        })
    })?;
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        status_text(status),
        body.len()
    );
    socket.write_all(header.as_bytes()).await.map_err(|err| {
        AppError::bridge(BridgeError::Io {
            context: "write http response",
            source: err,
        })
    })?;
    socket.write_all(&body).await.map_err(|err| {
        AppError::bridge(BridgeError::Io {
            context: "write http response body",
            source: err,
        })
    })
}

/// Extracts the session token from a `session` cookie or the
/// `X-Session-Token` header.
pub(super) fn session_token(headers: &HashMap<String, String>) -> Option<String> {
    if let Some(token) = headers.get("x-session-token") {
        return Some(token.clone());
    }
    let cookies = headers.get("cookie")?;
    for cookie in cookies.split(';') {
        if let Some((name, value)) = cookie.split_once('=') {
            if name.trim() == "session" {
                return Some(value.trim().to_owned());
            }
        }
    }
    None
}

pub async fn run_pki_http_listener(
    listener: TcpListener,
    registry: SessionRegistry,
    response_timeout: Duration,
) {
    loop {
        let (socket, _) = match listener.accept().await {
            Ok(result) => result,
            Err(err) => {
                warn!("Failed to accept PKI HTTP connection: {}", err);
                continue;
            }
        };
        let registry = registry.clone();
        tokio::spawn(async move {
            handle_pki_http_connection(socket, registry, response_timeout).await;
        });
    }
}

async fn handle_pki_http_connection(
    mut socket: TcpStream,
    mut registry: SessionRegistry,
    response_timeout: Duration,
) {
    let request = match read_http_request(&mut socket).await {
        Ok(request) => request,
        Err(err) => {
            let body = ErrorResponse { error: &err.message };
            if write_json_response(&mut socket, err.status, &body).await.is_err() {
                // Client went away mid-response.
            }
            return;
        }
    };

    let (status, body) = route_pki_request(&request, &mut registry, response_timeout).await;
    if write_json_response(&mut socket, status, &body).await.is_err() {
        // Client went away mid-response.
    }
}

async fn route_pki_request(
    request: &HttpRequest,
    registry: &mut SessionRegistry,
    response_timeout: Duration,
) -> (u16, serde_json::Value) {
    let Some(key) = request.path.strip_prefix("/pki/").filter(|key| !key.is_empty()) else {
        return error_body(404, "Unknown path");
    };
    let Some(token) = session_token(&request.headers) else {
        return error_body(404, "Missing session token");
    };
    let mut handle = match registry.resolve(&token) {
        Ok(handle) => handle,
        Err(err) => return error_body(404, &err.to_string()),
    };

    // Any routed request counts as a heartbeat for the session.
    handle.heartbeat.touch(&token);
    debug!(
        "PKI HTTP {} /pki/{} for execution {}",
        request.method, key, handle.execution_id
    );

    match request.method.as_str() {
        "GET" => {
            let result =
                tokio::time::timeout(response_timeout, handle.pki.get(key)).await;
            match result {
                Ok(Ok(value)) => {
                    let body = serde_json::to_value(ResultResponse { result: &value })
                        .unwrap_or_default();
                    (200, body)
                }
                Ok(Err(AppError::Pki(PkiError::NotFound { .. }))) => {
                    error_body(404, "PKI entry not found")
                }
                Ok(Err(err)) => error_body(400, &err.to_string()),
                Err(_elapsed) => error_body(504, "PKI backend timed out"),
            }
        }
        "POST" => {
            let parsed: Result<SetRequestBody, _> = serde_json::from_slice(&request.body);
            let Ok(parsed) = parsed else {
                return error_body(400, "Body must be {\"value\": ...}");
            };
            let result =
                tokio::time::timeout(response_timeout, handle.pki.set(key, &parsed.value)).await;
            match result {
                Ok(Ok(())) => (200, serde_json::json!({})),
                Ok(Err(AppError::Pki(PkiError::AlreadySet { .. }))) => {
                    error_body(409, "PKI entry is already set")
                }
                Ok(Err(err)) => error_body(400, &err.to_string()),
                Err(_elapsed) => error_body(504, "PKI backend timed out"),
            }
        }
        _ => error_body(405, "Use GET or POST"),
    }
}

fn error_body(status: u16, message: &str) -> (u16, serde_json::Value) {
    let body = serde_json::to_value(ErrorResponse { error: message }).unwrap_or_default();
    (status, body)
}
