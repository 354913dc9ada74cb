use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, PkiError};

use super::PkiStore;

/// Access path into an execution's PKI store.
///
/// Both paths observe identical write-once semantics: the direct path calls
/// the in-process store, the HTTP path talks to a remote PKI endpoint owned
/// by the companion web API.
#[async_trait]
pub trait PkiConnection: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<String>;
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
}

/// In-process access, used when the caller lives inside the orchestrator.
pub struct DirectPkiConnection {
    store: Arc<PkiStore>,
}

impl DirectPkiConnection {
    #[must_use]
    pub fn new(store: Arc<PkiStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PkiConnection for DirectPkiConnection {
    async fn get(&self, key: &str) -> AppResult<String> {
        self.store.get(key).map_err(AppError::pki)
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.store.set(key, value).map_err(AppError::pki)
    }
}

#[derive(Serialize)]
struct SetRequestBody<'v> {
    value: &'v str,
}

#[derive(Deserialize)]
struct GetResponseBody {
    result: String,
}

/// Access over the companion web API's PKI endpoints, authenticated by the
/// execution's session token.
pub struct HttpPkiConnection {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpPkiConnection {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, token: &str, request_timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        })
    }

    fn entry_url(&self, key: &str) -> String {
        format!("{}/pki/{}", self.base_url, key)
    }
}

#[async_trait]
impl PkiConnection for HttpPkiConnection {
    async fn get(&self, key: &str) -> AppResult<String> {
        let response = self
            .client
            .get(self.entry_url(key))
            .header("X-Session-Token", &self.token)
            .send()
            .await?;
        match response.status().as_u16() {
            200 => {
                let body: GetResponseBody = response.json().await?;
                Ok(body.result)
            }
            404 => Err(AppError::pki(PkiError::NotFound {
                key: key.to_owned(),
            })),
            status => Err(AppError::pki(PkiError::UnexpectedStatus {
                key: key.to_owned(),
                status,
            })),
        }
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let response = self
            .client
            .post(self.entry_url(key))
            .header("X-Session-Token", &self.token)
            .json(&SetRequestBody { value })
            .send()
            .await?;
        match response.status().as_u16() {
            200 => Ok(()),
            409 => Err(AppError::pki(PkiError::AlreadySet {
                key: key.to_owned(),
            })),
            status => Err(AppError::pki(PkiError::UnexpectedStatus {
                key: key.to_owned(),
                status,
            })),
        }
    }
}
