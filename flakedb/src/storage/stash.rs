//! Vault-style service backend.
//!
//! Talks to a secrets-vault service exposing a blob API under
//! `{endpoint}/data/{key}` plus a `POST {endpoint}/rename` operation.
//! Failures carry a structured JSON error envelope `{code, message}`, which
//! this backend decodes into [`StorageError`] rather than sniffing response
//! bytes for error-looking prefixes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Storage, StorageError};

/// Structured error envelope returned by the vault service.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    code: u16,
    message: String,
}

#[derive(Debug, Serialize)]
struct RenameRequest<'a> {
    from: &'a str,
    to: &'a str,
}

/// Vault-style implementation of [`Storage`].
pub struct StashStorage {
    client: Client,
    endpoint: String,
    closed: AtomicBool,
}

impl StashStorage {
    pub fn open(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Io(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn data_url(&self, key: &str) -> String {
        format!(
            "{}/data/{}",
            self.endpoint.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }

    fn transport(e: reqwest::Error) -> StorageError {
        if e.is_timeout() {
            StorageError::Timeout(e.to_string())
        } else {
            StorageError::Io(e.to_string())
        }
    }

    /// Decodes the service's error envelope from a non-success response.
    async fn decode_error(resp: Response, context: &str) -> StorageError {
        let status = resp.status();
        match resp.json::<ErrorEnvelope>().await {
            Ok(envelope) => StorageError::Backend {
                code: envelope.code,
                message: envelope.message,
            },
            Err(_) => StorageError::Backend {
                code: status.as_u16(),
                message: format!("{context} returned HTTP {status} without an error envelope"),
            },
        }
    }
}

#[async_trait]
impl Storage for StashStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check_open()?;
        let resp = self
            .client
            .get(self.data_url(key))
            .send()
            .await
            .map_err(Self::transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = resp.bytes().await.map_err(Self::transport)?;
                Ok(Some(bytes.to_vec()))
            }
            _ => Err(Self::decode_error(resp, "read").await),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.check_open()?;
        let resp = self
            .client
            .put(self.data_url(key))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(Self::transport)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::decode_error(resp, "write").await)
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check_open()?;
        let resp = self
            .client
            .head(self.data_url(key))
            .send()
            .await
            .map_err(Self::transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::decode_error(resp, "exists").await),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.check_open()?;
        let url = format!("{}/rename", self.endpoint.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&RenameRequest { from, to })
            .send()
            .await
            .map_err(Self::transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(from.to_string())),
            status if status.is_success() => Ok(()),
            _ => Err(Self::decode_error(resp, "rename").await),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check_open()?;
        let resp = self
            .client
            .delete(self.data_url(key))
            .send()
            .await
            .map_err(Self::transport)?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::decode_error(resp, "delete").await)
        }
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
