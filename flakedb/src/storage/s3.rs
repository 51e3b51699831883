//! S3-compatible object-store backend.
//!
//! Speaks the minimal S3 REST surface the facade needs: GET / PUT / HEAD /
//! DELETE on `{endpoint}/{bucket}/{key}`, plus server-side copy for
//! `rename` (`x-amz-copy-source` followed by a delete of the source).
//! Request signing is expected to be handled by the deployment (IAM
//! instance roles, a signing proxy, or an unauthenticated dev endpoint such
//! as MinIO with anonymous access). Payloads are treated opaquely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::{Storage, StorageError};

/// S3-compatible implementation of [`Storage`].
pub struct S3Storage {
    client: Client,
    endpoint: String,
    bucket: String,
    closed: AtomicBool,
}

impl S3Storage {
    /// Constructs a client against `endpoint` (e.g. `"http://127.0.0.1:9000"`)
    /// and `bucket`.
    pub fn open(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Io(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
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

    fn object_url(&self, key: &str) -> String {
        // Avoid accidental double slashes.
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
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

    fn backend(status: StatusCode, context: &str) -> StorageError {
        StorageError::Backend {
            code: status.as_u16(),
            message: format!("{context} returned HTTP {status}"),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check_open()?;
        let url = self.object_url(key);
        let resp = self.client.get(&url).send().await.map_err(Self::transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = resp.bytes().await.map_err(Self::transport)?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(Self::backend(status, "GET object")),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.check_open()?;
        let url = self.object_url(key);
        let resp = self
            .client
            .put(&url)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(Self::transport)?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::backend(status, "PUT object"))
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check_open()?;
        let url = self.object_url(key);
        let resp = self.client.head(&url).send().await.map_err(Self::transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Self::backend(status, "HEAD object")),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.check_open()?;
        // S3 has no rename: server-side copy, then delete the source.
        let copy_source = format!("/{}/{}", self.bucket, from.trim_start_matches('/'));
        let resp = self
            .client
            .put(self.object_url(to))
            .header("x-amz-copy-source", copy_source)
            .send()
            .await
            .map_err(Self::transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(from.to_string())),
            status if status.is_success() => {}
            status => return Err(Self::backend(status, "COPY object")),
        }
        self.delete(from).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check_open()?;
        let url = self.object_url(key);
        let resp = self.client.delete(&url).send().await.map_err(Self::transport)?;
        let status = resp.status();
        // S3 delete is idempotent: 404 and 204 both mean the key is gone.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::backend(status, "DELETE object"))
        }
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_urls_join_without_double_slashes() {
        let store =
            S3Storage::open("http://localhost:9000/", "bucket", Duration::from_secs(2)).unwrap();
        assert_eq!(
            store.object_url("/ledger/net/db/block/1"),
            "http://localhost:9000/bucket/ledger/net/db/block/1"
        );
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let store =
            S3Storage::open("http://localhost:9000", "bucket", Duration::from_secs(2)).unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.read("k").await, Err(StorageError::Closed)));
    }
}
