//! Storage facade: pluggable blob KV with uniform semantics.
//!
//! This module provides the async [`Storage`] trait the rest of the node
//! programs against, plus concrete implementations:
//!
//! - an in-memory store ([`mem::MemoryStorage`]) suitable for tests and the
//!   in-memory consensus mode,
//! - a filesystem store ([`file::FileStorage`]) with optional at-rest
//!   encryption,
//! - an S3-compatible object store ([`s3::S3Storage`]),
//! - a vault-style service store ([`stash::StashStorage`]).
//!
//! Keys are unix-style paths derived from `(network, dbid, key)`. Not-found
//! is explicit (`Ok(None)` on read, a dedicated error for rename sources),
//! and every backend exposes an idempotent `close`.

pub mod file;
pub mod mem;
pub mod s3;
pub mod stash;

use std::fmt;

use async_trait::async_trait;

use crate::error::LedgerError;

pub use file::FileStorage;
pub use mem::MemoryStorage;
pub use s3::S3Storage;
pub use stash::StashStorage;

/// Storage-level error type.
#[derive(Clone, Debug)]
pub enum StorageError {
    /// Underlying I/O failure (retryable).
    Io(String),
    /// Structured backend error envelope.
    Backend { code: u16, message: String },
    /// Key was required to exist (rename source) but does not.
    NotFound(String),
    /// Operation exceeded the backend timeout (retryable).
    Timeout(String),
    /// At-rest encryption or decryption failed.
    Encryption(String),
    /// Backend already closed.
    Closed,
}

impl StorageError {
    /// Whether the facade may retry the operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io(_) | StorageError::Timeout(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "storage i/o error: {msg}"),
            StorageError::Backend { code, message } => {
                write!(f, "storage backend error {code}: {message}")
            }
            StorageError::NotFound(key) => write!(f, "storage key not found: {key}"),
            StorageError::Timeout(msg) => write!(f, "storage timeout: {msg}"),
            StorageError::Encryption(msg) => write!(f, "storage encryption error: {msg}"),
            StorageError::Closed => write!(f, "storage backend is closed"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for LedgerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(key) => LedgerError::StorageNotFound(key),
            other => LedgerError::StorageIo(other.to_string()),
        }
    }
}

/// Async blob store with explicit not-found semantics.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads a blob; `Ok(None)` when the key does not exist.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Writes a blob, replacing any existing value.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Returns whether the key exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Atomically (where the backend allows) moves `from` to `to`. Fails
    /// with [`StorageError::NotFound`] when the source is missing.
    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Deletes the key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Idempotent close; further operations fail with
    /// [`StorageError::Closed`].
    async fn close(&self) -> Result<(), StorageError>;
}

/// Storage key of a sealed block: `ledger/{network}/{dbid}/block/{number}`.
pub fn block_key(network: &str, dbid: &str, block_number: u64) -> String {
    format!("ledger/{network}/{dbid}/block/{block_number}")
}

/// Storage key of the current-index pointer file.
pub fn index_root_key(network: &str, dbid: &str) -> String {
    format!("ledger/{network}/{dbid}/index/root")
}

/// Default retry budget applied by [`with_retries`] callers.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Runs `op` up to `budget` times, retrying transient failures only.
pub async fn with_retries<T, F, Fut>(budget: u32, mut op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StorageError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt + 1 < budget => {
                attempt += 1;
                tracing::warn!(attempt, error = %e, "retrying storage operation");
            }
            Err(e) => return Err(e),
        }
    }
}
