//! Filesystem storage backend with optional at-rest encryption.
//!
//! Blobs live under a base directory, one file per key; parent directories
//! are created on demand. When an encryption key is configured, `write`
//! applies AES-256-GCM before I/O and `read` decrypts symmetrically: the
//! random 12-byte nonce is prepended to the ciphertext. The 32-byte key is
//! derived from the configured passphrase with BLAKE3.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use aes_gcm::aead::{Aead, KeyInit, OsRng, rand_core::RngCore};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;

use super::{Storage, StorageError};

const NONCE_LEN: usize = 12;

/// Filesystem implementation of [`Storage`].
pub struct FileStorage {
    base: PathBuf,
    cipher: Option<Aes256Gcm>,
    closed: AtomicBool,
}

impl FileStorage {
    /// Opens a file store rooted at `base`. When `encryption_secret` is
    /// set, every blob is encrypted at rest with a key derived from it.
    pub fn open(base: impl Into<PathBuf>, encryption_secret: Option<&str>) -> Self {
        let cipher = encryption_secret.map(|secret| {
            let key_bytes = blake3::hash(secret.as_bytes());
            Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes.as_bytes()))
        });
        Self {
            base: base.into(),
            cipher,
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// Resolves a unix-style key to a path under the base directory,
    /// rejecting traversal segments.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(StorageError::Io(format!("illegal storage key {key:?}")));
        }
        Ok(self.base.join(key))
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        match &self.cipher {
            None => Ok(plaintext.to_vec()),
            Some(cipher) => {
                let mut nonce_bytes = [0u8; NONCE_LEN];
                OsRng.fill_bytes(&mut nonce_bytes);
                let nonce = Nonce::from_slice(&nonce_bytes);
                let ciphertext = cipher
                    .encrypt(nonce, plaintext)
                    .map_err(|e| StorageError::Encryption(e.to_string()))?;
                let mut out = nonce_bytes.to_vec();
                out.extend_from_slice(&ciphertext);
                Ok(out)
            }
        }
    }

    fn decrypt(&self, stored: &[u8]) -> Result<Vec<u8>, StorageError> {
        match &self.cipher {
            None => Ok(stored.to_vec()),
            Some(cipher) => {
                if stored.len() < NONCE_LEN {
                    return Err(StorageError::Encryption(
                        "stored blob shorter than nonce".to_string(),
                    ));
                }
                let (nonce_bytes, ciphertext) = stored.split_at(NONCE_LEN);
                cipher
                    .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                    .map_err(|e| StorageError::Encryption(e.to_string()))
            }
        }
    }
}

fn io_err(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io(format!("{}: {e}", path.display()))
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check_open()?;
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => self.decrypt(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.check_open()?;
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        let payload = self.encrypt(bytes)?;
        tokio::fs::write(&path, payload)
            .await
            .map_err(|e| io_err(&path, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check_open()?;
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.check_open()?;
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        if let Some(parent) = to_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        match tokio::fs::rename(&from_path, &to_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(from.to_string()))
            }
            Err(e) => Err(io_err(&from_path, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check_open()?;
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
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
    use tempfile::TempDir;

    #[tokio::test]
    async fn plaintext_roundtrip_with_nested_keys() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FileStorage::open(tmp.path(), None);

        let key = "ledger/net/db/block/1";
        store.write(key, b"block bytes").await.unwrap();
        assert_eq!(store.read(key).await.unwrap(), Some(b"block bytes".to_vec()));
        assert!(store.exists(key).await.unwrap());
        assert_eq!(store.read("ledger/net/db/block/2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn encrypted_roundtrip_and_ciphertext_differs_from_plaintext() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FileStorage::open(tmp.path(), Some("passphrase"));

        store.write("blob", b"secret payload").await.unwrap();
        assert_eq!(
            store.read("blob").await.unwrap(),
            Some(b"secret payload".to_vec())
        );

        // The raw file must not contain the plaintext.
        let raw = std::fs::read(tmp.path().join("blob")).unwrap();
        assert!(!raw.windows(b"secret payload".len()).any(|w| w == b"secret payload"));
    }

    #[tokio::test]
    async fn decrypting_with_the_wrong_key_fails() {
        let tmp = TempDir::new().expect("create temp dir");
        let writer = FileStorage::open(tmp.path(), Some("right"));
        writer.write("blob", b"payload").await.unwrap();

        let reader = FileStorage::open(tmp.path(), Some("wrong"));
        assert!(matches!(
            reader.read("blob").await,
            Err(StorageError::Encryption(_))
        ));
    }

    #[tokio::test]
    async fn rename_and_delete_semantics() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FileStorage::open(tmp.path(), None);

        store.write("a", b"1").await.unwrap();
        store.rename("a", "sub/b").await.unwrap();
        assert!(!store.exists("a").await.unwrap());
        assert_eq!(store.read("sub/b").await.unwrap(), Some(b"1".to_vec()));

        assert!(matches!(
            store.rename("missing", "x").await,
            Err(StorageError::NotFound(_))
        ));

        store.delete("sub/b").await.unwrap();
        store.delete("sub/b").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = FileStorage::open(tmp.path(), None);
        assert!(store.read("../etc/passwd").await.is_err());
        assert!(store.write("a/../../b", b"x").await.is_err());
    }
}
