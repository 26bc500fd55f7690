use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by object-store adapters. Transport-neutral: adapters
/// map their client errors into these variants.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("signed URL issuance failed: {0}")]
    Sign(String),

    #[error("upload session could not be started for '{key}': {reason}")]
    SessionInit { key: String, reason: String },

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Durable object storage holding source assets and published output.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ObjectStore: Send + Sync {
    /// Stream the object at `key` into `dest` on the local filesystem.
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError>;

    /// Stream the file at `local` into the object at `key` and return a
    /// long-lived signed read URL for it.
    async fn upload(&self, local: &Path, key: &str) -> Result<String, StorageError>;
}
