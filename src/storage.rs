//! Storage collaborator interfaces for the raw and curated layers.
//!
//! The crawler core never touches storage; batch callers persist raw page
//! bytes and curated article batches through the [`Storage`] trait and are
//! expected to catch failures without aborting the batch. Two backends
//! ship here:
//!
//! - [`LocalStorage`]: a filesystem tree mirroring the object-store key
//!   layout, for local runs and tests
//! - [`DisabledStorage`]: selected at startup when no storage root is
//!   configured; every call reports [`StorageError::Unavailable`]
//!
//! Real object-store and parquet backends are external collaborators that
//! implement the same trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::models::Article;

/// Failures surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend is absent or not configured.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writer for the raw and curated storage layers.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist raw page bytes under `key`, with object metadata.
    async fn put_compressed(
        &self,
        key: &str,
        bytes: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError>;

    /// Persist a batch of curated records under `path`.
    async fn write_batch(&self, path: &str, records: &[Article]) -> Result<(), StorageError>;
}

/// The no-op backend: reports `Unavailable` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStorage;

#[async_trait]
impl Storage for DisabledStorage {
    async fn put_compressed(
        &self,
        _key: &str,
        _bytes: &[u8],
        _metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        Err(StorageError::Unavailable(
            "no storage root configured".to_string(),
        ))
    }

    async fn write_batch(&self, _path: &str, _records: &[Article]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable(
            "no storage root configured".to_string(),
        ))
    }
}

/// Filesystem-backed storage rooted at a directory.
///
/// Keys map directly to paths under the root; raw objects get a
/// `<key>.meta.json` sidecar carrying their metadata, and curated batches
/// are written as JSON lines.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn prepare(&self, key: &str) -> Result<PathBuf, StorageError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(path)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_compressed(
        &self,
        key: &str,
        bytes: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let path = self.prepare(key).await?;
        fs::write(&path, bytes).await?;

        let meta_path = self.root.join(format!("{}.meta.json", key));
        fs::write(&meta_path, serde_json::to_vec(metadata)?).await?;

        debug!(key, bytes = bytes.len(), "Wrote raw object");
        Ok(())
    }

    async fn write_batch(&self, path: &str, records: &[Article]) -> Result<(), StorageError> {
        let full = self.prepare(path).await?;

        let mut out = String::new();
        for record in records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        fs::write(&full, out).await?;

        info!(path, count = records.len(), "Wrote curated batch");
        Ok(())
    }
}

/// Select the storage backend at startup: a [`LocalStorage`] when a root
/// directory is configured, the [`DisabledStorage`] no-op otherwise.
pub fn select_backend(root: Option<&str>) -> Arc<dyn Storage> {
    match root {
        Some(dir) => Arc::new(LocalStorage::new(dir)),
        None => Arc::new(DisabledStorage),
    }
}
