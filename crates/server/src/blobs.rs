//! Attachment bytes in object storage.
//!
//! The metadata database never holds file bytes; everything binary goes
//! through here, keyed by `vaultId/hash.ext`. Backends: local filesystem,
//! in-memory (tests/ephemeral), or any S3-compatible endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlobStoreConfig {
    /// Blobs under a local directory.
    Filesystem { path: PathBuf },
    /// Ephemeral store, lost on restart.
    Memory,
    /// S3-compatible object storage.
    S3 {
        endpoint: String,
        access_key: String,
        secret_key: String,
        bucket: String,
        region: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum BlobsError {
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),
    #[error("blob store setup failed: {0}")]
    Setup(String),
}

/// Thin handle over the configured object store.
#[derive(Clone)]
pub struct Blobs {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for Blobs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blobs").finish_non_exhaustive()
    }
}

impl Blobs {
    pub fn from_config(config: &BlobStoreConfig) -> Result<Self, BlobsError> {
        let store: Arc<dyn ObjectStore> = match config {
            BlobStoreConfig::Filesystem { path } => {
                std::fs::create_dir_all(path)
                    .map_err(|e| BlobsError::Setup(format!("creating blob dir: {e}")))?;
                info!("blob store: filesystem at {:?}", path);
                Arc::new(LocalFileSystem::new_with_prefix(path)?)
            }
            BlobStoreConfig::Memory => {
                info!("blob store: in-memory");
                Arc::new(InMemory::new())
            }
            BlobStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                info!(endpoint, bucket, "blob store: s3");
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(true);
                Arc::new(builder.build()?)
            }
        };
        Ok(Self { store })
    }

    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
        }
    }

    pub async fn put(&self, key: &str, bytes: Bytes) -> Result<(), BlobsError> {
        let size = bytes.len();
        self.store
            .put(&ObjectPath::from(key), bytes.into())
            .await?;
        debug!(key, size, "blob stored");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, BlobsError> {
        match self.store.get(&ObjectPath::from(key)).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), BlobsError> {
        match self.store.delete(&ObjectPath::from(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
