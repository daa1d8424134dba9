//! Shared service state handed to every handler.

use thiserror::Error;

use crate::blobs::{Blobs, BlobsError};
use crate::config::Config;
use crate::database::{Database, DatabaseSetupError};

#[derive(Clone)]
pub struct State {
    database: Database,
    blobs: Blobs,
    root_key: Option<String>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        let database = match &config.sqlite_path {
            Some(path) => Database::connect(path).await?,
            None => Database::in_memory().await?,
        };
        let blobs = Blobs::from_config(&config.blob_store)?;

        Ok(Self {
            database,
            blobs,
            root_key: config.api_key.clone(),
        })
    }

    /// Fully ephemeral state for tests.
    pub async fn ephemeral(root_key: Option<String>) -> Result<Self, StateSetupError> {
        Ok(Self {
            database: Database::in_memory().await?,
            blobs: Blobs::in_memory(),
            root_key,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn blobs(&self) -> &Blobs {
        &self.blobs
    }

    /// Accept the configured root key or any key minted via the auth
    /// endpoint.
    pub async fn is_authorized(&self, token: &str) -> bool {
        if self.root_key.as_deref() == Some(token) {
            return true;
        }
        self.database.api_key_exists(token).await.unwrap_or(false)
    }
}

#[derive(Debug, Error)]
pub enum StateSetupError {
    #[error("database setup error: {0}")]
    Database(#[from] DatabaseSetupError),
    #[error("blob store error: {0}")]
    Blobs(#[from] BlobsError),
}
