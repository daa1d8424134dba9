//! Server configuration: a TOML file with CLI/env overrides layered on top.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blobs::BlobStoreConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// SQLite file; in-memory when absent.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    /// Where attachment bytes live.
    #[serde(default = "default_blob_store")]
    pub blob_store: BlobStoreConfig,
    /// Root bearer key. Without it, only keys minted via `/api/auth/new`
    /// are accepted.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8787".parse().expect("static socket addr")
}

fn default_blob_store() -> BlobStoreConfig {
    BlobStoreConfig::Memory
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sqlite_path: None,
            blob_store: default_blob_store(),
            api_key: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}
