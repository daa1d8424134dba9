//! Persisted client state.
//!
//! One JSON file holds the connection settings, the sync toggles, both
//! cursors, and the serialized metadata caches. It is the durability
//! boundary: cursor advances only count once this file is written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-document sync metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocMetadata {
    pub path: String,
    pub rev: String,
    pub last_modified: i64,
}

/// Per-attachment sync metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMetadata {
    pub path: String,
    pub hash: String,
    pub size: i64,
    pub content_type: String,
    pub last_modified: i64,
    pub attachment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub server_url: String,
    pub api_key: String,
    pub vault_id: String,
    pub auto_sync: bool,
    /// Auto-sync period in seconds.
    pub sync_interval: u64,
    pub sync_on_startup: bool,
    pub sync_on_save: bool,
    pub sync_attachments: bool,
    pub last_sync: i64,
    pub last_seq: i64,
    pub last_attachment_seq: i64,
    pub metadata_cache: HashMap<String, DocMetadata>,
    pub attachment_cache: HashMap<String, AttachmentMetadata>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            api_key: String::new(),
            vault_id: "default".to_owned(),
            auto_sync: false,
            sync_interval: 300,
            sync_on_startup: false,
            sync_on_save: false,
            sync_attachments: false,
            last_sync: 0,
            last_seq: 0,
            last_attachment_seq: 0,
            metadata_cache: HashMap::new(),
            attachment_cache: HashMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write settings {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("settings JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed settings persistence.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing file loads as defaults; a fresh install has no state yet.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(source) => Err(SettingsError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Write through a sibling temp file so a crash mid-write cannot leave
    /// a torn settings file behind.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let raw = serde_json::to_string_pretty(settings)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw).map_err(|source| SettingsError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
