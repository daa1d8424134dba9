//! The sync orchestrator.
//!
//! `SyncService` composes the vault port, the metadata cache, the base
//! content store, the conflict prompt, and the API client, and drives one
//! status-gated run at a time: pull documents, push documents, then the
//! attachment phase. Per-file problems are counted and contained; only
//! configuration-level failures abort a run.

mod attachments;
mod documents;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use common::paths;

use crate::api::{ApiClient, ApiError};
use crate::base_store::BaseContentStore;
use crate::conflict::ConflictPrompt;
use crate::metadata::MetadataCache;
use crate::settings::{Settings, SettingsError, SettingsStore};
use crate::transport::Transport;
use crate::vault::{Vault, VaultFile};

/// Extensions treated as synced text documents.
const DOC_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Conservative allow-list of attachment extensions.
const ATTACHMENT_EXTENSIONS: [&str; 12] = [
    "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "pdf", "mp3", "wav", "mp4", "mov",
];

pub(crate) fn is_document_path(path: &str) -> bool {
    has_extension_in(path, &DOC_EXTENSIONS)
}

pub(crate) fn is_attachment_path(path: &str) -> bool {
    has_extension_in(path, &ATTACHMENT_EXTENSIONS)
}

fn has_extension_in(path: &str, allowed: &[&str]) -> bool {
    paths::file_ext(path)
        .strip_prefix('.')
        .is_some_and(|ext| allowed.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Inverse of doc-id normalization: ids without an extension map back to
/// markdown files.
pub(crate) fn path_for_doc_id(id: &str) -> String {
    if paths::file_ext(id).is_empty() {
        format!("{id}.md")
    } else {
        id.to_owned()
    }
}

/// Per-run counters surfaced to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub pulled: u32,
    pub pushed: u32,
    pub conflicts: u32,
    pub errors: u32,
    pub attachments_pushed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success { message: String },
    Error { message: String },
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    PullDocuments,
    PushDocuments,
    PushAttachments,
}

/// Host callbacks. All default to no-ops; a UI overrides what it renders.
pub trait SyncObserver: Send + Sync {
    fn on_status(&self, status: SyncStatus) {
        let _ = status;
    }
    fn on_progress(&self, phase: SyncPhase, current: usize, total: usize) {
        let _ = (phase, current, total);
    }
    /// Client-side sync state was cleared after a full-sync escalation.
    fn on_reset(&self) {}
}

struct NoopObserver;

impl SyncObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub stats: SyncStats,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error(transparent)]
    Api(ApiError),
    #[error("vault I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings persistence failed: {0}")]
    Settings(#[from] SettingsError),
    #[error("full sync required; client sync state was reset")]
    ResetRequested,
}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        if e.is_auth() {
            SyncError::Auth(e.to_string())
        } else {
            SyncError::Api(e)
        }
    }
}

/// Outcome of applying one remote change (or one conflicted push result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeOutcome {
    Applied,
    Cancelled,
    Failed,
    ResetRequested,
}

pub struct SyncService {
    pub(crate) api: ApiClient,
    pub(crate) vault: Arc<dyn Vault>,
    pub(crate) prompt: Arc<dyn ConflictPrompt>,
    pub(crate) observer: Arc<dyn SyncObserver>,
    pub(crate) settings: Settings,
    settings_store: SettingsStore,
    pub(crate) metadata: MetadataCache,
    pub(crate) base_store: BaseContentStore,
    pub(crate) stats: SyncStats,
    sync_in_progress: Arc<AtomicBool>,
}

impl SyncService {
    pub fn new(
        settings: Settings,
        settings_store: SettingsStore,
        vault: Arc<dyn Vault>,
        prompt: Arc<dyn ConflictPrompt>,
        base_store: BaseContentStore,
        transport: Transport,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::new(
            transport,
            &settings.server_url,
            &settings.api_key,
            &settings.vault_id,
        )?;
        let metadata = MetadataCache::from_settings(&settings);
        Ok(Self {
            api,
            vault,
            prompt,
            observer: Arc::new(NoopObserver),
            settings,
            settings_store,
            metadata,
            base_store,
            stats: SyncStats::default(),
            sync_in_progress: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// One full sync run. Re-entrant calls (auto-sync firing mid-run) are
    /// rejected immediately and report `Idle`.
    pub async fn perform_sync(&mut self) -> SyncReport {
        if self.sync_in_progress.swap(true, Ordering::SeqCst) {
            debug!("sync already in progress, skipping");
            return SyncReport {
                status: SyncStatus::Idle,
                stats: SyncStats::default(),
            };
        }

        self.stats = SyncStats::default();
        self.observer.on_status(SyncStatus::Syncing);

        let status = match self.run().await {
            Ok(message) => {
                self.settings.last_sync = chrono::Utc::now().timestamp_millis();
                if let Err(e) = self.persist_cache() {
                    warn!(error = %e, "failed to persist settings after sync");
                }
                SyncStatus::Success { message }
            }
            Err(e) => {
                if !matches!(e, SyncError::ResetRequested) {
                    self.stats.errors += 1;
                }
                SyncStatus::Error {
                    message: e.to_string(),
                }
            }
        };

        self.observer.on_status(status.clone());
        self.sync_in_progress.store(false, Ordering::SeqCst);

        SyncReport {
            status,
            stats: self.stats.clone(),
        }
    }

    async fn run(&mut self) -> Result<String, SyncError> {
        // Cheap gate: ask the server for its cursor tips. An unreachable
        // status endpoint is not fatal; assume the server moved.
        let status = match self.api.status().await {
            Ok(status) => Some(status),
            Err(e) if e.is_auth() => return Err(SyncError::Auth(e.to_string())),
            Err(e) => {
                warn!(error = %e, "status unavailable, assuming server changes");
                None
            }
        };

        let files = self.vault.list_files().await?;
        let has_local_docs = self.has_local_doc_changes(&files);
        let has_local_attachments =
            self.settings.sync_attachments && self.has_local_attachment_changes(&files);
        let has_server_docs = status
            .as_ref()
            .map_or(true, |s| s.last_seq > self.settings.last_seq);
        let has_server_attachments = self.settings.sync_attachments
            && status.as_ref().map_or(true, |s| {
                s.last_attachment_seq > self.settings.last_attachment_seq
            });

        if !has_local_docs && !has_local_attachments && !has_server_docs && !has_server_attachments
        {
            return Ok("No changes".to_owned());
        }

        if has_server_docs {
            self.pull_documents().await?;
        }

        // A pull can leave merged files dirty on purpose; rescan rather
        // than trusting the pre-pull gate.
        let files = self.vault.list_files().await?;
        if self.has_local_doc_changes(&files) {
            self.push_documents().await?;
        }

        if self.settings.sync_attachments && (has_local_attachments || has_server_attachments) {
            self.pull_attachment_cursor().await?;
            self.push_attachments().await?;
        }

        self.persist_cache()?;
        // Housekeeping: drop base entries nothing has touched in months.
        self.base_store
            .cleanup(crate::base_store::DEFAULT_MAX_AGE)
            .await;
        Ok(format!(
            "Synced: {} pulled, {} pushed, {} attachments, {} conflicts, {} errors",
            self.stats.pulled,
            self.stats.pushed,
            self.stats.attachments_pushed,
            self.stats.conflicts,
            self.stats.errors
        ))
    }

    fn has_local_doc_changes(&self, files: &[VaultFile]) -> bool {
        let dirty = files
            .iter()
            .filter(|f| is_document_path(&f.path))
            .any(|f| {
                self.metadata
                    .doc(&f.path)
                    .map_or(true, |m| m.last_modified < f.mtime)
            });
        if dirty {
            return true;
        }
        // Deletions: tracked paths that vanished from disk.
        self.metadata
            .doc_paths()
            .iter()
            .any(|path| !files.iter().any(|f| &f.path == path))
    }

    fn has_local_attachment_changes(&self, files: &[VaultFile]) -> bool {
        files
            .iter()
            .filter(|f| is_attachment_path(&f.path))
            .any(|f| match self.metadata.attachment(&f.path) {
                None => true,
                Some(m) => m.last_modified < f.mtime || m.attachment_id.is_empty(),
            })
    }

    /// Write the metadata maps and cursors through to the settings file.
    pub(crate) fn persist_cache(&mut self) -> Result<(), SettingsError> {
        self.metadata.export(&mut self.settings);
        self.settings_store.save(&self.settings)
    }

    /// Drop all client-side sync state (metadata, cursors, base content),
    /// preserving local files. The next run re-syncs against the server
    /// from scratch.
    pub async fn reset(&mut self) -> Result<(), SyncError> {
        warn!("resetting client sync state");
        self.metadata.clear_all();
        self.settings.last_seq = 0;
        self.settings.last_attachment_seq = 0;
        self.base_store.clear().await;
        self.persist_cache()?;
        self.observer.on_reset();
        Ok(())
    }
}
