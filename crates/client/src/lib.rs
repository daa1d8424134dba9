//! Vaultsync client: pulls the server's change feed, reconciles it against
//! local files with three-way merges, pushes local edits in bulk, and keeps
//! attachments content-addressed on the server.
//!
//! The sync driver is host-agnostic: the filesystem and the conflict UI
//! enter through the [`vault::Vault`] and [`conflict::ConflictPrompt`]
//! ports, injected into [`sync::SyncService`] by the embedding application.

pub mod api;
pub mod base_store;
pub mod conflict;
pub mod metadata;
pub mod settings;
pub mod sync;
pub mod transport;
pub mod vault;

pub use api::{ApiClient, ApiError};
pub use base_store::BaseContentStore;
pub use conflict::{AlwaysResolve, ConflictPrompt, ConflictRequest, Resolution, ScriptedPrompt};
pub use settings::{Settings, SettingsStore};
pub use sync::{SyncObserver, SyncReport, SyncService, SyncStats, SyncStatus};
pub use transport::{RetryPolicy, Transport};
pub use vault::{FsVault, MemoryVault, Vault, VaultFile};
