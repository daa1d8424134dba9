//! Document pull and push.
//!
//! Pull walks the change feed in seq order and reconciles each change
//! against the local file, merging through the saved base content when both
//! sides moved. Push gathers dirty files and deletions into one bulk call
//! and interprets each result, including server-side merges and conflicts.
//!
//! Cursor discipline: `last_seq` advances only past changes that were
//! applied or actively resolved. Cancel and per-file failures stop the pull
//! phase with the cursor parked before the offending change.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use common::merge::{compute_common_base, three_way_merge, MergeOutcome};
use common::paths::doc_id_from_path;
use common::protocol::{BulkDocInput, BulkDocResult, DocBody};

use crate::conflict::{ConflictRequest, Resolution};
use crate::settings::DocMetadata;

use super::{path_for_doc_id, ChangeOutcome, SyncError, SyncPhase, SyncService};

const PULL_BATCH: i64 = 100;

impl SyncService {
    /// Drain the document change feed from the saved cursor.
    pub(crate) async fn pull_documents(&mut self) -> Result<(), SyncError> {
        loop {
            let batch = self
                .api
                .changes(self.settings.last_seq, PULL_BATCH)
                .await?;
            if batch.results.is_empty() {
                break;
            }
            let total = batch.results.len();

            for (i, change) in batch.results.iter().enumerate() {
                self.observer
                    .on_progress(SyncPhase::PullDocuments, i + 1, total);

                let path = path_for_doc_id(&change.id);
                let outcome = if change.deleted == Some(true) {
                    self.apply_remote_delete(&path).await?
                } else {
                    match self.api.get_doc(&change.id).await? {
                        // A vanished document is nothing to apply.
                        None => ChangeOutcome::Applied,
                        // Tombstoned between the feed read and the fetch.
                        Some(doc) if doc.deleted == Some(true) => {
                            self.apply_remote_delete(&path).await?
                        }
                        Some(doc) => self.apply_remote_doc(&path, &doc, false).await?,
                    }
                };

                match outcome {
                    ChangeOutcome::Applied => {
                        self.settings.last_seq = change.seq;
                        self.stats.pulled += 1;
                    }
                    ChangeOutcome::Cancelled => {
                        debug!(seq = change.seq, "pull cancelled at conflict");
                        self.persist_cache()?;
                        return Ok(());
                    }
                    ChangeOutcome::Failed => {
                        // Cursor stays parked before this change; the rest
                        // of the run continues.
                        self.persist_cache()?;
                        return Ok(());
                    }
                    ChangeOutcome::ResetRequested => {
                        self.reset().await?;
                        return Err(SyncError::ResetRequested);
                    }
                }
            }

            self.persist_cache()?;
            if (total as i64) < PULL_BATCH {
                break;
            }
        }
        Ok(())
    }

    /// A remote tombstone: delete locally when the file is untouched since
    /// its last sync, otherwise this is a delete-vs-edit conflict.
    async fn apply_remote_delete(&mut self, path: &str) -> Result<ChangeOutcome, SyncError> {
        let Some(disk_mtime) = self.vault.mtime(path).await? else {
            self.metadata.remove_doc(path);
            self.base_store.delete(path).await;
            return Ok(ChangeOutcome::Applied);
        };

        let recorded = self.metadata.doc(path).map(|m| m.last_modified);
        if recorded.is_some_and(|recorded| disk_mtime <= recorded) {
            self.vault.delete(path).await?;
            self.metadata.remove_doc(path);
            self.base_store.delete(path).await;
            return Ok(ChangeOutcome::Applied);
        }

        self.stats.conflicts += 1;
        let local_content = self.vault.read_text(path).await?;
        let resolution = self
            .prompt
            .resolve(ConflictRequest {
                path: path.to_owned(),
                local_content,
                remote_content: None,
                remote_deleted: true,
                merge_conflicts: None,
                requires_full_sync: false,
            })
            .await;

        match resolution {
            Resolution::UseRemote => {
                self.vault.delete(path).await?;
                self.metadata.remove_doc(path);
                self.base_store.delete(path).await;
                Ok(ChangeOutcome::Applied)
            }
            Resolution::UseLocal => {
                // Forget the tracking state: the file now looks new and the
                // push phase re-creates it on the server.
                self.metadata.remove_doc(path);
                self.base_store.delete(path).await;
                Ok(ChangeOutcome::Applied)
            }
            Resolution::Cancel => Ok(ChangeOutcome::Cancelled),
            Resolution::FullReset => Ok(ChangeOutcome::ResetRequested),
        }
    }

    /// Reconcile one remote document body against the local file.
    ///
    /// `force_overwrite` skips the local-modification check; the push phase
    /// uses it when adopting a server-side merge for a file that has not
    /// changed since the push snapshot.
    pub(crate) async fn apply_remote_doc(
        &mut self,
        path: &str,
        doc: &DocBody,
        force_overwrite: bool,
    ) -> Result<ChangeOutcome, SyncError> {
        let Some(remote_content) = doc.content.clone() else {
            // Never write a missing body over a real file.
            warn!(path, rev = %doc.rev, "remote document has no content, skipping");
            self.stats.errors += 1;
            return Ok(ChangeOutcome::Failed);
        };

        let meta = self.metadata.doc(path).cloned();
        let Some(local_content) = self.vault.read_text(path).await? else {
            self.vault.write_text(path, &remote_content).await?;
            let mtime = self.vault.mtime(path).await?.unwrap_or(0);
            self.metadata.set_doc(DocMetadata {
                path: path.to_owned(),
                rev: doc.rev.clone(),
                last_modified: mtime,
            });
            self.base_store.set(path, &remote_content).await;
            return Ok(ChangeOutcome::Applied);
        };

        if !force_overwrite {
            if let Some(m) = &meta {
                if m.rev == doc.rev {
                    return Ok(ChangeOutcome::Applied);
                }
            }
        }

        let disk_mtime = self.vault.mtime(path).await?.unwrap_or(0);
        let locally_modified = meta
            .as_ref()
            .map_or(true, |m| disk_mtime > m.last_modified);

        if force_overwrite || !locally_modified {
            self.vault.write_text(path, &remote_content).await?;
            let mtime = self.vault.mtime(path).await?.unwrap_or(0);
            self.metadata.set_doc(DocMetadata {
                path: path.to_owned(),
                rev: doc.rev.clone(),
                last_modified: mtime,
            });
            self.base_store.set(path, &remote_content).await;
            return Ok(ChangeOutcome::Applied);
        }

        // Both sides moved: merge through the saved base, or a computed
        // one when this path was never synced here.
        let base = match self.base_store.get(path).await {
            Some(base) => base,
            None => compute_common_base(&local_content, &remote_content),
        };

        match three_way_merge(&base, &local_content, &remote_content) {
            Ok(MergeOutcome::Merged(merged)) => {
                self.vault.write_text(path, &merged).await?;
                // Base moves to the remote body so the next push carries
                // exactly the local delta; lastModified stays behind the
                // disk mtime so the push phase still sees the file dirty.
                self.base_store.set(path, &remote_content).await;
                let last_modified = meta.as_ref().map_or(0, |m| m.last_modified);
                self.metadata.set_doc(DocMetadata {
                    path: path.to_owned(),
                    rev: doc.rev.clone(),
                    last_modified,
                });
                debug!(path, "pull merged local and remote edits");
                Ok(ChangeOutcome::Applied)
            }
            Ok(MergeOutcome::Conflicts(regions)) => {
                self.prompt_pull_conflict(path, local_content, doc, Some(regions))
                    .await
            }
            Err(e) => {
                warn!(path, error = %e, "merge limits exceeded, treating as conflict");
                self.prompt_pull_conflict(path, local_content, doc, None)
                    .await
            }
        }
    }

    async fn prompt_pull_conflict(
        &mut self,
        path: &str,
        local_content: String,
        doc: &DocBody,
        regions: Option<Vec<common::ConflictRegion>>,
    ) -> Result<ChangeOutcome, SyncError> {
        self.stats.conflicts += 1;
        let resolution = self
            .prompt
            .resolve(ConflictRequest {
                path: path.to_owned(),
                local_content: Some(local_content),
                remote_content: doc.content.clone(),
                remote_deleted: false,
                merge_conflicts: regions,
                requires_full_sync: false,
            })
            .await;

        match resolution {
            Resolution::UseLocal => {
                // Keep the file; record the server's rev so the push phase
                // lands as a plain update over it.
                let last_modified = self.metadata.doc(path).map_or(0, |m| m.last_modified);
                self.metadata.set_doc(DocMetadata {
                    path: path.to_owned(),
                    rev: doc.rev.clone(),
                    last_modified,
                });
                Ok(ChangeOutcome::Applied)
            }
            Resolution::UseRemote => {
                let remote_content = doc.content.clone().unwrap_or_default();
                self.vault.write_text(path, &remote_content).await?;
                let mtime = self.vault.mtime(path).await?.unwrap_or(0);
                self.metadata.set_doc(DocMetadata {
                    path: path.to_owned(),
                    rev: doc.rev.clone(),
                    last_modified: mtime,
                });
                self.base_store.set(path, &remote_content).await;
                Ok(ChangeOutcome::Applied)
            }
            Resolution::Cancel => Ok(ChangeOutcome::Cancelled),
            Resolution::FullReset => Ok(ChangeOutcome::ResetRequested),
        }
    }

    /// Gather dirty files plus deletion records and send one bulk call.
    pub(crate) async fn push_documents(&mut self) -> Result<(), SyncError> {
        let files = self.vault.list_files().await?;

        let mut inputs: Vec<BulkDocInput> = Vec::new();
        let mut push_paths: Vec<String> = Vec::new();
        let mut push_time_mtimes: HashMap<String, i64> = HashMap::new();

        for file in files.iter().filter(|f| super::is_document_path(&f.path)) {
            let meta = self.metadata.doc(&file.path).cloned();
            // Cheap gate on the scan mtime first.
            if meta
                .as_ref()
                .is_some_and(|m| m.last_modified >= file.mtime)
            {
                continue;
            }
            // Confirm against an accurate disk mtime before sending.
            let Some(mtime) = self.vault.mtime(&file.path).await? else {
                continue;
            };
            if meta.as_ref().is_some_and(|m| m.last_modified >= mtime) {
                continue;
            }
            let Some(content) = self.vault.read_text(&file.path).await? else {
                continue;
            };

            let base_content = self.base_store.get(&file.path).await;
            push_time_mtimes.insert(file.path.clone(), mtime);
            push_paths.push(file.path.clone());
            inputs.push(BulkDocInput {
                id: doc_id_from_path(&file.path),
                rev: meta.map(|m| m.rev),
                content: Some(content),
                deleted: None,
                base_content,
            });
        }

        // Tracked paths that vanished from disk become deletion records.
        let on_disk: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
        for path in self.metadata.doc_paths() {
            if !on_disk.contains(path.as_str()) {
                if let Some(meta) = self.metadata.doc(&path).cloned() {
                    push_paths.push(path.clone());
                    inputs.push(BulkDocInput {
                        id: doc_id_from_path(&path),
                        rev: Some(meta.rev),
                        deleted: Some(true),
                        ..Default::default()
                    });
                }
            }
        }

        if inputs.is_empty() {
            return Ok(());
        }

        let results = self.api.bulk_docs(&inputs).await?;
        if results.len() != inputs.len() {
            warn!(
                sent = inputs.len(),
                received = results.len(),
                "bulk response entry count mismatch"
            );
        }
        let total = results.len();

        for (i, (result, (input, path))) in results
            .iter()
            .zip(inputs.iter().zip(push_paths.iter()))
            .enumerate()
        {
            self.observer
                .on_progress(SyncPhase::PushDocuments, i + 1, total);
            self.handle_push_result(path, input, result, &push_time_mtimes)
                .await?;
        }

        self.persist_cache()?;
        Ok(())
    }

    async fn handle_push_result(
        &mut self,
        path: &str,
        input: &BulkDocInput,
        result: &BulkDocResult,
        push_time_mtimes: &HashMap<String, i64>,
    ) -> Result<(), SyncError> {
        if result.ok == Some(true) {
            let Some(rev) = result.rev.clone() else {
                self.stats.errors += 1;
                warn!(path, "ok result without a rev");
                return Ok(());
            };

            if input.deleted == Some(true) {
                self.metadata.remove_doc(path);
                self.base_store.delete(path).await;
                self.stats.pushed += 1;
                return Ok(());
            }

            if result.merged == Some(true) {
                // The server combined our edit with a newer revision;
                // adopt its body. Skip the local-modification check only
                // if the file is untouched since the push snapshot.
                if let Some(doc) = self.api.get_doc(&input.id).await? {
                    let unchanged_since_push = match self.vault.mtime(path).await? {
                        Some(now) => push_time_mtimes
                            .get(path)
                            .is_some_and(|snapshot| now <= *snapshot),
                        None => false,
                    };
                    match self.apply_remote_doc(path, &doc, unchanged_since_push).await? {
                        ChangeOutcome::ResetRequested => {
                            self.reset().await?;
                            return Err(SyncError::ResetRequested);
                        }
                        ChangeOutcome::Applied
                        | ChangeOutcome::Cancelled
                        | ChangeOutcome::Failed => {}
                    }
                }
                self.stats.pushed += 1;
                return Ok(());
            }

            let mtime = self.vault.mtime(path).await?.unwrap_or(0);
            self.metadata.set_doc(DocMetadata {
                path: path.to_owned(),
                rev,
                last_modified: mtime,
            });
            if let Some(content) = &input.content {
                self.base_store.set(path, content).await;
            }
            self.stats.pushed += 1;
            return Ok(());
        }

        if result.is_conflict() {
            return self.handle_push_conflict(path, input, result).await;
        }

        self.stats.errors += 1;
        warn!(
            path,
            error = result.error.as_deref().unwrap_or("unknown"),
            reason = result.reason.as_deref().unwrap_or(""),
            "push rejected"
        );
        Ok(())
    }

    async fn handle_push_conflict(
        &mut self,
        path: &str,
        input: &BulkDocInput,
        result: &BulkDocResult,
    ) -> Result<(), SyncError> {
        self.stats.conflicts += 1;
        let requires_full_sync = result.requires_full_sync == Some(true)
            || result.reason.as_deref() == Some("base_revision_not_found");

        let resolution = self
            .prompt
            .resolve(ConflictRequest {
                path: path.to_owned(),
                local_content: input.content.clone(),
                remote_content: result.current_content.clone(),
                remote_deleted: result.current_deleted == Some(true),
                merge_conflicts: result.conflicts.clone(),
                requires_full_sync,
            })
            .await;

        match resolution {
            Resolution::UseLocal => {
                let Some(content) = &input.content else {
                    return Ok(());
                };
                // Force push: carry the server's current rev.
                match self
                    .api
                    .put_doc(&input.id, result.current_rev.as_deref(), content)
                    .await
                {
                    Ok(response) => {
                        let mtime = self.vault.mtime(path).await?.unwrap_or(0);
                        self.metadata.set_doc(DocMetadata {
                            path: path.to_owned(),
                            rev: response.rev,
                            last_modified: mtime,
                        });
                        self.base_store.set(path, content).await;
                        self.stats.pushed += 1;
                    }
                    Err(e) => {
                        self.stats.errors += 1;
                        warn!(path, error = %e, "force push failed");
                    }
                }
            }
            Resolution::UseRemote => {
                if result.current_deleted == Some(true) {
                    self.vault.delete(path).await?;
                    self.metadata.remove_doc(path);
                    self.base_store.delete(path).await;
                } else if let Some(remote) = &result.current_content {
                    self.vault.write_text(path, remote).await?;
                    let mtime = self.vault.mtime(path).await?.unwrap_or(0);
                    if let Some(rev) = &result.current_rev {
                        self.metadata.set_doc(DocMetadata {
                            path: path.to_owned(),
                            rev: rev.clone(),
                            last_modified: mtime,
                        });
                    }
                    self.base_store.set(path, remote).await;
                }
            }
            Resolution::Cancel => {}
            Resolution::FullReset => {
                self.reset().await?;
                return Err(SyncError::ResetRequested);
            }
        }
        Ok(())
    }
}
