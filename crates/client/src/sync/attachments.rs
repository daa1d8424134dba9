//! Attachment push and cursor handling.
//!
//! Attachments are upload-only: once stored, documents reference them by
//! URL, so the pull side just drains the feed to advance the cursor. After
//! a successful upload every wiki-link pointing at the file is rewritten to
//! the server URL and the local copy is removed.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use tracing::warn;

use common::protocol::UploadResponse;

use crate::vault::VaultFile;

use super::{is_attachment_path, SyncError, SyncPhase, SyncService};

const FEED_BATCH: i64 = 100;

/// Concurrent uploads per batch.
const UPLOAD_PARALLELISM: usize = 3;

/// `![[target]]` or `![[target|alias]]`.
static WIKI_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").expect("wiki link regex"));

impl SyncService {
    /// Advance the attachment cursor over the feed. Bytes are not
    /// downloaded; uploaded attachments live behind URLs.
    pub(crate) async fn pull_attachment_cursor(&mut self) -> Result<(), SyncError> {
        loop {
            let batch = self
                .api
                .attachment_changes(self.settings.last_attachment_seq, FEED_BATCH)
                .await?;
            if batch.results.is_empty() {
                break;
            }
            self.settings.last_attachment_seq = batch.last_seq;
            if (batch.results.len() as i64) < FEED_BATCH {
                break;
            }
        }
        self.persist_cache()?;
        Ok(())
    }

    /// Upload new and modified attachments in bounded-parallel batches,
    /// then rewrite links and drop the local copies. Everything here is
    /// best-effort per file.
    pub(crate) async fn push_attachments(&mut self) -> Result<(), SyncError> {
        let files = self.vault.list_files().await?;
        let candidates: Vec<VaultFile> = files
            .into_iter()
            .filter(|f| is_attachment_path(&f.path))
            .filter(|f| match self.metadata.attachment(&f.path) {
                None => true,
                Some(m) => m.last_modified < f.mtime || m.attachment_id.is_empty(),
            })
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }

        let total = candidates.len();
        let mut done = 0usize;
        let mut uploaded: Vec<(String, UploadResponse)> = Vec::new();

        for chunk in candidates.chunks(UPLOAD_PARALLELISM) {
            let batch = futures::future::join_all(chunk.iter().map(|f| self.upload_one(f))).await;
            for outcome in batch {
                done += 1;
                self.observer
                    .on_progress(SyncPhase::PushAttachments, done, total);
                match outcome {
                    Ok(pair) => uploaded.push(pair),
                    Err((path, message)) => {
                        self.stats.errors += 1;
                        warn!(path, error = %message, "attachment upload failed");
                    }
                }
            }
        }

        for (path, response) in &uploaded {
            let url = self.api.attachment_url(&response.id);
            if let Err(e) = self.rewrite_wiki_links(path, &url).await {
                self.stats.errors += 1;
                warn!(path, error = %e, "wiki-link rewrite failed");
                continue;
            }
            if let Err(e) = self.vault.delete(path).await {
                self.stats.errors += 1;
                warn!(path, error = %e, "removing uploaded attachment failed");
                continue;
            }
            self.metadata.remove_attachment(path);
            self.stats.attachments_pushed += 1;
        }

        self.persist_cache()?;
        Ok(())
    }

    async fn upload_one(
        &self,
        file: &VaultFile,
    ) -> Result<(String, UploadResponse), (String, String)> {
        let fail = |message: String| (file.path.clone(), message);

        let bytes = self
            .vault
            .read_bytes(&file.path)
            .await
            .map_err(|e| fail(e.to_string()))?
            .ok_or_else(|| fail("file disappeared before upload".to_owned()))?;
        let hash = hex::encode(Sha256::digest(&bytes));

        // Identical bytes already uploaded: reuse the stored id and URL.
        if let Some(meta) = self.metadata.attachment(&file.path) {
            if meta.hash == hash && !meta.attachment_id.is_empty() {
                return Ok((
                    file.path.clone(),
                    UploadResponse {
                        ok: true,
                        id: meta.attachment_id.clone(),
                        hash,
                        size: meta.size,
                        content_type: meta.content_type.clone(),
                        unchanged: Some(true),
                    },
                ));
            }
        }

        let content_type = mime_guess::from_path(&file.path)
            .first_or_octet_stream()
            .to_string();
        let response = self
            .api
            .upload_attachment(&file.path, &content_type, &hash, bytes)
            .await
            .map_err(|e| fail(e.to_string()))?;
        Ok((file.path.clone(), response))
    }

    /// Replace `![[path]]` / `![[path|alias]]` embeds of the uploaded file
    /// with standard markdown links to the server URL.
    async fn rewrite_wiki_links(&self, attachment_path: &str, url: &str) -> std::io::Result<()> {
        let file_name = attachment_path
            .rsplit('/')
            .next()
            .unwrap_or(attachment_path);

        let files = self.vault.list_files().await?;
        for file in files.iter().filter(|f| f.path.ends_with(".md")) {
            let Some(content) = self.vault.read_text(&file.path).await? else {
                continue;
            };
            if !content.contains("![[") {
                continue;
            }

            let rewritten = WIKI_LINK_RE.replace_all(&content, |caps: &Captures| {
                let target = caps[1].trim();
                if target != attachment_path && target != file_name {
                    return caps[0].to_owned();
                }
                match caps.get(2).map(|m| m.as_str().trim()) {
                    Some(alias) => format!("![{alias}|{target}]({url})"),
                    None => format!("![{target}]({url})"),
                }
            });

            if rewritten != content {
                self.vault.write_text(&file.path, &rewritten).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiki_link_regex_shapes() {
        let caps = WIKI_LINK_RE.captures("before ![[assets/a.png]] after").unwrap();
        assert_eq!(&caps[1], "assets/a.png");
        assert!(caps.get(2).is_none());

        let caps = WIKI_LINK_RE.captures("![[a.png|My Alt]]").unwrap();
        assert_eq!(&caps[1], "a.png");
        assert_eq!(&caps[2], "My Alt");

        assert!(WIKI_LINK_RE.captures("[[not-an-embed]]").is_none());
    }
}
