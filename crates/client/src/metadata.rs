//! In-memory metadata maps, the fast path over the persisted settings.

use std::collections::HashMap;

use crate::settings::{AttachmentMetadata, DocMetadata, Settings};

#[derive(Debug, Default, Clone)]
pub struct MetadataCache {
    docs: HashMap<String, DocMetadata>,
    attachments: HashMap<String, AttachmentMetadata>,
}

impl MetadataCache {
    /// Rehydrate from persisted settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            docs: settings.metadata_cache.clone(),
            attachments: settings.attachment_cache.clone(),
        }
    }

    /// Copy both maps back onto the settings for persistence.
    pub fn export(&self, settings: &mut Settings) {
        settings.metadata_cache = self.docs.clone();
        settings.attachment_cache = self.attachments.clone();
    }

    pub fn doc(&self, path: &str) -> Option<&DocMetadata> {
        self.docs.get(path)
    }

    pub fn set_doc(&mut self, meta: DocMetadata) {
        self.docs.insert(meta.path.clone(), meta);
    }

    pub fn remove_doc(&mut self, path: &str) -> Option<DocMetadata> {
        self.docs.remove(path)
    }

    pub fn doc_paths(&self) -> Vec<String> {
        self.docs.keys().cloned().collect()
    }

    pub fn attachment(&self, path: &str) -> Option<&AttachmentMetadata> {
        self.attachments.get(path)
    }

    pub fn set_attachment(&mut self, meta: AttachmentMetadata) {
        self.attachments.insert(meta.path.clone(), meta);
    }

    pub fn remove_attachment(&mut self, path: &str) -> Option<AttachmentMetadata> {
        self.attachments.remove(path)
    }

    pub fn clear_all(&mut self) {
        self.docs.clear();
        self.attachments.clear();
    }
}
