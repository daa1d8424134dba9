//! Attachment endpoints: content-addressed upload, metadata, bytes, soft
//! delete, and the attachment change feed.

pub mod changes;
pub mod content;
pub mod delete_attachment;
pub mod get_meta;
pub mod upload;

/// Upload hard cap.
pub const MAX_ATTACHMENT_BYTES: usize = 100 * 1024 * 1024;

pub const X_CONTENT_HASH: &str = "x-content-hash";
pub const X_CONTENT_LENGTH: &str = "x-content-length";
pub const X_ATTACHMENT_HASH: &str = "x-attachment-hash";

/// Every by-id route is scoped to the caller's vault: the id must carry the
/// `vault_id:` prefix or the request is refused.
pub(crate) fn id_belongs_to_vault(id: &str, vault_id: &str) -> bool {
    id.len() > vault_id.len() + 1
        && id.as_bytes()[vault_id.len()] == b':'
        && id.starts_with(vault_id)
}
