//! Path normalization and validation shared by both sides of the wire.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static TRAVERSAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\.|/\.\.|\\\.\.").expect("traversal regex"));

/// A document id is the vault-relative file path with any `.md` suffix
/// stripped and backslash separators normalized to `/`.
pub fn doc_id_from_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    normalized
        .strip_suffix(".md")
        .map_or(normalized.clone(), str::to_owned)
}

/// Extension of `path` including the leading dot, or empty when there is
/// none.
pub fn file_ext(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(i) if i > 0 => &name[i..],
        _ => "",
    }
}

/// `id = vaultId ":" hash ext`
pub fn attachment_id(vault_id: &str, hash: &str, ext: &str) -> String {
    format!("{vault_id}:{hash}{ext}")
}

/// `objectKey = vaultId "/" hash ext`
pub fn attachment_object_key(vault_id: &str, hash: &str, ext: &str) -> String {
    format!("{vault_id}/{hash}{ext}")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path is absolute")]
    Absolute,
    #[error("path contains a parent-directory component")]
    Traversal,
    #[error("path contains a NUL byte")]
    Nul,
}

/// Reject attachment paths that could escape the vault: empty paths,
/// absolute paths, anything carrying `..` or NUL.
pub fn validate_attachment_path(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(PathError::Absolute);
    }
    if path.contains('\0') {
        return Err(PathError::Nul);
    }
    if path.contains("..") || TRAVERSAL_RE.is_match(path) {
        return Err(PathError::Traversal);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_strips_md_suffix() {
        assert_eq!(doc_id_from_path("notes/todo.md"), "notes/todo");
        assert_eq!(doc_id_from_path("notes/todo.txt"), "notes/todo.txt");
        assert_eq!(doc_id_from_path("todo.md"), "todo");
    }

    #[test]
    fn doc_id_normalizes_separators() {
        assert_eq!(doc_id_from_path("notes\\deep\\todo.md"), "notes/deep/todo");
    }

    #[test]
    fn ext_includes_dot() {
        assert_eq!(file_ext("assets/photo.png"), ".png");
        assert_eq!(file_ext("archive.tar.gz"), ".gz");
        assert_eq!(file_ext("README"), "");
        assert_eq!(file_ext(".hidden"), "");
    }

    #[test]
    fn attachment_keys() {
        assert_eq!(attachment_id("v1", "abc", ".png"), "v1:abc.png");
        assert_eq!(attachment_object_key("v1", "abc", ".png"), "v1/abc.png");
    }

    #[test]
    fn valid_paths_pass() {
        assert_eq!(validate_attachment_path("assets/photo.png"), Ok(()));
        assert_eq!(validate_attachment_path("a.png"), Ok(()));
        assert_eq!(validate_attachment_path("deep/nested/dir/f.webp"), Ok(()));
    }

    #[test]
    fn traversal_paths_rejected() {
        assert_eq!(validate_attachment_path(""), Err(PathError::Empty));
        assert_eq!(validate_attachment_path("/abs"), Err(PathError::Absolute));
        assert_eq!(validate_attachment_path("\\abs"), Err(PathError::Absolute));
        assert_eq!(
            validate_attachment_path("../escape"),
            Err(PathError::Traversal)
        );
        assert_eq!(
            validate_attachment_path("a/../b"),
            Err(PathError::Traversal)
        );
        assert_eq!(
            validate_attachment_path("a\\..\\b"),
            Err(PathError::Traversal)
        );
        assert_eq!(validate_attachment_path("a\0b"), Err(PathError::Nul));
    }
}
