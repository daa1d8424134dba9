//! The editor/filesystem port.
//!
//! The sync driver never touches the disk directly; it goes through this
//! trait so a host editor can supply its own file layer. `FsVault` backs
//! the CLI with a plain directory, `MemoryVault` backs tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

/// A file the vault knows about, with its modification time in millis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultFile {
    pub path: String,
    pub mtime: i64,
}

#[async_trait]
pub trait Vault: Send + Sync {
    /// Every file in the vault, recursively, with vault-relative paths
    /// using `/` separators.
    async fn list_files(&self) -> std::io::Result<Vec<VaultFile>>;

    /// `None` when the file does not exist.
    async fn read_text(&self, path: &str) -> std::io::Result<Option<String>>;

    async fn read_bytes(&self, path: &str) -> std::io::Result<Option<Vec<u8>>>;

    /// Write, materializing any missing parent directories.
    async fn write_text(&self, path: &str, content: &str) -> std::io::Result<()>;

    /// Remove a file. Hosts with a trash concept may move instead of
    /// deleting.
    async fn delete(&self, path: &str) -> std::io::Result<()>;

    /// Current mtime in millis, `None` when the file does not exist.
    async fn mtime(&self, path: &str) -> std::io::Result<Option<i64>>;
}

/// A vault rooted at a plain directory.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn walk(dir: &Path, root: &Path, out: &mut Vec<VaultFile>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                // Hidden directories (e.g. .obsidian, .git) are host
                // territory, not synced content.
                if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'))
                {
                    continue;
                }
                Self::walk(&path, root, out)?;
            } else if file_type.is_file() {
                let rel = path
                    .strip_prefix(root)
                    .map_err(|_| std::io::Error::other("path escaped vault root"))?;
                let mtime = mtime_millis(&entry.metadata()?);
                out.push(VaultFile {
                    path: rel.to_string_lossy().replace('\\', "/"),
                    mtime,
                });
            }
        }
        Ok(())
    }
}

fn mtime_millis(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis() as i64)
}

#[async_trait]
impl Vault for FsVault {
    async fn list_files(&self) -> std::io::Result<Vec<VaultFile>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            if root.exists() {
                FsVault::walk(&root, &root, &mut out)?;
            }
            out.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(out)
        })
        .await
        .map_err(std::io::Error::other)?
    }

    async fn read_text(&self, path: &str) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.full_path(path)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_bytes(&self, path: &str) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.full_path(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write_text(&self, path: &str, content: &str) -> std::io::Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, content).await
    }

    async fn delete(&self, path: &str) -> std::io::Result<()> {
        match tokio::fs::remove_file(self.full_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn mtime(&self, path: &str) -> std::io::Result<Option<i64>> {
        match tokio::fs::metadata(self.full_path(path)).await {
            Ok(metadata) => Ok(Some(mtime_millis(&metadata))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory vault with controllable mtimes, for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    files: Arc<Mutex<BTreeMap<String, (Vec<u8>, i64)>>>,
    clock: Arc<Mutex<i64>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> i64 {
        let mut clock = self.clock.lock();
        *clock += 1;
        *clock
    }

    /// Insert a file with the next clock tick as its mtime.
    pub fn seed(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        let mtime = self.tick();
        self.files
            .lock()
            .insert(path.to_owned(), (bytes.into(), mtime));
    }

    /// Touch a file, bumping only its mtime.
    pub fn touch(&self, path: &str) {
        let mtime = self.tick();
        if let Some(entry) = self.files.lock().get_mut(path) {
            entry.1 = mtime;
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().contains_key(path)
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn list_files(&self) -> std::io::Result<Vec<VaultFile>> {
        Ok(self
            .files
            .lock()
            .iter()
            .map(|(path, (_, mtime))| VaultFile {
                path: path.clone(),
                mtime: *mtime,
            })
            .collect())
    }

    async fn read_text(&self, path: &str) -> std::io::Result<Option<String>> {
        Ok(self.files.lock().get(path).map(|(bytes, _)| {
            String::from_utf8_lossy(bytes).into_owned()
        }))
    }

    async fn read_bytes(&self, path: &str) -> std::io::Result<Option<Vec<u8>>> {
        Ok(self.files.lock().get(path).map(|(bytes, _)| bytes.clone()))
    }

    async fn write_text(&self, path: &str, content: &str) -> std::io::Result<()> {
        let mtime = self.tick();
        self.files
            .lock()
            .insert(path.to_owned(), (content.as_bytes().to_vec(), mtime));
        Ok(())
    }

    async fn delete(&self, path: &str) -> std::io::Result<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    async fn mtime(&self, path: &str) -> std::io::Result<Option<i64>> {
        Ok(self.files.lock().get(path).map(|(_, mtime)| *mtime))
    }
}
