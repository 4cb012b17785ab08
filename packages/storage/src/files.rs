//! Filesystem-like storage of named text files.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::StorageError;

/// Top-level folder a file is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Directory {
    /// Durable application data.
    Data,
    /// Data the platform may reclaim.
    Cache,
}

impl Directory {
    /// Folder name on disk.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Cache => "cache",
        }
    }
}

/// Async read/write of text files addressed by relative path.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `data` to `path` inside `directory`, replacing any existing
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    async fn write_file(
        &self,
        path: &str,
        data: &str,
        directory: Directory,
    ) -> Result<(), StorageError>;

    /// Reads the file at `path` inside `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist, or
    /// another [`StorageError`] if the read fails.
    async fn read_file(&self, path: &str, directory: Directory) -> Result<String, StorageError>;
}

/// [`FileStore`] rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    /// Creates a store whose [`Directory`] folders live under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str, directory: Directory) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("refusing non-relative storage path {path:?}"),
            )
            .into());
        }

        Ok(self.root.join(directory.as_str()).join(relative))
    }
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn write_file(
        &self,
        path: &str,
        data: &str,
        directory: Directory,
    ) -> Result<(), StorageError> {
        let full = self.resolve(path, directory)?;
        if let Some(parent) = full.parent() {
            crate::paths::ensure_dir(parent).await?;
        }
        tokio::fs::write(&full, data).await?;
        Ok(())
    }

    async fn read_file(&self, path: &str, directory: Directory) -> Result<String, StorageError> {
        let full = self.resolve(path, directory)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Volatile [`FileStore`] backed by a map.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<BTreeMap<(Directory, String), String>>,
}

impl MemoryFileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    /// Whether the store holds no files.
    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn write_file(
        &self,
        path: &str,
        data: &str,
        directory: Directory,
    ) -> Result<(), StorageError> {
        self.files
            .lock()
            .await
            .insert((directory, path.to_string()), data.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &str, directory: Directory) -> Result<String, StorageError> {
        self.files
            .lock()
            .await
            .get(&(directory, path.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }
}
