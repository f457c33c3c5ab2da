// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Local filesystem storage backend.
//!
//! Keys map to paths below the root directory, one path segment per key
//! segment:
//! ```text
//! root/
//! ├── user_model/
//! │   ├── 1.0.0
//! │   └── 1.1.4-alpha
//! └── price_model/
//!     └── 0.2.1-rc1
//! ```
//! Writes go to a hidden temp file in the target directory and are renamed
//! into place, so readers never see a partial object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use super::{validate_key, StorageBackend, StorageError};

const BACKEND: &str = "local";
const TEMP_SUFFIX: &str = ".tmp";

/// Stores each key as a file below `root`.
#[derive(Debug, Clone)]
pub struct LocalFilesystemBackend {
    root: PathBuf,
    label: &'static str,
}

impl LocalFilesystemBackend {
    /// Open a backend rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::unavailable(BACKEND, format!("cannot create {}: {}", root.display(), e))
        })?;
        debug!(root = %root.display(), "Initialized local backend");
        Ok(Self { root, label: BACKEND })
    }

    /// Wrap an existing directory without touching the filesystem.
    pub(crate) fn at(root: PathBuf, label: &'static str) -> Self {
        Self { root, label }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        let mut path = self.root.clone();
        path.extend(key.split('/'));
        Ok(path)
    }

    fn io_err(&self, key: &str, err: std::io::Error) -> StorageError {
        StorageError::from_io(self.label, key, err)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}{}", file_name, uuid::Uuid::new_v4(), TEMP_SUFFIX))
    }

    fn is_temp_file(name: &str) -> bool {
        name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
    }

    async fn write_atomic(&self, key: &str, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::unavailable(self.label, format!("{}: {}", key, e))
            })?;
        }

        let temp = TempFile::new(Self::temp_path(path));
        let result = async {
            let mut file = fs::File::create(temp.path()).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(temp.path(), path).await
        }
        .await;

        match result {
            Ok(()) => {
                temp.keep();
                Ok(())
            }
            Err(e) => Err(StorageError::unavailable(self.label, format!("{}: {}", key, e))),
        }
    }
}

/// Temp file of an in-flight write. Removed on drop unless kept, so a
/// failed write or one cancelled by a timeout leaves nothing behind.
struct TempFile {
    path: PathBuf,
    keep: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file was renamed into place; nothing to clean up.
    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl StorageBackend for LocalFilesystemBackend {
    async fn write(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        trace!(path = %path.display(), size = data.len(), "Writing object");
        self.write_atomic(key, &path, &data).await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(key)?;
        trace!(path = %path.display(), "Reading object");
        fs::read(&path).await.map_err(|e| self.io_err(key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_err(key, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        trace!(path = %path.display(), "Deleting object");
        fs::remove_file(&path).await.map_err(|e| self.io_err(key, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                StorageError::unavailable(self.label, format!("{}: {}", dir.display(), e))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::unavailable(self.label, format!("{}: {}", dir.display(), e))
            })? {
                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(ft) => ft,
                    Err(_) => continue,
                };
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }

                let name = entry.file_name();
                if Self::is_temp_file(&name.to_string_lossy()) {
                    continue;
                }

                let Ok(rel) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn kind(&self) -> &'static str {
        self.label
    }
}
