// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Network filesystem backend (NFS/SMB mounts).
//!
//! Uses the same on-disk layout as the local backend, but treats the mount
//! point as an external collaborator: it is never created, it is probed
//! before every operation, and each operation runs under a timeout. A lost
//! mount or a hung server surfaces as [`StorageError::Unavailable`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::local::LocalFilesystemBackend;
use super::{StorageBackend, StorageError};

const BACKEND: &str = "network";

pub struct NetworkFilesystemBackend {
    inner: LocalFilesystemBackend,
    mount: PathBuf,
    timeout: Duration,
}

impl NetworkFilesystemBackend {
    /// Attach to an already-mounted share at `mount`.
    pub async fn connect(mount: impl Into<PathBuf>, timeout: Duration) -> Result<Self, StorageError> {
        let mount = mount.into();
        let backend = Self {
            inner: LocalFilesystemBackend::at(mount.clone(), BACKEND),
            mount,
            timeout,
        };
        backend.probe().await?;
        debug!(mount = %backend.mount.display(), timeout_ms = timeout.as_millis() as u64, "Attached network backend");
        Ok(backend)
    }

    pub fn mount(&self) -> &Path {
        &self.mount
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<(), StorageError> {
        let check = async {
            match fs::metadata(&self.mount).await {
                Ok(meta) if meta.is_dir() => Ok(()),
                Ok(_) => Err(StorageError::unavailable(
                    BACKEND,
                    format!("{} is not a directory", self.mount.display()),
                )),
                Err(e) => Err(StorageError::unavailable(
                    BACKEND,
                    format!("mount {} unreachable: {}", self.mount.display(), e),
                )),
            }
        };
        match tokio::time::timeout(self.timeout, check).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out("probe")),
        }
    }

    fn timed_out(&self, op: &str) -> StorageError {
        warn!(mount = %self.mount.display(), op, "Network storage operation timed out");
        StorageError::unavailable(
            BACKEND,
            format!("{} timed out after {}ms", op, self.timeout.as_millis()),
        )
    }

    async fn guarded<T, F>(&self, op: &str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        self.probe().await?;
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out(op)),
        }
    }
}

#[async_trait]
impl StorageBackend for NetworkFilesystemBackend {
    async fn write(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.guarded("write", self.inner.write(key, data)).await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.guarded("read", self.inner.read(key)).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.guarded("exists", self.inner.exists(key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.guarded("delete", self.inner.delete(key)).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.guarded("list", self.inner.list(prefix)).await
    }

    fn kind(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_mount_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            NetworkFilesystemBackend::connect(dir.path().join("not-mounted"), Duration::from_secs(1))
                .await;
        assert!(matches!(result, Err(StorageError::Unavailable { backend: "network", .. })));
        assert!(!dir.path().join("not-mounted").exists(), "mount point must not be created");
    }

    #[tokio::test]
    async fn test_roundtrip_on_mount() {
        let dir = tempfile::tempdir().unwrap();
        let backend = NetworkFilesystemBackend::connect(dir.path(), Duration::from_secs(5))
            .await
            .unwrap();

        backend.write("m/1.0.0", b"abc".to_vec()).await.unwrap();
        assert_eq!(backend.read("m/1.0.0").await.unwrap(), b"abc");
        assert_eq!(backend.list("").await.unwrap(), vec!["m/1.0.0".to_string()]);
        assert_eq!(backend.kind(), "network");
    }

    #[tokio::test]
    async fn test_lost_mount_is_unavailable_not_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let mount = dir.path().join("share");
        std::fs::create_dir(&mount).unwrap();
        let backend = NetworkFilesystemBackend::connect(&mount, Duration::from_secs(5))
            .await
            .unwrap();

        std::fs::remove_dir(&mount).unwrap();
        let result = backend.read("m/1.0.0").await;
        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
    }
}
