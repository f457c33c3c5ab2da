// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Storage backends for serialized model binaries.
//!
//! The [`StorageBackend`] trait is the single seam between the model store
//! and wherever bytes live. Every backend writes atomically per key: a
//! concurrent `read` observes either the previous object or the complete
//! new one.

mod key;
mod local;
mod network;
mod object;

pub mod http;

pub use http::HttpObjectStore;
pub use key::{validate_key, StorageKey};
pub use local::LocalFilesystemBackend;
pub use network::NetworkFilesystemBackend;
pub use object::{MemoryObjectStore, ObjectLocation, ObjectStorageBackend, ObjectStoreClient};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable ({backend}): {reason}")]
    Unavailable { backend: &'static str, reason: String },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    pub(crate) fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable { backend, reason: reason.into() }
    }

    /// Transient failures the caller may retry. The core never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Map an IO error for `key`: a missing file is a missing key,
    /// everything else is an availability problem.
    pub(crate) fn from_io(backend: &'static str, key: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::KeyNotFound(key.to_string()),
            _ => Self::unavailable(backend, format!("{}: {}", key, err)),
        }
    }
}

/// Uniform key/value interface over a binary blob store.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Write `data` under `key`, replacing any prior object atomically.
    async fn write(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Read the full object stored under `key`.
    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove `key`. Missing keys fail with [`StorageError::KeyNotFound`].
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, sorted ascending.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Short label used in logs and errors.
    fn kind(&self) -> &'static str;
}
