// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persisting and loading registered model versions.
//!
//! Joins the [`Registry`] (which versions exist and which type reads them)
//! with a [`StorageBackend`] (where the bytes live).

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use super::object::{save_to_vec, AnyObject, ManagedObject, ObjectError, RegisteredModel};
use super::registry::{Registry, RegistryError, VersionRecord};
use super::version::SemVer;
use crate::storage::{StorageBackend, StorageError, StorageKey};
use crate::telemetry;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Object(#[from] ObjectError),
}

/// A record's bytes, deserialized through its class reference.
pub struct LoadedObject {
    pub record: VersionRecord,
    pub object: AnyObject,
    /// SHA-256 of the stored bytes, hex encoded.
    pub digest: String,
    pub size_bytes: usize,
}

/// Hex SHA-256 of a stored blob.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub struct ModelStore {
    registry: Arc<Registry>,
    backend: Arc<dyn StorageBackend>,
}

impl ModelStore {
    pub fn new(registry: Arc<Registry>, backend: Arc<dyn StorageBackend>) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Serialize `object` and store it under the key of the registered
    /// (`name`, `version`) record.
    pub async fn save(
        &self,
        name: &str,
        version: &SemVer,
        object: &dyn ManagedObject,
    ) -> Result<StorageKey, StoreError> {
        let record = self.registry.resolve_exact(name, version)?;
        let bytes = save_to_vec(object)?;
        let size = bytes.len();
        let key = record.storage_key.to_string();

        self.backend.write(&key, bytes).await?;
        telemetry::record_storage_write(self.backend.kind(), size);
        debug!(key = %key, size, backend = self.backend.kind(), "Saved model version");
        Ok(record.storage_key)
    }

    /// Store `object` under the name and version declared on its type.
    pub async fn save_model<T: RegisteredModel>(&self, object: &T) -> Result<StorageKey, StoreError> {
        let version = SemVer::parse(T::VERSION).map_err(RegistryError::from)?;
        self.save(T::REGISTERED_NAME, &version, object).await
    }

    /// Read and deserialize the bytes stored for `record`.
    pub async fn load(&self, record: &VersionRecord) -> Result<LoadedObject, StoreError> {
        let key = record.storage_key.to_string();
        let started = Instant::now();

        let bytes = self.backend.read(&key).await?;
        let size = bytes.len();
        telemetry::record_storage_read(self.backend.kind(), size);
        let digest = content_digest(&bytes);

        // Deserialization can be CPU heavy for large models.
        let class = record.class;
        let object = tokio::task::spawn_blocking(move || class.load(&mut Cursor::new(bytes)))
            .await
            .map_err(|e| ObjectError::Decode(format!("load task failed: {}", e)))??;

        telemetry::record_load_latency(&record.name, started.elapsed().as_secs_f64());
        debug!(key = %key, size, digest = %digest, "Loaded model version");
        Ok(LoadedObject { record: record.clone(), object, digest, size_bytes: size })
    }

    /// Resolve the latest acceptable version of `name` and load it.
    pub async fn load_latest(&self, name: &str) -> Result<LoadedObject, StoreError> {
        let record = self.registry.resolve(name, None)?;
        self.load(&record).await
    }

    /// Versions of `name` present in storage, ascending. Keys that do not
    /// follow the `{name}/{version}` layout are ignored.
    pub async fn stored_versions(&self, name: &str) -> Result<Vec<SemVer>, StoreError> {
        let keys = self.backend.list(&StorageKey::prefix_for(name)).await?;
        let mut versions: Vec<SemVer> = keys
            .iter()
            .filter_map(|k| StorageKey::parse(k))
            .filter(|k| k.name() == name)
            .map(|k| k.version().clone())
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// Remove the stored bytes of one version. The registration stays.
    pub async fn delete(&self, name: &str, version: &SemVer) -> Result<(), StoreError> {
        let key = StorageKey::new(name, version).to_string();
        self.backend.delete(&key).await?;
        debug!(key = %key, "Deleted stored model version");
        Ok(())
    }
}
