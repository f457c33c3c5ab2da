// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Object storage backend (S3-compatible buckets).
//!
//! [`ObjectStorageBackend`] maps store keys onto `{prefix}/{key}` inside one
//! bucket and delegates transport to an [`ObjectStoreClient`]. Object stores
//! replace an object atomically on PUT, so single-key atomicity comes from
//! uploading the whole body in one request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use super::{validate_key, StorageBackend, StorageError};

const BACKEND: &str = "object";

/// Minimal bucket operations an object store must provide.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync + 'static {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Delete is idempotent at the store level.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Shared clients, e.g. one connection pool serving several locations.
#[async_trait]
impl<C: ObjectStoreClient + ?Sized> ObjectStoreClient for Arc<C> {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        (**self).put_object(bucket, key, body).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).get_object(bucket, key).await
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        (**self).head_object(bucket, key).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        (**self).delete_object(bucket, key).await
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).list_objects(bucket, prefix).await
    }
}

/// Bucket plus optional key prefix, parsed from `s3://bucket/some/prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub prefix: String,
}

impl ObjectLocation {
    pub fn parse(url: &str) -> Result<Self, StorageError> {
        let rest = url
            .strip_prefix("s3://")
            .ok_or_else(|| StorageError::InvalidKey(format!("{} is not an s3:// location", url)))?;
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_matches('/')),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(StorageError::InvalidKey(format!("{} has no bucket", url)));
        }
        Ok(Self { bucket: bucket.to_string(), prefix: prefix.to_string() })
    }

    fn full_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    fn strip<'a>(&self, full: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            Some(full)
        } else {
            full.strip_prefix(self.prefix.as_str())?.strip_prefix('/')
        }
    }
}

pub struct ObjectStorageBackend<C> {
    client: C,
    location: ObjectLocation,
}

impl<C: ObjectStoreClient> ObjectStorageBackend<C> {
    pub fn new(client: C, location: ObjectLocation) -> Self {
        Self { client, location }
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn resolve(&self, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(self.location.full_key(key))
    }
}

#[async_trait]
impl<C: ObjectStoreClient> StorageBackend for ObjectStorageBackend<C> {
    async fn write(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let full = self.resolve(key)?;
        trace!(bucket = %self.location.bucket, key = %full, size = data.len(), "Uploading object");
        self.client.put_object(&self.location.bucket, &full, data).await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(key)?;
        trace!(bucket = %self.location.bucket, key = %full, "Downloading object");
        self.client
            .get_object(&self.location.bucket, &full)
            .await
            .map_err(|e| match e {
                StorageError::KeyNotFound(_) => StorageError::KeyNotFound(key.to_string()),
                other => other,
            })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let full = self.resolve(key)?;
        self.client.head_object(&self.location.bucket, &full).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let full = self.resolve(key)?;
        if !self.client.head_object(&self.location.bucket, &full).await? {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }
        self.client.delete_object(&self.location.bucket, &full).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let full_prefix = self.location.full_key(prefix);
        let mut keys: Vec<String> = self
            .client
            .list_objects(&self.location.bucket, &full_prefix)
            .await?
            .iter()
            .filter_map(|k| self.location.strip(k))
            .filter(|k| k.starts_with(prefix))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn kind(&self) -> &'static str {
        BACKEND
    }
}

/// In-process object store. Useful for tests and ephemeral deployments;
/// availability can be toggled to simulate an outage.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("memory", "object store offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.check()?;
        self.objects.write().insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.check()?;
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        self.check()?;
        Ok(self.objects.read().contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.objects.write().remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.check()?;
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> ObjectStorageBackend<MemoryObjectStore> {
        ObjectStorageBackend::new(MemoryObjectStore::new(), ObjectLocation::parse(url).unwrap())
    }

    #[test]
    fn test_parse_location() {
        let loc = ObjectLocation::parse("s3://models/prod/ml/").unwrap();
        assert_eq!(loc.bucket, "models");
        assert_eq!(loc.prefix, "prod/ml");

        let bare = ObjectLocation::parse("s3://models").unwrap();
        assert_eq!(bare.prefix, "");

        assert!(ObjectLocation::parse("models/prod").is_err());
        assert!(ObjectLocation::parse("s3:///prod").is_err());
    }

    #[tokio::test]
    async fn test_prefix_mapping() {
        let store = backend("s3://models/prod");
        store.write("user_model/1.0.0", vec![7]).await.unwrap();

        assert!(store.client().head_object("models", "prod/user_model/1.0.0").await.unwrap());
        assert_eq!(store.list("user_model/").await.unwrap(), vec!["user_model/1.0.0".to_string()]);
        assert_eq!(store.read("user_model/1.0.0").await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_key_not_found() {
        let store = backend("s3://models");
        let result = store.delete("user_model/1.0.0").await;
        assert!(matches!(result, Err(StorageError::KeyNotFound(k)) if k == "user_model/1.0.0"));
    }

    #[tokio::test]
    async fn test_outage_is_unavailable() {
        let store = backend("s3://models");
        store.write("m/1.0.0", vec![1]).await.unwrap();
        store.client().set_available(false);

        let err = store.read("m/1.0.0").await.unwrap_err();
        assert!(err.is_retryable());

        store.client().set_available(true);
        assert_eq!(store.read("m/1.0.0").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_list_ignores_sibling_prefixes() {
        let store = backend("s3://models/prod");
        store.write("a/1.0.0", vec![1]).await.unwrap();
        store.client().put_object("models", "production/a/2.0.0", vec![2]).await.unwrap();

        assert_eq!(store.list("").await.unwrap(), vec!["a/1.0.0".to_string()]);
    }
}
