// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Signed, registry-free object storage.
//!
//! [`LiteStore`] saves any [`ManagedObject`] under a plain name, without a
//! registration or a semantic version. Blobs are signed with HMAC-SHA256
//! over a shared secret and verified before deserialization, so a reader
//! only ever loads what a holder of the same secret wrote.
//!
//! Two key schemes share one namespace:
//!
//! ```text
//! {prefix}/{name}        unversioned, written once
//! {prefix}/{name}-v{N}   versioned, N = 1, 2, ... assigned on save
//! ```
//!
//! Blob layout:
//!
//! ```text
//! "VLT1" | tag: 32 bytes | class_len: u16 LE | class (type name) | payload
//! ```
//! The tag covers every byte after it.

use std::io::Cursor;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::object::{save_to_vec, ManagedObject, ObjectError};
use crate::storage::{validate_key, StorageBackend, StorageError};
use crate::telemetry;

type HmacSha256 = Hmac<Sha256>;

const MAGIC: &[u8; 4] = b"VLT1";
const TAG_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + TAG_LEN + 2;

/// Secret used when none is configured. Anyone can forge blobs signed
/// with it.
pub const DEFAULT_LITE_SECRET: &str = "vesta";

#[derive(Error, Debug)]
pub enum LiteError {
    #[error("Invalid lite object name '{0}': use ASCII letters, digits and '_'")]
    InvalidName(String),

    #[error("Unusable signing secret: {0}")]
    InvalidSecret(String),

    #[error("Lite object already exists: {0}")]
    AlreadyExists(String),

    #[error("No lite object named '{name}' ({scheme})")]
    NotFound { name: String, scheme: &'static str },

    #[error("Signature mismatch for {0}: wrong secret or tampered bytes")]
    BadSignature(String),

    #[error("Malformed lite blob {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("Lite object {key} holds {found}, not {expected}")]
    TypeMismatch { key: String, expected: &'static str, found: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Object(#[from] ObjectError),
}

/// Where a lite object was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteKey {
    pub key: String,
    /// `None` for unversioned objects.
    pub version: Option<u64>,
}

pub struct LiteStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
    mac: HmacSha256,
    /// Serializes version assignment among writers sharing this store.
    saving: Mutex<()>,
}

impl LiteStore {
    /// Create a store writing below `prefix` (empty for the backend root).
    ///
    /// A missing or empty `secret` falls back to [`DEFAULT_LITE_SECRET`].
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        prefix: &str,
        secret: Option<&str>,
    ) -> Result<Self, LiteError> {
        let prefix = prefix.trim_matches('/').to_string();
        if !prefix.is_empty() {
            validate_key(&prefix)?;
        }
        let secret = match secret.filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!(prefix = %prefix, "Lite store uses the default signing secret");
                DEFAULT_LITE_SECRET
            }
        };
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| LiteError::InvalidSecret(e.to_string()))?;
        Ok(Self { backend, prefix, mac, saving: Mutex::new(()) })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key_for(&self, leaf: &str) -> String {
        if self.prefix.is_empty() {
            leaf.to_string()
        } else {
            format!("{}/{}", self.prefix, leaf)
        }
    }

    fn versioned_key(&self, name: &str, version: u64) -> String {
        self.key_for(&format!("{}-v{}", name, version))
    }

    /// Versions saved under `name`, ascending.
    pub async fn versions(&self, name: &str) -> Result<Vec<u64>, LiteError> {
        validate_name(name)?;
        let stem = self.key_for(&format!("{}-v", name));
        let keys = self.backend.list(&stem).await?;
        let mut versions: Vec<u64> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(stem.as_str()))
            .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|n| n.parse().ok())
            .collect();
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    /// Sign and store `object` under `name`.
    ///
    /// Versioned saves take the next version after the highest one present.
    /// Unversioned saves refuse to overwrite an existing object.
    pub async fn save_object<T: ManagedObject>(
        &self,
        name: &str,
        object: &T,
        versioned: bool,
    ) -> Result<LiteKey, LiteError> {
        validate_name(name)?;
        let blob = self.seal(std::any::type_name::<T>(), &save_to_vec(object)?);

        let _saving = self.saving.lock().await;
        let target = if versioned {
            let next = self.versions(name).await?.last().map_or(1, |v| v + 1);
            LiteKey { key: self.versioned_key(name, next), version: Some(next) }
        } else {
            let key = self.key_for(name);
            if self.backend.exists(&key).await? {
                return Err(LiteError::AlreadyExists(key));
            }
            LiteKey { key, version: None }
        };

        let size = blob.len();
        self.backend.write(&target.key, blob).await?;
        telemetry::record_storage_write(self.backend.kind(), size);
        debug!(key = %target.key, size, "Saved signed lite object");
        Ok(target)
    }

    /// Load `name`, verifying its signature first. Versioned loads pick the
    /// highest version.
    pub async fn load_object<T: ManagedObject>(&self, name: &str, versioned: bool) -> Result<T, LiteError> {
        validate_name(name)?;
        let scheme = if versioned { "versioned" } else { "unversioned" };
        let not_found = || LiteError::NotFound { name: name.to_string(), scheme };
        let key = if versioned {
            match self.versions(name).await?.last() {
                Some(latest) => self.versioned_key(name, *latest),
                None => return Err(not_found()),
            }
        } else {
            self.key_for(name)
        };

        match self.load_key(&key).await {
            Err(LiteError::Storage(StorageError::KeyNotFound(_))) => Err(not_found()),
            other => other,
        }
    }

    /// Load one specific version of `name`.
    pub async fn load_version<T: ManagedObject>(&self, name: &str, version: u64) -> Result<T, LiteError> {
        validate_name(name)?;
        self.load_key(&self.versioned_key(name, version)).await
    }

    async fn load_key<T: ManagedObject>(&self, key: &str) -> Result<T, LiteError> {
        let blob = self.backend.read(key).await?;
        telemetry::record_storage_read(self.backend.kind(), blob.len());

        let (class, payload) = self.open(key, &blob)?;
        let expected = std::any::type_name::<T>();
        if class != expected {
            return Err(LiteError::TypeMismatch {
                key: key.to_string(),
                expected,
                found: class.to_string(),
            });
        }

        let payload = payload.to_vec();
        let object = tokio::task::spawn_blocking(move || T::load(&mut Cursor::new(payload)))
            .await
            .map_err(|e| ObjectError::Decode(format!("load task failed: {}", e)))??;
        debug!(key, "Loaded signed lite object");
        Ok(object)
    }

    fn seal(&self, class: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(2 + class.len() + payload.len());
        body.extend_from_slice(&(class.len() as u16).to_le_bytes());
        body.extend_from_slice(class.as_bytes());
        body.extend_from_slice(payload);

        let mut mac = self.mac.clone();
        mac.update(&body);
        let tag = mac.finalize().into_bytes();

        let mut blob = Vec::with_capacity(MAGIC.len() + TAG_LEN + body.len());
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&tag);
        blob.extend_from_slice(&body);
        blob
    }

    /// Verify `blob` and split it into its class name and payload.
    fn open<'a>(&self, key: &str, blob: &'a [u8]) -> Result<(&'a str, &'a [u8]), LiteError> {
        let malformed = |reason: &str| LiteError::Malformed { key: key.to_string(), reason: reason.to_string() };

        if blob.len() < HEADER_LEN || &blob[..MAGIC.len()] != MAGIC {
            return Err(malformed("not a signed lite blob"));
        }
        let tag = &blob[MAGIC.len()..MAGIC.len() + TAG_LEN];
        let body = &blob[MAGIC.len() + TAG_LEN..];

        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(tag).map_err(|_| LiteError::BadSignature(key.to_string()))?;

        let class_len = u16::from_le_bytes([body[0], body[1]]) as usize;
        let rest = &body[2..];
        if rest.len() < class_len {
            return Err(malformed("class name overruns blob"));
        }
        let class = std::str::from_utf8(&rest[..class_len]).map_err(|_| malformed("class name is not UTF-8"))?;
        Ok((class, &rest[class_len..]))
    }
}

fn validate_name(name: &str) -> Result<(), LiteError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(LiteError::InvalidName(name.to_string()));
    }
    Ok(())
}
