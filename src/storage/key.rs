// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Storage key layout: `{registered_name}/{version}`.

use std::fmt;

use super::StorageError;
use crate::models::SemVer;

/// Namespaced key of one stored model version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    name: String,
    version: SemVer,
}

impl StorageKey {
    pub fn new(name: impl Into<String>, version: &SemVer) -> Self {
        Self { name: name.into(), version: version.clone() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &SemVer {
        &self.version
    }

    /// Listing prefix covering every version of `name`.
    pub fn prefix_for(name: &str) -> String {
        format!("{}/", name)
    }

    /// Parse `{name}/{version}`. Returns `None` for keys outside the layout.
    pub fn parse(key: &str) -> Option<Self> {
        let (name, version) = key.split_once('/')?;
        if name.is_empty() || version.contains('/') {
            return None;
        }
        let version = SemVer::parse(version).ok()?;
        Some(Self { name: name.to_string(), version })
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Reject keys that could escape a backend root or alias another key.
///
/// `:` is refused so a segment can never be read as a drive prefix
/// (`C:`) or an alternate data stream on Windows.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.contains(':')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
