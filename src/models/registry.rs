// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model registry: registered name → known versions.
//!
//! Registration normally happens once at application setup, but the table is
//! safe to mutate from any thread. Each insert is a single check-and-insert
//! under the write lock, so two threads racing to register the same
//! (name, version) see exactly one success and one
//! [`RegistryError::DuplicateVersion`]. No I/O ever happens under the lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

use super::object::{ClassRef, RegisteredModel};
use super::version::{SemVer, VersionError, VersionRange};
use crate::storage::StorageKey;
use crate::telemetry;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registered name '{0}': use letters, digits, '_', '-' or '.'")]
    InvalidName(String),

    #[error("Version {version} of '{name}' is already registered")]
    DuplicateVersion { name: String, version: SemVer },

    #[error("Version {version} of '{name}' does not satisfy its own constraint {constraint}")]
    ConstraintViolation { name: String, version: SemVer, constraint: VersionRange },

    #[error("Unknown registered name: {0}")]
    UnknownName(String),

    #[error("No version of '{name}' satisfies {constraint}")]
    NoMatchingVersion { name: String, constraint: VersionRange },

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// One registered (name, version). Immutable once registered.
#[derive(Debug, Clone)]
pub struct VersionRecord {
    pub name: String,
    pub version: SemVer,
    pub constraint: VersionRange,
    pub storage_key: StorageKey,
    pub class: ClassRef,
    pub registered_at: DateTime<Utc>,
}

/// Thread-safe table of registered model versions.
pub struct Registry {
    records: RwLock<HashMap<String, BTreeMap<SemVer, VersionRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { records: RwLock::new(HashMap::new()) }
    }

    /// Process-wide registry shared by everything that does not own one.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Registry::new())).clone()
    }

    /// Record a new version of `name`.
    pub fn register(
        &self,
        name: &str,
        version: SemVer,
        constraint: VersionRange,
        class: ClassRef,
    ) -> Result<VersionRecord, RegistryError> {
        validate_name(name)?;

        if !constraint.matches(&version) {
            return Err(RegistryError::ConstraintViolation {
                name: name.to_string(),
                version,
                constraint,
            });
        }

        let record = VersionRecord {
            name: name.to_string(),
            storage_key: StorageKey::new(name, &version),
            version,
            constraint,
            class,
            registered_at: Utc::now(),
        };

        {
            let mut records = self.records.write();
            let versions = records.entry(name.to_string()).or_default();
            if versions.contains_key(&record.version) {
                return Err(RegistryError::DuplicateVersion {
                    name: name.to_string(),
                    version: record.version,
                });
            }
            versions.insert(record.version.clone(), record.clone());
        }

        info!(
            name = %record.name,
            version = %record.version,
            constraint = %record.constraint,
            class = record.class.type_name(),
            "Registered model version"
        );
        telemetry::record_registration(&record.name);
        Ok(record)
    }

    /// [`Registry::register`] with string arguments. `None` accepts any version.
    pub fn register_str(
        &self,
        name: &str,
        version: &str,
        constraint: Option<&str>,
        class: ClassRef,
    ) -> Result<VersionRecord, RegistryError> {
        let version = SemVer::parse(version)?;
        let constraint = match constraint {
            Some(c) => VersionRange::parse(c)?,
            None => VersionRange::any(),
        };
        self.register(name, version, constraint, class)
    }

    /// Register `T` using the metadata declared on its type.
    pub fn register_model<T: RegisteredModel>(&self) -> Result<VersionRecord, RegistryError> {
        self.register_str(
            T::REGISTERED_NAME,
            T::VERSION,
            T::VERSION_CONSTRAINTS,
            ClassRef::of::<T>(),
        )
    }

    /// Highest version of `name` satisfying `constraint_override`, or the
    /// constraint declared by the newest registered version when `None`.
    pub fn resolve(
        &self,
        name: &str,
        constraint_override: Option<&VersionRange>,
    ) -> Result<VersionRecord, RegistryError> {
        let records = self.records.read();
        let versions = records
            .get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))?;

        let query = match constraint_override {
            Some(range) => range,
            // Non-empty checked above.
            None => match versions.values().next_back() {
                Some(newest) => &newest.constraint,
                None => return Err(RegistryError::UnknownName(name.to_string())),
            },
        };

        versions
            .values()
            .rev()
            .find(|r| query.matches(&r.version))
            .cloned()
            .ok_or_else(|| RegistryError::NoMatchingVersion {
                name: name.to_string(),
                constraint: query.clone(),
            })
    }

    /// The record for exactly `version`.
    pub fn resolve_exact(&self, name: &str, version: &SemVer) -> Result<VersionRecord, RegistryError> {
        self.resolve(name, Some(&VersionRange::exact(version)))
    }

    pub fn contains(&self, name: &str, version: &SemVer) -> bool {
        self.records
            .read()
            .get(name)
            .map(|v| v.contains_key(version))
            .unwrap_or(false)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .read()
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        names.sort();
        names
    }

    /// Registered versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> Result<Vec<SemVer>, RegistryError> {
        self.records
            .read()
            .get(name)
            .filter(|v| !v.is_empty())
            .map(|v| v.keys().cloned().collect())
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    /// Number of registered (name, version) records.
    pub fn len(&self) -> usize {
        self.records.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration. Intended for tests and tooling.
    pub fn clear(&self) {
        let mut records = self.records.write();
        let count: usize = records.values().map(BTreeMap::len).sum();
        warn!(count, "Removing all registered model versions");
        records.clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::object::{ManagedObject, ObjectError};
    use std::io::{Read, Write};

    struct Stub;

    impl ManagedObject for Stub {
        fn save(&self, _sink: &mut dyn Write) -> Result<(), ObjectError> {
            Ok(())
        }

        fn load(_source: &mut dyn Read) -> Result<Self, ObjectError> {
            Ok(Stub)
        }
    }

    fn class() -> ClassRef {
        ClassRef::of::<Stub>()
    }

    #[test]
    fn test_register_and_resolve_latest() {
        let registry = Registry::new();
        for v in ["0.1.0", "0.1.5", "0.2.0"] {
            registry.register_str("price_model", v, None, class()).unwrap();
        }
        let record = registry.resolve("price_model", None).unwrap();
        assert_eq!(record.version.to_string(), "0.2.0");
        assert_eq!(record.storage_key.to_string(), "price_model/0.2.0");
    }

    #[test]
    fn test_resolve_with_override() {
        let registry = Registry::new();
        for v in ["0.1.0", "0.1.5", "0.2.0"] {
            registry.register_str("price_model", v, None, class()).unwrap();
        }
        let range = VersionRange::parse(">=0.1.0,<0.2.0").unwrap();
        let record = registry.resolve("price_model", Some(&range)).unwrap();
        assert_eq!(record.version.to_string(), "0.1.5");
    }

    #[test]
    fn test_default_query_uses_newest_constraint() {
        let registry = Registry::new();
        registry.register_str("m", "1.0.0", Some(">=1.0.0"), class()).unwrap();
        registry.register_str("m", "1.5.0", Some(">=1.0.0,<2.0.0"), class()).unwrap();
        let record = registry.resolve("m", None).unwrap();
        assert_eq!(record.version.to_string(), "1.5.0");
    }

    #[test]
    fn test_duplicate_rejected_and_table_unchanged() {
        let registry = Registry::new();
        registry.register_str("m", "1.0.0", None, class()).unwrap();
        let err = registry.register_str("m", "1.0.0", None, class()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateVersion { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_constraint_violation() {
        let registry = Registry::new();
        let err = registry
            .register_str("m", "3.0.0", Some(">=1.0,<3.0"), class())
            .unwrap_err();
        assert!(matches!(err, RegistryError::ConstraintViolation { .. }));
        assert!(registry.is_empty());
        assert!(matches!(registry.resolve("m", None), Err(RegistryError::UnknownName(_))));
    }

    #[test]
    fn test_malformed_inputs_propagate() {
        let registry = Registry::new();
        assert!(matches!(
            registry.register_str("m", "1.0", None, class()),
            Err(RegistryError::Version(VersionError::MalformedVersion { .. }))
        ));
        assert!(matches!(
            registry.register_str("m", "1.0.0", Some(">>1"), class()),
            Err(RegistryError::Version(VersionError::MalformedRange { .. }))
        ));
    }

    #[test]
    fn test_invalid_names() {
        let registry = Registry::new();
        for bad in ["", "a/b", "..", "with space", "a\\b"] {
            assert!(
                matches!(
                    registry.register_str(bad, "1.0.0", None, class()),
                    Err(RegistryError::InvalidName(_))
                ),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_unknown_and_no_match() {
        let registry = Registry::new();
        registry.register_str("m", "1.0.0", None, class()).unwrap();
        assert!(matches!(registry.resolve("nope", None), Err(RegistryError::UnknownName(_))));

        let range = VersionRange::parse(">=2.0.0").unwrap();
        assert!(matches!(
            registry.resolve("m", Some(&range)),
            Err(RegistryError::NoMatchingVersion { .. })
        ));
    }

    #[test]
    fn test_names_versions_clear() {
        let registry = Registry::new();
        registry.register_str("b", "1.0.0", None, class()).unwrap();
        registry.register_str("a", "2.0.0", None, class()).unwrap();
        registry.register_str("a", "1.0.0-alpha", None, class()).unwrap();

        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        let versions: Vec<String> =
            registry.versions("a").unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(versions, vec!["1.0.0-alpha", "2.0.0"]);
        assert!(registry.contains("a", &SemVer::parse("2.0.0").unwrap()));

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }
}
