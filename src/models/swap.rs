// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hot-swap of the live instance behind each registered name.
//!
//! Every name has a slot holding an `Arc<ActiveInstance>`. Readers clone the
//! `Arc` under a read lock and never wait on storage. A swap resolves, reads
//! and deserializes the new version first, and only then takes the write
//! lock to replace the pointer. Callers still holding the previous `Arc`
//! keep using it until they drop it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, Instrument};

use super::object::{AnyObject, ManagedObject, ObjectError};
use super::registry::{RegistryError, VersionRecord};
use super::store::{LoadedObject, ModelStore, StoreError};
use super::version::{SemVer, VersionRange};
use crate::storage::StorageError;
use crate::telemetry::{self, OperationSpan, SpanExt};

#[derive(Error, Debug)]
pub enum SwapError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error("Active instance of '{name}' is {found}, not {expected}")]
    TypeMismatch { name: String, expected: &'static str, found: &'static str },

    #[error("A scheduled reload is already running for '{0}'")]
    ReloadAlreadyScheduled(String),

    #[error("No scheduled reload to cancel for '{0}'")]
    NoScheduledReload(String),
}

impl From<StoreError> for SwapError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Registry(e) => Self::Registry(e),
            StoreError::Storage(e) => Self::Storage(e),
            StoreError::Object(e) => Self::Object(e),
        }
    }
}

/// The live, fully deserialized object for one registered name.
pub struct ActiveInstance {
    pub record: VersionRecord,
    pub object: AnyObject,
    pub digest: String,
    pub loaded_at: DateTime<Utc>,
}

impl From<LoadedObject> for ActiveInstance {
    fn from(loaded: LoadedObject) -> Self {
        Self {
            record: loaded.record,
            object: loaded.object,
            digest: loaded.digest,
            loaded_at: Utc::now(),
        }
    }
}

/// Summary of an active instance, cheap to hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveInfo {
    pub name: String,
    pub version: SemVer,
    pub digest: String,
    pub type_name: &'static str,
    pub loaded_at: DateTime<Utc>,
}

/// Result of a successful swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// A new instance was published.
    Swapped { previous: Option<SemVer>, current: SemVer },
    /// The resolved version and its bytes match the active instance.
    Unchanged(SemVer),
}

#[derive(Default)]
struct Slot {
    active: RwLock<Option<Arc<ActiveInstance>>>,
    /// Serializes loaders (first load, swaps) for this name across their I/O.
    loading: Mutex<()>,
}

impl Slot {
    fn current(&self) -> Option<Arc<ActiveInstance>> {
        self.active.read().clone()
    }

    fn publish(&self, instance: Arc<ActiveInstance>) -> Option<Arc<ActiveInstance>> {
        self.active.write().replace(instance)
    }
}

/// Coordinates lazy loading and atomic replacement of active instances.
pub struct HotSwapController {
    store: Arc<ModelStore>,
    slots: DashMap<String, Arc<Slot>>,
    pub(super) reloads: DashMap<String, super::reload::ReloadJob>,
}

impl HotSwapController {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self { store, slots: DashMap::new(), reloads: DashMap::new() }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    fn slot(&self, name: &str) -> Arc<Slot> {
        if let Some(slot) = self.slots.get(name) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(name.to_string()).or_default().value())
    }

    /// The active instance of `name` as `T`, loading the latest acceptable
    /// version on first access.
    pub async fn get_active<T: ManagedObject>(&self, name: &str) -> Result<Arc<T>, SwapError> {
        let instance = self.active_instance(name).await?;
        let found = instance.record.class.type_name();
        instance.object.clone().downcast::<T>().map_err(|_| SwapError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
            found,
        })
    }

    /// Type-erased variant of [`HotSwapController::get_active`].
    pub async fn active_instance(&self, name: &str) -> Result<Arc<ActiveInstance>, SwapError> {
        if let Some(instance) = self.slots.get(name).and_then(|slot| slot.current()) {
            return Ok(instance);
        }

        // Slots exist only for registered names.
        let record = self.store.registry().resolve(name, None)?;
        let slot = self.slot(name);
        let _loading = slot.loading.lock().await;
        // Another loader may have published while we waited.
        if let Some(instance) = slot.current() {
            return Ok(instance);
        }

        let loaded = self.store.load(&record).await?;
        let instance = Arc::new(ActiveInstance::from(loaded));
        slot.publish(instance.clone());
        info!(name, version = %instance.record.version, "Loaded initial active instance");
        Ok(instance)
    }

    /// Replace the active instance of `name` with `version`, or with the
    /// latest acceptable version when `None`.
    ///
    /// The new version is fully loaded before it is published. On any error
    /// the previous instance stays active.
    pub async fn swap(&self, name: &str, version: Option<&SemVer>) -> Result<SwapOutcome, SwapError> {
        let query = version.map(VersionRange::exact);
        let span = OperationSpan::new("swap", name);
        let result = self.swap_inner(name, query.as_ref()).instrument(span.clone()).await;
        span.record_result(&result);

        match &result {
            Ok(SwapOutcome::Swapped { .. }) => telemetry::record_swap(name, "swapped"),
            Ok(SwapOutcome::Unchanged(_)) => telemetry::record_swap(name, "unchanged"),
            Err(_) => telemetry::record_swap_failure(name),
        }
        result
    }

    async fn swap_inner(
        &self,
        name: &str,
        query: Option<&VersionRange>,
    ) -> Result<SwapOutcome, SwapError> {
        let record = self.store.registry().resolve(name, query)?;
        let slot = self.slot(name);
        let _loading = slot.loading.lock().await;

        let previous = slot.current();
        let loaded = self.store.load(&record).await?;

        if let Some(prev) = &previous {
            if prev.record.version == loaded.record.version && prev.digest == loaded.digest {
                info!(name, version = %prev.record.version, "Active instance already current");
                return Ok(SwapOutcome::Unchanged(prev.record.version.clone()));
            }
        }

        let current = loaded.record.version.clone();
        slot.publish(Arc::new(ActiveInstance::from(loaded)));
        let previous = previous.map(|p| p.record.version.clone());
        info!(
            name,
            previous = %previous.as_ref().map(ToString::to_string).unwrap_or_default(),
            current = %current,
            "Swapped active instance"
        );
        Ok(SwapOutcome::Swapped { previous, current })
    }

    /// Version of the currently active instance, if any.
    pub fn active_version(&self, name: &str) -> Option<SemVer> {
        self.slots
            .get(name)
            .and_then(|slot| slot.current())
            .map(|i| i.record.version.clone())
    }

    pub fn active_info(&self, name: &str) -> Option<ActiveInfo> {
        let instance = self.slots.get(name)?.current()?;
        Some(ActiveInfo {
            name: name.to_string(),
            version: instance.record.version.clone(),
            digest: instance.digest.clone(),
            type_name: instance.record.class.type_name(),
            loaded_at: instance.loaded_at,
        })
    }

    /// Drop the active instance of `name`; the next access reloads it.
    pub fn evict(&self, name: &str) -> Option<Arc<ActiveInstance>> {
        self.slots.get(name)?.active.write().take()
    }

    /// Names with a published instance, sorted.
    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.value().current().is_some())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::object::RegisteredModel;
    use crate::models::registry::Registry;
    use crate::storage::{MemoryObjectStore, ObjectLocation, ObjectStorageBackend};
    use std::io::{Read, Write};

    #[derive(Debug, PartialEq)]
    struct Threshold(u32);

    impl ManagedObject for Threshold {
        fn save(&self, sink: &mut dyn Write) -> Result<(), ObjectError> {
            sink.write_all(&self.0.to_le_bytes())?;
            Ok(())
        }

        fn load(source: &mut dyn Read) -> Result<Self, ObjectError> {
            let mut buf = [0u8; 4];
            source.read_exact(&mut buf)?;
            Ok(Threshold(u32::from_le_bytes(buf)))
        }
    }

    impl RegisteredModel for Threshold {
        const REGISTERED_NAME: &'static str = "threshold";
        const VERSION: &'static str = "1.0.0";
    }

    async fn controller() -> HotSwapController {
        let backend = ObjectStorageBackend::new(
            MemoryObjectStore::new(),
            ObjectLocation::parse("s3://models").unwrap(),
        );
        let store = Arc::new(ModelStore::new(Arc::new(Registry::new()), Arc::new(backend)));
        store.registry().register_model::<Threshold>().unwrap();
        store.save_model(&Threshold(10)).await.unwrap();
        HotSwapController::new(store)
    }

    #[tokio::test]
    async fn test_lazy_first_load() {
        let controller = controller().await;
        assert!(controller.active_version("threshold").is_none());

        let t = controller.get_active::<Threshold>("threshold").await.unwrap();
        assert_eq!(*t, Threshold(10));
        assert_eq!(controller.active_version("threshold").unwrap().to_string(), "1.0.0");
        assert_eq!(controller.active_names(), vec!["threshold".to_string()]);
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        struct NotThreshold;
        impl ManagedObject for NotThreshold {
            fn save(&self, _sink: &mut dyn Write) -> Result<(), ObjectError> {
                Ok(())
            }
            fn load(_source: &mut dyn Read) -> Result<Self, ObjectError> {
                Ok(NotThreshold)
            }
        }

        let controller = controller().await;
        let result = controller.get_active::<NotThreshold>("threshold").await;
        assert!(matches!(result, Err(SwapError::TypeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_swap_same_bytes_is_unchanged() {
        let controller = controller().await;
        controller.get_active::<Threshold>("threshold").await.unwrap();

        let outcome = controller.swap("threshold", None).await.unwrap();
        assert_eq!(outcome, SwapOutcome::Unchanged(SemVer::parse("1.0.0").unwrap()));
    }

    #[tokio::test]
    async fn test_swap_rewritten_bytes_publishes() {
        let controller = controller().await;
        let before = controller.get_active::<Threshold>("threshold").await.unwrap();

        controller.store().save_model(&Threshold(20)).await.unwrap();
        let outcome = controller.swap("threshold", None).await.unwrap();
        assert!(matches!(outcome, SwapOutcome::Swapped { .. }));

        let after = controller.get_active::<Threshold>("threshold").await.unwrap();
        assert_eq!(*before, Threshold(10));
        assert_eq!(*after, Threshold(20));
    }

    #[tokio::test]
    async fn test_evict_forces_reload() {
        let controller = controller().await;
        controller.get_active::<Threshold>("threshold").await.unwrap();
        assert!(controller.evict("threshold").is_some());
        assert!(controller.active_info("threshold").is_none());

        controller.get_active::<Threshold>("threshold").await.unwrap();
        let info = controller.active_info("threshold").unwrap();
        assert_eq!(info.version.to_string(), "1.0.0");
        assert!(info.type_name.ends_with("Threshold"));
    }

    #[tokio::test]
    async fn test_unknown_names_leave_no_slots() {
        let controller = controller().await;
        for i in 0..100 {
            let name = format!("unknown{}", i);
            let result = controller.active_instance(&name).await;
            assert!(matches!(result, Err(SwapError::Registry(RegistryError::UnknownName(_)))));
            assert!(controller.swap(&name, None).await.is_err());
        }
        assert_eq!(controller.slots.len(), 0);

        controller.get_active::<Threshold>("threshold").await.unwrap();
        assert_eq!(controller.slots.len(), 1);
    }

    #[tokio::test]
    async fn test_swap_conversion_flattens_store_errors() {
        let controller = controller().await;
        let result = controller.swap("missing", None).await;
        assert!(matches!(result, Err(SwapError::Registry(RegistryError::UnknownName(_)))));
    }
}
