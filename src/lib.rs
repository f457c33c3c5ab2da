// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vesta
//!
//! A versioned model registry: classes register under a name and a
//! semantic version together with a constraint on acceptable versions,
//! serialized instances live in a pluggable storage backend, and a
//! hot-swap controller atomically replaces the live instance of a name.
//!
//! # Layers
//!
//! - `models::version`: semver parsing and range matching
//! - `models::Registry`: name/version/constraint bookkeeping
//! - `storage`: local, network-mount and object-store backends
//! - `models::ModelStore`: save and load through a backend
//! - `models::HotSwapController`: live instances, swaps, scheduled reloads
//! - `models::LiteStore`: signed, registry-free objects with numbered versions

pub mod cli;
pub mod config;
pub mod models;
pub mod storage;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use config::EnvConfig;
use models::{HotSwapController, LiteError, LiteStore, ModelStore, Registry, SwapError};
use storage::StorageBackend;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Lite(#[from] LiteError),
}

/// Wired registry, store, controller and lite store over one backend.
pub struct Runtime {
    pub registry: Arc<Registry>,
    pub store: Arc<ModelStore>,
    pub controller: Arc<HotSwapController>,
    pub lite: Arc<LiteStore>,
    reload_interval: Option<Duration>,
}

impl Runtime {
    /// Create a runtime over an explicit registry and backend. Lite objects
    /// go under the default prefix and secret.
    pub fn new(registry: Arc<Registry>, backend: Arc<dyn StorageBackend>) -> Result<Self, RuntimeError> {
        let defaults = config::LiteConfig::default();
        Self::wire(registry, backend, &defaults)
    }

    fn wire(
        registry: Arc<Registry>,
        backend: Arc<dyn StorageBackend>,
        lite: &config::LiteConfig,
    ) -> Result<Self, RuntimeError> {
        let lite = Arc::new(LiteStore::new(Arc::clone(&backend), &lite.prefix, lite.secret.as_deref())?);
        let store = Arc::new(ModelStore::new(Arc::clone(&registry), backend));
        let controller = Arc::new(HotSwapController::new(Arc::clone(&store)));
        Ok(Self { registry, store, controller, lite, reload_interval: None })
    }

    /// Build the configured backend and wire it to the process-wide registry.
    pub async fn from_config(config: &EnvConfig) -> Result<Self, RuntimeError> {
        let backend = config.storage.build().await?;
        let mut runtime = Self::wire(Registry::global(), backend, &config.lite)?;
        runtime.reload_interval = config.reload_interval;
        Ok(runtime)
    }

    /// Schedule a reload of `name` at the configured default interval.
    ///
    /// Returns `Ok(false)` when no default interval is configured.
    pub fn watch(&self, name: &str) -> Result<bool, SwapError> {
        match self.reload_interval {
            Some(interval) => {
                self.controller.schedule_reload(name, interval)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
