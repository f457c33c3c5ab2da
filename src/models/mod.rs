// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model management: versions, registration, persistence and hot-swap.

pub mod lite;
pub mod object;
pub mod version;
pub mod wrapper;

mod registry;
mod reload;
mod store;
mod swap;

pub use object::{
    save_to_vec, AnyObject, ClassRef, ManagedObject, ObjectError, RegisteredModel,
};
pub use lite::{LiteError, LiteKey, LiteStore, DEFAULT_LITE_SECRET};
pub use registry::{Registry, RegistryError, VersionRecord};
pub use reload::MIN_RELOAD_INTERVAL;
pub use store::{content_digest, LoadedObject, ModelStore, StoreError};
pub use swap::{ActiveInfo, ActiveInstance, HotSwapController, SwapError, SwapOutcome};
pub use version::{satisfies, Comparator, SemVer, VersionError, VersionRange};
pub use wrapper::Serialized;
