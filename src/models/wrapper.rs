// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pass-through [`ManagedObject`] for plain serde types.
//!
//! Most models are a struct of weights and settings with no special byte
//! format. Wrapping one in [`Serialized`] makes it storable, swappable and
//! registrable without writing `save`/`load` by hand:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Ranker { weights: Vec<f32> }
//!
//! registry.register_str("ranker", "1.0.0", None, ClassRef::of::<Serialized<Ranker>>())?;
//! store.save("ranker", &version, &Serialized(ranker)).await?;
//! let live = controller.get_active::<Serialized<Ranker>>("ranker").await?;
//! live.weights.len(); // derefs to Ranker
//! ```

use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::object::{ManagedObject, ObjectError};

/// A serde value stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Serialized<T>(pub T);

impl<T> Serialized<T> {
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Serialized<T> {
    fn from(inner: T) -> Self {
        Self(inner)
    }
}

impl<T> Deref for Serialized<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Serialized<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> ManagedObject for Serialized<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn save(&self, sink: &mut dyn Write) -> Result<(), ObjectError> {
        serde_json::to_writer(sink, &self.0).map_err(|e| ObjectError::Encode(e.to_string()))
    }

    fn load(source: &mut dyn Read) -> Result<Self, ObjectError> {
        serde_json::from_reader(source)
            .map(Self)
            .map_err(|e| ObjectError::Decode(e.to_string()))
    }
}
