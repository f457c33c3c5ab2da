// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Capability contract for managed model objects.
//!
//! Every persistable model type implements [`ManagedObject`]: it writes its
//! full reconstructable state to an opaque byte sink and rebuilds itself from
//! the same bytes. The byte format belongs to the type. [`ClassRef`] is the
//! type-erased handle the registry keeps so it can deserialize a stored
//! version without knowing the concrete type.

use std::any::{Any, TypeId};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),
}

/// A model object that can be saved to and loaded from bytes.
///
/// `load(save(x))` must yield an object equivalent to `x` under the
/// implementor's own notion of equivalence.
pub trait ManagedObject: Send + Sync + 'static {
    /// Serialize the full reconstructable state into `sink`.
    fn save(&self, sink: &mut dyn Write) -> Result<(), ObjectError>;

    /// Rebuild an instance from bytes produced by [`ManagedObject::save`].
    fn load(source: &mut dyn Read) -> Result<Self, ObjectError>
    where
        Self: Sized;
}

/// Registration metadata attached to a model type at definition time.
///
/// ```ignore
/// impl RegisteredModel for UserModel {
///     const REGISTERED_NAME: &'static str = "user_model";
///     const VERSION: &'static str = "1.1.4-alpha";
///     const VERSION_CONSTRAINTS: Option<&'static str> = Some(">=1.0,<3.0");
/// }
/// ```
pub trait RegisteredModel: ManagedObject + Sized {
    const REGISTERED_NAME: &'static str;
    const VERSION: &'static str;
    /// `None` accepts every version.
    const VERSION_CONSTRAINTS: Option<&'static str> = None;
}

/// Type-erased, shareable deserialized object.
pub type AnyObject = Arc<dyn Any + Send + Sync>;

type LoadFn = fn(&mut dyn Read) -> Result<AnyObject, ObjectError>;

fn load_erased<T: ManagedObject>(source: &mut dyn Read) -> Result<AnyObject, ObjectError> {
    let object: AnyObject = Arc::new(T::load(source)?);
    Ok(object)
}

/// Reference to a concrete [`ManagedObject`] type.
#[derive(Clone, Copy)]
pub struct ClassRef {
    type_name: &'static str,
    type_id: TypeId,
    load: LoadFn,
}

impl ClassRef {
    pub fn of<T: ManagedObject>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            load: load_erased::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: ManagedObject>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Deserialize through the referenced type's `load`.
    pub fn load(&self, source: &mut dyn Read) -> Result<AnyObject, ObjectError> {
        (self.load)(source)
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRef").field("type_name", &self.type_name).finish()
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassRef {}

/// Serialize `object` into a fresh buffer.
pub fn save_to_vec(object: &dyn ManagedObject) -> Result<Vec<u8>, ObjectError> {
    let mut buf = Vec::new();
    object.save(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Debug, PartialEq)]
    struct Weights(Vec<u8>);

    impl ManagedObject for Weights {
        fn save(&self, sink: &mut dyn Write) -> Result<(), ObjectError> {
            sink.write_all(&(self.0.len() as u32).to_le_bytes())?;
            sink.write_all(&self.0)?;
            Ok(())
        }

        fn load(source: &mut dyn Read) -> Result<Self, ObjectError> {
            let mut len = [0u8; 4];
            source.read_exact(&mut len)?;
            let mut data = vec![0u8; u32::from_le_bytes(len) as usize];
            source.read_exact(&mut data)?;
            Ok(Self(data))
        }
    }

    struct Other;

    impl ManagedObject for Other {
        fn save(&self, _sink: &mut dyn Write) -> Result<(), ObjectError> {
            Ok(())
        }

        fn load(_source: &mut dyn Read) -> Result<Self, ObjectError> {
            Ok(Other)
        }
    }

    #[test]
    fn test_class_ref_roundtrip() {
        let original = Weights(vec![1, 2, 3, 4]);
        let bytes = save_to_vec(&original).unwrap();

        let class = ClassRef::of::<Weights>();
        let loaded = class.load(&mut Cursor::new(bytes)).unwrap();
        let loaded = loaded.downcast::<Weights>().unwrap();
        assert_eq!(*loaded, original);
    }

    #[test]
    fn test_class_ref_identity() {
        assert!(ClassRef::of::<Weights>().is::<Weights>());
        assert!(!ClassRef::of::<Weights>().is::<Other>());
        assert_ne!(ClassRef::of::<Weights>(), ClassRef::of::<Other>());
        assert!(ClassRef::of::<Weights>().type_name().ends_with("Weights"));
    }

    #[test]
    fn test_truncated_input_is_io_error() {
        let class = ClassRef::of::<Weights>();
        let result = class.load(&mut Cursor::new(vec![9, 0, 0, 0, 1]));
        assert!(matches!(result, Err(ObjectError::Io(_))));
    }
}
