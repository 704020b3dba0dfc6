//! Maps block type names to payload constructors.

use std::collections::HashMap;

use crate::error::{NifError, Result};
use crate::object::{NiObject, NiUnknown};
use crate::stream::NiIStream;

/// A constructor deserializes one payload from the stream, which
/// carries the active version for version-conditional fields.
pub type BlockConstructor =
    Box<dyn Fn(&mut NiIStream<'_>) -> Result<Box<dyn NiObject>> + Send + Sync>;

/// Runtime registry of block type names.
///
/// Payload crates register their types here; the reader looks each
/// block's declared type name up and calls the matching constructor.
/// Names without a constructor fall back to [`NiUnknown`] when the
/// header declares the block's size.
#[derive(Default)]
pub struct BlockRegistry {
    constructors: HashMap<String, BlockConstructor>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&mut NiIStream<'_>) -> Result<Box<dyn NiObject>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Whether a constructor is registered for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Number of registered type names.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Deserializes one payload of the named type.
    ///
    /// Unregistered names read as [`NiUnknown`] of `declared_size`
    /// bytes; without a declared size the operation fails with
    /// [`NifError::UnknownBlockType`].
    pub fn create(
        &self,
        name: &str,
        stream: &mut NiIStream<'_>,
        declared_size: Option<u32>,
    ) -> Result<Box<dyn NiObject>> {
        match self.constructors.get(name) {
            Some(constructor) => constructor(stream),
            None => match declared_size {
                Some(size) => Ok(Box::new(NiUnknown::read(stream, name, size)?)),
                None => Err(NifError::UnknownBlockType(name.to_string())),
            },
        }
    }
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("types", &self.constructors.len())
            .finish()
    }
}
