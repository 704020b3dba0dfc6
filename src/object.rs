//! The opaque block contract and the fallback payload for
//! unrecognized types.

use std::any::Any;

use crate::basic::{NiPtr, NiRef, NiStringRef};
use crate::error::Result;
use crate::stream::{NiIStream, NiOStream};

/// Capability set every block payload exposes to the container layer.
///
/// The container never looks inside a payload. It only needs the
/// payload to name its type, serialize itself, and enumerate the
/// fields that point at other blocks or at pool strings so that
/// structural edits can rewrite them. Payload kinds form an open set:
/// deserialization goes through a [`crate::registry::BlockRegistry`]
/// keyed on the type name.
///
/// The enumerators default to empty, so payloads without references
/// only implement what they have.
pub trait NiObject: Any {
    /// The stable type name recorded in the header's type registry.
    fn block_name(&self) -> &str;

    /// Serializes the payload in the form the stream's version
    /// dictates.
    fn put(&mut self, stream: &mut NiOStream<'_>) -> Result<()>;

    /// All owning child references, in field order.
    fn child_refs(&self) -> Vec<&NiRef> {
        Vec::new()
    }

    /// Mutable view of [`NiObject::child_refs`].
    fn child_refs_mut(&mut self) -> Vec<&mut NiRef> {
        Vec::new()
    }

    /// All non-owning back-pointers, in field order.
    fn ptrs(&self) -> Vec<&NiPtr> {
        Vec::new()
    }

    /// Mutable view of [`NiObject::ptrs`].
    fn ptrs_mut(&mut self) -> Vec<&mut NiPtr> {
        Vec::new()
    }

    /// All string references, in field order.
    fn string_refs(&self) -> Vec<&NiStringRef> {
        Vec::new()
    }

    /// Mutable view of [`NiObject::string_refs`].
    fn string_refs_mut(&mut self) -> Vec<&mut NiStringRef> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Fallback payload for block types the registry does not know.
///
/// Stores the declared number of payload bytes verbatim and writes
/// them back unchanged, so a file with unrecognized blocks still
/// round-trips. Only constructible when the header carries a block
/// size table (file 20.2.0.5 and up); without a declared size there
/// is no way to skip an unknown payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NiUnknown {
    name: String,
    data: Vec<u8>,
}

impl NiUnknown {
    /// Creates an unknown block from bytes already in hand.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Reads `size` verbatim bytes for a block of the named type.
    pub fn read(stream: &mut NiIStream<'_>, name: impl Into<String>, size: u32) -> Result<Self> {
        let mut data = vec![0u8; size as usize];
        stream.read_bytes(&mut data)?;

        Ok(Self {
            name: name.into(),
            data,
        })
    }

    /// The raw payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl NiObject for NiUnknown {
    fn block_name(&self) -> &str {
        &self.name
    }

    fn put(&mut self, stream: &mut NiOStream<'_>) -> Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        stream.write_bytes(&self.data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
