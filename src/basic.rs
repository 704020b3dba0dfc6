//! Elementary wire types: block references and the two string forms.

use binrw::{BinRead, BinWrite};

use crate::error::{NifError, Result};
use crate::stream::{NiIStream, NiOStream};

/// The `u32::MAX` sentinel meaning "no index".
pub const NIF_NPOS: u32 = u32::MAX;

/// Upper bound on sane string pool indices. Anything above it (other
/// than [`NIF_NPOS`]) is treated as corrupt.
pub const NIF_STRING_INDEX_LIMIT: u32 = 1_000_000;

/// Longest inline string accepted while reading pre-20.1.0.3 files.
const NIF_INLINE_STRING_CAP: usize = 2048;

/// A nullable block index denoting an owning child edge.
///
/// References never hold the block itself; a block is only reached
/// through the owning block array. Structural edits rewrite the index
/// in place, which is what keeps references valid across them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BinRead, BinWrite)]
pub struct NiRef {
    pub index: u32,
}

impl NiRef {
    pub fn new(index: u32) -> Self {
        Self { index }
    }

    /// Whether the reference points at nothing.
    pub fn is_empty(&self) -> bool {
        self.index == NIF_NPOS
    }

    /// Severs the reference.
    pub fn clear(&mut self) {
        self.index = NIF_NPOS;
    }
}

impl Default for NiRef {
    fn default() -> Self {
        Self { index: NIF_NPOS }
    }
}

/// A nullable block index denoting a non-owning back edge.
///
/// Same wire shape as [`NiRef`]; the distinction exists so that edits
/// rewrite both kinds without ever inverting which edge owns the
/// target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BinRead, BinWrite)]
pub struct NiPtr {
    pub index: u32,
}

impl NiPtr {
    pub fn new(index: u32) -> Self {
        Self { index }
    }

    pub fn is_empty(&self) -> bool {
        self.index == NIF_NPOS
    }

    pub fn clear(&mut self) {
        self.index = NIF_NPOS;
    }
}

impl Default for NiPtr {
    fn default() -> Self {
        Self { index: NIF_NPOS }
    }
}

/// A length-prefixed byte string with a 1, 2, or 4 byte length.
///
/// The count on the wire does not include a NUL terminator unless
/// null output is enabled, in which case the serialized length is
/// `len + 1` and a trailing `0x00` follows the bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NiString {
    value: String,
    null_output: bool,
}

impl NiString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            null_output: false,
        }
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Appends a trailing NUL on the next write.
    pub fn set_null_output(&mut self) {
        self.null_output = true;
    }

    /// Reads a length of the given width followed by that many bytes.
    /// Any width other than 1, 2, or 4 is a no-op.
    ///
    /// The stored value stops at the first embedded NUL.
    pub fn read(&mut self, stream: &mut NiIStream<'_>, sz_size: u8) -> Result<()> {
        let len = match sz_size {
            1 => stream.read_u8()? as usize,
            2 => stream.read_u16()? as usize,
            4 => stream.read_u32()? as usize,
            _ => return Ok(()),
        };

        let mut buf = vec![0u8; len];
        stream.read_bytes(&mut buf)?;

        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        self.value = String::from_utf8_lossy(&buf[..end]).into_owned();
        Ok(())
    }

    /// Mirrors [`NiString::read`]. The serialized length is the string
    /// length cast to the prefix width; the stored value is truncated
    /// to the cast value first, so a wider string narrows on write.
    pub fn write(&mut self, stream: &mut NiOStream<'_>, sz_size: u8) -> Result<()> {
        match sz_size {
            1 => {
                let sz = self.value.len() as u8;
                self.truncate(sz as usize);
                let out = if self.null_output { sz.wrapping_add(1) } else { sz };
                stream.write_u8(out)?;
            }
            2 => {
                let sz = self.value.len() as u16;
                self.truncate(sz as usize);
                let out = if self.null_output { sz.wrapping_add(1) } else { sz };
                stream.write_u16(out)?;
            }
            4 => {
                let sz = self.value.len() as u32;
                self.truncate(sz as usize);
                let out = if self.null_output { sz.wrapping_add(1) } else { sz };
                stream.write_u32(out)?;
            }
            _ => {}
        }

        stream.write_bytes(self.value.as_bytes())?;
        if self.null_output {
            stream.write_u8(0)?;
        }
        Ok(())
    }

    fn truncate(&mut self, mut at: usize) {
        if at >= self.value.len() {
            return;
        }
        while !self.value.is_char_boundary(at) {
            at -= 1;
        }
        self.value.truncate(at);
    }
}

impl From<&str> for NiString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A block-level string that is inline in old files and an index into
/// the header's central string pool in new ones.
///
/// The cached value is a copy; the pool is the authoritative store
/// once the file version has one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NiStringRef {
    value: String,
    index: u32,
}

impl NiStringRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            index: NIF_NPOS,
        }
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn set_index(&mut self, index: u32) {
        self.index = index;
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.index = NIF_NPOS;
    }

    /// Reads the reference in the form the stream's version dictates:
    /// an inline `u32`-length string before 20.1.0.3, a pool index
    /// from then on.
    ///
    /// Inline strings longer than 2048 bytes are consumed in full but
    /// truncated; the cached value stops at the first embedded NUL.
    /// Pool indices above [`NIF_STRING_INDEX_LIMIT`] fail with
    /// [`NifError::LengthError`].
    pub fn read(&mut self, stream: &mut NiIStream<'_>) -> Result<()> {
        if !stream.version().has_pooled_string_refs() {
            let len = stream.read_u32()? as usize;
            let keep = len.min(NIF_INLINE_STRING_CAP);

            let mut buf = vec![0u8; keep];
            stream.read_bytes(&mut buf)?;
            stream.skip((len - keep) as u64)?;

            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            self.value = String::from_utf8_lossy(&buf[..end]).into_owned();
        } else {
            self.index = stream.read_u32()?;

            if self.index != NIF_NPOS && self.index > NIF_STRING_INDEX_LIMIT {
                return Err(NifError::LengthError(
                    "read: string index is too high".into(),
                ));
            }
        }

        Ok(())
    }

    /// Mirrors [`NiStringRef::read`].
    pub fn write(&self, stream: &mut NiOStream<'_>) -> Result<()> {
        if !stream.version().has_pooled_string_refs() {
            stream.write_u32(self.value.len() as u32)?;
            stream.write_bytes(self.value.as_bytes())?;
        } else {
            if self.index != NIF_NPOS && self.index > NIF_STRING_INDEX_LIMIT {
                return Err(NifError::LengthError(
                    "write: string index is too high".into(),
                ));
            }
            stream.write_u32(self.index)?;
        }

        Ok(())
    }
}

impl Default for NiStringRef {
    fn default() -> Self {
        Self {
            value: String::new(),
            index: NIF_NPOS,
        }
    }
}
