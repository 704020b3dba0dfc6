//! Endian-aware byte streams for reading and writing container data.
//!
//! Both stream types are type-erased over the caller's reader or
//! writer so that block constructors can be stored as plain boxed
//! closures. They carry the active [`NiVersion`] because string
//! references and block payloads change their wire form with it, and
//! the current byte order, which switches in place once the header's
//! endian flag has been read or written. Everything in front of that
//! flag is little-endian by definition of the format.
//!
//! Streams are not thread-safe; each wraps exclusive access to its
//! source or sink.

use std::io::{self, Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite, Endian};

use crate::error::{NifError, Result};
use crate::version::NiVersion;

/// Byte-order flag stored in headers of file version 20.0.0.3 and up.
///
/// On the wire this is a single byte: 0 for big-endian, anything else
/// for little-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NiEndian {
    Big,
    #[default]
    Little,
}

impl NiEndian {
    pub fn from_u8(value: u8) -> Self {
        if value == 0 {
            Self::Big
        } else {
            Self::Little
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Big => 0,
            Self::Little => 1,
        }
    }
}

impl From<NiEndian> for Endian {
    fn from(value: NiEndian) -> Self {
        match value {
            NiEndian::Big => Endian::Big,
            NiEndian::Little => Endian::Little,
        }
    }
}

/// Anything an input stream can wrap.
pub trait ReadSource: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSource for T {}

/// Anything an output stream can wrap.
pub trait WriteSink: Write + Seek {}

impl<T: Write + Seek + ?Sized> WriteSink for T {}

macro_rules! impl_read_scalar {
    ($($fn_name:ident -> $ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $fn_name(&mut self) -> Result<$ty> {
                let endian = self.endian;
                <$ty>::read_options(self, endian, ()).map_err(NifError::from)
            }
        )*
    };
}

macro_rules! impl_write_scalar {
    ($($fn_name:ident($ty:ty)),* $(,)?) => {
        $(
            #[inline]
            pub fn $fn_name(&mut self, value: $ty) -> Result<()> {
                let endian = self.endian;
                value.write_options(self, endian, ()).map_err(NifError::from)
            }
        )*
    };
}

/// An input stream over caller-supplied bytes.
///
/// Short reads surface as [`NifError::Truncated`].
pub struct NiIStream<'a> {
    inner: &'a mut dyn ReadSource,
    endian: Endian,
    version: NiVersion,
}

impl<'a> NiIStream<'a> {
    /// Wraps a reader. The stream starts out little-endian.
    pub fn new<R: Read + Seek>(inner: &'a mut R, version: NiVersion) -> Self {
        Self {
            inner,
            endian: Endian::Little,
            version,
        }
    }

    /// The version active for this stream.
    pub fn version(&self) -> &NiVersion {
        &self.version
    }

    pub fn set_version(&mut self, version: NiVersion) {
        self.version = version;
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: NiEndian) {
        self.endian = endian.into();
    }

    impl_read_scalar! {
        read_u8 -> u8,
        read_u16 -> u16,
        read_u32 -> u32,
        read_u64 -> u64,
        read_f32 -> f32,
        read_f64 -> f64,
    }

    /// Fills `buf` from the stream.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(NifError::from)
    }

    /// Advances the stream position by `count` bytes without reading.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.inner
            .seek(SeekFrom::Current(count as i64))
            .map_err(NifError::from)?;
        Ok(())
    }

    /// Reads bytes up to a `0x0A` terminator (consumed, not returned)
    /// or `max_len` bytes, whichever comes first. Hitting the end of
    /// the stream ends the line.
    pub fn getline(&mut self, max_len: usize) -> Result<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        while line.len() < max_len {
            match self.inner.read_exact(&mut byte) {
                Ok(()) => {
                    if byte[0] == 0x0A {
                        break;
                    }
                    line.push(byte[0]);
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// The current position in the stream.
    pub fn stream_position(&mut self) -> Result<u64> {
        self.inner.stream_position().map_err(NifError::from)
    }
}

impl Read for NiIStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for NiIStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// An output stream over a caller-supplied sink.
///
/// Failed writes surface as [`NifError::Io`].
pub struct NiOStream<'a> {
    inner: &'a mut dyn WriteSink,
    endian: Endian,
    version: NiVersion,
}

impl<'a> NiOStream<'a> {
    /// Wraps a writer. The stream starts out little-endian.
    pub fn new<W: Write + Seek>(inner: &'a mut W, version: NiVersion) -> Self {
        Self {
            inner,
            endian: Endian::Little,
            version,
        }
    }

    /// The version active for this stream.
    pub fn version(&self) -> &NiVersion {
        &self.version
    }

    pub fn set_version(&mut self, version: NiVersion) {
        self.version = version;
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: NiEndian) {
        self.endian = endian.into();
    }

    impl_write_scalar! {
        write_u8(u8),
        write_u16(u16),
        write_u32(u32),
        write_u64(u64),
        write_f32(f32),
        write_f64(f64),
    }

    /// Writes `buf` to the stream in full.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf).map_err(NifError::from)
    }

    /// Writes `line` followed by a `0x0A` terminator.
    pub fn writeline(&mut self, line: &str) -> Result<()> {
        self.write_bytes(line.as_bytes())?;
        self.write_u8(0x0A)
    }

    /// The current position in the stream.
    pub fn stream_position(&mut self) -> Result<u64> {
        self.inner.stream_position().map_err(NifError::from)
    }

    /// Moves the stream position, for backpatching reserved tables.
    pub fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        self.inner.seek(pos).map_err(NifError::from)
    }
}

impl Write for NiOStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for NiOStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
