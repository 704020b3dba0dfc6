//! Error types shared by every reading, writing, and editing operation.

use std::io;

use thiserror::Error;

/// Result type alias for NIF operations.
pub type Result<T> = std::result::Result<T, NifError>;

/// Failure modes of the container layer.
#[derive(Debug, Error)]
pub enum NifError {
    /// The stream ended in the middle of a field.
    #[error("stream ended in the middle of a field")]
    Truncated,

    /// The underlying byte stream failed to read or write.
    #[error("i/o failure: {0}")]
    Io(io::Error),

    /// The first line of the file matches none of the known
    /// version-string families.
    #[error("unrecognized version string")]
    BadSignature,

    /// The file version lies outside the accepted range.
    #[error("unsupported file version {0:#010x}")]
    VersionUnsupported(u32),

    /// A string index exceeded its limit.
    #[error("{0}")]
    LengthError(String),

    /// A post-condition check after an edit found a dangling
    /// reference or a desync between the header tables and the
    /// block array.
    #[error("graph invariant violated: {0}")]
    InvariantViolated(String),

    /// A block type has no registered constructor and the file
    /// carries no block size to skip it by.
    #[error("no constructor registered for block type `{0}`")]
    UnknownBlockType(String),
}

impl From<io::Error> for NifError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            NifError::Truncated
        } else {
            NifError::Io(err)
        }
    }
}

impl From<binrw::Error> for NifError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(e) => e.into(),
            other => NifError::Io(io::Error::new(io::ErrorKind::InvalidData, other.to_string())),
        }
    }
}
