//! Container layer for the Gamebryo/NetImmerse File Format (NIF).
//!
//! A NIF file is a versioned binary container holding a directed
//! graph of typed blocks. This crate implements the parts of the
//! format that stay the same no matter which blocks a file carries:
//! the version-dependent header, the block graph with its ordinal
//! references and central string pool, and the edit operations that
//! keep all of it consistent (adding, deleting, replacing, and
//! reordering blocks rewrites every reference transitively).
//!
//! Block payloads are opaque to this crate. They implement the
//! [`NiObject`] trait (name your type, serialize yourself, enumerate
//! your reference fields) and register a constructor in a
//! [`BlockRegistry`] keyed on the type name. Types the registry does
//! not know load as [`NiUnknown`] and round-trip verbatim.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use nifio::{BlockRegistry, NifFile};
//!
//! # fn main() -> nifio::Result<()> {
//! let registry = BlockRegistry::new();
//! let mut reader = BufReader::new(File::open("mesh.nif")?);
//!
//! let mut nif = NifFile::read(&mut reader, &registry)?;
//! nif.delete_blocks_by_type("NiStringExtraData", true)?;
//! # Ok(())
//! # }
//! ```

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod basic;
pub mod error;
pub mod file;
pub mod header;
pub mod object;
pub mod registry;
pub mod stream;
pub mod version;

pub use self::basic::{NiPtr, NiRef, NiString, NiStringRef, NIF_NPOS, NIF_STRING_INDEX_LIMIT};
pub use self::error::{NifError, Result};
pub use self::file::{NiFooter, NifFile};
pub use self::header::NiHeader;
pub use self::object::{NiObject, NiUnknown};
pub use self::registry::BlockRegistry;
pub use self::stream::{NiEndian, NiIStream, NiOStream};
pub use self::version::{NiFileVersion, NiVersion};
