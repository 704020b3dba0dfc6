//! The version-dependent file preamble and its bookkeeping tables.

use tracing::debug;

use crate::basic::{NiString, NIF_NPOS};
use crate::error::Result;
use crate::stream::{NiEndian, NiIStream, NiOStream};
use crate::version::{parse_version_line, NiVersion, V3_1};

/// Sentinel returned by [`NiHeader::block_type_index_of`] for an
/// out-of-range block id.
pub const NIF_BLOCK_TYPE_NPOS: u16 = u16::MAX;

/// The header of a NIF file.
///
/// Owns everything the preamble stores: the version quadruple, the
/// block type registry with the per-block type indices, the block
/// size table, the central string pool, export metadata, and the
/// group sizes. The blocks themselves live in the owning
/// [`crate::file::NifFile`]; the tables here are kept aligned with
/// that array by the graph editor.
///
/// Every field after the first is gated on the file version; `get`
/// and `put` walk the same canonical field order with the same
/// predicates so that reading and writing cannot drift apart.
#[derive(Clone, Debug, Default)]
pub struct NiHeader {
    valid: bool,
    version: NiVersion,
    endian: NiEndian,

    creator: NiString,
    export_info1: NiString,
    export_info2: NiString,
    export_info3: NiString,
    unk_int1: u32,
    embed_data: Vec<u8>,
    copyright: [String; 3],

    num_blocks: u32,
    block_types: Vec<NiString>,
    block_type_indices: Vec<u16>,
    block_sizes: Vec<u32>,

    strings: Vec<NiString>,
    max_string_len: u32,

    group_sizes: Vec<u32>,

    // Stream offset of the reserved block size table during a write.
    block_size_pos: Option<u64>,
}

impl NiHeader {
    /// Creates an empty, valid header for the given version, ready to
    /// be populated through the graph editor.
    pub fn new(version: NiVersion) -> Self {
        Self {
            valid: true,
            version,
            ..Self::default()
        }
    }

    /// Whether the header was recognized on read (or built locally).
    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn version(&self) -> &NiVersion {
        &self.version
    }

    pub fn version_mut(&mut self) -> &mut NiVersion {
        &mut self.version
    }

    pub fn endian(&self) -> NiEndian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: NiEndian) {
        self.endian = endian;
    }

    /// Number of blocks the header accounts for.
    pub fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    /// Number of distinct block type names.
    pub fn num_block_types(&self) -> u32 {
        self.block_types.len() as u32
    }

    /// The registered type names in table order.
    pub fn block_types(&self) -> impl Iterator<Item = &str> {
        self.block_types.iter().map(NiString::get)
    }

    /// The per-block type indices.
    pub fn block_type_indices(&self) -> &[u16] {
        &self.block_type_indices
    }

    /// The per-block payload sizes; empty below file 20.2.0.5.
    pub fn block_sizes(&self) -> &[u32] {
        &self.block_sizes
    }

    /// The type name of the given block, or empty when the id or its
    /// type index is out of range.
    pub fn block_type_string(&self, block_id: u32) -> String {
        self.block_type_name_checked(block_id)
            .unwrap_or_default()
            .to_string()
    }

    pub(crate) fn block_type_name_checked(&self, block_id: u32) -> Option<&str> {
        if block_id == NIF_NPOS || block_id >= self.num_blocks {
            return None;
        }

        let type_index = *self.block_type_indices.get(block_id as usize)?;
        self.block_types
            .get(type_index as usize)
            .map(NiString::get)
    }

    /// The type index of the given block, or [`NIF_BLOCK_TYPE_NPOS`]
    /// when the id is out of range.
    pub fn block_type_index_of(&self, block_id: u32) -> u16 {
        if block_id != NIF_NPOS && block_id < self.num_blocks {
            self.block_type_indices
                .get(block_id as usize)
                .copied()
                .unwrap_or(NIF_BLOCK_TYPE_NPOS)
        } else {
            NIF_BLOCK_TYPE_NPOS
        }
    }

    /// The recorded payload size of the given block, when the file
    /// version carries a size table.
    pub fn block_size_of(&self, block_id: u32) -> Option<u32> {
        self.block_sizes.get(block_id as usize).copied()
    }

    pub(crate) fn set_block_size(&mut self, block_id: usize, size: u32) {
        if let Some(slot) = self.block_sizes.get_mut(block_id) {
            *slot = size;
        }
    }

    /// Stream offset of the reserved block size table after a `put`,
    /// used to backpatch the measured sizes.
    pub fn block_size_pos(&self) -> Option<u64> {
        self.block_size_pos
    }

    pub(crate) fn reset_block_size_pos(&mut self) {
        self.block_size_pos = None;
    }

    pub fn creator_info(&self) -> &str {
        self.creator.get()
    }

    pub fn set_creator_info(&mut self, creator: impl Into<String>) {
        self.creator.set(creator);
    }

    /// The export strings joined with newlines, skipping empty ones.
    pub fn export_info(&self) -> String {
        let mut info = self.export_info1.get().to_string();

        for part in [&self.export_info2, &self.export_info3] {
            if !part.is_empty() {
                info.push('\n');
                info.push_str(part.get());
            }
        }

        info
    }

    /// Splits `info` across the three export strings, 254 bytes each.
    pub fn set_export_info(&mut self, info: &str) {
        self.export_info1.clear();
        self.export_info2.clear();
        self.export_info3.clear();

        let mut rest = info;
        for slot in [
            &mut self.export_info1,
            &mut self.export_info2,
            &mut self.export_info3,
        ] {
            if rest.is_empty() {
                break;
            }

            let mut at = rest.len().min(254);
            while !rest.is_char_boundary(at) {
                at -= 1;
            }

            slot.set(&rest[..at]);
            rest = &rest[at..];
        }
    }

    pub fn embed_data(&self) -> &[u8] {
        &self.embed_data
    }

    pub fn set_embed_data(&mut self, data: Vec<u8>) {
        self.embed_data = data;
    }

    /// The three copyright lines of pre-3.1 files.
    pub fn copyright(&self) -> &[String; 3] {
        &self.copyright
    }

    pub fn set_copyright(&mut self, copyright: [String; 3]) {
        self.copyright = copyright;
    }

    pub fn group_sizes(&self) -> &[u32] {
        &self.group_sizes
    }

    pub fn set_group_sizes(&mut self, group_sizes: Vec<u32>) {
        self.group_sizes = group_sizes;
    }

    /// Resets the tables to the empty state.
    pub fn clear(&mut self) {
        self.num_blocks = 0;
        self.block_types.clear();
        self.block_type_indices.clear();
        self.block_sizes.clear();
        self.strings.clear();
        self.max_string_len = 0;
        self.group_sizes.clear();
    }

    // Block type table

    /// Looks `name` up in the type table (byte-exact) and appends it
    /// when absent. Returns the type index either way.
    pub fn add_or_find_block_type_id(&mut self, name: &str) -> u16 {
        if let Some(id) = self.find_block_type_id(name) {
            return id;
        }

        self.block_types.push(NiString::new(name));
        (self.block_types.len() - 1) as u16
    }

    pub(crate) fn find_block_type_id(&self, name: &str) -> Option<u16> {
        self.block_types
            .iter()
            .position(|t| t.get() == name)
            .map(|i| i as u16)
    }

    /// Appends table entries for a freshly added block of the given
    /// type: its type index and, when the version carries a size
    /// table, a zero size to be patched on write.
    pub(crate) fn add_block_entry(&mut self, type_id: u16) {
        self.block_type_indices.push(type_id);

        if self.version.has_block_sizes() {
            self.block_sizes.push(0);
        }

        self.num_blocks += 1;
    }

    /// Pre-5.0.0.1 files name each block inline instead of through a
    /// table; reading registers the name here so the tables stay
    /// aligned with the block array.
    pub(crate) fn record_inline_type(&mut self, name: &str) {
        let type_id = self.add_or_find_block_type_id(name);
        self.block_type_indices.push(type_id);
    }

    /// Drops the table entries of a deleted block. When the block was
    /// the last user of its type, the type is dropped as well and all
    /// later type indices shift down.
    pub(crate) fn remove_block_entry(&mut self, block_id: u32) {
        let idx = block_id as usize;
        let type_id = self.block_type_indices[idx];

        let type_ref_count = self
            .block_type_indices
            .iter()
            .filter(|&&t| t == type_id)
            .count();

        if type_ref_count < 2 {
            self.block_types.remove(type_id as usize);
            for t in &mut self.block_type_indices {
                if *t > type_id {
                    *t -= 1;
                }
            }
        }

        self.block_type_indices.remove(idx);

        if !self.block_sizes.is_empty() {
            self.block_sizes.remove(idx);
        }

        self.num_blocks -= 1;
    }

    /// Rewrites the table entries of a replaced block: the old type is
    /// compacted away when it loses its last user, the new type is
    /// registered, and the recorded size resets to zero.
    pub(crate) fn replace_block_entry(&mut self, block_id: u32, new_name: &str) {
        let idx = block_id as usize;
        let type_id = self.block_type_indices[idx];

        let type_ref_count = self
            .block_type_indices
            .iter()
            .filter(|&&t| t == type_id)
            .count();

        if type_ref_count < 2 {
            self.block_types.remove(type_id as usize);
            for t in &mut self.block_type_indices {
                if *t > type_id {
                    *t -= 1;
                }
            }
        }

        let new_type_id = self.add_or_find_block_type_id(new_name);
        self.block_type_indices[idx] = new_type_id;

        if let Some(slot) = self.block_sizes.get_mut(idx) {
            *slot = 0;
        }
    }

    /// Moves every table entry from position `i` to `new_order[i]`.
    pub(crate) fn reorder_block_entries(&mut self, new_order: &[u32]) {
        let mut new_type_indices = vec![0u16; self.block_type_indices.len()];
        for (i, &t) in self.block_type_indices.iter().enumerate() {
            new_type_indices[new_order[i] as usize] = t;
        }
        self.block_type_indices = new_type_indices;

        if !self.block_sizes.is_empty() {
            let mut new_sizes = vec![0u32; self.block_sizes.len()];
            for (i, &s) in self.block_sizes.iter().enumerate() {
                new_sizes[new_order[i] as usize] = s;
            }
            self.block_sizes = new_sizes;
        }
    }

    // String pool

    /// Number of entries in the central string pool.
    pub fn string_count(&self) -> u32 {
        self.strings.len() as u32
    }

    /// Length of the longest pool entry, as recorded in the header.
    pub fn max_string_len(&self) -> u32 {
        self.max_string_len
    }

    /// The pool entries in order.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(NiString::get)
    }

    /// Index of `value` in the pool, or [`NIF_NPOS`].
    pub fn find_string_id(&self, value: &str) -> u32 {
        self.strings
            .iter()
            .position(|s| s.get() == value)
            .map(|i| i as u32)
            .unwrap_or(NIF_NPOS)
    }

    /// Looks `value` up in the pool and appends it when absent.
    ///
    /// Empty strings are only added when `add_empty` is set; otherwise
    /// the call returns [`NIF_NPOS`] for them. A full pool also
    /// returns [`NIF_NPOS`].
    pub fn add_or_find_string_id(&mut self, value: &str, add_empty: bool) -> u32 {
        let found = self.find_string_id(value);
        if found != NIF_NPOS {
            return found;
        }

        if !add_empty && value.is_empty() {
            return NIF_NPOS;
        }

        if self.strings.len() >= u32::MAX as usize {
            return NIF_NPOS;
        }

        self.strings.push(NiString::new(value));
        (self.strings.len() - 1) as u32
    }

    /// The pool entry at `id`, or empty when out of range.
    pub fn string_by_id(&self, id: u32) -> String {
        if id == NIF_NPOS {
            return String::new();
        }
        self.strings
            .get(id as usize)
            .map(|s| s.get().to_string())
            .unwrap_or_default()
    }

    pub fn set_string_by_id(&mut self, id: u32, value: impl Into<String>) {
        if id == NIF_NPOS {
            return;
        }
        if let Some(slot) = self.strings.get_mut(id as usize) {
            slot.set(value);
        }
    }

    /// Empties the pool.
    pub fn clear_strings(&mut self) {
        self.strings.clear();
        self.max_string_len = 0;
    }

    /// Recomputes the recorded maximum string length from the pool.
    pub fn update_max_string_length(&mut self) {
        self.max_string_len = self
            .strings
            .iter()
            .map(|s| s.len() as u32)
            .max()
            .unwrap_or(0);
    }

    // Serialization

    /// Parses the preamble from the stream.
    ///
    /// An unrecognized version-string family returns `Ok(())` with the
    /// header left invalid and nothing consumed beyond the first line.
    /// On success the stream's version and endian reflect the header
    /// for the block payloads that follow.
    pub fn get(&mut self, stream: &mut NiIStream<'_>) -> Result<()> {
        let line = stream.getline(128)?;
        let Some(parsed) = parse_version_line(&line) else {
            debug!("first line matches no known version-string family");
            return Ok(());
        };

        let mut file = parsed.file;
        if file > V3_1 && !parsed.nds {
            let binary = stream.read_u32()?;
            if binary != file {
                // The binary field is authoritative; the string is
                // only a signature.
                debug!("version string {file:#010x} and binary version {binary:#010x} disagree");
            }
            file = binary;
        } else if parsed.nds {
            let nds = stream.read_u32()?;
            self.version.set_nds(nds);
        } else {
            for entry in &mut self.copyright {
                *entry = stream.getline(128)?;
            }
        }

        self.version.set_file(file);

        if self.version.has_endian_flag() {
            self.endian = NiEndian::from_u8(stream.read_u8()?);
            stream.set_endian(self.endian);
        } else {
            self.endian = NiEndian::Little;
        }

        if self.version.has_user_version() {
            let user = stream.read_u32()?;
            self.version.set_user(user);
        }

        self.num_blocks = stream.read_u32()?;

        if self.version.is_bethesda() {
            let stream_version = stream.read_u32()?;
            self.version.set_stream(stream_version);

            self.creator.read(stream, 1)?;

            if self.version.stream() > 130 {
                self.unk_int1 = stream.read_u32()?;
            }

            self.export_info1.read(stream, 1)?;
            self.export_info2.read(stream, 1)?;

            if self.version.stream() == 130 {
                self.export_info3.read(stream, 1)?;
            }
        } else if self.version.has_embed_data() {
            let embed_size = stream.read_u32()?;
            self.embed_data = vec![0u8; embed_size as usize];
            stream.read_bytes(&mut self.embed_data)?;
        }

        if self.version.has_block_type_table() {
            let num_block_types = stream.read_u32()?;
            self.block_types = Vec::with_capacity(num_block_types as usize);
            for _ in 0..num_block_types {
                let mut name = NiString::default();
                name.read(stream, 4)?;
                self.block_types.push(name);
            }

            self.block_type_indices = Vec::with_capacity(self.num_blocks as usize);
            for _ in 0..self.num_blocks {
                self.block_type_indices.push(stream.read_u16()?);
            }
        }

        if self.version.has_block_sizes() {
            self.block_sizes = Vec::with_capacity(self.num_blocks as usize);
            for _ in 0..self.num_blocks {
                self.block_sizes.push(stream.read_u32()?);
            }
        }

        if self.version.has_string_pool() {
            let num_strings = stream.read_u32()?;
            self.max_string_len = stream.read_u32()?;

            self.strings = Vec::with_capacity(num_strings as usize);
            for _ in 0..num_strings {
                let mut value = NiString::default();
                value.read(stream, 4)?;
                self.strings.push(value);
            }
        }

        if self.version.has_group_table() {
            let num_groups = stream.read_u32()?;
            self.group_sizes = Vec::with_capacity(num_groups as usize);
            for _ in 0..num_groups {
                self.group_sizes.push(stream.read_u32()?);
            }
        }

        stream.set_version(self.version);
        self.valid = true;
        Ok(())
    }

    /// Serializes the preamble to the stream, walking the same field
    /// order and version predicates as `get`.
    ///
    /// When the version carries a block size table its stream offset
    /// is recorded in [`NiHeader::block_size_pos`]; the values written
    /// here are placeholders the writer patches after measuring each
    /// payload.
    pub fn put(&mut self, stream: &mut NiOStream<'_>) -> Result<()> {
        stream.set_version(self.version);

        stream.write_bytes(self.version.string().as_bytes())?;
        stream.write_u8(0x0A)?;

        if self.version.has_binary_version() {
            stream.write_u32(self.version.file())?;
        } else if self.version.nds() != 0 {
            stream.write_u32(self.version.nds())?;
        } else {
            for line in &self.copyright {
                stream.writeline(line)?;
            }
        }

        if self.version.has_endian_flag() {
            stream.write_u8(self.endian.to_u8())?;
            stream.set_endian(self.endian);
        }

        if self.version.has_user_version() {
            stream.write_u32(self.version.user())?;
        }

        stream.write_u32(self.num_blocks)?;

        if self.version.is_bethesda() {
            stream.write_u32(self.version.stream())?;

            self.creator.set_null_output();
            self.creator.write(stream, 1)?;

            if self.version.stream() > 130 {
                stream.write_u32(self.unk_int1)?;
            }

            self.export_info1.set_null_output();
            self.export_info1.write(stream, 1)?;

            self.export_info2.set_null_output();
            self.export_info2.write(stream, 1)?;

            if self.version.stream() == 130 {
                self.export_info3.set_null_output();
                self.export_info3.write(stream, 1)?;
            }
        } else if self.version.has_embed_data() {
            stream.write_u32(self.embed_data.len() as u32)?;
            stream.write_bytes(&self.embed_data)?;
        }

        if self.version.has_block_type_table() {
            stream.write_u32(self.block_types.len() as u32)?;
            for name in &mut self.block_types {
                name.write(stream, 4)?;
            }

            for &t in &self.block_type_indices {
                stream.write_u16(t)?;
            }
        }

        if self.version.has_block_sizes() {
            self.block_size_pos = Some(stream.stream_position()?);
            for &size in &self.block_sizes {
                stream.write_u32(size)?;
            }
        }

        if self.version.has_string_pool() {
            stream.write_u32(self.strings.len() as u32)?;
            stream.write_u32(self.max_string_len)?;
            for value in &mut self.strings {
                value.write(stream, 4)?;
            }
        }

        if self.version.has_group_table() {
            stream.write_u32(self.group_sizes.len() as u32)?;
            for &size in &self.group_sizes {
                stream.write_u32(size)?;
            }
        }

        Ok(())
    }

    pub(crate) fn put_block_sizes(&self, stream: &mut NiOStream<'_>) -> Result<()> {
        for &size in &self.block_sizes {
            stream.write_u32(size)?;
        }
        Ok(())
    }
}
