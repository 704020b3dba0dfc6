//! Whole-file reading and writing plus the graph editor.
//!
//! A [`NifFile`] pairs the header's bookkeeping tables with the block
//! arena. Block identity is ordinal: a block's id is its position in
//! the arena, and [`crate::basic::NiRef`]/[`crate::basic::NiPtr`]
//! fields hold those ordinals. Every structural edit therefore goes
//! through this type, which rewrites all reference fields and keeps
//! the header tables aligned with the arena.
//!
//! Edits are synchronous and run to completion; a file instance
//! assumes exclusive access. Reference rewriting happens in place,
//! and the enumerators blocks expose are infallible, so an edit
//! either completes or fails its up-front checks.

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, warn};

use crate::basic::{NiRef, NiString, NIF_NPOS};
use crate::error::{NifError, Result};
use crate::header::NiHeader;
use crate::object::NiObject;
use crate::registry::BlockRegistry;
use crate::stream::{NiIStream, NiOStream};
use crate::version::{is_supported, NiVersion};

/// The trailer of a NIF file: the root blocks of the scene graph.
///
/// The roots are ordinary block references and are rewritten by the
/// graph editor along with every in-block reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NiFooter {
    pub roots: Vec<NiRef>,
}

impl NiFooter {
    /// Reads the root list from the stream.
    pub fn get(&mut self, stream: &mut NiIStream<'_>) -> Result<()> {
        let num_roots = stream.read_u32()?;

        self.roots = Vec::with_capacity(num_roots as usize);
        for _ in 0..num_roots {
            self.roots.push(NiRef::new(stream.read_u32()?));
        }

        Ok(())
    }

    /// Writes the root list to the stream.
    pub fn put(&self, stream: &mut NiOStream<'_>) -> Result<()> {
        stream.write_u32(self.roots.len() as u32)?;
        for root in &self.roots {
            stream.write_u32(root.index)?;
        }

        Ok(())
    }
}

/// A NIF file: header, block arena, and footer.
pub struct NifFile {
    header: NiHeader,
    blocks: Vec<Box<dyn NiObject>>,
    footer: NiFooter,
    has_unknown: bool,
}

impl NifFile {
    /// Creates an empty file for the given version, to be populated
    /// through [`NifFile::add_block`].
    pub fn new(version: NiVersion) -> Self {
        Self {
            header: NiHeader::new(version),
            blocks: Vec::new(),
            footer: NiFooter::default(),
            has_unknown: false,
        }
    }

    /// Parses a whole file from `reader`, constructing each block
    /// payload through `registry`.
    ///
    /// Blocks with unregistered type names load as
    /// [`crate::object::NiUnknown`] when the header declares their
    /// size, and mark the file (see [`NifFile::has_unknown`]).
    pub fn read<R: Read + Seek>(reader: &mut R, registry: &BlockRegistry) -> Result<Self> {
        let mut stream = NiIStream::new(reader, NiVersion::default());

        let mut header = NiHeader::default();
        header.get(&mut stream)?;

        if !header.valid() {
            return Err(NifError::BadSignature);
        }

        let file = header.version().file();
        if !is_supported(file) {
            return Err(NifError::VersionUnsupported(file));
        }

        if header.version().has_block_type_table() {
            let orphans = orphan_type_count(&header);
            if orphans > 0 {
                warn!(orphans, "type table carries entries no block uses");
            }
        }

        let num_blocks = header.num_blocks();
        let mut blocks: Vec<Box<dyn NiObject>> = Vec::with_capacity(num_blocks as usize);
        let mut has_unknown = false;

        let has_type_table = header.version().has_block_type_table();
        for i in 0..num_blocks {
            let name = if !has_type_table {
                // Old files name each block inline instead of through
                // the header's type table.
                let mut type_name = NiString::default();
                type_name.read(&mut stream, 4)?;
                header.record_inline_type(type_name.get());
                type_name.get().to_string()
            } else {
                header
                    .block_type_name_checked(i)
                    .ok_or_else(|| {
                        NifError::InvariantViolated(format!(
                            "block {i} has a type index outside the type table"
                        ))
                    })?
                    .to_string()
            };

            if !registry.contains(&name) {
                has_unknown = true;
            }

            let declared_size = header.block_size_of(i);
            blocks.push(registry.create(&name, &mut stream, declared_size)?);
        }

        let mut footer = NiFooter::default();
        footer.get(&mut stream)?;

        debug!(num_blocks, has_unknown, "block graph loaded");

        let mut nif = Self {
            header,
            blocks,
            footer,
            has_unknown,
        };
        nif.fill_string_refs();

        Ok(nif)
    }

    /// Serializes the whole file to `writer`.
    ///
    /// Rebuilds the string pool first, then writes the preamble with a
    /// reserved block size table, measures each payload as it is
    /// written, and patches the table in place afterwards.
    pub fn write<W: Write + Seek>(&mut self, writer: &mut W) -> Result<()> {
        let has_unknown = self.has_unknown;
        self.update_header_strings(has_unknown);

        let mut stream = NiOStream::new(writer, *self.header.version());
        self.header.put(&mut stream)?;

        let has_type_table = self.header.version().has_block_type_table();
        for (i, block) in self.blocks.iter_mut().enumerate() {
            if !has_type_table {
                let mut type_name = NiString::new(block.block_name());
                type_name.write(&mut stream, 4)?;
            }

            let start = stream.stream_position()?;
            block.put(&mut stream)?;
            let size = (stream.stream_position()? - start) as u32;

            self.header.set_block_size(i, size);
        }

        self.footer.put(&mut stream)?;

        if let Some(pos) = self.header.block_size_pos() {
            let end = stream.stream_position()?;
            stream.seek_to(SeekFrom::Start(pos))?;
            self.header.put_block_sizes(&mut stream)?;
            stream.seek_to(SeekFrom::Start(end))?;
            self.header.reset_block_size_pos();
        }

        debug!(num_blocks = self.blocks.len(), "block graph written");
        Ok(())
    }

    pub fn header(&self) -> &NiHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut NiHeader {
        &mut self.header
    }

    pub fn version(&self) -> &NiVersion {
        self.header.version()
    }

    pub fn footer(&self) -> &NiFooter {
        &self.footer
    }

    pub fn footer_mut(&mut self) -> &mut NiFooter {
        &mut self.footer
    }

    /// Whether any block loaded as an opaque fallback payload.
    pub fn has_unknown(&self) -> bool {
        self.has_unknown
    }

    /// The block arena in id order.
    pub fn blocks(&self) -> &[Box<dyn NiObject>] {
        &self.blocks
    }

    /// The block with the given id.
    pub fn block(&self, block_id: u32) -> Option<&dyn NiObject> {
        self.blocks.get(block_id as usize).map(|b| b.as_ref())
    }

    /// Mutable access to the block with the given id.
    pub fn block_mut(&mut self, block_id: u32) -> Option<&mut dyn NiObject> {
        self.blocks.get_mut(block_id as usize).map(|b| b.as_mut())
    }

    /// The block with the given id, downcast to a concrete payload
    /// type.
    pub fn block_as<T: NiObject>(&self, block_id: u32) -> Option<&T> {
        self.block(block_id)?.as_any().downcast_ref()
    }

    /// Mutable variant of [`NifFile::block_as`].
    pub fn block_as_mut<T: NiObject>(&mut self, block_id: u32) -> Option<&mut T> {
        self.block_mut(block_id)?.as_any_mut().downcast_mut()
    }

    /// The ordinal of a block found by identity, or [`NIF_NPOS`] when
    /// the block does not live in this arena.
    pub fn block_id_of(&self, target: &dyn NiObject) -> u32 {
        let target_ptr = target as *const dyn NiObject as *const ();

        self.blocks
            .iter()
            .position(|b| b.as_ref() as *const dyn NiObject as *const () == target_ptr)
            .map(|i| i as u32)
            .unwrap_or(NIF_NPOS)
    }

    // Graph editing

    /// Appends a block to the arena, registering its type name, and
    /// returns the new block id.
    pub fn add_block(&mut self, block: Box<dyn NiObject>) -> u32 {
        let type_id = self.header.add_or_find_block_type_id(block.block_name());
        self.header.add_block_entry(type_id);
        self.blocks.push(block);

        self.header.num_blocks() - 1
    }

    /// Deletes the block with the given id.
    ///
    /// Every reference to the deleted block becomes null, every
    /// reference past it shifts down by one, and the type table drops
    /// the block's type when it was its last user. Passing
    /// [`NIF_NPOS`] is a no-op.
    pub fn delete_block(&mut self, block_id: u32) -> Result<()> {
        if block_id == NIF_NPOS {
            return Ok(());
        }
        if block_id as usize >= self.blocks.len() {
            return Err(NifError::InvariantViolated(format!(
                "block id {block_id} out of range"
            )));
        }

        self.header.remove_block_entry(block_id);
        self.blocks.remove(block_id as usize);

        for block in &mut self.blocks {
            for r in block.child_refs_mut() {
                patch_deleted(&mut r.index, block_id);
            }
            for p in block.ptrs_mut() {
                patch_deleted(&mut p.index, block_id);
            }
        }
        for root in &mut self.footer.roots {
            patch_deleted(&mut root.index, block_id);
        }

        self.post_edit_check()
    }

    /// Deletes every block of the named type, or only the ones nothing
    /// references when `orphaned_only` is set.
    pub fn delete_blocks_by_type(&mut self, type_name: &str, orphaned_only: bool) -> Result<()> {
        let Some(type_id) = self.header.find_block_type_id(type_name) else {
            return Ok(());
        };

        let ids: Vec<u32> = self
            .header
            .block_type_indices()
            .iter()
            .enumerate()
            .filter(|(_, &t)| t == type_id)
            .map(|(i, _)| i as u32)
            .collect();

        // Descending order keeps the earlier ids stable while deleting.
        for &id in ids.iter().rev() {
            if orphaned_only && self.is_block_referenced(id, true) {
                continue;
            }
            self.delete_block(id)?;
        }

        Ok(())
    }

    /// Swaps in a new payload for an existing block id.
    ///
    /// Block ordinals and all existing references stay valid; only the
    /// type tables are rewritten. Returns the block id, or
    /// [`NIF_NPOS`] when that was passed in.
    pub fn replace_block(&mut self, block_id: u32, block: Box<dyn NiObject>) -> Result<u32> {
        if block_id == NIF_NPOS {
            return Ok(NIF_NPOS);
        }
        if block_id as usize >= self.blocks.len() {
            return Err(NifError::InvariantViolated(format!(
                "block id {block_id} out of range"
            )));
        }

        self.header.replace_block_entry(block_id, block.block_name());
        self.blocks[block_id as usize] = block;

        self.post_edit_check()?;
        Ok(block_id)
    }

    /// Moves the block at position `i` to position `new_order[i]` and
    /// rewrites every reference accordingly.
    ///
    /// A `new_order` of the wrong length is rejected as a no-op; one
    /// that is not a permutation of the block ids fails without
    /// modifying the graph.
    pub fn set_block_order(&mut self, new_order: &[u32]) -> Result<()> {
        if new_order.len() != self.blocks.len() {
            return Ok(());
        }

        // The move below loses blocks unless this is a permutation.
        let mut seen = vec![false; new_order.len()];
        for &target in new_order {
            let Some(slot) = seen.get_mut(target as usize) else {
                return Err(NifError::InvariantViolated(format!(
                    "block order target {target} out of range"
                )));
            };
            if *slot {
                return Err(NifError::InvariantViolated(format!(
                    "block order target {target} duplicated"
                )));
            }
            *slot = true;
        }

        let count = self.blocks.len();
        let mut slots: Vec<Option<Box<dyn NiObject>>> = Vec::with_capacity(count);
        slots.resize_with(count, || None);

        for (i, block) in self.blocks.drain(..).enumerate() {
            slots[new_order[i] as usize] = Some(block);
        }
        self.blocks = slots.into_iter().flatten().collect();

        self.header.reorder_block_entries(new_order);

        for block in &mut self.blocks {
            for r in block.child_refs_mut() {
                patch_reordered(&mut r.index, new_order);
            }
            for p in block.ptrs_mut() {
                patch_reordered(&mut p.index, new_order);
            }
        }
        for root in &mut self.footer.roots {
            patch_reordered(&mut root.index, new_order);
        }

        self.post_edit_check()
    }

    /// Whether any block points at the given id through a child
    /// reference, or through a back-pointer as well when
    /// `include_ptrs` is set.
    pub fn is_block_referenced(&self, block_id: u32, include_ptrs: bool) -> bool {
        if block_id == NIF_NPOS {
            return false;
        }

        self.blocks.iter().any(|block| {
            block.child_refs().iter().any(|r| r.index == block_id)
                || (include_ptrs && block.ptrs().iter().any(|p| p.index == block_id))
        })
    }

    /// Counts references to the given id across all blocks.
    pub fn block_ref_count(&self, block_id: u32, include_ptrs: bool) -> usize {
        if block_id == NIF_NPOS {
            return 0;
        }

        let mut count = 0;
        for block in &self.blocks {
            count += block.child_refs().iter().filter(|r| r.index == block_id).count();
            if include_ptrs {
                count += block.ptrs().iter().filter(|p| p.index == block_id).count();
            }
        }

        count
    }

    // String pool maintenance

    /// Read-side finalization for files with a central string pool:
    /// resolves every block's string reference against the pool and
    /// caches the value.
    ///
    /// Indices at or above the pool size are reinterpreted modulo the
    /// pool size first. That rule exists in shipped files and is kept
    /// for round-trip fidelity; it is data we inherit, not a design.
    pub fn fill_string_refs(&mut self) {
        if !self.header.version().has_string_pool() {
            return;
        }

        let num_strings = self.header.string_count();
        let header = &self.header;

        for block in &mut self.blocks {
            for string_ref in block.string_refs_mut() {
                let mut id = string_ref.index();

                if id != NIF_NPOS && id >= num_strings {
                    id -= num_strings;
                    string_ref.set_index(id);
                }

                string_ref.set(header.string_by_id(id));
            }
        }
    }

    /// Write-side rebuild of the central string pool.
    ///
    /// Starts from an empty pool (unless `has_unknown` blocks may hold
    /// live indices the enumerators cannot see), re-interns every
    /// block's string value, writes the new index back into the
    /// reference, and recomputes the maximum string length. Empty
    /// values only enter the pool when their reference currently holds
    /// a live index.
    pub fn update_header_strings(&mut self, has_unknown: bool) {
        if !has_unknown {
            self.header.clear_strings();
        }

        if !self.header.version().has_string_pool() {
            return;
        }

        let header = &mut self.header;
        for block in &mut self.blocks {
            for string_ref in block.string_refs_mut() {
                let add_empty = string_ref.index() != NIF_NPOS;
                let id = header.add_or_find_string_id(string_ref.get(), add_empty);
                string_ref.set_index(id);
            }
        }

        self.header.update_max_string_length();
    }

    // Integrity

    /// Full consistency check over the header tables, the block
    /// arena, and (for pooled versions) the string references.
    pub fn validate(&self) -> Result<()> {
        self.post_edit_check()?;

        let num_types = self.header.num_block_types() as usize;
        let mut used = vec![false; num_types];
        for &t in self.header.block_type_indices() {
            used[t as usize] = true;
        }
        if let Some(orphan) = used.iter().position(|&u| !u) {
            return Err(NifError::InvariantViolated(format!(
                "block type {orphan} has no blocks"
            )));
        }

        let types: Vec<&str> = self.header.block_types().collect();
        for i in 0..types.len() {
            for j in i + 1..types.len() {
                if types[i] == types[j] {
                    return Err(NifError::InvariantViolated(format!(
                        "block type `{}` registered twice",
                        types[i]
                    )));
                }
            }
        }

        if self.header.version().has_string_pool() {
            let num_strings = self.header.string_count();

            for (i, block) in self.blocks.iter().enumerate() {
                for string_ref in block.string_refs() {
                    let id = string_ref.index();
                    if id == NIF_NPOS {
                        continue;
                    }
                    if id >= num_strings {
                        return Err(NifError::InvariantViolated(format!(
                            "block {i} references string {id} outside the pool"
                        )));
                    }
                    if self.header.string_by_id(id) != string_ref.get() {
                        return Err(NifError::InvariantViolated(format!(
                            "block {i} caches a stale copy of string {id}"
                        )));
                    }
                }
            }

            let expected_max = self
                .header
                .strings()
                .map(|s| s.len() as u32)
                .max()
                .unwrap_or(0);
            if self.header.max_string_len() != expected_max {
                return Err(NifError::InvariantViolated(format!(
                    "recorded max string length {} does not match pool maximum {expected_max}",
                    self.header.max_string_len()
                )));
            }
        }

        Ok(())
    }

    /// The post-condition every edit must leave behind: tables and
    /// arena the same length, type indices inside the type table, and
    /// no reference past the end of the arena.
    fn post_edit_check(&self) -> Result<()> {
        let num_blocks = self.blocks.len();

        if self.header.num_blocks() as usize != num_blocks {
            return Err(NifError::InvariantViolated(format!(
                "header counts {} blocks, arena holds {num_blocks}",
                self.header.num_blocks()
            )));
        }
        if self.header.block_type_indices().len() != num_blocks {
            return Err(NifError::InvariantViolated(
                "type index table out of step with the arena".into(),
            ));
        }
        if self.header.version().has_block_sizes() && self.header.block_sizes().len() != num_blocks
        {
            return Err(NifError::InvariantViolated(
                "block size table out of step with the arena".into(),
            ));
        }

        let num_types = self.header.num_block_types();
        for &t in self.header.block_type_indices() {
            if t as u32 >= num_types {
                return Err(NifError::InvariantViolated(format!(
                    "type index {t} outside the type table"
                )));
            }
        }

        for (i, block) in self.blocks.iter().enumerate() {
            for r in block.child_refs() {
                if r.index != NIF_NPOS && r.index as usize >= num_blocks {
                    return Err(NifError::InvariantViolated(format!(
                        "block {i} holds a dangling child reference to {}",
                        r.index
                    )));
                }
            }
            for p in block.ptrs() {
                if p.index != NIF_NPOS && p.index as usize >= num_blocks {
                    return Err(NifError::InvariantViolated(format!(
                        "block {i} holds a dangling back-pointer to {}",
                        p.index
                    )));
                }
            }
        }

        for root in &self.footer.roots {
            if root.index != NIF_NPOS && root.index as usize >= num_blocks {
                return Err(NifError::InvariantViolated(format!(
                    "footer holds a dangling root reference to {}",
                    root.index
                )));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for NifFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NifFile")
            .field("version", self.header.version())
            .field("num_blocks", &self.blocks.len())
            .field("num_roots", &self.footer.roots.len())
            .field("has_unknown", &self.has_unknown)
            .finish()
    }
}

fn patch_deleted(index: &mut u32, deleted: u32) {
    if *index == NIF_NPOS {
        return;
    }

    if *index == deleted {
        *index = NIF_NPOS;
    } else if *index > deleted {
        *index -= 1;
    }
}

fn patch_reordered(index: &mut u32, new_order: &[u32]) {
    if *index != NIF_NPOS && (*index as usize) < new_order.len() {
        *index = new_order[*index as usize];
    }
}

fn orphan_type_count(header: &NiHeader) -> usize {
    let num_types = header.num_block_types() as usize;
    let mut used = vec![false; num_types];

    for &t in header.block_type_indices() {
        if let Some(slot) = used.get_mut(t as usize) {
            *slot = true;
        }
    }

    used.iter().filter(|&&u| !u).count()
}
