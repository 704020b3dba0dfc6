#![allow(dead_code)]

//! Test payload types and helpers shared by the integration tests.

use std::any::Any;
use std::io::Cursor;

use nifio::version::{to_file, NiFileVersion};
use nifio::{
    BlockRegistry, NiIStream, NiOStream, NiObject, NiPtr, NiRef, NiStringRef, NiVersion, NifFile,
    Result,
};

/// Minimal scene-node payload: a name, a back-pointer to the parent
/// node, and an owned child list.
pub struct Node {
    pub name: NiStringRef,
    pub parent: NiPtr,
    pub children: Vec<NiRef>,
}

impl Node {
    pub fn named(name: &str) -> Self {
        Self {
            name: NiStringRef::new(name),
            parent: NiPtr::default(),
            children: Vec::new(),
        }
    }

    pub fn with_children(name: &str, children: &[u32]) -> Self {
        Self {
            children: children.iter().map(|&i| NiRef::new(i)).collect(),
            ..Self::named(name)
        }
    }

    pub fn read(stream: &mut NiIStream<'_>) -> Result<Box<dyn NiObject>> {
        let mut name = NiStringRef::default();
        name.read(stream)?;

        let parent = NiPtr::new(stream.read_u32()?);

        let num_children = stream.read_u32()?;
        let mut children = Vec::with_capacity(num_children as usize);
        for _ in 0..num_children {
            children.push(NiRef::new(stream.read_u32()?));
        }

        Ok(Box::new(Self {
            name,
            parent,
            children,
        }))
    }
}

impl NiObject for Node {
    fn block_name(&self) -> &str {
        "NiNode"
    }

    fn put(&mut self, stream: &mut NiOStream<'_>) -> Result<()> {
        self.name.write(stream)?;
        stream.write_u32(self.parent.index)?;
        stream.write_u32(self.children.len() as u32)?;
        for child in &self.children {
            stream.write_u32(child.index)?;
        }
        Ok(())
    }

    fn child_refs(&self) -> Vec<&NiRef> {
        self.children.iter().collect()
    }

    fn child_refs_mut(&mut self) -> Vec<&mut NiRef> {
        self.children.iter_mut().collect()
    }

    fn ptrs(&self) -> Vec<&NiPtr> {
        vec![&self.parent]
    }

    fn ptrs_mut(&mut self) -> Vec<&mut NiPtr> {
        vec![&mut self.parent]
    }

    fn string_refs(&self) -> Vec<&NiStringRef> {
        vec![&self.name]
    }

    fn string_refs_mut(&mut self) -> Vec<&mut NiStringRef> {
        vec![&mut self.name]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Minimal geometry payload: a name and a reference to a data block.
pub struct Shape {
    pub name: NiStringRef,
    pub data: NiRef,
}

impl Shape {
    pub fn named(name: &str) -> Self {
        Self {
            name: NiStringRef::new(name),
            data: NiRef::default(),
        }
    }

    pub fn read(stream: &mut NiIStream<'_>) -> Result<Box<dyn NiObject>> {
        let mut name = NiStringRef::default();
        name.read(stream)?;

        let data = NiRef::new(stream.read_u32()?);

        Ok(Box::new(Self { name, data }))
    }
}

impl NiObject for Shape {
    fn block_name(&self) -> &str {
        "NiTriShape"
    }

    fn put(&mut self, stream: &mut NiOStream<'_>) -> Result<()> {
        self.name.write(stream)?;
        stream.write_u32(self.data.index)
    }

    fn child_refs(&self) -> Vec<&NiRef> {
        vec![&self.data]
    }

    fn child_refs_mut(&mut self) -> Vec<&mut NiRef> {
        vec![&mut self.data]
    }

    fn string_refs(&self) -> Vec<&NiStringRef> {
        vec![&self.name]
    }

    fn string_refs_mut(&mut self) -> Vec<&mut NiStringRef> {
        vec![&mut self.name]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A registry knowing both test payload types.
pub fn full_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    registry.register("NiNode", Node::read);
    registry.register("NiTriShape", Shape::read);
    registry
}

/// A registry knowing only `NiNode`, for exercising the unknown-block
/// fallback.
pub fn nodes_only_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    registry.register("NiNode", Node::read);
    registry
}

/// File version 20.2.0.7 with a Bethesda (user, stream) pair.
pub fn bethesda_version() -> NiVersion {
    NiVersion::new(to_file(20, 2, 0, 7), 12, 83)
}

/// A plain Gamebryo/NetImmerse version without user or stream.
pub fn plain_version(file: NiFileVersion) -> NiVersion {
    NiVersion::new(file, 0, 0)
}

pub fn write_to_bytes(nif: &mut NifFile) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    nif.write(&mut cursor)?;
    Ok(cursor.into_inner())
}

pub fn read_from_bytes(bytes: &[u8], registry: &BlockRegistry) -> Result<NifFile> {
    NifFile::read(&mut Cursor::new(bytes), registry)
}
