//! Renderer-facing mesh resource.
//!
//! [`MeshResource`] is the seam between the generator and whatever owns the
//! GPU buffers. [`HostMesh`] keeps everything in memory and counts writes,
//! which is what the CLI and the tests use.

use crate::error::{LatticeError, Result};
use crate::manager::EnvironmentMode;
use crate::triangles::Vertex;
use glam::Vec3;

/// What a vertex attribute means to the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    Normal,
}

/// Element type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32,
    /// 16-bit signed normalized integer.
    SNorm16,
}

impl AttributeFormat {
    pub const fn size_bytes(self) -> usize {
        match self {
            AttributeFormat::Float32 => 4,
            AttributeFormat::SNorm16 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeDescriptor {
    pub attribute: VertexAttribute,
    pub format: AttributeFormat,
    pub dimension: u8,
}

impl VertexAttributeDescriptor {
    pub const fn new(attribute: VertexAttribute, format: AttributeFormat, dimension: u8) -> Self {
        Self {
            attribute,
            format,
            dimension,
        }
    }

    pub const fn size_bytes(&self) -> usize {
        self.format.size_bytes() * self.dimension as usize
    }

    /// Layout of [`Vertex`]: float3 position, snorm16x4 normal.
    pub const fn lattice_layout() -> [Self; 2] {
        [
            Self::new(VertexAttribute::Position, AttributeFormat::Float32, 3),
            Self::new(VertexAttribute::Normal, AttributeFormat::SNorm16, 4),
        ]
    }

    /// Sum of attribute sizes (attributes are tightly packed, single stream).
    pub fn stride(layout: &[Self]) -> usize {
        layout.iter().map(Self::size_bytes).sum()
    }

    /// Byte offset of each attribute within a vertex.
    pub fn offsets(layout: &[Self]) -> Vec<usize> {
        layout
            .iter()
            .scan(0, |offset, attr| {
                let here = *offset;
                *offset += attr.size_bytes();
                Some(here)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

/// A range of the index buffer drawn as one triangle list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubMeshDescriptor {
    pub index_start: usize,
    pub index_count: usize,
}

impl SubMeshDescriptor {
    pub const fn new(index_start: usize, index_count: usize) -> Self {
        Self {
            index_start,
            index_count,
        }
    }
}

/// Axis-aligned bounding box stored as centre + full size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub size: Vec3,
}

impl Aabb {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self { center, size }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.size * 0.5
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.size * 0.5
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min()).all() && p.cmple(self.max()).all()
    }
}

/// A mesh owned by the renderer. Calls arrive in this order on a rebuild:
/// `clear`, `set_vertex_layout`, `set_vertex_data`, `set_index_data`,
/// `set_sub_meshes`, `set_bounds`; an update only calls `set_vertex_data` and
/// `set_bounds`.
pub trait MeshResource {
    /// Drops all buffers and descriptors.
    fn clear(&mut self);

    /// Declares the vertex count and attribute layout for subsequent uploads.
    fn set_vertex_layout(
        &mut self,
        vertex_count: usize,
        layout: &[VertexAttributeDescriptor],
    ) -> Result<()>;

    /// Replaces the vertex data; `data.len()` must equal `vertex_count · stride`.
    fn set_vertex_data(&mut self, data: &[u8]) -> Result<()>;

    fn set_index_data(&mut self, indices: &[u32], format: IndexFormat) -> Result<()>;

    fn set_sub_meshes(&mut self, sub_meshes: &[SubMeshDescriptor]);

    fn set_bounds(&mut self, bounds: Aabb);

    /// Gives the underlying buffers back. `mode` selects deferred or immediate destruction.
    fn release(&mut self, mode: EnvironmentMode);
}

/// Number of calls a [`HostMesh`] has received, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshWriteStats {
    pub clears: u32,
    pub layout_writes: u32,
    pub vertex_writes: u32,
    pub index_writes: u32,
    pub sub_mesh_writes: u32,
    pub bounds_writes: u32,
    pub releases: u32,
}

/// In-memory [`MeshResource`].
#[derive(Debug, Default)]
pub struct HostMesh {
    layout: Vec<VertexAttributeDescriptor>,
    vertex_count: usize,
    vertex_bytes: Vec<u8>,
    index_bytes: Vec<u8>,
    index_format: Option<IndexFormat>,
    sub_meshes: Vec<SubMeshDescriptor>,
    bounds: Option<Aabb>,
    released: Option<EnvironmentMode>,
    stats: MeshWriteStats,
}

impl HostMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MeshWriteStats {
        self.stats
    }

    pub fn layout(&self) -> &[VertexAttributeDescriptor] {
        &self.layout
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertex_bytes
    }

    pub fn index_bytes(&self) -> &[u8] {
        &self.index_bytes
    }

    pub fn index_format(&self) -> Option<IndexFormat> {
        self.index_format
    }

    pub fn sub_meshes(&self) -> &[SubMeshDescriptor] {
        &self.sub_meshes
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// The mode of the last release, if the mesh has been released since its last write.
    pub fn released(&self) -> Option<EnvironmentMode> {
        self.released
    }

    /// Decodes the vertex buffer. Only meaningful for the lattice layout.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.vertex_bytes
            .chunks_exact(std::mem::size_of::<Vertex>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    /// Decodes the index buffer, widening 16-bit indices.
    pub fn indices(&self) -> Vec<u32> {
        match self.index_format {
            Some(IndexFormat::U16) => self
                .index_bytes
                .chunks_exact(2)
                .map(|c| bytemuck::pod_read_unaligned::<u16>(c) as u32)
                .collect(),
            Some(IndexFormat::U32) => self
                .index_bytes
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<u32>)
                .collect(),
            None => Vec::new(),
        }
    }

    fn replace_bytes(dst: &mut Vec<u8>, src: &[u8], what: &'static str) -> Result<()> {
        dst.clear();
        dst.try_reserve_exact(src.len())
            .map_err(|source| LatticeError::Allocation { what, len: src.len(), source })?;
        dst.extend_from_slice(src);
        Ok(())
    }
}

impl MeshResource for HostMesh {
    fn clear(&mut self) {
        self.stats.clears += 1;
        self.layout.clear();
        self.vertex_count = 0;
        self.vertex_bytes.clear();
        self.index_bytes.clear();
        self.index_format = None;
        self.sub_meshes.clear();
        self.bounds = None;
    }

    fn set_vertex_layout(
        &mut self,
        vertex_count: usize,
        layout: &[VertexAttributeDescriptor],
    ) -> Result<()> {
        self.stats.layout_writes += 1;
        self.layout = layout.to_vec();
        self.vertex_count = vertex_count;
        self.released = None;
        Ok(())
    }

    fn set_vertex_data(&mut self, data: &[u8]) -> Result<()> {
        let expected = self.vertex_count * VertexAttributeDescriptor::stride(&self.layout);
        if data.len() != expected {
            return Err(LatticeError::Resource(format!(
                "vertex upload of {} bytes, layout expects {}",
                data.len(),
                expected
            )));
        }

        self.stats.vertex_writes += 1;
        Self::replace_bytes(&mut self.vertex_bytes, data, "host vertex buffer")
    }

    fn set_index_data(&mut self, indices: &[u32], format: IndexFormat) -> Result<()> {
        self.stats.index_writes += 1;
        match format {
            IndexFormat::U32 => {
                Self::replace_bytes(&mut self.index_bytes, bytemuck::cast_slice(indices), "host index buffer")?
            }
            IndexFormat::U16 => {
                let narrow = indices
                    .iter()
                    .map(|&i| u16::try_from(i))
                    .collect::<std::result::Result<Vec<u16>, _>>()
                    .map_err(|_| LatticeError::Resource("index does not fit 16 bits".into()))?;
                Self::replace_bytes(&mut self.index_bytes, bytemuck::cast_slice(&narrow), "host index buffer")?
            }
        }
        self.index_format = Some(format);
        Ok(())
    }

    fn set_sub_meshes(&mut self, sub_meshes: &[SubMeshDescriptor]) {
        self.stats.sub_mesh_writes += 1;
        self.sub_meshes = sub_meshes.to_vec();
    }

    fn set_bounds(&mut self, bounds: Aabb) {
        self.stats.bounds_writes += 1;
        self.bounds = Some(bounds);
    }

    fn release(&mut self, mode: EnvironmentMode) {
        self.stats.releases += 1;
        self.released = Some(mode);
        self.vertex_bytes = Vec::new();
        self.index_bytes = Vec::new();
        self.sub_meshes = Vec::new();
        self.layout.clear();
        self.vertex_count = 0;
        self.index_format = None;
        self.bounds = None;
    }
}
