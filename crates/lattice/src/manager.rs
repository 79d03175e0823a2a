//! Stage 3: commit a finished vertex buffer to the persistent mesh resource.

use crate::config::Resolution;
use crate::error::{LatticeError, Result};
use crate::index::identity_indices;
use crate::mesh::{Aabb, IndexFormat, MeshResource, SubMeshDescriptor, VertexAttributeDescriptor};
use crate::triangles::Vertex;
use glam::{Vec2, Vec3};

/// How resources are handed back when a mesh is released. Decided once at
/// start-up by the binary and passed down, never re-queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentMode {
    /// A renderer may still reference the buffers this frame: destruction is deferred.
    Interactive,
    /// Nothing else holds the buffers: destroy immediately.
    Headless,
}

impl EnvironmentMode {
    pub fn defers_release(self) -> bool {
        matches!(self, EnvironmentMode::Interactive)
    }
}

/// Which path a commit took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitKind {
    /// Topology changed: layout, vertices, indices and sub-mesh were all rewritten.
    Rebuilt,
    /// Same topology: only the vertex data was uploaded.
    Updated,
}

/// Owns the mesh resource across ticks and tracks the committed topology.
pub struct MeshBufferManager<M: MeshResource> {
    resource: M,
    mode: EnvironmentMode,
    committed: Option<Resolution>,
    sub_mesh: Option<SubMeshDescriptor>,
    released: bool,
}

impl<M: MeshResource> MeshBufferManager<M> {
    pub fn new(resource: M, mode: EnvironmentMode) -> Self {
        Self {
            resource,
            mode,
            committed: None,
            sub_mesh: None,
            released: false,
        }
    }

    pub fn resource(&self) -> &M {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut M {
        &mut self.resource
    }

    pub fn mode(&self) -> EnvironmentMode {
        self.mode
    }

    /// `None` until the first successful rebuild, and again after a release.
    pub fn committed_resolution(&self) -> Option<Resolution> {
        self.committed
    }

    pub fn sub_mesh(&self) -> Option<SubMeshDescriptor> {
        self.sub_mesh
    }

    /// Conservative bounds of a lattice: the full extent in x/y and the
    /// largest possible displacement either side of z = 0.
    pub fn bounds_for(extent: Vec2, amplitude: f32) -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::new(extent.x, extent.y, 2.0 * amplitude.abs()))
    }

    /// Uploads `vertices` for a lattice of `resolution`, rebuilding the
    /// topology only when the resolution differs from the committed one.
    pub fn commit(
        &mut self,
        vertices: &[Vertex],
        resolution: Resolution,
        extent: Vec2,
        amplitude: f32,
    ) -> Result<CommitKind> {
        let expected = resolution.vertex_count();
        if vertices.len() != expected {
            return Err(LatticeError::Malformed {
                what: "vertex buffer",
                expected,
                actual: vertices.len(),
            });
        }

        let kind = if self.committed == Some(resolution) {
            self.resource.set_vertex_data(bytemuck::cast_slice(vertices))?;
            CommitKind::Updated
        } else {
            self.rebuild(vertices, resolution)?;
            CommitKind::Rebuilt
        };

        self.resource.set_bounds(Self::bounds_for(extent, amplitude));
        Ok(kind)
    }

    fn rebuild(&mut self, vertices: &[Vertex], resolution: Resolution) -> Result<()> {
        let first = self.committed.is_none() && !self.released;
        log::debug!(
            "rebuilding mesh topology: {} -> {}",
            self.committed.map_or_else(|| "none".to_string(), |r| r.to_string()),
            resolution
        );

        // Until this completes the resource holds no usable topology.
        self.committed = None;
        self.sub_mesh = None;
        self.released = false;

        let count = vertices.len();
        let indices = identity_indices(count)?;

        self.resource.clear();
        self.resource
            .set_vertex_layout(count, &VertexAttributeDescriptor::lattice_layout())?;
        self.resource.set_vertex_data(bytemuck::cast_slice(vertices))?;
        self.resource.set_index_data(&indices, IndexFormat::U32)?;

        let sub_mesh = SubMeshDescriptor::new(0, count);
        self.resource.set_sub_meshes(&[sub_mesh]);

        self.sub_mesh = Some(sub_mesh);
        self.committed = Some(resolution);
        if first {
            log::info!("first mesh committed: {} ({} vertices)", resolution, count);
        }
        Ok(())
    }

    /// Hands the resource back. Idempotent; the next commit rebuilds.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        log::debug!("releasing mesh resource ({:?})", self.mode);
        self.resource.release(self.mode);
        self.released = true;
        self.committed = None;
        self.sub_mesh = None;
    }
}

impl<M: MeshResource> Drop for MeshBufferManager<M> {
    fn drop(&mut self) {
        self.release();
    }
}
