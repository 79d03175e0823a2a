//! [`MeshResource`] backed by wgpu buffers.

use lattice::{
    Aabb, AttributeFormat, EnvironmentMode, IndexFormat, LatticeError, MeshResource,
    SubMeshDescriptor, VertexAttribute, VertexAttributeDescriptor,
};
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Maps a lattice attribute to a wgpu vertex format.
pub fn vertex_format(desc: &VertexAttributeDescriptor) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    match (desc.format, desc.dimension) {
        (AttributeFormat::Float32, 1) => Some(F::Float32),
        (AttributeFormat::Float32, 2) => Some(F::Float32x2),
        (AttributeFormat::Float32, 3) => Some(F::Float32x3),
        (AttributeFormat::Float32, 4) => Some(F::Float32x4),
        (AttributeFormat::SNorm16, 2) => Some(F::Snorm16x2),
        (AttributeFormat::SNorm16, 4) => Some(F::Snorm16x4),
        _ => None,
    }
}

/// Shader input slot of each attribute (see `LATTICE_WGSL`).
pub fn shader_location(attribute: VertexAttribute) -> u32 {
    match attribute {
        VertexAttribute::Position => 0,
        VertexAttribute::Normal => 1,
    }
}

/// Translates a lattice vertex layout into wgpu attributes with packed offsets.
pub fn vertex_attributes(
    layout: &[VertexAttributeDescriptor],
) -> lattice::Result<Vec<wgpu::VertexAttribute>> {
    layout
        .iter()
        .zip(VertexAttributeDescriptor::offsets(layout))
        .map(|(desc, offset)| {
            let format = vertex_format(desc).ok_or_else(|| {
                LatticeError::Resource(format!(
                    "unsupported vertex attribute {:?} {:?}x{}",
                    desc.attribute, desc.format, desc.dimension
                ))
            })?;
            Ok(wgpu::VertexAttribute {
                format,
                offset: offset as u64,
                shader_location: shader_location(desc.attribute),
            })
        })
        .collect()
}

/// GPU-side mesh: one vertex buffer, one index buffer, a list of sub-meshes.
pub struct GpuMesh {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    vertex_count: usize,
    stride: usize,
    index_format: wgpu::IndexFormat,
    sub_meshes: Vec<SubMeshDescriptor>,
    bounds: Option<Aabb>,
}

impl GpuMesh {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            vertex_buffer: None,
            index_buffer: None,
            vertex_count: 0,
            stride: 0,
            index_format: wgpu::IndexFormat::Uint32,
            sub_meshes: Vec::new(),
            bounds: None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Creates a buffer, turning a wgpu out-of-memory error into a `Resource` error.
    fn create_checked(
        &self,
        label: &str,
        size: u64,
        create: impl FnOnce(&wgpu::Device) -> wgpu::Buffer,
    ) -> lattice::Result<wgpu::Buffer> {
        let max = self.device.limits().max_buffer_size;
        if size > max {
            return Err(LatticeError::Resource(format!(
                "{label}: {size} bytes exceeds the device limit of {max}"
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(LatticeError::Resource(format!("{label}: {err}"))),
            None => Ok(buffer),
        }
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        let (Some(vb), Some(ib)) = (&self.vertex_buffer, &self.index_buffer) else {
            return;
        };
        pass.set_vertex_buffer(0, vb.slice(..));
        pass.set_index_buffer(ib.slice(..), self.index_format);
        for sub in &self.sub_meshes {
            let start = sub.index_start as u32;
            pass.draw_indexed(start..start + sub.index_count as u32, 0, 0..1);
        }
    }
}

impl MeshResource for GpuMesh {
    fn clear(&mut self) {
        self.vertex_buffer = None;
        self.index_buffer = None;
        self.vertex_count = 0;
        self.stride = 0;
        self.sub_meshes.clear();
        self.bounds = None;
    }

    fn set_vertex_layout(
        &mut self,
        vertex_count: usize,
        layout: &[VertexAttributeDescriptor],
    ) -> lattice::Result<()> {
        vertex_attributes(layout)?;
        let stride = VertexAttributeDescriptor::stride(layout);
        let size = (vertex_count * stride) as u64;

        let buffer = self.create_checked("lattice vertices", size, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Lattice Vertex Buffer"),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        self.vertex_buffer = Some(buffer);
        self.vertex_count = vertex_count;
        self.stride = stride;
        Ok(())
    }

    fn set_vertex_data(&mut self, data: &[u8]) -> lattice::Result<()> {
        let expected = self.vertex_count * self.stride;
        let buffer = self
            .vertex_buffer
            .as_ref()
            .ok_or_else(|| LatticeError::Resource("vertex data before vertex layout".into()))?;
        if data.len() != expected || data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(LatticeError::Resource(format!(
                "vertex upload of {} bytes, buffer holds {}",
                data.len(),
                expected
            )));
        }

        self.queue.write_buffer(buffer, 0, data);
        Ok(())
    }

    fn set_index_data(&mut self, indices: &[u32], format: IndexFormat) -> lattice::Result<()> {
        let narrow;
        let (contents, wgpu_format): (&[u8], _) = match format {
            IndexFormat::U32 => (bytemuck::cast_slice(indices), wgpu::IndexFormat::Uint32),
            IndexFormat::U16 => {
                narrow = indices
                    .iter()
                    .map(|&i| u16::try_from(i))
                    .collect::<Result<Vec<u16>, _>>()
                    .map_err(|_| LatticeError::Resource("index does not fit 16 bits".into()))?;
                (bytemuck::cast_slice(&narrow), wgpu::IndexFormat::Uint16)
            }
        };

        let buffer = self.create_checked("lattice indices", contents.len() as u64, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Lattice Index Buffer"),
                contents,
                usage: wgpu::BufferUsages::INDEX,
            })
        })?;

        self.index_buffer = Some(buffer);
        self.index_format = wgpu_format;
        Ok(())
    }

    fn set_sub_meshes(&mut self, sub_meshes: &[SubMeshDescriptor]) {
        self.sub_meshes = sub_meshes.to_vec();
    }

    fn set_bounds(&mut self, bounds: Aabb) {
        self.bounds = Some(bounds);
    }

    fn release(&mut self, mode: EnvironmentMode) {
        let buffers = [self.vertex_buffer.take(), self.index_buffer.take()];
        match mode {
            // Queued frames may still read these; let wgpu free them once idle.
            EnvironmentMode::Interactive => drop(buffers),
            EnvironmentMode::Headless => buffers.iter().flatten().for_each(wgpu::Buffer::destroy),
        }
        self.clear();
    }
}
