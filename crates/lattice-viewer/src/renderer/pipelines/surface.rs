// Flat-shaded lattice surface. One directional light, lit from both sides.

use crate::gpu_mesh::{vertex_attributes, GpuMesh};
use glam::{Mat4, Vec3};
use lattice::VertexAttributeDescriptor;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LatticeUniforms {
    pub view_proj: Mat4,         // 64 B
    /// Direction towards the light, world space; w unused.
    pub light_dir: [f32; 4],     // +16 -> 80
    /// Base albedo; w = ambient term.
    pub base_color: [f32; 4],    // +16 -> 96
}

// Must match the WGSL struct below.
const _: [(); 96] = [(); core::mem::size_of::<LatticeUniforms>()];

impl LatticeUniforms {
    pub fn new(view_proj: Mat4, light_dir: Vec3) -> Self {
        Self {
            view_proj,
            light_dir: light_dir.normalize_or_zero().extend(0.0).to_array(),
            base_color: [0.35, 0.62, 0.86, 0.18],
        }
    }
}

pub struct LatticePipeline {
    pipeline:       wgpu::RenderPipeline,
    bind_group:     wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
}

impl LatticePipeline {
    pub fn new(
        device:    &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> anyhow::Result<Self> {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label:              Some("Lattice Uniform Buffer"),
            size:               std::mem::size_of::<LatticeUniforms>() as u64,
            usage:              wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label:   Some("Lattice BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding:    0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty:                 wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size:   wgpu::BufferSize::new(
                        std::mem::size_of::<LatticeUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label:   Some("Lattice Bind Group"),
            layout:  &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding:  0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label:  Some("Lattice WGSL"),
            source: wgpu::ShaderSource::Wgsl(LATTICE_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label:                Some("Lattice Pipeline Layout"),
            bind_group_layouts:   &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Vertex layout comes from the generator's own descriptor.
        let layout = VertexAttributeDescriptor::lattice_layout();
        let attributes = vertex_attributes(&layout)?;

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label:  Some("Lattice Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module:      &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: VertexAttributeDescriptor::stride(&layout) as u64,
                    step_mode:    wgpu::VertexStepMode::Vertex,
                    attributes:   &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module:      &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format:     color_fmt,
                    blend:      None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology:  wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format:              depth_fmt,
                depth_write_enabled: true,
                depth_compare:       wgpu::CompareFunction::LessEqual,
                stencil:             wgpu::StencilState::default(),
                bias:                wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview:   None,
        });

        Ok(Self {
            pipeline,
            bind_group,
            uniform_buffer,
        })
    }

    pub fn update(&self, queue: &wgpu::Queue, uniforms: &LatticeUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, mesh: &'a GpuMesh) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        mesh.draw(rpass);
    }
}

const LATTICE_WGSL: &str = r#"
struct Uniforms {
    view_proj:  mat4x4<f32>,
    light_dir:  vec4<f32>,
    base_color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Uniforms;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal:   vec4<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) height: f32,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    out.clip = u.view_proj * vec4<f32>(in.position, 1.0);
    out.normal = in.normal.xyz;
    out.height = in.position.z;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    // Degenerate triangles carry a zero normal.
    let len = length(in.normal);
    let n = select(vec3<f32>(0.0, 0.0, 1.0), in.normal / len, len > 1e-4);

    let diffuse = abs(dot(n, u.light_dir.xyz));
    let tint = 1.0 + clamp(in.height, -1.0, 1.0) * 0.25;
    let ambient = u.base_color.w;
    let rgb = u.base_color.rgb * tint * (ambient + (1.0 - ambient) * diffuse);
    return vec4<f32>(rgb, 1.0);
}
"#;
