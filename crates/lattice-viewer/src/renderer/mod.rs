//! Owns the GPU handles, the depth target, the lattice pipeline and the egui renderer.

pub mod pipelines;
pub mod targets;

use self::{
    pipelines::surface::{LatticePipeline, LatticeUniforms},
    targets::Targets,
};
use crate::{camera::Camera, gpu_mesh::GpuMesh};
use anyhow::{anyhow, Context as _};
use glam::Vec3;
use std::sync::Arc;
use winit::{dpi::PhysicalSize, window::Window};

const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.015, g: 0.018, b: 0.024, a: 1.0 };

/// Window surface plus the device and queue, which [`GpuMesh`] shares.
pub struct Gpu {
    pub surface: wgpu::Surface<'static>,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub config: wgpu::SurfaceConfiguration,
}

/// Prefers an sRGB swapchain so the lit colours come out gamma-correct.
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(wgpu::TextureFormat::is_srgb)
        .or_else(|| formats.first().copied())
}

impl Gpu {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window)
            .context("creating window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no GPU adapter can present to this window"))?;

        // Lattice vertex buffers grow with the resolution; ask for the adapter's own limits.
        let limits = adapter.limits();
        log::info!(
            "adapter {:?}, max buffer {} MiB",
            adapter.get_info().name,
            limits.max_buffer_size >> 20
        );
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lattice Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                },
                None,
            )
            .await
            .context("requesting device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = pick_surface_format(&caps.formats)
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    fn reconfigure(&mut self, size: PhysicalSize<u32>) {
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }
}

pub struct Renderer {
    pub gpu: Gpu,
    pub targets: Targets,
    pub surface: LatticePipeline,
    pub egui_renderer: egui_wgpu::Renderer,
    pub light_dir: Vec3,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let gpu = Gpu::new(window).await?;
        let targets = Targets::new(&gpu.device, gpu.size());
        let surface = LatticePipeline::new(&gpu.device, gpu.config.format, targets.depth_fmt)?;
        let egui_renderer =
            egui_wgpu::Renderer::new(&gpu.device, gpu.config.format, None, 1);

        Ok(Self {
            gpu,
            targets,
            surface,
            egui_renderer,
            light_dir: Vec3::new(0.4, -0.3, 1.0),
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gpu.reconfigure(new_size);
            self.targets.resize(&self.gpu.device, new_size);
        }
    }

    /// Records and submits the geometry pass into `swap_view`.
    pub fn render(&mut self, swap_view: &wgpu::TextureView, mesh: &GpuMesh, camera: &Camera) {
        self.surface.update(
            &self.gpu.queue,
            &LatticeUniforms::new(camera.view_proj(), self.light_dir),
        );

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Lattice Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.surface.draw(&mut pass, mesh);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat;

    #[test]
    fn test_surface_format_prefers_srgb() {
        let formats = [TextureFormat::Bgra8Unorm, TextureFormat::Bgra8UnormSrgb];
        assert_eq!(pick_surface_format(&formats), Some(TextureFormat::Bgra8UnormSrgb));
        assert_eq!(
            pick_surface_format(&[TextureFormat::Rgba16Float]),
            Some(TextureFormat::Rgba16Float)
        );
        assert_eq!(pick_surface_format(&[]), None);
    }
}
