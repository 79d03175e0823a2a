use crate::{
    camera::{Camera, CameraController},
    gpu_mesh::GpuMesh,
    renderer::Renderer,
    ui::{self, Playback},
};
use anyhow::Result;
use lattice::{EnvironmentMode, Lattice, LatticeConfig, LatticeError, TickReport};
use std::{sync::Arc, time::Instant};
use winit::{event::WindowEvent, window::Window};

pub struct App {
    pub renderer: Renderer,
    pub camera: Camera,
    pub camera_controller: CameraController,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    pub lattice: Lattice<GpuMesh>,
    pub playback: Playback,
    time: f32,
    last_frame: Instant,
    fps: f32,
    last_report: Option<TickReport>,
}

impl App {
    pub async fn new(
        window: Arc<Window>,
        config: LatticeConfig,
        mode: EnvironmentMode,
    ) -> Result<Self> {
        let renderer = Renderer::new(window.clone()).await?;

        let mesh = GpuMesh::new(renderer.gpu.device.clone(), renderer.gpu.queue.clone());
        let extent = config.extent();
        let lattice = Lattice::new(config, mesh, mode, None)?;
        log::info!("lattice workers: {}", lattice.threads());

        let mut camera = Camera::new(10.0, renderer.gpu.aspect());
        camera.fit(extent.x, extent.y);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        Ok(Self {
            renderer,
            camera,
            camera_controller: CameraController::new(),
            egui_ctx,
            egui_state,
            lattice,
            playback: Playback::default(),
            time: 0.0,
            last_frame: Instant::now(),
            fps: 0.0,
            last_report: None,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            self.camera.aspect = self.renderer.gpu.aspect();
        }
    }

    /// Returns true if egui consumed the event.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        self.camera_controller.handle_event(event, &mut self.camera);

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    /// Advances the animation clock and regenerates the lattice.
    ///
    /// Allocation and size-overflow failures are returned to the caller; any
    /// other tick error is logged. A job failure leaves the last committed
    /// frame on screen, but an upload that fails partway through a rebuild has
    /// already cleared the GPU buffers, so nothing is drawn until the next
    /// tick rebuilds them.
    pub fn update(&mut self) -> lattice::Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        if dt > 0.0 {
            self.fps = if self.fps == 0.0 { 1.0 / dt } else { self.fps * 0.9 + 0.1 / dt };
        }
        if !self.playback.paused {
            self.time += dt * self.playback.speed;
        }

        match self.lattice.tick(self.time) {
            Ok(report) => {
                self.last_report = Some(report);
                Ok(())
            }
            Err(err @ (LatticeError::Allocation { .. } | LatticeError::Overflow { .. })) => Err(err),
            Err(err) => {
                log::error!("tick failed: {err}");
                Ok(())
            }
        }
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let frame = self.renderer.gpu.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer
            .render(&swap_view, self.lattice.mesh(), &self.camera);

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        ui::draw_hud(&self.egui_ctx, self.fps, self.time, self.last_report.as_ref());
        if ui::draw_config_panel(&self.egui_ctx, self.lattice.config_mut(), &mut self.playback) {
            log::debug!("config edited: {:?}", self.lattice.config());
        }

        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);
        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gpu.config.width,
                self.renderer.gpu.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder = self
            .renderer
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gpu.device,
                &self.renderer.gpu.queue,
                *id,
                delta,
            );
        }

        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gpu.device,
            &self.renderer.gpu.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gpu
            .queue
            .submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }
}
