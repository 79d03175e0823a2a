use glam::{Mat4, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

const MIN_ELEVATION_DEG: f32 = -85.0;
const MAX_ELEVATION_DEG: f32 = 85.0;

/// Orbit camera around a target point, Z up.
#[derive(Debug, Clone)]
pub struct Camera {
    pub target: Vec3,
    /// Distance from the camera to the target.
    pub radius: f32,
    /// Angle around +Z, measured from +X (radians).
    pub azimuth_rad: f32,
    /// Angle above the XY plane (radians).
    pub elevation_rad: f32,

    pub fov_y_rad: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn new(radius: f32, aspect: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            radius,
            azimuth_rad: (-60.0f32).to_radians(),
            elevation_rad: 35.0f32.to_radians(),
            fov_y_rad: 50.0f32.to_radians(),
            aspect,
        }
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_az, cos_az) = self.azimuth_rad.sin_cos();
        let (sin_el, cos_el) = self.elevation_rad.sin_cos();
        self.target + self.radius * Vec3::new(cos_el * cos_az, cos_el * sin_az, sin_el)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Z)
    }

    /// Near/far scale with the orbit radius so the lattice never clips.
    pub fn proj(&self) -> Mat4 {
        let near = (self.radius * 0.01).max(1e-3);
        let far = self.radius * 10.0 + 100.0;
        Mat4::perspective_rh(self.fov_y_rad, self.aspect, near, far)
    }

    /// wgpu clip space (depth in [0, 1]).
    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// Frames a lattice of the given extent.
    pub fn fit(&mut self, extent_x: f32, extent_y: f32) {
        let half_diag = 0.5 * (extent_x * extent_x + extent_y * extent_y).sqrt();
        self.radius = (half_diag / (0.5 * self.fov_y_rad).tan()).max(1.0);
    }
}

pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraController {
    pub fn new() -> Self {
        Self {
            mouse_down: false,
            last_mouse: None,
        }
    }

    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_orbit((position.x, position.y), camera);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                self.handle_scroll(scroll, camera);
            }
            _ => {}
        }
    }

    /// Positive delta zooms in.
    fn handle_scroll(&mut self, delta: f32, camera: &mut Camera) {
        camera.radius = (camera.radius * 1.1f32.powf(-delta)).clamp(0.1, 10_000.0);
    }

    fn handle_cursor_orbit(&mut self, xy: (f64, f64), camera: &mut Camera) {
        if let (Some(last), true) = (self.last_mouse, self.mouse_down) {
            let dx = ((xy.0 - last.0) * 0.005) as f32;
            let dy = ((xy.1 - last.1) * 0.005) as f32;

            camera.azimuth_rad -= dx;
            camera.elevation_rad = (camera.elevation_rad + dy)
                .clamp(MIN_ELEVATION_DEG.to_radians(), MAX_ELEVATION_DEG.to_radians());
        }
        self.last_mouse = Some(xy);
    }
}
