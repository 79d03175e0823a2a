//! Interactive viewer for the animated lattice.
//!
//! Ticks the generator once per frame, uploads the result into wgpu buffers
//! through [`gpu_mesh::GpuMesh`] and draws it flat-shaded, with an egui panel
//! for live parameter edits.

pub mod app;
pub mod camera;
pub mod gpu_mesh;
pub mod renderer;
pub mod ui;
