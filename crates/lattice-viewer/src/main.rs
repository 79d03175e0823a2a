//! Entry point for the lattice viewer.
//!
//! Usage: `lattice_viewer [CONFIG.json]`

use anyhow::{Context, Result};
use lattice::{EnvironmentMode, LatticeConfig};
use lattice_viewer::app::App;
use std::{fs::File, io::BufReader, sync::Arc};
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn load_config() -> Result<LatticeConfig> {
    match std::env::args_os().nth(1) {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("opening config {}", path.to_string_lossy()))?;
            let config = LatticeConfig::from_json_reader(BufReader::new(file))
                .with_context(|| format!("parsing config {}", path.to_string_lossy()))?;
            log::info!("loaded config from {}", path.to_string_lossy());
            Ok(config)
        }
        None => Ok(LatticeConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let config = load_config()?;

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Lattice")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
            .build(&event_loop)?,
    );

    // A window is open: the renderer may still hold buffers when the mesh is released.
    let mut app = pollster::block_on(App::new(window.clone(), config, EnvironmentMode::Interactive))?;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if !app.handle_event(&window, &event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                                elwt.exit();
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(err) = app.update() {
                                log::error!("fatal: {err}");
                                elwt.exit();
                                return;
                            }
                            match app.render(&window) {
                                Ok(_) => {}
                                Err(wgpu::SurfaceError::Lost) => {
                                    app.resize(app.renderer.gpu.size());
                                }
                                Err(wgpu::SurfaceError::OutOfMemory) => {
                                    log::error!("WGPU out of memory – exiting.");
                                    elwt.exit();
                                }
                                Err(e) => log::error!("Render error: {:?}", e),
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
