//! egui overlays: frame statistics and the live parameter panel.

use lattice::{CommitKind, LatticeConfig, TickReport, MAX_OCTAVES, MIN_RESOLUTION};

const MAX_PANEL_RESOLUTION: u32 = 1024;

/// Animation controls that live outside [`LatticeConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playback {
    pub paused: bool,
    pub speed: f32,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            paused: false,
            speed: 1.0,
        }
    }
}

pub fn draw_hud(ctx: &egui::Context, fps: f32, time: f32, report: Option<&TickReport>) {
    egui::Area::new(egui::Id::new("hud"))
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
        .show(ctx, |ui| {
            ui.label(format!("{fps:.0} fps   t = {time:.2} s"));
            if let Some(r) = report {
                let path = match r.commit {
                    CommitKind::Rebuilt => "rebuild",
                    CommitKind::Updated => "update",
                };
                ui.label(format!(
                    "{}  {} tris  {} verts  ({path})",
                    r.resolution, r.triangle_count, r.vertex_count
                ));
                ui.label(format!(
                    "generate {:.2} ms   commit {:.2} ms",
                    r.generate.as_secs_f64() * 1e3,
                    r.commit_time.as_secs_f64() * 1e3
                ));
            }
        });
}

/// Edits `config` through its clamping setters. Returns true if anything changed.
pub fn draw_config_panel(
    ctx: &egui::Context,
    config: &mut LatticeConfig,
    playback: &mut Playback,
) -> bool {
    let mut changed = false;

    egui::Window::new("Lattice")
        .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
        .resizable(false)
        .show(ctx, |ui| {
            let mut res = config.resolution();
            let range = MIN_RESOLUTION..=MAX_PANEL_RESOLUTION;
            let rx = ui.add(egui::Slider::new(&mut res.x, range.clone()).text("resolution x"));
            let ry = ui.add(egui::Slider::new(&mut res.y, range).text("resolution y"));
            if rx.changed() || ry.changed() {
                config.set_resolution(res.x, res.y);
                changed = true;
            }

            let mut extent = config.extent();
            let ex = ui.add(egui::Slider::new(&mut extent.x, 0.0..=100.0).text("extent x"));
            let ey = ui.add(egui::Slider::new(&mut extent.y, 0.0..=100.0).text("extent y"));
            if ex.changed() || ey.changed() {
                config.set_extent(extent.x, extent.y);
                changed = true;
            }

            ui.separator();

            let mut frequency = config.noise_frequency();
            if ui.add(egui::Slider::new(&mut frequency, 0.0..=10.0).text("frequency")).changed() {
                config.set_noise_frequency(frequency);
                changed = true;
            }

            let mut octaves = config.noise_octaves();
            if ui.add(egui::Slider::new(&mut octaves, 1..=MAX_OCTAVES).text("octaves")).changed() {
                config.set_noise_octaves(octaves);
                changed = true;
            }

            let mut amplitude = config.noise_amplitude();
            if ui.add(egui::Slider::new(&mut amplitude, 0.0..=5.0).text("amplitude")).changed() {
                config.set_noise_amplitude(amplitude);
                changed = true;
            }

            let mut animation = config.noise_animation();
            if ui.add(egui::Slider::new(&mut animation, 0.0..=5.0).text("animation")).changed() {
                config.set_noise_animation(animation);
                changed = true;
            }

            let mut seed = config.seed();
            if ui.add(egui::DragValue::new(&mut seed).prefix("seed ")).changed() {
                config.set_seed(seed);
                changed = true;
            }

            ui.separator();
            ui.horizontal(|ui| {
                ui.checkbox(&mut playback.paused, "paused");
                ui.add(egui::Slider::new(&mut playback.speed, 0.0..=4.0).text("speed"));
            });
        });

    changed
}
