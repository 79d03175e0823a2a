//! Stage 1: displaced lattice points.

use crate::config::{LatticeConfig, Resolution};
use crate::error::{LatticeError, Result};
use crate::jobs::{JobHandle, JobSystem};
use crate::noise::{fractal_height, NoiseSampler};
use glam::{Vec2, Vec3};
use std::sync::Arc;

/// Per-tick snapshot of everything the point kernel reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointParams {
    pub resolution: Resolution,
    pub extent: Vec2,
    pub frequency: f32,
    pub octaves: u32,
    pub amplitude: f32,
    /// Animation phase passed to the noise sampler (`time · animation rate`).
    pub phase: f32,
}

impl PointParams {
    pub fn new(config: &LatticeConfig, time: f32) -> Self {
        Self {
            resolution: config.resolution(),
            extent: config.extent(),
            frequency: config.noise_frequency(),
            octaves: config.noise_octaves(),
            amplitude: config.noise_amplitude(),
            phase: time * config.noise_animation(),
        }
    }
}

/// Flat (x, y) position of lattice sample `i`, before displacement.
///
/// Even rows shift left by a quarter cell, odd rows right, giving a brick
/// pattern; the grid is centred on the origin and scaled to `extent`.
#[inline]
pub fn lattice_xy(i: usize, resolution: Resolution, extent: Vec2) -> Vec2 {
    let columns = resolution.x as usize + 1;
    let row = i / columns;
    let column = i - row * columns;

    let stagger = if row & 1 == 0 { -0.25 } else { 0.25 };
    let p = Vec2::new(column as f32 + stagger, row as f32);
    let res = Vec2::new(resolution.x as f32, resolution.y as f32);

    (p / res - 0.5) * extent
}

/// Displaced position of lattice sample `i`.
#[inline]
pub fn grid_point<N: NoiseSampler + ?Sized>(i: usize, params: &PointParams, noise: &N) -> Vec3 {
    let p = lattice_xy(i, params.resolution, params.extent);
    let np = (p + params.extent) * params.frequency;
    let z = fractal_height(noise, np, params.octaves, params.phase);
    p.extend(z * params.amplitude)
}

/// Schedules the point job into `points`, which must hold `(rx+1)·(ry+1)`
/// elements.
pub fn schedule_points(
    jobs: &JobSystem,
    params: PointParams,
    noise: Arc<dyn NoiseSampler>,
    points: Vec<Vec3>,
    batch: usize,
) -> Result<JobHandle<Vec<Vec3>>> {
    let expected = params.resolution.point_count();
    if points.len() != expected {
        return Err(LatticeError::Malformed {
            what: "point buffer",
            expected,
            actual: points.len(),
        });
    }

    Ok(jobs.schedule("grid points", points, 1, batch, move |i, out| {
        out[0] = grid_point(i, &params, noise.as_ref());
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::SimplexNoise;

    fn flat_params(rx: u32, ry: u32, ex: f32, ey: f32) -> PointParams {
        PointParams {
            resolution: Resolution::new(rx, ry),
            extent: Vec2::new(ex, ey),
            frequency: 1.0,
            octaves: 2,
            amplitude: 0.0,
            phase: 0.0,
        }
    }

    #[test]
    fn test_row_parity_stagger() {
        let res = Resolution::new(4, 4);
        let ext = Vec2::new(4.0, 4.0);
        // One grid unit == one world unit here.
        let even_row = lattice_xy(2, res, ext);
        let odd_row = lattice_xy(5 + 2, res, ext);

        assert_eq!(even_row, Vec2::new(2.0 - 0.25 - 2.0, -2.0));
        assert_eq!(odd_row, Vec2::new(2.0 + 0.25 - 2.0, -1.0));
    }

    #[test]
    fn test_scenario_4x4_flat() {
        let params = flat_params(4, 4, 2.0, 2.0);
        let noise = SimplexNoise::new(0);
        let n = params.resolution.point_count();
        assert_eq!(n, 25);

        let pts: Vec<Vec3> = (0..n).map(|i| grid_point(i, &params, &noise)).collect();
        assert!(pts.iter().all(|p| p.z == 0.0));

        let min_y = pts.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_y = pts.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        assert_eq!((min_y, max_y), (-1.0, 1.0));

        for (i, p) in pts.iter().enumerate() {
            let (row, col) = (i / 5, i % 5);
            // Unstaggered column spans [-1, 1]; rows shift by ∓extent/(4·rx).
            let shift = if row % 2 == 0 { -0.125 } else { 0.125 };
            let expected_x = col as f32 * 0.5 - 1.0 + shift;
            assert!((p.x - expected_x).abs() < 1e-6, "point {i}: {p:?}");
            assert!((p.y - (row as f32 * 0.5 - 1.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_amplitude_scales_height() {
        let noise = SimplexNoise::new(11);
        let mut params = flat_params(8, 8, 10.0, 10.0);
        params.amplitude = 1.0;
        params.phase = 0.4;
        let mut doubled = params;
        doubled.amplitude = 2.0;

        for i in 0..params.resolution.point_count() {
            let a = grid_point(i, &params, &noise);
            let b = grid_point(i, &doubled, &noise);
            assert_eq!(a.truncate(), b.truncate());
            assert!((b.z - 2.0 * a.z).abs() <= 1e-6 * a.z.abs().max(1.0));
        }
    }

    #[test]
    fn test_scheduled_job_matches_serial_kernel() {
        let jobs = JobSystem::new(Some(3)).unwrap();
        let noise: Arc<dyn NoiseSampler> = Arc::new(SimplexNoise::new(5));
        let mut params = flat_params(17, 9, 6.0, 3.0);
        params.amplitude = 0.7;
        params.octaves = 4;
        params.phase = 2.0;

        let buf = vec![Vec3::ZERO; params.resolution.point_count()];
        let pts = schedule_points(&jobs, params, noise.clone(), buf, 8).unwrap().wait().unwrap();
        assert_eq!(pts.len(), 18 * 10);
        for (i, p) in pts.iter().enumerate() {
            assert_eq!(*p, grid_point(i, &params, noise.as_ref()));
        }
    }

    #[test]
    fn test_wrong_buffer_is_rejected_before_scheduling() {
        let jobs = JobSystem::new(Some(1)).unwrap();
        let params = flat_params(4, 4, 1.0, 1.0);
        let noise: Arc<dyn NoiseSampler> = Arc::new(SimplexNoise::new(0));

        match schedule_points(&jobs, params, noise, vec![Vec3::ZERO; 3], 8) {
            Err(LatticeError::Malformed { expected, actual, .. }) => assert_eq!((expected, actual), (25, 3)),
            Err(other) => panic!("expected Malformed, got {other}"),
            Ok(_) => panic!("expected Malformed"),
        }
    }
}
