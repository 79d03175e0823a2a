//! Tick driver: points -> triangles -> commit.

use crate::config::{LatticeConfig, Resolution};
use crate::error::{try_zeroed_vec, LatticeError, Result};
use crate::jobs::{JobSystem, DEFAULT_BATCH_SIZE};
use crate::manager::{CommitKind, EnvironmentMode, MeshBufferManager};
use crate::mesh::MeshResource;
use crate::noise::{NoiseSampler, SimplexNoise};
use crate::points::{schedule_points, PointParams};
use crate::triangles::{schedule_triangles, Vertex};
use glam::Vec3;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub time: f32,
    pub resolution: Resolution,
    pub commit: CommitKind,
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Both job stages, from scheduling until the vertex buffer is published.
    pub generate: Duration,
    /// Upload to the mesh resource (including index build on rebuild).
    pub commit_time: Duration,
}

impl TickReport {
    pub fn total(&self) -> Duration {
        self.generate + self.commit_time
    }
}

/// An animated lattice bound to one mesh resource.
pub struct Lattice<M: MeshResource> {
    config: LatticeConfig,
    jobs: JobSystem,
    noise: Arc<dyn NoiseSampler>,
    /// Seed of the built-in sampler; `None` once a custom sampler is installed.
    noise_seed: Option<u32>,
    manager: MeshBufferManager<M>,
    batch_size: usize,
}

impl<M: MeshResource> Lattice<M> {
    /// Creates a lattice with a [`SimplexNoise`] seeded from `config`, on a
    /// pool of `threads` workers (`None` = one per logical CPU).
    pub fn new(
        config: LatticeConfig,
        resource: M,
        mode: EnvironmentMode,
        threads: Option<usize>,
    ) -> Result<Self> {
        let seed = config.seed();
        Ok(Self {
            config,
            jobs: JobSystem::new(threads)?,
            noise: Arc::new(SimplexNoise::new(seed)),
            noise_seed: Some(seed),
            manager: MeshBufferManager::new(resource, mode),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Replaces the noise source. The config seed is ignored from then on.
    pub fn with_noise(mut self, noise: Arc<dyn NoiseSampler>) -> Self {
        self.noise = noise;
        self.noise_seed = None;
        self
    }

    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    /// Edits take effect on the next tick.
    pub fn config_mut(&mut self) -> &mut LatticeConfig {
        &mut self.config
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    pub fn threads(&self) -> usize {
        self.jobs.threads()
    }

    /// The mesh as of the last successful tick.
    pub fn mesh(&self) -> &M {
        self.manager.resource()
    }

    pub fn mesh_mut(&mut self) -> &mut M {
        self.manager.resource_mut()
    }

    pub fn committed_resolution(&self) -> Option<Resolution> {
        self.manager.committed_resolution()
    }

    /// Regenerates the lattice for animation time `time` (seconds) and
    /// commits it. On error the previously committed geometry is left as is.
    pub fn tick(&mut self, time: f32) -> Result<TickReport> {
        let config = self.config.clone();
        self.sync_noise(config.seed());

        let resolution = config.resolution();
        let start = Instant::now();

        // Both buffers exist before any job runs, so a failure here leaves nothing in flight.
        let (point_count, vertex_count) = buffer_lengths(resolution)?;
        let points = try_zeroed_vec::<Vec3>("grid points", point_count)?;
        let vertices = try_zeroed_vec::<Vertex>("vertices", vertex_count)?;

        let points = schedule_points(
            &self.jobs,
            PointParams::new(&config, time),
            Arc::clone(&self.noise),
            points,
            self.batch_size,
        )?;
        let vertices =
            schedule_triangles(&self.jobs, points, vertices, resolution, self.batch_size)?.wait()?;
        let generate = start.elapsed();

        let start = Instant::now();
        let commit = self.manager.commit(
            &vertices,
            resolution,
            config.extent(),
            config.noise_amplitude(),
        )?;
        let commit_time = start.elapsed();

        let report = TickReport {
            time,
            resolution,
            commit,
            vertex_count: vertices.len(),
            triangle_count: resolution.triangle_count(),
            generate,
            commit_time,
        };
        log::trace!(
            "tick t={:.3} {} {:?}: generate {:?}, commit {:?}",
            time,
            resolution,
            commit,
            generate,
            commit_time
        );
        Ok(report)
    }

    /// Releases the mesh resource now instead of on drop.
    pub fn release(&mut self) {
        self.manager.release();
    }

    fn sync_noise(&mut self, seed: u32) {
        if matches!(self.noise_seed, Some(current) if current != seed) {
            log::debug!("reseeding noise: {seed}");
            self.noise = Arc::new(SimplexNoise::new(seed));
            self.noise_seed = Some(seed);
        }
    }
}

/// Point and vertex buffer lengths for `resolution`.
fn buffer_lengths(resolution: Resolution) -> Result<(usize, usize)> {
    let points = resolution
        .checked_point_count()
        .ok_or(LatticeError::Overflow { what: "grid point", resolution })?;
    let vertices = resolution
        .checked_vertex_count()
        .ok_or(LatticeError::Overflow { what: "vertex", resolution })?;
    Ok((points, vertices))
}
