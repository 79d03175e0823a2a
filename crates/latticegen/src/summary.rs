//! Aggregated timings over a headless run.

use lattice::{CommitKind, MeshWriteStats, TickReport};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub ticks: u32,
    pub rebuilds: u32,
    pub updates: u32,
    pub last_resolution: Option<String>,
    pub last_vertex_count: usize,
    pub generate_ms: Timing,
    pub commit_ms: Timing,
    pub mesh_writes: Option<MeshWrites>,
}

/// Min / mean / max of one stage, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Timing {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    #[serde(skip)]
    total: f64,
    #[serde(skip)]
    samples: u32,
}

impl Timing {
    fn record(&mut self, d: Duration) {
        let ms = d.as_secs_f64() * 1e3;
        if self.samples == 0 {
            self.min = ms;
            self.max = ms;
        } else {
            self.min = self.min.min(ms);
            self.max = self.max.max(ms);
        }
        self.samples += 1;
        self.total += ms;
        self.mean = self.total / self.samples as f64;
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MeshWrites {
    pub clears: u32,
    pub layout: u32,
    pub vertex: u32,
    pub index: u32,
    pub sub_mesh: u32,
    pub bounds: u32,
}

impl From<MeshWriteStats> for MeshWrites {
    fn from(s: MeshWriteStats) -> Self {
        Self {
            clears: s.clears,
            layout: s.layout_writes,
            vertex: s.vertex_writes,
            index: s.index_writes,
            sub_mesh: s.sub_mesh_writes,
            bounds: s.bounds_writes,
        }
    }
}

impl RunSummary {
    pub fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        match report.commit {
            CommitKind::Rebuilt => self.rebuilds += 1,
            CommitKind::Updated => self.updates += 1,
        }
        self.last_resolution = Some(report.resolution.to_string());
        self.last_vertex_count = report.vertex_count;
        self.generate_ms.record(report.generate);
        self.commit_ms.record(report.commit_time);
    }

    pub fn log(&self) {
        log::info!(
            "{} ticks ({} rebuilds, {} updates), final {} with {} vertices",
            self.ticks,
            self.rebuilds,
            self.updates,
            self.last_resolution.as_deref().unwrap_or("-"),
            self.last_vertex_count
        );
        log::info!(
            "generate ms: min {:.3} mean {:.3} max {:.3}",
            self.generate_ms.min,
            self.generate_ms.mean,
            self.generate_ms.max
        );
        log::info!(
            "commit ms:   min {:.3} mean {:.3} max {:.3}",
            self.commit_ms.min,
            self.commit_ms.mean,
            self.commit_ms.max
        );
        if let Some(w) = &self.mesh_writes {
            log::info!(
                "mesh writes: {} clears, {} vertex, {} index, {} sub-mesh, {} bounds",
                w.clears,
                w.vertex,
                w.index,
                w.sub_mesh,
                w.bounds
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice::Resolution;

    fn report(commit: CommitKind, gen_ms: u64) -> TickReport {
        let resolution = Resolution::new(4, 4);
        TickReport {
            time: 0.0,
            resolution,
            commit,
            vertex_count: resolution.vertex_count(),
            triangle_count: resolution.triangle_count(),
            generate: Duration::from_millis(gen_ms),
            commit_time: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_counts_and_timings() {
        let mut s = RunSummary::default();
        s.record(&report(CommitKind::Rebuilt, 4));
        s.record(&report(CommitKind::Updated, 2));
        s.record(&report(CommitKind::Updated, 6));

        assert_eq!((s.ticks, s.rebuilds, s.updates), (3, 1, 2));
        assert_eq!(s.last_resolution.as_deref(), Some("4x4"));
        assert_eq!(s.last_vertex_count, 96);
        assert!((s.generate_ms.min - 2.0).abs() < 1e-9);
        assert!((s.generate_ms.max - 6.0).abs() < 1e-9);
        assert!((s.generate_ms.mean - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_shape() {
        let mut s = RunSummary::default();
        s.record(&report(CommitKind::Rebuilt, 3));
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["ticks"], 1);
        assert_eq!(v["rebuilds"], 1);
        assert!(v["generate_ms"].get("total").is_none());
        assert!(v["mesh_writes"].is_null());
    }
}
