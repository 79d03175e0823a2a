//! Stage 2: lattice points -> flat-shaded triangle soup.

use crate::config::Resolution;
use crate::error::{LatticeError, Result};
use crate::jobs::{JobHandle, JobSystem};
use crate::normal::{pack_normal, PackedNormal};
use glam::Vec3;

/// One triangle-soup vertex. Must match the layout declared by
/// [`crate::mesh::VertexAttributeDescriptor::lattice_layout`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: PackedNormal,
}

// position (12) + snorm16x4 normal (8)
const _: [(); 20] = [(); core::mem::size_of::<Vertex>()];

/// Point indices of triangle `i` in the `(rx+1)`-wide row-major point array.
///
/// Cell `i / 2` is split into two triangles by its diagonal. The diagonal
/// flips with row parity so that it always joins the two closest corners of
/// the staggered cell; both triangles wind the same way.
#[inline]
pub fn triangle_indices(i: usize, rx: usize) -> [usize; 3] {
    let it = i / 2;
    let iy = it / rx;
    let ix = it - iy * rx;

    let stride = rx + 1;
    let base = iy * stride + ix;

    match (iy & 1 == 0, i & 1 == 0) {
        // Even row: diagonal from top-left to bottom-right.
        (true, true) => [base, base + stride, base + 1],
        (true, false) => [base + stride, base + stride + 1, base + 1],
        // Odd row: diagonal from bottom-left to top-right.
        (false, true) => [base, base + stride, base + stride + 1],
        (false, false) => [base, base + stride + 1, base + 1],
    }
}

/// Builds the three vertices of triangle `i`, sharing one packed flat normal.
#[inline]
pub fn build_triangle(points: &[Vec3], i: usize, rx: usize) -> [Vertex; 3] {
    let [i1, i2, i3] = triangle_indices(i, rx);
    let (v1, v2, v3) = (points[i1], points[i2], points[i3]);

    let normal = pack_normal((v2 - v1).cross(v3 - v1).normalize_or_zero());

    [
        Vertex { position: v1.to_array(), normal },
        Vertex { position: v2.to_array(), normal },
        Vertex { position: v3.to_array(), normal },
    ]
}

/// Schedules the triangle job after `points`, writing into `vertices`, which
/// must hold `6·rx·ry` elements; triangle `i` occupies slots `3i..3i+3`.
pub fn schedule_triangles(
    jobs: &JobSystem,
    points: JobHandle<Vec<Vec3>>,
    vertices: Vec<Vertex>,
    resolution: Resolution,
    batch: usize,
) -> Result<JobHandle<Vec<Vertex>>> {
    let expected = resolution.vertex_count();
    if vertices.len() != expected {
        return Err(LatticeError::Malformed {
            what: "vertex buffer",
            expected,
            actual: vertices.len(),
        });
    }
    let rx = resolution.x as usize;

    Ok(jobs.schedule_after("triangles", points, vertices, 3, batch, move |points, i, out| {
        out.copy_from_slice(&build_triangle(points, i, rx));
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normal::unpack_normal;
    use crate::points::lattice_xy;
    use glam::Vec2;
    use std::collections::HashMap;

    fn flat_points(rx: u32, ry: u32, extent: Vec2) -> Vec<Vec3> {
        let res = Resolution::new(rx, ry);
        (0..res.point_count())
            .map(|i| lattice_xy(i, res, extent).extend(0.0))
            .collect()
    }

    fn signed_area(points: &[Vec3], tri: [usize; 3]) -> f32 {
        let (a, b, c) = (points[tri[0]], points[tri[1]], points[tri[2]]);
        0.5 * (b - a).cross(c - a).z
    }

    fn edge(a: usize, b: usize) -> (usize, usize) {
        (a.min(b), a.max(b))
    }

    #[test]
    fn test_vertex_is_20_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        assert_eq!(std::mem::align_of::<Vertex>(), 4);
    }

    #[test]
    fn test_each_cell_tiled_exactly_once() {
        for (rx, ry) in [(3, 3), (4, 4), (5, 3), (7, 6)] {
            let extent = Vec2::new(3.0, 2.0);
            let pts = flat_points(rx, ry, extent);
            let cell_area = extent.x * extent.y / (rx * ry) as f32;

            for cell in 0..(rx * ry) as usize {
                let a = signed_area(&pts, triangle_indices(2 * cell, rx as usize));
                let b = signed_area(&pts, triangle_indices(2 * cell + 1, rx as usize));

                // Same orientation => no overlap; sum == cell area => no gap.
                assert!(a.signum() == b.signum(), "cell {cell}: {a} vs {b}");
                assert!(((a + b).abs() - cell_area).abs() < 1e-5, "cell {cell}");
            }
        }
    }

    #[test]
    fn test_cell_boundary_is_its_four_sides() {
        let (rx, ry) = (6usize, 5usize);
        let stride = rx + 1;

        for iy in 0..ry {
            for ix in 0..rx {
                let cell = iy * rx + ix;
                let mut counts: HashMap<(usize, usize), u32> = HashMap::new();
                for t in [2 * cell, 2 * cell + 1] {
                    let [a, b, c] = triangle_indices(t, rx);
                    for e in [edge(a, b), edge(b, c), edge(c, a)] {
                        *counts.entry(e).or_default() += 1;
                    }
                }

                let bl = iy * stride + ix;
                let (br, tl, tr) = (bl + 1, bl + stride, bl + stride + 1);
                let mut outer: Vec<_> = counts.iter().filter(|&(_, &n)| n == 1).map(|(e, _)| *e).collect();
                outer.sort_unstable();
                let mut sides = vec![edge(bl, br), edge(tl, tr), edge(bl, tl), edge(br, tr)];
                sides.sort_unstable();
                assert_eq!(outer, sides, "cell ({ix}, {iy})");

                // The shared diagonal flips with row parity.
                let diagonal = counts.iter().find(|&(_, &n)| n == 2).map(|(e, _)| *e).unwrap();
                let expected = if iy % 2 == 0 { edge(tl, br) } else { edge(bl, tr) };
                assert_eq!(diagonal, expected);
            }
        }
    }

    #[test]
    fn test_diagonal_is_short_one() {
        // With the stagger the chosen diagonal is the shorter of the two.
        let (rx, ry) = (4u32, 4u32);
        let pts = flat_points(rx, ry, Vec2::new(4.0, 4.0));
        let stride = rx as usize + 1;
        for iy in 0..ry as usize {
            let bl = iy * stride;
            let (br, tl, tr) = (bl + 1, bl + stride, bl + stride + 1);
            let d_main = pts[tl].distance(pts[br]);
            let d_anti = pts[bl].distance(pts[tr]);
            if iy % 2 == 0 {
                assert!(d_main < d_anti);
            } else {
                assert!(d_anti < d_main);
            }
        }
    }

    #[test]
    fn test_flat_grid_normals_agree() {
        let (rx, ry) = (5u32, 4u32);
        let pts = flat_points(rx, ry, Vec2::new(2.0, 2.0));

        let expected = build_triangle(&pts, 0, rx as usize)[0].normal;
        assert_eq!(unpack_normal(expected).abs(), Vec3::Z);

        for i in 0..Resolution::new(rx, ry).triangle_count() {
            let tri = build_triangle(&pts, i, rx as usize);
            for v in tri {
                assert_eq!(v.normal, expected, "triangle {i}");
            }
        }
    }

    #[test]
    fn test_normal_is_unit_cross_product() {
        let pts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.3),
            Vec3::new(0.0, 1.0, -0.2),
            Vec3::new(1.0, 1.0, 0.5),
        ];
        // rx = 1 addresses a 2x2 point block directly.
        let tri = build_triangle(&pts, 0, 1);
        let [a, b, c] = triangle_indices(0, 1);
        let n = (pts[b] - pts[a]).cross(pts[c] - pts[a]).normalize();

        let got = unpack_normal(tri[0].normal);
        assert!((got - n).abs().max_element() <= 1.0 / 32767.0);
        assert_eq!(tri[0].position, pts[a].to_array());
        assert_eq!(tri[1].position, pts[b].to_array());
        assert_eq!(tri[2].position, pts[c].to_array());
    }

    #[test]
    fn test_degenerate_triangle_has_zero_normal() {
        let pts = vec![Vec3::ZERO; 4];
        let tri = build_triangle(&pts, 0, 1);
        assert_eq!(tri[0].normal, PackedNormal([0, 0, 0, 0]));
    }

    #[test]
    fn test_scheduled_job_layout() {
        let jobs = JobSystem::new(Some(2)).unwrap();
        let res = Resolution::new(4, 3);
        let pts = flat_points(res.x, res.y, Vec2::new(1.0, 1.0));
        let expected: Vec<Vertex> = (0..res.triangle_count())
            .flat_map(|i| build_triangle(&pts, i, res.x as usize))
            .collect();

        let points = jobs.schedule("points", pts, 1, 5, |_, _| {});
        let buf = vec![Vertex::default(); res.vertex_count()];
        let vertices = schedule_triangles(&jobs, points, buf, res, 5).unwrap().wait().unwrap();
        assert_eq!(vertices.len(), res.vertex_count());
        assert_eq!(vertices, expected);
    }
}
