//! Signed-normalized 16-bit normal encoding (`snorm16x4`, w unused).

use glam::Vec3;

const SNORM16_MAX: f32 = 32767.0;

/// Four signed-normalized 16-bit components; only x, y, z carry data.
/// Matches `wgpu::VertexFormat::Snorm16x4` / `VK_FORMAT_R16G16B16A16_SNORM`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedNormal(pub [i16; 4]);

/// Encodes a (unit) vector. Components are clamped to [-1, 1] and rounded;
/// non-finite components encode as zero.
#[inline]
pub fn pack_normal(v: Vec3) -> PackedNormal {
    #[inline(always)]
    fn q(c: f32) -> i16 {
        if c.is_finite() {
            (c.clamp(-1.0, 1.0) * SNORM16_MAX).round() as i16
        } else {
            0
        }
    }

    PackedNormal([q(v.x), q(v.y), q(v.z), 0])
}

/// Decodes a packed normal. `-32768` decodes to `-1.0`, like the GPU does.
#[inline]
pub fn unpack_normal(n: PackedNormal) -> Vec3 {
    #[inline(always)]
    fn d(c: i16) -> f32 {
        (c as f32 / SNORM16_MAX).max(-1.0)
    }

    Vec3::new(d(n.0[0]), d(n.0[1]), d(n.0[2]))
}

impl From<Vec3> for PackedNormal {
    fn from(v: Vec3) -> Self {
        pack_normal(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1.0 / SNORM16_MAX;

    fn assert_round_trip(v: Vec3) {
        let back = unpack_normal(pack_normal(v));
        let err = (back - v).abs().max_element();
        assert!(err <= TOLERANCE, "{v:?} -> {back:?} (err {err})");
    }

    #[test]
    fn test_axes_are_exact() {
        for v in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::NEG_X, Vec3::NEG_Y, Vec3::NEG_Z] {
            assert_eq!(unpack_normal(pack_normal(v)), v);
        }
        assert_eq!(pack_normal(Vec3::NEG_Z).0, [0, 0, -32767, 0]);
    }

    #[test]
    fn test_round_trip_on_sphere() {
        // Fibonacci sphere: evenly spread unit vectors.
        let n = 2000;
        let golden = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
        for i in 0..n {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
            let r = (1.0 - y * y).sqrt();
            let theta = golden * i as f32;
            assert_round_trip(Vec3::new(r * theta.cos(), y, r * theta.sin()).normalize());
        }
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(pack_normal(Vec3::new(2.0, -3.0, 0.0)).0, [32767, -32767, 0, 0]);
    }

    #[test]
    fn test_non_finite_packs_to_zero() {
        let n = pack_normal(Vec3::new(f32::NAN, f32::INFINITY, 0.5));
        assert_eq!(n.0[0], 0);
        assert_eq!(n.0[1], 0);
        assert_eq!(n.0[3], 0);
    }

    #[test]
    fn test_min_value_decodes_to_minus_one() {
        assert_eq!(unpack_normal(PackedNormal([-32768, 0, 0, 0])).x, -1.0);
    }
}
