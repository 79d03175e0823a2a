//! Scalar noise for the height field.
//!
//! The base primitive is a [`NoiseSampler`]; [`fractal_height`] layers it into
//! octaves (frequency doubles, weight halves).

use ::noise::{NoiseFn, OpenSimplex};
use glam::Vec2;

/// Deterministic, pure 2D noise animated by a phase parameter.
pub trait NoiseSampler: Send + Sync {
    /// Returns a value roughly in [-1, 1]. Identical inputs must give identical output.
    fn sample(&self, p: Vec2, phase: f32) -> f32;
}

/// Seeded OpenSimplex noise; the animation phase is the third coordinate.
#[derive(Clone)]
pub struct SimplexNoise {
    simplex: OpenSimplex,
    seed: u32,
}

impl SimplexNoise {
    pub fn new(seed: u32) -> Self {
        Self {
            simplex: OpenSimplex::new(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl std::fmt::Debug for SimplexNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimplexNoise").field("seed", &self.seed).finish()
    }
}

impl NoiseSampler for SimplexNoise {
    #[inline]
    fn sample(&self, p: Vec2, phase: f32) -> f32 {
        self.simplex.get([p.x as f64, p.y as f64, phase as f64]) as f32
    }
}

/// Unnormalized fractal sum of `octaves` samples starting at `p`.
#[inline]
pub fn fractal_height<N: NoiseSampler + ?Sized>(noise: &N, p: Vec2, octaves: u32, phase: f32) -> f32 {
    let mut np = p;
    let mut weight = 1.0;
    let mut sum = 0.0;

    for _ in 0..octaves {
        sum += noise.sample(np, phase) * weight;
        np *= 2.0;
        weight *= 0.5;
    }

    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns the x coordinate so the octave weighting is observable.
    struct Ramp;

    impl NoiseSampler for Ramp {
        fn sample(&self, p: Vec2, _phase: f32) -> f32 {
            p.x
        }
    }

    #[test]
    fn test_simplex_is_deterministic() {
        let a = SimplexNoise::new(7);
        let b = SimplexNoise::new(7);
        let p = Vec2::new(3.25, -1.5);

        for phase in [0.0, 0.5, 12.75] {
            let first = a.sample(p, phase);
            assert_eq!(first.to_bits(), a.sample(p, phase).to_bits());
            assert_eq!(first.to_bits(), b.sample(p, phase).to_bits());
        }
    }

    #[test]
    fn test_simplex_varies_with_phase() {
        let n = SimplexNoise::new(1);
        let p = Vec2::new(0.37, 0.81);
        let samples: Vec<f32> = (0..8).map(|i| n.sample(p, i as f32 * 0.3)).collect();
        assert!(samples.windows(2).any(|w| w[0] != w[1]));
        assert!(samples.iter().all(|v| v.is_finite() && v.abs() <= 1.5));
    }

    #[test]
    fn test_fractal_octave_weights() {
        // x, then 2x * 0.5, then 4x * 0.25: each octave adds x.
        let p = Vec2::new(1.5, 0.0);
        assert_eq!(fractal_height(&Ramp, p, 1, 0.0), 1.5);
        assert_eq!(fractal_height(&Ramp, p, 3, 0.0), 4.5);
        assert_eq!(fractal_height(&Ramp, p, 0, 0.0), 0.0);
    }

    #[test]
    fn test_fractal_is_deterministic() {
        let n = SimplexNoise::new(3);
        let p = Vec2::new(10.0, 10.0);
        let a = fractal_height(&n, p, 8, 1.25);
        let b = fractal_height(&n, p, 8, 1.25);
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
