//! User-facing lattice parameters.
//!
//! Every setter clamps its input into the valid range, so a [`LatticeConfig`]
//! can never hold a value the generation stages would choke on. Deserialized
//! configs go through the same setters.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Smallest accepted grid resolution along each axis.
pub const MIN_RESOLUTION: u32 = 3;

/// Largest accepted octave count.
pub const MAX_OCTAVES: u32 = 8;

/// Number of grid cells along x and y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub x: u32,
    pub y: u32,
}

impl Resolution {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Lattice samples: `(x+1) · (y+1)`, or `None` if that overflows `usize`.
    pub fn checked_point_count(self) -> Option<usize> {
        (self.x as usize + 1).checked_mul(self.y as usize + 1)
    }

    /// Two triangles per cell, or `None` on overflow.
    pub fn checked_triangle_count(self) -> Option<usize> {
        (self.x as usize)
            .checked_mul(self.y as usize)
            .and_then(|cells| cells.checked_mul(2))
    }

    /// Triangle soup: three unshared vertices per triangle. `None` on overflow.
    pub fn checked_vertex_count(self) -> Option<usize> {
        self.checked_triangle_count().and_then(|t| t.checked_mul(3))
    }

    /// Saturates at `usize::MAX`; see [`Resolution::checked_point_count`].
    #[inline]
    pub fn point_count(self) -> usize {
        self.checked_point_count().unwrap_or(usize::MAX)
    }

    /// Saturates at `usize::MAX`.
    #[inline]
    pub fn triangle_count(self) -> usize {
        self.checked_triangle_count().unwrap_or(usize::MAX)
    }

    /// Saturates at `usize::MAX`.
    #[inline]
    pub fn vertex_count(self) -> usize {
        self.checked_vertex_count().unwrap_or(usize::MAX)
    }

    fn clamped(self) -> Self {
        Self {
            x: self.x.max(MIN_RESOLUTION),
            y: self.y.max(MIN_RESOLUTION),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Parameters of the animated lattice. Read once per tick; may change between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigFile", into = "ConfigFile")]
pub struct LatticeConfig {
    resolution: Resolution,
    extent: Vec2,
    noise_frequency: f32,
    noise_octaves: u32,
    noise_amplitude: f32,
    noise_animation: f32,
    seed: u32,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::new(64, 64),
            extent: Vec2::new(10.0, 10.0),
            noise_frequency: 1.0,
            noise_octaves: 2,
            noise_amplitude: 0.1,
            noise_animation: 0.5,
            seed: 0,
        }
    }
}

impl LatticeConfig {
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn extent(&self) -> Vec2 {
        self.extent
    }

    pub fn noise_frequency(&self) -> f32 {
        self.noise_frequency
    }

    pub fn noise_octaves(&self) -> u32 {
        self.noise_octaves
    }

    pub fn noise_amplitude(&self) -> f32 {
        self.noise_amplitude
    }

    pub fn noise_animation(&self) -> f32 {
        self.noise_animation
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Sets the cell counts; each axis is raised to at least [`MIN_RESOLUTION`].
    pub fn set_resolution(&mut self, x: u32, y: u32) -> &mut Self {
        let requested = Resolution::new(x, y);
        self.resolution = requested.clamped();
        if self.resolution != requested {
            log::debug!("resolution {} clamped to {}", requested, self.resolution);
        }
        self
    }

    /// Sets the world-space size; negative (or NaN) components become zero.
    pub fn set_extent(&mut self, x: f32, y: f32) -> &mut Self {
        let clamped = Vec2::new(x.max(0.0), y.max(0.0));
        if clamped.x != x || clamped.y != y {
            log::debug!("extent ({x}, {y}) clamped to ({}, {})", clamped.x, clamped.y);
        }
        self.extent = clamped;
        self
    }

    pub fn set_noise_frequency(&mut self, frequency: f32) -> &mut Self {
        self.noise_frequency = frequency;
        self
    }

    /// Sets the number of fractal octaves, clamped to `1..=MAX_OCTAVES`.
    pub fn set_noise_octaves(&mut self, octaves: u32) -> &mut Self {
        self.noise_octaves = octaves.clamp(1, MAX_OCTAVES);
        if self.noise_octaves != octaves {
            log::debug!("octave count {} clamped to {}", octaves, self.noise_octaves);
        }
        self
    }

    pub fn set_noise_amplitude(&mut self, amplitude: f32) -> &mut Self {
        self.noise_amplitude = amplitude;
        self
    }

    pub fn set_noise_animation(&mut self, rate: f32) -> &mut Self {
        self.noise_animation = rate;
        self
    }

    pub fn set_seed(&mut self, seed: u32) -> &mut Self {
        self.seed = seed;
        self
    }

    /// Reads a JSON config file. Missing keys fall back to the defaults.
    pub fn from_json_reader<R: std::io::Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// On-disk shape of [`LatticeConfig`]; converted through the clamping setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    resolution: [u32; 2],
    extent: [f32; 2],
    noise_frequency: f32,
    noise_octaves: u32,
    noise_amplitude: f32,
    noise_animation: f32,
    seed: u32,
}

impl Default for ConfigFile {
    fn default() -> Self {
        LatticeConfig::default().into()
    }
}

impl From<ConfigFile> for LatticeConfig {
    fn from(file: ConfigFile) -> Self {
        let mut config = LatticeConfig::default();
        config
            .set_resolution(file.resolution[0], file.resolution[1])
            .set_extent(file.extent[0], file.extent[1])
            .set_noise_frequency(file.noise_frequency)
            .set_noise_octaves(file.noise_octaves)
            .set_noise_amplitude(file.noise_amplitude)
            .set_noise_animation(file.noise_animation)
            .set_seed(file.seed);
        config
    }
}

impl From<LatticeConfig> for ConfigFile {
    fn from(config: LatticeConfig) -> Self {
        Self {
            resolution: [config.resolution.x, config.resolution.y],
            extent: config.extent.to_array(),
            noise_frequency: config.noise_frequency,
            noise_octaves: config.noise_octaves,
            noise_amplitude: config.noise_amplitude,
            noise_animation: config.noise_animation,
            seed: config.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_clamped_to_minimum() {
        let mut config = LatticeConfig::default();
        config.set_resolution(1, 1);
        assert_eq!(config.resolution(), Resolution::new(3, 3));

        config.set_resolution(0, 17);
        assert_eq!(config.resolution(), Resolution::new(3, 17));
    }

    #[test]
    fn test_extent_never_negative() {
        let mut config = LatticeConfig::default();
        config.set_extent(-2.0, 5.0);
        assert_eq!(config.extent(), Vec2::new(0.0, 5.0));

        config.set_extent(f32::NAN, -0.5);
        assert_eq!(config.extent(), Vec2::ZERO);
    }

    #[test]
    fn test_octaves_clamped() {
        let mut config = LatticeConfig::default();
        config.set_noise_octaves(0);
        assert_eq!(config.noise_octaves(), 1);
        config.set_noise_octaves(42);
        assert_eq!(config.noise_octaves(), MAX_OCTAVES);
        config.set_noise_octaves(4);
        assert_eq!(config.noise_octaves(), 4);
    }

    #[test]
    fn test_counts() {
        let r = Resolution::new(4, 3);
        assert_eq!(r.point_count(), 20);
        assert_eq!(r.triangle_count(), 24);
        assert_eq!(r.vertex_count(), 72);
    }

    #[test]
    fn test_counts_at_u32_max_do_not_overflow() {
        let huge = Resolution::new(u32::MAX, u32::MAX);
        assert_eq!(huge.checked_vertex_count(), None);
        assert_eq!(huge.vertex_count(), usize::MAX);
        #[cfg(target_pointer_width = "64")]
        {
            // (2^32)^2 is one past usize::MAX.
            assert_eq!(huge.checked_point_count(), None);
            assert_eq!(
                Resolution::new(u32::MAX, 3).checked_point_count(),
                Some((1usize << 32) * 4)
            );
        }
    }

    #[test]
    fn test_json_goes_through_setters() {
        let json = r#"{ "resolution": [1, 2], "extent": [-1.0, 4.0], "noise_octaves": 12 }"#;
        let config = LatticeConfig::from_json_reader(json.as_bytes()).unwrap();

        assert_eq!(config.resolution(), Resolution::new(3, 3));
        assert_eq!(config.extent(), Vec2::new(0.0, 4.0));
        assert_eq!(config.noise_octaves(), MAX_OCTAVES);
        // Untouched keys keep their defaults.
        assert_eq!(config.noise_amplitude(), LatticeConfig::default().noise_amplitude());
    }

    #[test]
    fn test_json_round_trip_preserves_values() {
        let mut config = LatticeConfig::default();
        config.set_resolution(12, 7).set_seed(99).set_noise_animation(2.5);

        let text = config.to_json_pretty().unwrap();
        let back = LatticeConfig::from_json_reader(text.as_bytes()).unwrap();
        assert_eq!(back, config);
    }
}
