//! Flow-field noise
//!
//! A seeded, continuous 3D scalar field sampled at `(x, y, t)`. Each engine
//! mount builds a fresh [`NoiseField`] so no two sessions share a field.

use noise::{NoiseFn, OpenSimplex};
use serde::{Deserialize, Serialize};

/// Anything that can steer particles: deterministic, continuous, in `[-1, 1]`.
pub trait NoiseSource: Send + Sync {
    /// Samples the field at already-scaled coordinates.
    fn sample(&self, x: f64, y: f64, t: f64) -> f32;
}

/// Multipliers applied to pixel coordinates and the time axis before sampling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseScale {
    pub x: f64,
    pub y: f64,
    pub t: f64,
}

impl NoiseScale {
    pub const fn uniform(s: f64) -> Self {
        Self { x: s, y: s, t: s }
    }

    /// Samples `source` at pixel position `(x, y)` and time `t`.
    #[inline]
    pub fn sample(&self, source: &dyn NoiseSource, x: f32, y: f32, t: f64) -> f32 {
        source.sample(x as f64 * self.x, y as f64 * self.y, t * self.t)
    }
}

/// Largest magnitude `OpenSimplex` 3D reaches in practice. Its output is
/// normalised to roughly half the unit range, so samples are divided by this
/// to make the full `[-1, 1]` available to headings and hue offsets.
pub const OPEN_SIMPLEX_3D_PEAK: f64 = 0.53;

/// OpenSimplex field with a fixed seed, rescaled to `[-1, 1]`.
#[derive(Clone)]
pub struct NoiseField {
    seed: u32,
    noise: OpenSimplex,
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            noise: OpenSimplex::new(seed),
        }
    }
}

impl std::fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseField").field("seed", &self.seed).finish()
    }
}

impl NoiseSource for NoiseField {
    fn sample(&self, x: f64, y: f64, t: f64) -> f32 {
        let v = self.noise.get([x, y, t]) / OPEN_SIMPLEX_3D_PEAK;
        if v.is_finite() {
            v.clamp(-1.0, 1.0) as f32
        } else {
            0.0
        }
    }
}

/// Field that returns the same value everywhere. Pins particle headings in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstantField(pub f32);

impl NoiseSource for ConstantField {
    fn sample(&self, _x: f64, _y: f64, _t: f64) -> f32 {
        self.0.clamp(-1.0, 1.0)
    }
}
