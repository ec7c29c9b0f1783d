//! Permuted congruential random source.
//!
//! One 32-bit state per pixel per sample. The state is derived from the
//! pixel index and the global sample index, so frames never repeat noise and
//! an identical seed sequence reproduces an identical image.

use glam::{Vec2, Vec3};
use std::f32::consts::TAU;

const MULTIPLIER: u32 = 747_796_405;
const INCREMENT: u32 = 2_891_336_453;
const OUTPUT_MULTIPLIER: u32 = 277_803_737;

/// Largest `f32` strictly below 1.
pub const ONE_MINUS_EPSILON: f32 = 1.0 - f32::EPSILON / 2.0;

/// Advance `seed` and return `(new_seed, output)`.
#[inline]
pub fn pcg_hash(seed: u32) -> (u32, u32) {
    let state = seed.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(OUTPUT_MULTIPLIER);
    (state, (word >> 22) ^ word)
}

/// Draw one uniform value in `[0, 1)`. Returns `(value, new_seed)`.
#[inline]
pub fn next(seed: u32) -> (f32, u32) {
    let (state, out) = pcg_hash(seed);
    (to_unit(out), state)
}

#[inline]
fn to_unit(out: u32) -> f32 {
    ((out as f64 / u32::MAX as f64) as f32).min(ONE_MINUS_EPSILON)
}

/// Per-pixel random stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcg {
    state: u32,
}

impl Pcg {
    #[inline]
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Stream for one pixel sample. `sample_index` counts every sample the
    /// pixel has taken since the last accumulation reset.
    #[inline]
    pub fn for_pixel(x: u32, y: u32, width: u32, sample_index: u32) -> Self {
        let pixel = y.wrapping_mul(width).wrapping_add(x);
        let (_, salt) = pcg_hash(sample_index);
        let (_, seed) = pcg_hash(pixel ^ salt);
        Self { state: seed }
    }

    #[inline]
    pub fn state(&self) -> u32 {
        self.state
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let (state, out) = pcg_hash(self.state);
        self.state = state;
        out
    }

    /// Uniform value in `[0, 1)`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        to_unit(self.next_u32())
    }

    #[inline]
    pub fn next_vec2(&mut self) -> Vec2 {
        let x = self.next_f32();
        Vec2::new(x, self.next_f32())
    }

    #[inline]
    pub fn next_vec3(&mut self) -> Vec3 {
        let x = self.next_f32();
        let y = self.next_f32();
        Vec3::new(x, y, self.next_f32())
    }

    /// Uniform point in the unit disk (one angle draw, one sqrt-radius draw).
    pub fn point_in_disk(&mut self) -> Vec2 {
        let angle = self.next_f32() * TAU;
        let r = self.next_f32().sqrt();
        Vec2::new(angle.cos(), angle.sin()) * r
    }

    /// Uniform direction on the unit sphere.
    pub fn unit_sphere(&mut self) -> Vec3 {
        let a = self.next_f32() * TAU;
        let z = self.next_f32() * 2.0 - 1.0;
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * a.cos(), r * a.sin(), z)
    }

    /// Cosine-weighted direction around `normal`: a uniform sphere point
    /// shifted by the normal and renormalized.
    pub fn cosine_hemisphere(&mut self, normal: Vec3) -> Vec3 {
        let d = self.unit_sphere() + normal;
        let len2 = d.length_squared();
        if len2 > 1e-12 {
            d / len2.sqrt()
        } else {
            normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sequence() {
        // Reference values of the hash for seeds 0 and 42
        let mut rng = Pcg::new(0);
        assert_eq!(rng.next_u32(), 129_708_002);
        assert_eq!(rng.state(), 2_891_336_453);
        assert_eq!(rng.next_u32(), 582_399_676);
        assert_eq!(rng.next_u32(), 1_006_035_121);

        let mut rng = Pcg::new(42);
        assert_eq!(rng.next_u32(), 1_223_963_391);
        assert_eq!(rng.next_u32(), 1_180_595_976);
        assert_eq!(rng.next_u32(), 2_715_732_808);
    }

    #[test]
    fn test_next_contract() {
        let (v, seed) = next(0);
        assert_eq!(seed, 2_891_336_453);
        assert!((v - 0.030_2).abs() < 1e-4);
    }

    #[test]
    fn test_deterministic() {
        let a: Vec<u32> = {
            let mut r = Pcg::for_pixel(17, 5, 64, 3);
            (0..100).map(|_| r.next_u32()).collect()
        };
        let b: Vec<u32> = {
            let mut r = Pcg::for_pixel(17, 5, 64, 3);
            (0..100).map(|_| r.next_u32()).collect()
        };
        assert_eq!(a, b);

        // A different sample index gives a different stream
        let mut c = Pcg::for_pixel(17, 5, 64, 4);
        assert_ne!(a[0], c.next_u32());
    }

    #[test]
    fn test_unit_range() {
        let mut rng = Pcg::new(12345);
        for _ in 0..1_000_000 {
            let v = rng.next_f32();
            assert!((0.0..1.0).contains(&v));
        }
        assert!(to_unit(u32::MAX) < 1.0);
        assert_eq!(to_unit(0), 0.0);
    }

    #[test]
    fn test_mean() {
        let mut rng = Pcg::new(7);
        let n = 200_000;
        let mean: f64 = (0..n).map(|_| rng.next_f32() as f64).sum::<f64>() / n as f64;
        assert!((mean - 0.5).abs() < 0.005, "mean {mean}");
    }

    #[test]
    fn test_disk_and_hemisphere() {
        let mut rng = Pcg::new(99);
        let n = Vec3::new(0.0, 1.0, 0.0);
        let mut cos_sum = 0.0f64;
        let count = 100_000;
        for _ in 0..count {
            let p = rng.point_in_disk();
            assert!(p.length() <= 1.0 + 1e-6);

            let d = rng.cosine_hemisphere(n);
            assert!(d.dot(n) >= -1e-6);
            assert!((d.length() - 1.0).abs() < 1e-4);
            cos_sum += d.dot(n) as f64;
        }
        // E[cos] under a cosine-weighted density is 2/3
        let mean = cos_sum / count as f64;
        assert!((mean - 2.0 / 3.0).abs() < 0.01, "mean cos {mean}");
    }
}
