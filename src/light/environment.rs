//! Environment lighting: constant color or an importance-sampled equirect table.

use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::sampling::{dir_to_equirect, equirect_to_dir, uv_pdf_to_solid_angle, Distribution2D};
use crate::util::luminance;

const INV_4PI: f32 = 1.0 / (4.0 * PI);

/// Equirect radiance table with sampling tables.
#[derive(Debug, Clone)]
pub struct EnvironmentMap {
    width: u32,
    height: u32,
    /// Row-major, `v = 0` at the zenith.
    texels: Vec<Vec3>,
    distribution: Distribution2D,
}

impl EnvironmentMap {
    pub fn new(width: u32, height: u32, texels: Vec<Vec3>) -> Self {
        let lum: Vec<f32> = texels.iter().map(|&c| luminance(c)).collect();
        let distribution = Distribution2D::from_equirect_luminance(width, height, &lum);
        Self { width, height, texels, distribution }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn texels(&self) -> &[Vec3] {
        &self.texels
    }

    #[inline]
    pub fn distribution(&self) -> &Distribution2D {
        &self.distribution
    }

    /// Nearest-texel lookup, matching the sampling tables exactly.
    fn lookup(&self, uv: Vec2) -> Vec3 {
        let w = self.width.max(1) as usize;
        let h = self.height.max(1) as usize;
        let x = ((uv.x * w as f32) as usize).min(w - 1);
        let y = ((uv.y * h as f32) as usize).min(h - 1);
        self.texels.get(y * w + x).copied().unwrap_or(Vec3::ZERO)
    }
}

/// Radiance arriving from infinitely far away.
#[derive(Debug, Clone)]
pub enum Environment {
    /// Same radiance from every direction.
    Uniform(Vec3),
    /// Baked table (analytic sky or image).
    Map(Arc<EnvironmentMap>),
}

impl Default for Environment {
    fn default() -> Self {
        Self::Uniform(Vec3::ZERO)
    }
}

impl Environment {
    /// True if no direction carries any radiance.
    pub fn is_black(&self) -> bool {
        match self {
            Self::Uniform(c) => c.max_element() <= 0.0,
            Self::Map(map) => map.distribution.is_degenerate(),
        }
    }

    /// Radiance along unit direction `dir`.
    pub fn radiance(&self, dir: Vec3) -> Vec3 {
        match self {
            Self::Uniform(c) => *c,
            Self::Map(map) => map.lookup(dir_to_equirect(dir)),
        }
    }

    /// Draw a direction. Returns `(direction, radiance, solid-angle pdf)`.
    pub fn sample(&self, u: Vec2) -> (Vec3, Vec3, f32) {
        match self {
            Self::Uniform(c) => {
                let z = 1.0 - 2.0 * u.x;
                let r = (1.0 - z * z).max(0.0).sqrt();
                let phi = 2.0 * PI * u.y;
                (Vec3::new(r * phi.cos(), r * phi.sin(), z), *c, INV_4PI)
            }
            Self::Map(map) => {
                let (uv, pdf_uv) = map.distribution.sample(u);
                let dir = equirect_to_dir(uv);
                (dir, map.lookup(uv), uv_pdf_to_solid_angle(pdf_uv, uv))
            }
        }
    }

    /// Solid-angle pdf of [`Environment::sample`] producing `dir`.
    pub fn pdf(&self, dir: Vec3) -> f32 {
        match self {
            Self::Uniform(_) => INV_4PI,
            Self::Map(map) => {
                let uv = dir_to_equirect(dir);
                uv_pdf_to_solid_angle(map.distribution.pdf(uv), uv)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform() {
        let env = Environment::Uniform(Vec3::ONE);
        assert!(!env.is_black());
        assert!(Environment::default().is_black());
        let (dir, l, pdf) = env.sample(Vec2::new(0.3, 0.7));
        assert!(dir.is_normalized());
        assert_eq!(l, Vec3::ONE);
        assert!((pdf - INV_4PI).abs() < 1e-7);
    }

    #[test]
    fn test_map_prefers_bright_texels() {
        // 8x4 map, one bright texel in the second row
        let mut texels = vec![Vec3::splat(0.01); 32];
        texels[8 + 5] = Vec3::splat(100.0);
        let env = Environment::Map(Arc::new(EnvironmentMap::new(8, 4, texels)));

        let mut bright = 0;
        let n = 1000;
        for i in 0..n {
            let u = Vec2::new((i as f32 + 0.5) / n as f32, ((i * 7919) % n) as f32 / n as f32);
            let (dir, l, pdf) = env.sample(u);
            assert!(pdf > 0.0);
            assert_eq!(l, env.radiance(dir));
            assert!((pdf - env.pdf(dir)).abs() / pdf < 1e-3);
            if l.x > 1.0 {
                bright += 1;
            }
        }
        assert!(bright > n / 2, "{bright}");
    }

    #[test]
    fn test_map_estimator_matches_integral() {
        // E[L / pdf] over the sphere equals the integral of L
        let texels: Vec<Vec3> = (0..64).map(|i| Vec3::splat(1.0 + (i % 5) as f32)).collect();
        let env = Environment::Map(Arc::new(EnvironmentMap::new(8, 8, texels)));
        let uniform = Environment::Uniform(Vec3::ONE);

        let mut rng = crate::sampling::Pcg::new(9);
        let n = 200_000;
        let (mut imp, mut uni) = (0.0f64, 0.0f64);
        for _ in 0..n {
            let (_, l, pdf) = env.sample(rng.next_vec2());
            imp += (l.x / pdf) as f64;
            let (dir, _, pdf) = uniform.sample(rng.next_vec2());
            uni += (env.radiance(dir).x / pdf) as f64;
        }
        let (imp, uni) = (imp / n as f64, uni / n as f64);
        assert!((imp - uni).abs() / uni < 0.02, "{imp} vs {uni}");
    }
}
