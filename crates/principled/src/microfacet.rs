//! Microfacet distributions.
//!
//! Anisotropic GGX (GTR2) for the specular, metallic and transmission
//! lobes, and the Berry (GTR1) distribution for the clearcoat lobe. All
//! functions take vectors in the local shading frame.

use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// Lower bound for alpha to keep the distributions finite.
pub const MIN_ALPHA: f32 = 1.0e-3;

/// Anisotropic GGX distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ggx {
    pub ax: f32,
    pub ay: f32,
}

impl Ggx {
    /// Disney remapping: `alpha = roughness^2`, stretched by anisotropy.
    pub fn from_roughness(roughness: f32, anisotropic: f32) -> Self {
        let aspect = (1.0 - 0.9 * anisotropic).sqrt();
        let alpha = roughness * roughness;
        Self {
            ax: (alpha / aspect).max(MIN_ALPHA),
            ay: (alpha * aspect).max(MIN_ALPHA),
        }
    }

    #[inline]
    pub fn max_alpha(&self) -> f32 {
        self.ax.max(self.ay)
    }

    /// Normal distribution function D(h).
    #[inline]
    pub fn d(&self, h: Vec3) -> f32 {
        let a = h.x / self.ax;
        let b = h.y / self.ay;
        let c = a * a + b * b + h.z * h.z;
        1.0 / (PI * self.ax * self.ay * c * c)
    }

    /// Smith masking term G1 for direction `v`.
    #[inline]
    pub fn g1(&self, v: Vec3) -> f32 {
        let a = v.x * self.ax;
        let b = v.y * self.ay;
        let c = v.z.abs();
        2.0 * c / (c + (a * a + b * b + c * c).sqrt())
    }

    /// Separable masking-shadowing G2.
    #[inline]
    pub fn g2(&self, v: Vec3, l: Vec3) -> f32 {
        self.g1(v) * self.g1(l)
    }

    /// Sample a visible normal as seen from `v` (Heitz 2018). `v.z` must be positive.
    pub fn sample_vndf(&self, v: Vec3, u1: f32, u2: f32) -> Vec3 {
        let vh = Vec3::new(self.ax * v.x, self.ay * v.y, v.z).normalize();
        let lensq = vh.x * vh.x + vh.y * vh.y;
        let t1 = if lensq > 0.0 {
            Vec3::new(-vh.y, vh.x, 0.0) / lensq.sqrt()
        } else {
            Vec3::X
        };
        let t2 = vh.cross(t1);

        let r = u1.sqrt();
        let phi = TAU * u2;
        let p1 = r * phi.cos();
        let mut p2 = r * phi.sin();
        let s = 0.5 * (1.0 + vh.z);
        p2 = (1.0 - s) * (1.0 - p1 * p1).max(0.0).sqrt() + s * p2;

        let nh = t1 * p1 + t2 * p2 + vh * (1.0 - p1 * p1 - p2 * p2).max(0.0).sqrt();
        Vec3::new(self.ax * nh.x, self.ay * nh.y, nh.z.max(0.0)).normalize()
    }
}

/// Berry distribution used by the clearcoat lobe.
#[inline]
pub fn gtr1(cos_h: f32, alpha: f32) -> f32 {
    if alpha >= 1.0 {
        return 1.0 / PI;
    }
    let a2 = alpha * alpha;
    let t = 1.0 + (a2 - 1.0) * cos_h * cos_h;
    (a2 - 1.0) / (PI * a2.ln() * t)
}

/// Sample a half vector proportional to `gtr1(h.z) * h.z`.
pub fn sample_gtr1(alpha: f32, u1: f32, u2: f32) -> Vec3 {
    let a = alpha.clamp(MIN_ALPHA, 0.999);
    let a2 = a * a;
    let phi = TAU * u1;
    let cos_theta = ((1.0 - a2.powf(1.0 - u2)) / (1.0 - a2)).max(0.0).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).clamp(0.0, 1.0).sqrt();
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Isotropic Smith G1 for GGX with fixed `alpha` (clearcoat uses 0.25).
#[inline]
pub fn smith_g_ggx(cos: f32, alpha: f32) -> f32 {
    let a = alpha * alpha;
    let b = cos * cos;
    2.0 * cos / (cos + (a + b - a * b).sqrt())
}
