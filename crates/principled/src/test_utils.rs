//! Shared helpers for the Monte Carlo tests.

use glam::Vec3;
use std::f32::consts::TAU;

macro_rules! assert_eq_approx {
    ($lhs:expr, $rhs:expr, $eps_abs:expr, $eps_rel:expr) => {
        assert!(
            $crate::test_utils::ApproxEqual::equals_approx($lhs, $rhs, $eps_abs, $eps_rel),
            r#"assert_eq_approx failed:
    {}: {:?}
    {}: {:?}
    {} (maximum absolute error): {:?}
    {} (maximum relative error): {:?}"#,
            stringify!($lhs),
            $lhs,
            stringify!($rhs),
            $rhs,
            stringify!($eps_abs),
            $eps_abs,
            stringify!($eps_rel),
            $eps_rel,
        )
    };
}

pub(crate) use assert_eq_approx;

pub trait ApproxEqual {
    fn equals_approx(self, other: Self, eps_abs: Self, eps_rel: Self) -> bool;
}

impl ApproxEqual for f32 {
    fn equals_approx(self, other: Self, eps_abs: Self, eps_rel: Self) -> bool {
        #[allow(clippy::float_cmp)]
        if self == other || (self - other).abs() <= eps_abs {
            return true;
        }
        let diff = (self - other).abs();
        diff <= self.abs().max(other.abs()) * eps_rel
    }
}

impl ApproxEqual for Vec3 {
    fn equals_approx(self, other: Self, eps_abs: Self, eps_rel: Self) -> bool {
        self.x.equals_approx(other.x, eps_abs.x, eps_rel.x)
            && self.y.equals_approx(other.y, eps_abs.y, eps_rel.y)
            && self.z.equals_approx(other.z, eps_abs.z, eps_rel.z)
    }
}

pub trait SamplerExt {
    fn vec3(&mut self) -> Vec3;
}

impl SamplerExt for fastrand::Rng {
    fn vec3(&mut self) -> Vec3 {
        Vec3::new(self.f32(), self.f32(), self.f32())
    }
}

/// Uniform direction on the sphere, density `1 / 4pi`.
pub fn spherical_sample(rng: &mut fastrand::Rng) -> Vec3 {
    let cos_theta = 2.0 * rng.f32() - 1.0;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = TAU * rng.f32();
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Uniform direction with `z > 0` (local frame).
pub fn upper_hemisphere(rng: &mut fastrand::Rng) -> Vec3 {
    loop {
        let v = spherical_sample(rng);
        if v.z > 1e-3 {
            return v;
        }
        if v.z < -1e-3 {
            return Vec3::new(v.x, v.y, -v.z);
        }
    }
}
