//! Preetham analytic daylight model.
//!
//! Evaluates the Perez sky luminance distribution in CIE Yxy for a given
//! turbidity and sun position, converts to linear Rec. 709 RGB and bakes it
//! into an equirectangular radiance table.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Mat3, Vec2, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::environment::EnvironmentMap;
use crate::sampling::equirect_to_dir;

/// Accepted turbidity range.
pub const TURBIDITY_RANGE: (f32, f32) = (1.3, 10.0);

/// Converts model luminance (kcd/m^2) into renderer radiance units.
const LUMINANCE_SCALE: f32 = 0.05;

/// Angular radius of the sun disk. Enlarged from the physical 0.27 degrees
/// so the disk covers several texels of a typical bake.
const SUN_ANGULAR_RADIUS: f32 = 0.03;

/// Sun disk radiance relative to the sky at the zenith.
const SUN_DISK_SCALE: f32 = 40.0;

/// Horizon clamp for view directions (cos theta never reaches 0).
const MIN_COS_THETA: f32 = 1.0e-3;

/// User-facing sky parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkySettings {
    /// Atmospheric haziness, 1.3 (clear) to 10 (hazy).
    pub turbidity: f32,
    /// Sun angle around the vertical axis, radians.
    pub azimuth: f32,
    /// Sun angle from the zenith, radians.
    pub inclination: f32,
    /// Overall radiance multiplier.
    pub intensity: f32,
}

impl Default for SkySettings {
    fn default() -> Self {
        Self {
            turbidity: 3.14,
            azimuth: 0.0,
            inclination: 0.0,
            intensity: 1.0,
        }
    }
}

impl SkySettings {
    /// Copy with parameters forced into their valid ranges.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let finite = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        Self {
            turbidity: finite(self.turbidity, d.turbidity).clamp(TURBIDITY_RANGE.0, TURBIDITY_RANGE.1),
            azimuth: finite(self.azimuth, d.azimuth).clamp(0.0, TAU),
            inclination: finite(self.inclination, d.inclination).clamp(0.0, TAU),
            intensity: finite(self.intensity, d.intensity).max(0.0),
        }
    }

    /// Unit vector pointing at the sun.
    pub fn sun_direction(&self) -> Vec3 {
        let (sin_i, cos_i) = self.inclination.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        Vec3::new(sin_i * cos_a, cos_i, sin_i * sin_a)
    }
}

/// Perez distribution coefficients for one Yxy channel.
#[derive(Debug, Clone, Copy)]
struct Perez {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
}

impl Perez {
    #[inline]
    fn eval(&self, cos_theta: f32, gamma: f32, cos_gamma: f32) -> f32 {
        (1.0 + self.a * (self.b / cos_theta).exp())
            * (1.0 + self.c * (self.d * gamma).exp() + self.e * cos_gamma * cos_gamma)
    }
}

/// Precomputed model state for one sun position and turbidity.
#[derive(Debug, Clone)]
pub struct PreethamSky {
    sun: Vec3,
    perez: [Perez; 3],
    /// Zenith Yxy divided by the Perez value at the zenith.
    norm: Vec3,
    zenith_y: f32,
    intensity: f32,
}

impl PreethamSky {
    pub fn new(settings: &SkySettings) -> Self {
        let s = settings.sanitized();
        let t = s.turbidity;
        let sun = s.sun_direction();
        let theta_s = sun.y.clamp(-1.0, 1.0).acos();

        let perez = [
            Perez {
                a: 0.1787 * t - 1.4630,
                b: -0.3554 * t + 0.4275,
                c: -0.0227 * t + 5.3251,
                d: 0.1206 * t - 2.5771,
                e: -0.0670 * t + 0.3703,
            },
            Perez {
                a: -0.0193 * t - 0.2592,
                b: -0.0665 * t + 0.0008,
                c: -0.0004 * t + 0.2125,
                d: -0.0641 * t - 0.8989,
                e: -0.0033 * t + 0.0452,
            },
            Perez {
                a: -0.0167 * t - 0.2608,
                b: -0.0950 * t + 0.0092,
                c: -0.0079 * t + 0.2102,
                d: -0.0441 * t - 1.6537,
                e: -0.0109 * t + 0.0529,
            },
        ];

        // Zenith chromaticity and luminance
        let ts = theta_s.min(FRAC_PI_2);
        let (t2, s2, s3) = (t * t, ts * ts, ts * ts * ts);
        let chi = (4.0 / 9.0 - t / 120.0) * (PI - 2.0 * ts);
        let zenith_y = ((4.0453 * t - 4.9710) * chi.tan() - 0.2155 * t + 2.4192).max(0.0);
        let zenith_x = t2 * (0.00166 * s3 - 0.00375 * s2 + 0.00209 * ts)
            + t * (-0.02903 * s3 + 0.06377 * s2 - 0.03202 * ts + 0.00394)
            + (0.11693 * s3 - 0.21196 * s2 + 0.06052 * ts + 0.25886);
        let zenith_yy = t2 * (0.00275 * s3 - 0.00610 * s2 + 0.00317 * ts)
            + t * (-0.04214 * s3 + 0.08970 * s2 - 0.04153 * ts + 0.00516)
            + (0.15346 * s3 - 0.26756 * s2 + 0.06670 * ts + 0.26688);

        let cos_ts = ts.cos().max(MIN_COS_THETA);
        let zenith = Vec3::new(zenith_y, zenith_x, zenith_yy);
        let at_zenith = Vec3::new(
            perez[0].eval(1.0, ts, cos_ts),
            perez[1].eval(1.0, ts, cos_ts),
            perez[2].eval(1.0, ts, cos_ts),
        );

        // Sun below the horizon fades the whole sky
        let daylight = smoothstep(-0.1, 0.05, sun.y);

        Self {
            sun,
            perez,
            norm: zenith / at_zenith,
            zenith_y: zenith_y * daylight,
            intensity: s.intensity * daylight,
        }
    }

    #[inline]
    pub fn sun_direction(&self) -> Vec3 {
        self.sun
    }

    /// Linear RGB radiance seen along `dir` (unit vector, +Y up).
    pub fn radiance(&self, dir: Vec3) -> Vec3 {
        let cos_theta = dir.y.max(MIN_COS_THETA);
        let cos_gamma = dir.dot(self.sun).clamp(-1.0, 1.0);
        let gamma = cos_gamma.acos();

        let yxy = Vec3::new(
            self.norm.x * self.perez[0].eval(cos_theta, gamma, cos_gamma),
            self.norm.y * self.perez[1].eval(cos_theta, gamma, cos_gamma),
            self.norm.z * self.perez[2].eval(cos_theta, gamma, cos_gamma),
        );

        let mut rgb = yxy_to_rgb(Vec3::new(yxy.x * LUMINANCE_SCALE, yxy.y, yxy.z));
        if gamma < SUN_ANGULAR_RADIUS && self.sun.y > 0.0 {
            rgb += Vec3::splat(self.zenith_y * LUMINANCE_SCALE * SUN_DISK_SCALE);
        }

        // Ground: dimmed horizon color
        if dir.y < 0.0 {
            rgb *= 0.3;
        }

        let rgb = rgb * self.intensity;
        if rgb.is_finite() { rgb.max(Vec3::ZERO) } else { Vec3::ZERO }
    }

    /// Bake into a `width x height` equirect table with importance-sampling CDFs.
    #[tracing::instrument(skip(self))]
    pub fn bake(&self, width: u32, height: u32) -> EnvironmentMap {
        let w = width.max(1) as usize;
        let h = height.max(1) as usize;
        let mut texels = vec![Vec3::ZERO; w * h];
        texels.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, texel) in row.iter_mut().enumerate() {
                let uv = Vec2::new((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32);
                *texel = self.radiance(equirect_to_dir(uv));
            }
        });
        EnvironmentMap::new(w as u32, h as u32, texels)
    }
}

#[inline]
fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// CIE Yxy to linear sRGB (D65).
fn yxy_to_rgb(yxy: Vec3) -> Vec3 {
    let (lum, x, y) = (yxy.x, yxy.y, yxy.z);
    if y <= 0.0 {
        return Vec3::ZERO;
    }
    let xyz = Vec3::new(x * (lum / y), lum, (1.0 - x - y) * (lum / y));
    let m = Mat3::from_cols(
        Vec3::new(3.240_454_2, -0.969_266, 0.055_643_4),
        Vec3::new(-1.537_138_5, 1.876_010_8, -0.204_025_9),
        Vec3::new(-0.498_531_4, 0.041_556, 1.057_225_2),
    );
    m * xyz
}
