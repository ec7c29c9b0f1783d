//! Multi-lobe principled BSDF.
//!
//! Lobes: diffuse (with retro-reflection, fake subsurface and sheen),
//! dielectric specular, metallic specular, specular transmission (rough
//! glass) and clearcoat. One lobe is picked per sample with probability
//! proportional to its approximate albedo; the returned pdf is always the
//! full mixture pdf so a single sample is an unbiased estimate of the sum.
//!
//! Conventions:
//! - `v` points from the surface towards the viewer, `l` towards the light.
//! - The shading normal must face the viewer (`dot(n, v) > 0`).
//! - `f` values include the cosine term `|dot(n, l)|`.

use glam::Vec3;
use std::f32::consts::{FRAC_1_PI, TAU};

use crate::fresnel::{dielectric, reflect, refract, schlick_weight};
use crate::frame::Frame;
use crate::microfacet::{gtr1, sample_gtr1, smith_g_ggx, Ggx, MIN_ALPHA};
use crate::params::Material;

/// Reflection lobes narrower than this are treated as specular: they are
/// left out of light sampling and their hits on emitters are counted by
/// the path instead.
pub const SPECULAR_ALPHA: f32 = 0.01;

/// Which lobe produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lobe {
    Diffuse,
    Specular,
    Metallic,
    GlassReflection,
    Transmission,
    Clearcoat,
}

/// Value and mixture pdf for a pair of directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfEval {
    /// BSDF times `|cos theta_l|`.
    pub f: Vec3,
    /// Solid-angle pdf of sampling `l`.
    pub pdf: f32,
}

impl BsdfEval {
    pub const ZERO: Self = Self { f: Vec3::ZERO, pdf: 0.0 };
}

/// Result of [`Bsdf::sample`]. `f` is NOT divided by `pdf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterSample {
    /// World-space outgoing direction.
    pub l: Vec3,
    pub f: Vec3,
    pub pdf: f32,
    pub lobe: Lobe,
    /// The part of `f` that [`Bsdf::eval_direct`] leaves out (transmission
    /// and near-delta reflection), whichever lobe was picked. Emission found
    /// along `l` must be weighted by this, not by `f`.
    pub f_specular: Vec3,
}

/// Per-hit colors derived from the material.
#[derive(Debug, Clone, Copy)]
struct Tint {
    f0: f32,
    spec0: Vec3,
    sheen: Vec3,
}

/// Unnormalized lobe weights and normalized selection probabilities.
#[derive(Debug, Clone, Copy)]
struct Lobes {
    dielectric_wt: f32,
    metal_wt: f32,
    glass_wt: f32,
    diffuse_pr: f32,
    dielectric_pr: f32,
    metal_pr: f32,
    glass_pr: f32,
    clearcoat_pr: f32,
}

impl Lobes {
    fn cdf(&self) -> [f32; 4] {
        let c0 = self.diffuse_pr;
        let c1 = c0 + self.dielectric_pr;
        let c2 = c1 + self.metal_pr;
        let c3 = c2 + self.glass_pr;
        [c0, c1, c2, c3]
    }
}

/// Relative index of refraction for a ray hitting a surface of `ior`.
///
/// Entering the medium gives `1 / ior`, leaving it gives `ior`.
#[inline]
pub fn relative_eta(ior: f32, entering: bool) -> f32 {
    if entering {
        1.0 / ior
    } else {
        ior
    }
}

#[inline]
fn luminance(c: Vec3) -> f32 {
    c.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// Principled BSDF bound to one shading point.
#[derive(Debug, Clone, Copy)]
pub struct Bsdf<'a> {
    mat: &'a Material,
    frame: Frame,
    eta: f32,
    ggx: Ggx,
    clearcoat_alpha: f32,
    tint: Tint,
}

impl<'a> Bsdf<'a> {
    /// `eta` is the relative index of refraction seen from the viewer side
    /// (see [`relative_eta`]).
    pub fn new(mat: &'a Material, frame: Frame, eta: f32) -> Self {
        let base = mat.base_color();
        let lum = luminance(base);
        let ctint = if lum > 0.0 { base / lum } else { Vec3::ONE };
        let f0 = ((1.0 - eta) / (1.0 + eta)).powi(2);

        Self {
            mat,
            frame,
            eta,
            ggx: Ggx::from_roughness(mat.roughness, mat.anisotropic),
            clearcoat_alpha: (0.001 + (0.1 - 0.001) * mat.clearcoat_roughness).clamp(MIN_ALPHA, 0.999),
            tint: Tint {
                f0,
                spec0: f0 * Vec3::ONE.lerp(ctint, mat.specular_tint),
                sheen: Vec3::ONE.lerp(ctint, mat.sheen_tint),
            },
        }
    }

    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    #[inline]
    pub fn eta(&self) -> f32 {
        self.eta
    }

    /// True if the main specular lobe is narrow enough to count as a delta.
    #[inline]
    fn specular_is_delta(&self) -> bool {
        self.ggx.max_alpha() < SPECULAR_ALPHA
    }

    fn lobes(&self, v: Vec3) -> Lobes {
        let m = self.mat;
        let base = m.base_color();
        let dielectric_wt = (1.0 - m.metallic) * (1.0 - m.spec_trans);
        let metal_wt = m.metallic;
        let glass_wt = (1.0 - m.metallic) * m.spec_trans;

        let schlick = schlick_weight(v.z);
        let mut l = Lobes {
            dielectric_wt,
            metal_wt,
            glass_wt,
            diffuse_pr: dielectric_wt * luminance(base),
            dielectric_pr: dielectric_wt * luminance(self.tint.spec0.lerp(Vec3::ONE, schlick)),
            metal_pr: metal_wt * luminance(base.lerp(Vec3::ONE, schlick)),
            glass_pr: glass_wt,
            clearcoat_pr: 0.25 * m.clearcoat,
        };

        let total = l.diffuse_pr + l.dielectric_pr + l.metal_pr + l.glass_pr + l.clearcoat_pr;
        if total > 0.0 && total.is_finite() {
            let inv = 1.0 / total;
            l.diffuse_pr *= inv;
            l.dielectric_pr *= inv;
            l.metal_pr *= inv;
            l.glass_pr *= inv;
            l.clearcoat_pr *= inv;
        } else {
            l.diffuse_pr = 0.0;
            l.dielectric_pr = 0.0;
            l.metal_pr = 0.0;
            l.glass_pr = 0.0;
            l.clearcoat_pr = 0.0;
        }
        l
    }

    /// Evaluate every lobe for world-space `v` and `l`.
    pub fn eval(&self, v: Vec3, l: Vec3) -> BsdfEval {
        self.eval_local(self.frame.to_local(v), self.frame.to_local(l), true)
    }

    /// Evaluate only the lobes that light sampling is responsible for:
    /// transmission and near-delta reflection are excluded.
    pub fn eval_direct(&self, v: Vec3, l: Vec3) -> BsdfEval {
        self.eval_local(self.frame.to_local(v), self.frame.to_local(l), false)
    }

    fn eval_local(&self, v: Vec3, l: Vec3, include_specular: bool) -> BsdfEval {
        if v.z <= 0.0 || l.z == 0.0 || !l.is_finite() {
            return BsdfEval::ZERO;
        }

        let reflect = l.z > 0.0;
        let mut h = if reflect { l + v } else { l + v * self.eta };
        let len2 = h.length_squared();
        if !(len2 > 1e-12) {
            return BsdfEval::ZERO;
        }
        h /= len2.sqrt();
        if h.z < 0.0 {
            h = -h;
        }

        let m = self.mat;
        let lobes = self.lobes(v);
        let delta = self.specular_is_delta();
        let spec_on = include_specular || !delta;
        let v_dot_h = v.dot(h).abs();

        let mut f = Vec3::ZERO;
        let mut pdf = 0.0;

        if lobes.diffuse_pr > 0.0 && reflect {
            let (df, dp) = self.eval_diffuse(v, l, h);
            f += df * lobes.dielectric_wt;
            pdf += dp * lobes.diffuse_pr;
        }

        if lobes.dielectric_pr > 0.0 && reflect && spec_on {
            // Rescale the exact Fresnel curve so it starts at the tinted F0
            let fr = (dielectric(v_dot_h, 1.0 / m.ior) - self.tint.f0) / (1.0 - self.tint.f0);
            let fresnel = self.tint.spec0.lerp(Vec3::ONE, fr);
            let (rf, rp) = self.eval_reflection(v, l, h, fresnel);
            f += rf * lobes.dielectric_wt;
            pdf += rp * lobes.dielectric_pr;
        }

        if lobes.metal_pr > 0.0 && reflect && spec_on {
            let fresnel = m.base_color().lerp(Vec3::ONE, schlick_weight(v_dot_h));
            let (rf, rp) = self.eval_reflection(v, l, h, fresnel);
            f += rf * lobes.metal_wt;
            pdf += rp * lobes.metal_pr;
        }

        if lobes.glass_pr > 0.0 {
            let fr = dielectric(v_dot_h, self.eta);
            if reflect {
                if spec_on {
                    let (rf, rp) = self.eval_reflection(v, l, h, Vec3::splat(fr));
                    f += rf * lobes.glass_wt;
                    pdf += rp * lobes.glass_pr * fr;
                }
            } else if include_specular {
                let (tf, tp) = self.eval_refraction(v, l, h, fr);
                f += tf * lobes.glass_wt;
                pdf += tp * lobes.glass_pr * (1.0 - fr);
            }
        }

        if lobes.clearcoat_pr > 0.0 && reflect && (include_specular || self.clearcoat_alpha >= SPECULAR_ALPHA) {
            let (cf, cp) = self.eval_clearcoat(v, l, h);
            f += Vec3::splat(cf * 0.25 * m.clearcoat);
            pdf += cp * lobes.clearcoat_pr;
        }

        let f = f * l.z.abs();
        if !f.is_finite() || !pdf.is_finite() {
            return BsdfEval::ZERO;
        }
        BsdfEval { f: f.max(Vec3::ZERO), pdf: pdf.max(0.0) }
    }

    fn eval_diffuse(&self, v: Vec3, l: Vec3, h: Vec3) -> (Vec3, f32) {
        let m = self.mat;
        let l_dot_h = l.dot(h);
        let rr = 2.0 * m.roughness * l_dot_h * l_dot_h;

        let fl = schlick_weight(l.z);
        let fv = schlick_weight(v.z);
        let retro = rr * (fl + fv + fl * fv * (rr - 1.0));
        let fd = (1.0 - 0.5 * fl) * (1.0 - 0.5 * fv);

        // Hanrahan-Krueger style flattening
        let fss90 = 0.5 * rr;
        let fss = (1.0 + (fss90 - 1.0) * fl) * (1.0 + (fss90 - 1.0) * fv);
        let ss = 1.25 * (fss * (1.0 / (l.z + v.z) - 0.5) + 0.5);

        let sheen = self.tint.sheen * (schlick_weight(l_dot_h) * m.sheen);
        let diffuse = m.base_color() * (FRAC_1_PI * ((fd + retro) + (ss - (fd + retro)) * m.subsurface));

        (diffuse + sheen, l.z * FRAC_1_PI)
    }

    fn eval_reflection(&self, v: Vec3, l: Vec3, h: Vec3, fresnel: Vec3) -> (Vec3, f32) {
        let d = self.ggx.d(h);
        let g1 = self.ggx.g1(v);
        let g2 = g1 * self.ggx.g1(l);
        let pdf = g1 * d / (4.0 * v.z);
        (fresnel * (d * g2 / (4.0 * l.z * v.z)), pdf)
    }

    fn eval_refraction(&self, v: Vec3, l: Vec3, h: Vec3, fresnel: f32) -> (Vec3, f32) {
        let l_dot_h = l.dot(h);
        let v_dot_h = v.dot(h);
        if v_dot_h <= 0.0 || l_dot_h >= 0.0 {
            return (Vec3::ZERO, 0.0);
        }

        let d = self.ggx.d(h);
        let g1 = self.ggx.g1(v);
        let g2 = g1 * self.ggx.g1(l);
        let denom = (l_dot_h + v_dot_h * self.eta).powi(2);
        let jacobian = l_dot_h.abs() / denom;

        let pdf = g1 * v_dot_h * d * jacobian / v.z;
        let value = (1.0 - fresnel) * d * g2 * v_dot_h * jacobian * self.eta * self.eta / (l.z * v.z).abs();
        (self.mat.base_color().powf(0.5) * value, pdf)
    }

    fn eval_clearcoat(&self, v: Vec3, l: Vec3, h: Vec3) -> (f32, f32) {
        let v_dot_h = v.dot(h);
        if v_dot_h <= 0.0 {
            return (0.0, 0.0);
        }
        let fresnel = 0.04 + 0.96 * schlick_weight(v_dot_h);
        let d = gtr1(h.z, self.clearcoat_alpha);
        let g = smith_g_ggx(l.z, 0.25) * smith_g_ggx(v.z, 0.25);
        let pdf = d * h.z / (4.0 * v_dot_h);
        (fresnel * d * g / (4.0 * l.z * v.z), pdf)
    }

    /// Importance-sample an outgoing direction.
    ///
    /// `u` holds three uniform numbers in `[0, 1)`: two for the direction,
    /// one for lobe selection. Returns `None` for any sample that must not
    /// contribute (zero or non-finite pdf, wrong hemisphere, viewer below
    /// the shading normal).
    pub fn sample(&self, v: Vec3, u: Vec3) -> Option<ScatterSample> {
        let v = self.frame.to_local(v);
        if !(v.z > 0.0) {
            return None;
        }

        let lobes = self.lobes(v);
        let [c0, c1, c2, c3] = lobes.cdf();
        let (u1, u2, u3) = (u.x, u.y, u.z);

        let (l, lobe) = if u3 < c0 {
            (cosine_hemisphere(u1, u2), Lobe::Diffuse)
        } else if u3 < c2 {
            let h = self.ggx.sample_vndf(v, u1, u2);
            let lobe = if u3 < c1 { Lobe::Specular } else { Lobe::Metallic };
            (reflect(v, h), lobe)
        } else if u3 < c3 {
            let h = self.ggx.sample_vndf(v, u1, u2);
            let fr = dielectric(v.dot(h), self.eta);
            // Reuse the selection number to pick reflection vs refraction
            let u = (u3 - c2) / (c3 - c2);
            if u < fr {
                (reflect(v, h), Lobe::GlassReflection)
            } else {
                match refract(v, h, self.eta) {
                    Some(t) => (t, Lobe::Transmission),
                    None => (reflect(v, h), Lobe::GlassReflection),
                }
            }
        } else if lobes.clearcoat_pr > 0.0 {
            let h = sample_gtr1(self.clearcoat_alpha, u1, u2);
            (reflect(v, h), Lobe::Clearcoat)
        } else {
            return None;
        };

        let l = l.normalize_or_zero();
        let valid_side = match lobe {
            Lobe::Transmission => l.z < 0.0,
            _ => l.z > 0.0,
        };
        if !valid_side {
            return None;
        }

        let eval = self.eval_local(v, l, true);
        if !(eval.pdf > 0.0) || !eval.pdf.is_finite() || !eval.f.is_finite() {
            return None;
        }

        let direct = self.eval_local(v, l, false);
        Some(ScatterSample {
            l: self.frame.to_world(l),
            f: eval.f,
            pdf: eval.pdf,
            lobe,
            f_specular: (eval.f - direct.f).max(Vec3::ZERO),
        })
    }
}

/// Cosine-weighted local direction (Malley's method).
#[inline]
fn cosine_hemisphere(u1: f32, u2: f32) -> Vec3 {
    let r = u1.sqrt();
    let phi = TAU * u2;
    Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - u1).max(0.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_eq_approx, spherical_sample, upper_hemisphere, SamplerExt};
    use std::f32::consts::PI;

    fn materials() -> Vec<(&'static str, Material)> {
        vec![
            ("diffuse", Material::diffuse(Vec3::new(0.8, 0.6, 0.4))),
            ("plastic", Material::plastic(Vec3::new(0.2, 0.4, 0.9), 0.3)),
            ("metal", Material::metal(Vec3::new(0.9, 0.7, 0.3), 0.4)),
            ("rough_glass", Material::glass(1.5, 0.4)),
            ("smooth_glass", Material::glass(1.5, 0.0)),
            (
                "everything",
                Material {
                    base_color: [0.7, 0.5, 0.6],
                    metallic: 0.3,
                    roughness: 0.45,
                    anisotropic: 0.6,
                    subsurface: 0.5,
                    specular_tint: 0.4,
                    sheen: 0.7,
                    sheen_tint: 0.3,
                    clearcoat: 0.8,
                    clearcoat_roughness: 0.4,
                    spec_trans: 0.4,
                    ior: 1.4,
                    ..Material::default()
                },
            ),
        ]
    }

    #[test]
    fn test_valid_samples_respect_hemisphere() {
        let mut rng = fastrand::Rng::with_seed(1);
        for (name, mat) in materials() {
            for entering in [true, false] {
                let frame = Frame::from_normal(Vec3::new(0.2, 0.9, -0.1).normalize());
                let bsdf = Bsdf::new(&mat, frame, relative_eta(mat.ior, entering));
                for _ in 0..20_000 {
                    let v = frame.to_world(upper_hemisphere(&mut rng));
                    let Some(s) = bsdf.sample(v, rng.vec3()) else { continue };
                    assert!(s.pdf > 0.0, "{name}: pdf {}", s.pdf);
                    assert!(s.f.min_element() >= 0.0 && s.f.is_finite(), "{name}: f {:?}", s.f);
                    let cos = s.l.dot(frame.normal);
                    match s.lobe {
                        Lobe::Transmission => assert!(cos < 0.0, "{name}: transmission above"),
                        _ => assert!(cos > 0.0, "{name}: reflection below ({:?})", s.lobe),
                    }
                }
            }
        }
    }

    #[test]
    fn test_sample_matches_eval() {
        let mut rng = fastrand::Rng::with_seed(2);
        for (_, mat) in materials() {
            let frame = Frame::from_normal(Vec3::Z);
            let bsdf = Bsdf::new(&mat, frame, relative_eta(mat.ior, true));
            for _ in 0..5_000 {
                let v = upper_hemisphere(&mut rng);
                let Some(s) = bsdf.sample(v, rng.vec3()) else { continue };
                let e = bsdf.eval(v, s.l);
                assert_eq_approx!(s.pdf, e.pdf, 1e-5, 1e-3);
                assert_eq_approx!(s.f, e.f, Vec3::splat(1e-5), Vec3::splat(1e-3));
            }
        }
    }

    #[test]
    fn test_pdf_integrates_to_at_most_one() {
        let mut rng = fastrand::Rng::with_seed(3);
        let n = 400_000;
        for (name, mat) in materials() {
            if name == "smooth_glass" {
                continue; // too spiky for uniform integration
            }
            let bsdf = Bsdf::new(&mat, Frame::from_normal(Vec3::Z), relative_eta(mat.ior, true));
            let v = Vec3::new(0.4, -0.2, 0.8).normalize();
            let mut sum = 0.0f64;
            for _ in 0..n {
                let l = spherical_sample(&mut rng);
                sum += bsdf.eval(v, l).pdf as f64 * 4.0 * PI as f64;
            }
            let integral = sum / n as f64;
            assert!(integral < 1.05, "{name}: pdf integrates to {integral}");
            if name == "diffuse" {
                assert!((integral - 1.0).abs() < 0.03, "{name}: pdf integrates to {integral}");
            }
        }
    }

    #[test]
    fn test_white_furnace_diffuse() {
        let mat = Material {
            base_color: [1.0; 3],
            roughness: 0.0,
            ior: 1.0,
            ..Material::default()
        };
        let bsdf = Bsdf::new(&mat, Frame::from_normal(Vec3::Z), relative_eta(mat.ior, true));
        let v = Vec3::new(0.6, 0.0, 0.8);
        let mut rng = fastrand::Rng::with_seed(4);
        let n = 200_000;
        let mut sum = 0.0f64;
        for _ in 0..n {
            if let Some(s) = bsdf.sample(v, rng.vec3()) {
                sum += (s.f.x / s.pdf) as f64;
            }
        }
        let albedo = sum / n as f64;
        assert!(albedo > 0.9 && albedo < 1.01, "albedo {albedo}");
    }

    #[test]
    fn test_total_internal_reflection_fallback() {
        let mat = Material::glass(1.5, 0.0);
        // Leaving glass at 70 degrees: beyond the critical angle
        let bsdf = Bsdf::new(&mat, Frame::from_normal(Vec3::Z), relative_eta(mat.ior, false));
        let theta = 70f32.to_radians();
        let v = Vec3::new(theta.sin(), 0.0, theta.cos());
        let mut rng = fastrand::Rng::with_seed(5);
        let mut count = 0;
        for _ in 0..1_000 {
            if let Some(s) = bsdf.sample(v, rng.vec3()) {
                assert!(s.l.z > 0.0);
                assert_eq!(s.lobe, Lobe::GlassReflection);
                assert_eq!(s.f_specular, s.f);
                count += 1;
            }
        }
        assert!(count > 900);
    }

    #[test]
    fn test_viewer_below_surface_is_invalid() {
        let mat = Material::default();
        let bsdf = Bsdf::new(&mat, Frame::from_normal(Vec3::Z), relative_eta(mat.ior, true));
        let v = Vec3::new(0.0, 0.3, -0.9).normalize();
        assert!(bsdf.sample(v, Vec3::splat(0.5)).is_none());
        assert_eq!(bsdf.eval(v, Vec3::Z).pdf, 0.0);
    }

    #[test]
    fn test_direct_eval_excludes_transmission() {
        let mat = Material::glass(1.5, 0.3);
        let bsdf = Bsdf::new(&mat, Frame::from_normal(Vec3::Z), relative_eta(mat.ior, true));
        let v = Vec3::new(0.3, 0.0, 0.95).normalize();
        let l = Vec3::new(-0.2, 0.0, -0.98).normalize();
        assert!(bsdf.eval(v, l).f.max_element() > 0.0);
        assert_eq!(bsdf.eval_direct(v, l).f, Vec3::ZERO);

        // Rough reflection stays visible to light sampling
        let r = Vec3::new(-0.3, 0.0, 0.95).normalize();
        assert!(bsdf.eval_direct(v, r).f.max_element() > 0.0);
    }

    #[test]
    fn test_lobe_probabilities_sum_to_one() {
        for (name, mat) in materials() {
            let bsdf = Bsdf::new(&mat, Frame::from_normal(Vec3::Z), relative_eta(mat.ior, true));
            let l = bsdf.lobes(Vec3::new(0.0, 0.6, 0.8));
            let total = l.diffuse_pr + l.dielectric_pr + l.metal_pr + l.glass_pr + l.clearcoat_pr;
            assert!((total - 1.0).abs() < 1e-5, "{name}: {total}");
        }
    }

    #[test]
    fn test_extreme_parameters_stay_finite() {
        let mat = Material {
            roughness: 0.0,
            anisotropic: 1.0,
            metallic: 0.5,
            spec_trans: 0.5,
            clearcoat: 1.0,
            clearcoat_roughness: 0.0,
            ior: 1.0,
            ..Material::default()
        };
        let bsdf = Bsdf::new(&mat, Frame::from_normal(Vec3::Z), relative_eta(mat.ior, true));
        let mut rng = fastrand::Rng::with_seed(6);
        for _ in 0..20_000 {
            let v = upper_hemisphere(&mut rng);
            if let Some(s) = bsdf.sample(v, rng.vec3()) {
                assert!(s.pdf.is_finite() && s.f.is_finite());
            }
            let e = bsdf.eval(v, spherical_sample(&mut rng));
            assert!(e.pdf.is_finite() && e.f.is_finite());
        }
    }

    #[test]
    fn test_specular_part_complements_direct_eval() {
        let clearcoat = Material {
            clearcoat: 1.0,
            clearcoat_roughness: 0.0,
            ..Material::plastic(Vec3::new(0.6, 0.2, 0.1), 0.5)
        };
        let cases = [
            ("diffuse", Material::diffuse(Vec3::splat(0.7))),
            ("clearcoat", clearcoat),
            ("smooth_plastic", Material::plastic(Vec3::new(0.2, 0.4, 0.9), 0.0)),
            ("rough_glass", Material::glass(1.5, 0.4)),
        ];
        let mut rng = fastrand::Rng::with_seed(7);
        for (name, mat) in cases {
            let bsdf = Bsdf::new(&mat, Frame::from_normal(Vec3::Z), relative_eta(mat.ior, true));
            let mut specular_seen = false;
            for _ in 0..5_000 {
                let v = upper_hemisphere(&mut rng);
                let Some(s) = bsdf.sample(v, rng.vec3()) else { continue };
                let rest = s.f - bsdf.eval_direct(v, s.l).f;
                assert_eq_approx!(s.f_specular, rest.max(Vec3::ZERO), Vec3::splat(1e-5), Vec3::splat(1e-3));
                assert!(s.f_specular.cmple(s.f + 1e-6).all(), "{name}: {:?} > {:?}", s.f_specular, s.f);
                if s.lobe == Lobe::Transmission {
                    assert_eq!(s.f_specular, s.f, "{name}");
                }
                specular_seen |= s.f_specular.max_element() > 0.0;
            }
            // Only lobes hidden from light sampling feed the specular part
            assert_eq!(specular_seen, name != "diffuse", "{name}");
        }
    }
}
