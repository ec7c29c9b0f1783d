//! Light sources and next-event sampling.
//!
//! Lights are selected uniformly; the returned pdf includes the selection
//! probability. Delta lights (point, directional) report `is_delta` and a
//! pdf equal to the selection probability alone.

mod environment;
mod sky;

pub use environment::{Environment, EnvironmentMap};
pub use sky::{PreethamSky, SkySettings, TURBIDITY_RANGE};

use glam::{Vec2, Vec3};
use principled_bsdf::Material;

use crate::accel::Triangle;
use crate::sampling::Pcg;

/// A light the integrator can sample directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Isotropic point light; `intensity` is radiant intensity (falls off with distance squared).
    Point { position: Vec3, intensity: Vec3 },
    /// Light from one direction at infinity. `direction` points towards the light.
    Directional { direction: Vec3, irradiance: Vec3 },
    /// One-sided emissive triangle (front face follows counter-clockwise winding).
    Triangle { v0: Vec3, v1: Vec3, v2: Vec3, emission: Vec3 },
    /// The scene environment.
    Environment,
}

impl Light {
    pub fn point(position: Vec3, intensity: Vec3) -> Self {
        Self::Point { position, intensity }
    }

    pub fn directional(direction: Vec3, irradiance: Vec3) -> Self {
        Self::Directional { direction: direction.normalize_or(Vec3::Y), irradiance }
    }

    #[inline]
    pub fn is_delta(&self) -> bool {
        matches!(self, Self::Point { .. } | Self::Directional { .. })
    }
}

/// Direct-lighting sample toward a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Surface normal at the sampled point (faces the receiver for area lights).
    pub normal: Vec3,
    /// Radiance arriving along `direction` (already attenuated for point lights).
    pub emission: Vec3,
    /// Unit direction from the receiver to the light.
    pub direction: Vec3,
    /// Distance to the light sample (`INFINITY` for distant lights).
    pub dist: f32,
    /// Solid-angle pdf including light selection. Selection probability for delta lights.
    pub pdf: f32,
    pub is_delta: bool,
}

/// All lights of a scene plus its environment.
#[derive(Debug, Clone, Default)]
pub struct LightSet {
    lights: Vec<Light>,
    environment: Environment,
}

impl LightSet {
    /// Gather analytic lights, emissive triangles and (if not black) the environment.
    pub fn new(analytic: &[Light], triangles: &[Triangle], materials: &[Material], environment: Environment) -> Self {
        let mut lights: Vec<Light> = analytic
            .iter()
            .copied()
            .filter(|l| !matches!(l, Light::Triangle { .. } | Light::Environment))
            .collect();

        for tri in triangles {
            let Some(mat) = materials.get(tri.material_id as usize) else {
                continue;
            };
            let emission = mat.emitted();
            if emission.max_element() > 0.0 && emission.is_finite() && tri.area() > 0.0 {
                lights.push(Light::Triangle { v0: tri.v0, v1: tri.v1, v2: tri.v2, emission });
            }
        }

        if !environment.is_black() {
            lights.push(Light::Environment);
        }

        tracing::trace!(lights = lights.len(), "light set");
        Self { lights, environment }
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    #[inline]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Pick a light uniformly and sample it from `p`. `None` when there are no
    /// lights or the sample carries no energy.
    pub fn sample(&self, p: Vec3, rng: &mut Pcg) -> Option<LightSample> {
        if self.lights.is_empty() {
            return None;
        }
        let n = self.lights.len();
        let idx = ((rng.next_f32() * n as f32) as usize).min(n - 1);
        let select_pdf = 1.0 / n as f32;

        let mut sample = self.sample_light(&self.lights[idx], p, rng.next_vec2())?;
        sample.pdf *= select_pdf;
        (sample.pdf > 0.0 && sample.pdf.is_finite()).then_some(sample)
    }

    fn sample_light(&self, light: &Light, p: Vec3, u: Vec2) -> Option<LightSample> {
        match *light {
            Light::Point { position, intensity } => {
                let d = position - p;
                let dist2 = d.length_squared();
                if !(dist2 > 0.0) {
                    return None;
                }
                let dist = dist2.sqrt();
                let direction = d / dist;
                Some(LightSample {
                    normal: -direction,
                    emission: intensity / dist2,
                    direction,
                    dist,
                    pdf: 1.0,
                    is_delta: true,
                })
            }
            Light::Directional { direction, irradiance } => Some(LightSample {
                normal: -direction,
                emission: irradiance,
                direction,
                dist: f32::INFINITY,
                pdf: 1.0,
                is_delta: true,
            }),
            Light::Triangle { v0, v1, v2, emission } => {
                // Uniform point on the triangle
                let su = u.x.sqrt();
                let (b1, b2) = (su * (1.0 - u.y), su * u.y);
                let q = v0 * (1.0 - b1 - b2) + v1 * b1 + v2 * b2;

                let cross = (v1 - v0).cross(v2 - v0);
                let area = 0.5 * cross.length();
                let normal = cross.normalize_or_zero();

                let d = q - p;
                let dist2 = d.length_squared();
                if !(dist2 > 0.0) || area <= 0.0 {
                    return None;
                }
                let dist = dist2.sqrt();
                let direction = d / dist;
                let cos_light = -direction.dot(normal);
                if cos_light <= 0.0 {
                    return None;
                }
                Some(LightSample {
                    normal,
                    emission,
                    direction,
                    dist,
                    pdf: dist2 / (area * cos_light),
                    is_delta: false,
                })
            }
            Light::Environment => {
                let (direction, emission, pdf) = self.environment.sample(u);
                (pdf > 0.0).then_some(LightSample {
                    normal: -direction,
                    emission,
                    direction,
                    dist: f32::INFINITY,
                    pdf,
                    is_delta: false,
                })
            }
        }
    }
}
