//! Path tracing state machine.
//!
//! Each camera sample runs `Trace -> (Background | Shade) -> ... -> Done`.
//! Light sampling covers every lobe except transmission and near-delta
//! reflection. Emission and environment reached by a BSDF-sampled ray are
//! weighted only by those excluded lobes, so no light path is counted twice.

use glam::{UVec2, Vec2, Vec3};
use principled_bsdf::{Bsdf, Lobe, Material};

use super::payload::Payload;
use super::{IntegratorSettings, Kernel};
use crate::accel::AccelerationStructure;
use crate::light::LightSet;
use crate::sampling::Pcg;
use crate::scene::CameraUniform;
use crate::util::{is_valid_radiance, luminance, offset_origin, Ray, Result};

/// Shadow rays stop this fraction short of finite lights.
const SHADOW_EPSILON: f32 = 1.0e-3;

/// Upper bound on the Russian roulette survival probability.
const RR_MAX_SURVIVAL: f32 = 0.95;

/// Read-only scene data a dispatch works against.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    pub accel: &'a AccelerationStructure,
    pub materials: &'a [Material],
    pub lights: &'a LightSet,
}

impl SceneView<'_> {
    #[inline]
    fn material(&self, id: u32) -> Material {
        self.materials.get(id as usize).copied().unwrap_or_default()
    }
}

/// Where a path is in its life cycle.
#[derive(Debug, Clone, Copy)]
pub enum PathState {
    /// Find the closest surface along the ray.
    Trace(Ray),
    /// Shade a surface hit and pick the next ray.
    Shade(Payload),
    /// The ray escaped in this direction.
    Background(Vec3),
    Done,
}

/// Running state of one path.
struct Path {
    radiance: Vec3,
    throughput: Vec3,
    /// Surfaces shaded so far.
    depth: u32,
    /// Weight of emission found by the current ray. One for camera rays,
    /// afterwards the share of the last bounce light sampling skipped.
    emitted_weight: Vec3,
}

impl Path {
    /// Add `throughput * contribution` unless the result is unusable.
    #[inline]
    fn add(&mut self, contribution: Vec3) {
        let c = self.throughput * contribution;
        if is_valid_radiance(c) {
            self.radiance += c;
        }
    }

    #[inline]
    fn add_emitted(&mut self, emission: Vec3) {
        let c = self.emitted_weight * emission;
        if is_valid_radiance(c) {
            self.radiance += c;
        }
    }
}

/// Path tracer bound to one set of settings.
#[derive(Debug, Clone)]
pub struct Integrator {
    settings: IntegratorSettings,
}

impl Integrator {
    pub fn new(settings: IntegratorSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    #[inline]
    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    /// Mean of `spp` samples for pixel `(x, y)`. Sample `s` uses the random
    /// stream of global sample index `first_sample + s`.
    #[allow(clippy::too_many_arguments)]
    pub fn render_pixel(
        &self,
        scene: &SceneView,
        camera: &CameraUniform,
        size: UVec2,
        x: u32,
        y: u32,
        first_sample: u32,
        spp: u32,
    ) -> Vec3 {
        let spp = spp.max(1);
        let mut sum = Vec3::ZERO;
        for s in 0..spp {
            let mut rng = Pcg::for_pixel(x, y, size.x, first_sample.wrapping_add(s));
            let offset = if self.settings.jitter { rng.next_vec2() } else { Vec2::splat(0.5) };
            let lens = if camera.aperture > 0.0 { rng.point_in_disk() } else { Vec2::ZERO };
            let ray = camera.generate_ray(Vec2::new(x as f32, y as f32) + offset, size, lens);
            sum += self.sample(scene, ray, &mut rng);
        }
        sum / spp as f32
    }

    /// One sample along `ray`. Always finite and non-negative.
    pub fn sample(&self, scene: &SceneView, ray: Ray, rng: &mut Pcg) -> Vec3 {
        let l = match self.settings.kernel {
            Kernel::PathTrace => self.trace_path(scene, ray, rng),
            Kernel::Normals | Kernel::Albedo => self.first_hit(scene, &ray),
        };
        if is_valid_radiance(l) {
            l
        } else {
            Vec3::ZERO
        }
    }

    fn trace_path(&self, scene: &SceneView, ray: Ray, rng: &mut Pcg) -> Vec3 {
        let mut path = Path {
            radiance: Vec3::ZERO,
            throughput: Vec3::ONE,
            depth: 0,
            emitted_weight: Vec3::ONE,
        };
        let mut state = PathState::Trace(ray);

        loop {
            state = match state {
                PathState::Trace(ray) => match scene.accel.intersect(&ray) {
                    Some(hit) => PathState::Shade(Payload::new(&hit, &ray, scene.material(hit.material_id))),
                    None => PathState::Background(ray.dir),
                },
                PathState::Background(dir) => {
                    if path.depth > 0 || self.settings.sky_visible {
                        path.add_emitted(scene.lights.environment().radiance(dir));
                    }
                    PathState::Done
                }
                PathState::Shade(hit) => self.shade(scene, &hit, &mut path, rng),
                PathState::Done => break,
            };
        }

        let l = path.radiance;
        let clamp = self.settings.firefly_clamp;
        if clamp > 0.0 {
            let lum = luminance(l);
            if lum > clamp {
                return l * (clamp / lum);
            }
        }
        l
    }

    /// Emission, next-event estimation and BSDF sampling at one hit.
    fn shade(&self, scene: &SceneView, hit: &Payload, path: &mut Path, rng: &mut Pcg) -> PathState {
        path.add_emitted(hit.emission());

        let bsdf = Bsdf::new(&hit.material, hit.frame(), hit.eta);

        if let Some(ls) = scene.lights.sample(hit.position, rng) {
            if hit.geometric_normal.dot(ls.direction) > 0.0 {
                let eval = bsdf.eval_direct(hit.view, ls.direction);
                if eval.f.max_element() > 0.0 {
                    let origin = offset_origin(hit.position, hit.geometric_normal, ls.direction);
                    let t_max = if ls.dist.is_finite() { ls.dist * (1.0 - SHADOW_EPSILON) } else { f32::INFINITY };
                    if !scene.accel.occluded(&Ray::segment(origin, ls.direction, t_max)) {
                        path.add(eval.f * ls.emission / ls.pdf);
                    }
                }
            }
        }

        path.depth += 1;
        if path.depth >= self.settings.max_depth {
            return PathState::Done;
        }

        let Some(scatter) = bsdf.sample(hit.view, rng.next_vec3()) else {
            return PathState::Done;
        };

        // Shading normals can send a reflection below the actual surface
        let cos_g = hit.geometric_normal.dot(scatter.l);
        let transmitted = scatter.lobe == Lobe::Transmission;
        if (transmitted && cos_g >= 0.0) || (!transmitted && cos_g <= 0.0) {
            return PathState::Done;
        }
        if !(scatter.pdf > 0.0) || !scatter.pdf.is_finite() {
            return PathState::Done;
        }

        let weight = path.throughput / scatter.pdf;
        let throughput = weight * scatter.f;
        let emitted_weight = weight * scatter.f_specular;
        if !is_valid_radiance(throughput) || !is_valid_radiance(emitted_weight) {
            return PathState::Done;
        }
        path.throughput = throughput;
        path.emitted_weight = emitted_weight;

        if path.depth >= self.settings.rr_depth {
            let survival = path.throughput.max_element().min(RR_MAX_SURVIVAL);
            if !(survival > 0.0) || rng.next_f32() >= survival {
                return PathState::Done;
            }
            path.throughput /= survival;
            path.emitted_weight /= survival;
        }

        let origin = offset_origin(hit.position, hit.geometric_normal, scatter.l);
        PathState::Trace(Ray::new(origin, scatter.l))
    }

    /// Debug kernels: visualize the first hit.
    fn first_hit(&self, scene: &SceneView, ray: &Ray) -> Vec3 {
        let Some(hit) = scene.accel.intersect(ray) else {
            return Vec3::ZERO;
        };
        match self.settings.kernel {
            Kernel::Normals => hit.shading_normal * 0.5 + 0.5,
            _ => {
                let m = scene.material(hit.material_id);
                if m.is_emissive() {
                    m.emitted()
                } else {
                    m.base_color()
                }
            }
        }
    }
}
