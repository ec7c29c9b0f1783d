//! CPU implementation of the GPU resource service.
//!
//! Resource tables live behind `parking_lot` locks. A submission runs its
//! commands in order on the calling thread; `TraceRays` and `ToneMap` fan out
//! over image rows with rayon, so every pixel task is independent and writes
//! only its own texel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, UVec2, Vec3, Vec4};
use parking_lot::RwLock;
use rayon::prelude::*;

use super::tonemap::resolve_pixel;
use super::{
    AccelHandle, Command, CommandList, DeviceLimits, GpuDevice, ImageData, ImageFormat, ImageHandle, ImageSpec,
    PipelineDesc, PipelineHandle, SubmissionIndex,
};
use crate::accel::AccelerationStructure;
use crate::integrator::{Integrator, SceneView};
use crate::light::{Environment, Light, LightSet, PreethamSky};
use crate::scene::{CameraUniform, Material, Mesh};
use crate::util::{Error, Result};

struct Image {
    spec: ImageSpec,
    data: ImageData,
}

impl Image {
    fn new(spec: ImageSpec) -> Self {
        let n = spec.texel_count();
        let data = match spec.format {
            ImageFormat::Rgba32Float => ImageData::Rgba32Float(vec![Vec4::ZERO; n]),
            ImageFormat::Rgba8Unorm => ImageData::Rgba8Unorm(vec![[0; 4]; n]),
        };
        Self { spec, data }
    }
}

struct Pipeline {
    desc: PipelineDesc,
    integrator: Integrator,
}

/// Parameters of one `TraceRays` command.
struct TraceParams {
    pipeline: PipelineHandle,
    accel: AccelHandle,
    accumulation: ImageHandle,
    camera: CameraUniform,
    frame_index: u32,
    samples_per_pixel: u32,
    size: UVec2,
}

/// Software device executing command lists on the rayon thread pool.
pub struct CpuDevice {
    limits: DeviceLimits,
    images: RwLock<Vec<Option<Image>>>,
    pipelines: RwLock<Vec<Option<Pipeline>>>,
    accels: RwLock<Vec<Option<AccelerationStructure>>>,
    materials: RwLock<Vec<Material>>,
    lights: RwLock<Vec<Light>>,
    environment: RwLock<Environment>,
    submissions: AtomicU64,
}

impl CpuDevice {
    pub fn new(limits: DeviceLimits) -> Self {
        tracing::info!(threads = rayon::current_num_threads(), "cpu device ready");
        Self {
            limits,
            images: RwLock::new(Vec::new()),
            pipelines: RwLock::new(Vec::new()),
            accels: RwLock::new(Vec::new()),
            materials: RwLock::new(Vec::new()),
            lights: RwLock::new(Vec::new()),
            environment: RwLock::new(Environment::default()),
            submissions: AtomicU64::new(0),
        }
    }

    /// Current environment (for inspection and tests).
    pub fn environment(&self) -> Environment {
        self.environment.read().clone()
    }

    fn check_size(&self, width: u32, height: u32) -> Result<()> {
        let max = self.limits.max_image_dimension;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Error::invalid(format!("image size {width}x{height} outside 1..={max}")));
        }
        Ok(())
    }

    fn accel_ref(accels: &[Option<AccelerationStructure>], handle: AccelHandle) -> Result<&AccelerationStructure> {
        let accel = accels
            .get(handle.index as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidHandle { kind: "accel", index: handle.index })?;
        if accel.generation() != handle.generation {
            return Err(Error::StaleAccel { handle: handle.generation, current: accel.generation() });
        }
        Ok(accel)
    }

    fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::ClearImage { image, value } => self.clear_image(image, value),
            Command::TraceRays {
                pipeline,
                accel,
                accumulation,
                camera,
                frame_index,
                samples_per_pixel,
                width,
                height,
            } => self.trace_rays(TraceParams {
                pipeline,
                accel,
                accumulation,
                camera,
                frame_index,
                samples_per_pixel,
                size: UVec2::new(width, height),
            }),
            Command::ToneMap { source, target, exposure, frame_count, post_processing } => {
                self.tone_map(source, target, exposure, frame_count, post_processing)
            }
            Command::BakeSky { settings, width, height } => {
                self.check_size(width, height)?;
                let map = PreethamSky::new(&settings).bake(width, height);
                *self.environment.write() = Environment::Map(Arc::new(map));
                Ok(())
            }
            Command::UniformEnvironment(color) => {
                let color = if color.is_finite() { color.max(Vec3::ZERO) } else { Vec3::ZERO };
                *self.environment.write() = Environment::Uniform(color);
                Ok(())
            }
        }
    }

    fn clear_image(&self, image: ImageHandle, value: [f32; 4]) -> Result<()> {
        let mut images = self.images.write();
        let img = images
            .get_mut(image.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidHandle { kind: "image", index: image.0 })?;
        match &mut img.data {
            ImageData::Rgba32Float(texels) => texels.fill(Vec4::from_array(value)),
            ImageData::Rgba8Unorm(texels) => {
                let v = value.map(|c| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8);
                texels.fill(v);
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(w = params.size.x, h = params.size.y, frame = params.frame_index))]
    fn trace_rays(&self, params: TraceParams) -> Result<()> {
        if params.frame_index == 0 {
            return Err(Error::invalid("frame index starts at 1"));
        }
        let start = Instant::now();

        // Lock order: accels, pipelines, materials, lights, environment, images
        let accels = self.accels.read();
        let accel = Self::accel_ref(&accels, params.accel)?;
        let pipelines = self.pipelines.read();
        let pipeline = pipelines
            .get(params.pipeline.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidHandle { kind: "pipeline", index: params.pipeline.0 })?;
        let materials = self.materials.read();
        let lights = LightSet::new(&self.lights.read(), accel.triangles(), &materials, self.environment.read().clone());
        let scene = SceneView { accel, materials: &materials, lights: &lights };

        let mut images = self.images.write();
        let img = images
            .get_mut(params.accumulation.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidHandle { kind: "image", index: params.accumulation.0 })?;
        if (img.spec.width, img.spec.height) != (params.size.x, params.size.y) {
            return Err(Error::invalid(format!(
                "dispatch {}x{} does not match '{}' ({}x{})",
                params.size.x, params.size.y, img.spec.debug_name, img.spec.width, img.spec.height
            )));
        }
        let ImageData::Rgba32Float(texels) = &mut img.data else {
            return Err(Error::invalid(format!("'{}' is not a float image", img.spec.debug_name)));
        };

        let spp = params.samples_per_pixel.max(1);
        let first_sample = (params.frame_index - 1).wrapping_mul(spp);
        let integrator = &pipeline.integrator;
        let width = params.size.x as usize;

        texels.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, texel) in row.iter_mut().enumerate() {
                let l = integrator.render_pixel(
                    &scene,
                    &params.camera,
                    params.size,
                    x as u32,
                    y as u32,
                    first_sample,
                    spp,
                );
                *texel += l.extend(1.0);
            }
        });

        tracing::trace!(
            pipeline = %pipeline.desc.debug_name,
            lights = lights.len(),
            ms = start.elapsed().as_secs_f32() * 1000.0,
            "trace rays"
        );
        Ok(())
    }

    fn tone_map(
        &self,
        source: ImageHandle,
        target: ImageHandle,
        exposure: f32,
        frame_count: u32,
        post_processing: bool,
    ) -> Result<()> {
        let mut images = self.images.write();

        let resolved: Vec<[u8; 4]> = {
            let src = images
                .get(source.0 as usize)
                .and_then(Option::as_ref)
                .ok_or(Error::InvalidHandle { kind: "image", index: source.0 })?;
            let ImageData::Rgba32Float(texels) = &src.data else {
                return Err(Error::invalid(format!("tone map source '{}' is not a float image", src.spec.debug_name)));
            };
            let exposure = if exposure.is_finite() { exposure.max(0.0) } else { 0.0 };
            texels
                .par_iter()
                .map(|&sum| resolve_pixel(sum, frame_count, exposure, post_processing))
                .collect()
        };

        let dst = images
            .get_mut(target.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidHandle { kind: "image", index: target.0 })?;
        match &mut dst.data {
            ImageData::Rgba8Unorm(texels) if texels.len() == resolved.len() => {
                texels.copy_from_slice(&resolved);
                Ok(())
            }
            _ => Err(Error::invalid(format!(
                "tone map target '{}' must be an rgba8 image of the source size",
                dst.spec.debug_name
            ))),
        }
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new(DeviceLimits::default())
    }
}

impl GpuDevice for CpuDevice {
    fn name(&self) -> &str {
        "cpu"
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_image(&self, spec: ImageSpec) -> Result<ImageHandle> {
        self.check_size(spec.width, spec.height)?;
        let mut images = self.images.write();
        images.push(Some(Image::new(spec)));
        Ok(ImageHandle((images.len() - 1) as u32))
    }

    fn resize_image(&self, image: ImageHandle, width: u32, height: u32) -> Result<()> {
        self.check_size(width, height)?;
        let mut images = self.images.write();
        let img = images
            .get_mut(image.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidHandle { kind: "image", index: image.0 })?;
        let spec = ImageSpec { width, height, ..img.spec.clone() };
        *img = Image::new(spec);
        Ok(())
    }

    fn image_spec(&self, image: ImageHandle) -> Result<ImageSpec> {
        self.images
            .read()
            .get(image.0 as usize)
            .and_then(Option::as_ref)
            .map(|img| img.spec.clone())
            .ok_or(Error::InvalidHandle { kind: "image", index: image.0 })
    }

    fn read_image(&self, image: ImageHandle) -> Result<ImageData> {
        self.images
            .read()
            .get(image.0 as usize)
            .and_then(Option::as_ref)
            .map(|img| img.data.clone())
            .ok_or(Error::InvalidHandle { kind: "image", index: image.0 })
    }

    fn destroy_image(&self, image: ImageHandle) {
        if let Some(slot) = self.images.write().get_mut(image.0 as usize) {
            *slot = None;
        }
    }

    fn write_materials(&self, materials: &[Material]) -> Result<()> {
        *self.materials.write() = materials.to_vec();
        Ok(())
    }

    fn write_lights(&self, lights: &[Light]) -> Result<()> {
        *self.lights.write() = lights.to_vec();
        Ok(())
    }

    fn build_accel(&self, meshes: &[Mesh], transforms: &[Mat4]) -> Result<AccelHandle> {
        let accel = AccelerationStructure::build(meshes, transforms, self.limits.max_triangles)?;
        let generation = accel.generation();
        let mut accels = self.accels.write();
        accels.push(Some(accel));
        Ok(AccelHandle { index: (accels.len() - 1) as u32, generation })
    }

    fn rebuild_accel(&self, handle: AccelHandle, transforms: &[Mat4]) -> Result<AccelHandle> {
        // Write lock: no dispatch can observe the structure mid-rebuild
        let mut accels = self.accels.write();
        let accel = accels
            .get_mut(handle.index as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidHandle { kind: "accel", index: handle.index })?;
        if accel.generation() != handle.generation {
            return Err(Error::StaleAccel { handle: handle.generation, current: accel.generation() });
        }
        accel.rebuild(transforms)?;
        Ok(AccelHandle { index: handle.index, generation: accel.generation() })
    }

    fn destroy_accel(&self, handle: AccelHandle) {
        if let Some(slot) = self.accels.write().get_mut(handle.index as usize) {
            *slot = None;
        }
    }

    #[tracing::instrument(skip_all, fields(name = %desc.debug_name, kernel = ?desc.settings.kernel))]
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<PipelineHandle> {
        let integrator = Integrator::new(desc.settings)?;
        let mut pipelines = self.pipelines.write();
        pipelines.push(Some(Pipeline { desc: desc.clone(), integrator }));
        Ok(PipelineHandle((pipelines.len() - 1) as u32))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        if let Some(slot) = self.pipelines.write().get_mut(pipeline.0 as usize) {
            *slot = None;
        }
    }

    fn submit(&self, commands: CommandList) -> Result<SubmissionIndex> {
        let index = SubmissionIndex(self.submissions.fetch_add(1, Ordering::AcqRel) + 1);
        for command in commands {
            self.execute(command)?;
        }
        Ok(index)
    }

    fn wait(&self, submission: SubmissionIndex) -> Result<()> {
        // Submissions complete before submit() returns
        if submission.0 > self.submissions.load(Ordering::Acquire) {
            return Err(Error::invalid(format!("unknown submission {}", submission.0)));
        }
        Ok(())
    }
}
