//! The frame orchestrator.
//!
//! Once per frame the [`Renderer`] collects everything that changed since the
//! previous frame, pushes the changes to the device and decides whether the
//! accumulation continues or restarts. A restart sets the frame index back to
//! 1 and clears the accumulation image in the same submission that traces the
//! new frame, so pre-reset energy can never leak into the average.

use std::path::Path;
use std::time::{Duration, Instant};

use glam::{IVec2, Mat4, UVec2, Vec3, Vec4};
use smallvec::SmallVec;

use super::config::{EnvironmentKind, RendererConfig};
use super::export::write_png;
use super::{FrameInput, Layer};
use crate::gpu::{
    AccelHandle, Command, CommandList, CpuDevice, GpuDevice, ImageData, ImageFormat, ImageHandle, ImageSpec,
    PipelineDesc, PipelineHandle,
};
use crate::integrator::IntegratorSettings;
use crate::light::{Light, SkySettings};
use crate::scene::{Camera, CameraUniform, DemoScene, MaterialTable, Mesh, SceneDesc};
use crate::util::{BBox3f, Error, Result};

/// Why the accumulation restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetReason {
    /// First frame after init.
    Initial,
    /// Accumulation is switched off.
    AccumulationOff,
    CameraMoved,
    Resized,
    Materials,
    Lights,
    /// Meshes replaced (full acceleration structure build).
    Geometry,
    /// Mesh transforms edited (rebuild).
    Transforms,
    /// Sky parameters or environment kind changed.
    Environment,
    /// Integrator pipeline replaced.
    Pipeline,
    /// Samples per pixel changed.
    Sampling,
}

impl ResetReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::AccumulationOff => "accumulation off",
            Self::CameraMoved => "camera",
            Self::Resized => "resize",
            Self::Materials => "materials",
            Self::Lights => "lights",
            Self::Geometry => "geometry",
            Self::Transforms => "transforms",
            Self::Environment => "environment",
            Self::Pipeline => "pipeline",
            Self::Sampling => "sampling",
        }
    }
}

/// What happened during the last rendered frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Frame index the dispatch ran with (1 right after a reset).
    pub frame_index: u32,
    /// Frames summed in the accumulation image.
    pub accumulated_frames: u32,
    /// Reasons the accumulation restarted this frame; empty = continued.
    pub reset: SmallVec<[ResetReason; 4]>,
    /// False when the frame was skipped (no valid acceleration structure,
    /// device error).
    pub dispatched: bool,
    /// Camera samples traced (`width * height * spp`).
    pub samples: u64,
    pub dispatch_time: Duration,
    pub size: UVec2,
}

impl FrameStats {
    #[inline]
    pub fn was_reset(&self) -> bool {
        !self.reset.is_empty()
    }
}

/// Progressive renderer driving a [`GpuDevice`].
///
/// All scene state is owned here and mutated only between frames; setters
/// record what changed and [`Renderer::render_frame`] consumes the flags.
pub struct Renderer<D: GpuDevice = CpuDevice> {
    device: D,
    config: RendererConfig,
    camera: Camera,
    materials: MaterialTable,
    meshes: Vec<Mesh>,
    transforms: Vec<Mat4>,
    lights: Vec<Light>,

    geometry_dirty: bool,
    transforms_dirty: bool,
    lights_dirty: bool,
    environment_dirty: bool,
    sampling_dirty: bool,
    pipeline_dirty: bool,

    accel: Option<AccelHandle>,
    pipeline: Option<PipelineHandle>,
    accumulation: Option<ImageHandle>,
    display: Option<ImageHandle>,

    size: UVec2,
    pending_size: Option<UVec2>,
    /// Index the next dispatch runs with.
    frame_index: u32,
    accumulated_frames: u32,
    last_camera: Option<CameraUniform>,
    stats: FrameStats,
    last_error: Option<String>,
}

impl<D: GpuDevice> Renderer<D> {
    /// Renderer with an empty scene. Call [`Layer::on_init`] before the first frame.
    pub fn new(device: D, config: RendererConfig) -> Self {
        let size = clamp_size(IVec2::new(config.width as i32, config.height as i32), device.limits().max_image_dimension)
            .unwrap_or(UVec2::ONE);
        Self {
            device,
            config,
            camera: Camera::default(),
            materials: MaterialTable::default(),
            meshes: Vec::new(),
            transforms: Vec::new(),
            lights: Vec::new(),
            geometry_dirty: true,
            transforms_dirty: false,
            lights_dirty: true,
            environment_dirty: true,
            sampling_dirty: false,
            pipeline_dirty: false,
            accel: None,
            pipeline: None,
            accumulation: None,
            display: None,
            size,
            pending_size: None,
            frame_index: 1,
            accumulated_frames: 0,
            last_camera: None,
            stats: FrameStats::default(),
            last_error: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Camera movement is detected by comparing snapshots, so any edit made
    /// here resets the accumulation on the next frame.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialTable {
        &mut self.materials
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// World-space bounds of the current geometry.
    pub fn scene_bounds(&self) -> BBox3f {
        let mut b = BBox3f::EMPTY;
        for (mesh, xform) in self.meshes.iter().zip(&self.transforms) {
            let local = mesh.bounds();
            if local.is_empty() {
                continue;
            }
            for i in 0..8 {
                let corner = Vec3::new(
                    if i & 1 == 0 { local.min.x } else { local.max.x },
                    if i & 2 == 0 { local.min.y } else { local.max.y },
                    if i & 4 == 0 { local.min.z } else { local.max.z },
                );
                b.expand_by_point(xform.transform_point3(corner));
            }
        }
        b
    }

    /// Replace the whole scene (loader output).
    pub fn set_scene(&mut self, scene: SceneDesc) {
        tracing::info!(
            name = %scene.name,
            meshes = scene.meshes.len(),
            triangles = scene.triangle_count(),
            lights = scene.lights.len(),
            "set scene"
        );
        self.meshes = scene.meshes;
        self.transforms = scene.transforms;
        self.lights = scene.lights;
        self.materials.replace(scene.materials);
        self.geometry_dirty = true;
        self.lights_dirty = true;
    }

    /// Load a demo scene and move the camera to its suggested viewpoint.
    pub fn load_demo(&mut self, demo: &DemoScene) {
        self.set_scene(demo.scene.clone());
        self.camera.set_position(demo.eye);
        self.camera.look_at(demo.target);
    }

    /// Move one mesh. Unchanged values are ignored.
    pub fn set_transform(&mut self, mesh: usize, transform: Mat4) -> Result<()> {
        let slot = self
            .transforms
            .get_mut(mesh)
            .ok_or(Error::InvalidHandle { kind: "mesh", index: mesh as u32 })?;
        if *slot != transform {
            *slot = transform;
            self.transforms_dirty = true;
        }
        Ok(())
    }

    pub fn set_lights(&mut self, lights: Vec<Light>) {
        if self.lights != lights {
            self.lights = lights;
            self.lights_dirty = true;
        }
    }

    pub fn set_accumulate(&mut self, accumulate: bool) {
        self.config.accumulate = accumulate;
    }

    /// Display-only; does not restart the accumulation.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.config.exposure = exposure;
    }

    /// Display-only; does not restart the accumulation.
    pub fn set_post_processing(&mut self, enabled: bool) {
        self.config.post_processing = enabled;
    }

    pub fn set_samples_per_pixel(&mut self, spp: u32) {
        let spp = spp.max(1);
        if spp != self.config.samples_per_pixel {
            self.config.samples_per_pixel = spp;
            self.sampling_dirty = true;
        }
    }

    pub fn sky(&self) -> &SkySettings {
        &self.config.sky
    }

    /// Update the sky model. Values are clamped to their valid ranges.
    pub fn set_sky(&mut self, sky: SkySettings) {
        let sky = sky.sanitized();
        if sky != self.config.sky {
            self.config.sky = sky;
            if self.config.environment == EnvironmentKind::Sky {
                self.environment_dirty = true;
            }
        }
    }

    pub fn set_environment(&mut self, environment: EnvironmentKind) {
        if environment != self.config.environment {
            self.config.environment = environment;
            self.environment_dirty = true;
        }
    }

    /// Build a new integrator pipeline and swap it in.
    ///
    /// On failure the current pipeline stays active and the error is kept in
    /// [`Renderer::last_error`].
    #[tracing::instrument(skip_all, fields(kernel = ?settings.kernel, max_depth = settings.max_depth))]
    pub fn reload_pipeline(&mut self, settings: IntegratorSettings) -> Result<()> {
        let desc = PipelineDesc {
            debug_name: format!("integrator ({})", settings.kernel.label()),
            settings,
        };
        match self.device.create_pipeline(&desc) {
            Ok(pipeline) => {
                if let Some(old) = self.pipeline.replace(pipeline) {
                    self.device.destroy_pipeline(old);
                }
                self.config.integrator = settings;
                self.pipeline_dirty = true;
                tracing::info!("pipeline reloaded");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "pipeline build failed, keeping the previous pipeline");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Request a new viewport size.
    ///
    /// Zero or negative sizes (minimized window) are ignored: the render
    /// targets keep their last valid size until a positive size arrives.
    pub fn resize(&mut self, width: i32, height: i32) {
        match clamp_size(IVec2::new(width, height), self.device.limits().max_image_dimension) {
            Some(size) if size != self.size => self.pending_size = Some(size),
            Some(_) => self.pending_size = None,
            None => tracing::debug!(width, height, "deferring resize to an empty viewport"),
        }
    }

    /// Current render target size.
    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// Index the next dispatch will run with.
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Frames summed in the accumulation image.
    pub fn accumulated_frames(&self) -> u32 {
        self.accumulated_frames
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Most recent pipeline, acceleration structure or device failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// True if a valid acceleration structure is bound.
    pub fn has_accel(&self) -> bool {
        self.accel.is_some()
    }

    /// Raw accumulation sums (radiance summed over `accumulated_frames`).
    pub fn read_accumulation(&self) -> Result<Vec<Vec4>> {
        let image = self.accumulation.ok_or_else(not_initialized)?;
        match self.device.read_image(image)? {
            ImageData::Rgba32Float(texels) => Ok(texels),
            ImageData::Rgba8Unorm(_) => Err(Error::invalid("accumulation image is not float")),
        }
    }

    /// The display image as RGBA8, row-major, top row first.
    pub fn display_pixels(&self) -> Result<Vec<[u8; 4]>> {
        let image = self.display.ok_or_else(not_initialized)?;
        match self.device.read_image(image)? {
            ImageData::Rgba8Unorm(pixels) => Ok(pixels),
            ImageData::Rgba32Float(_) => Err(Error::invalid("display image is not rgba8")),
        }
    }

    /// Save the display image as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.accumulated_frames == 0 {
            return Err(Error::NotReady("nothing rendered yet".into()));
        }
        let pixels = self.display_pixels()?;
        write_png(path, self.size.x, self.size.y, &pixels)
    }

    /// Update with `input`, then render.
    pub fn frame(&mut self, input: &FrameInput) -> Result<&FrameStats> {
        self.on_update(input);
        self.render_frame()?;
        Ok(&self.stats)
    }

    /// Sync changed state to the device, decide reset vs. continue, trace one
    /// frame and tone-map it.
    ///
    /// Device failures do not surface as errors here: they are logged, kept
    /// in [`Renderer::last_error`], and the frame is skipped, leaving the last
    /// good display image in place. A failed upload stays pending and is
    /// retried next frame; a failed submission restarts accumulation.
    pub fn render_frame(&mut self) -> Result<&FrameStats> {
        let (Some(accumulation), Some(display), Some(pipeline)) = (self.accumulation, self.display, self.pipeline)
        else {
            return Err(not_initialized());
        };
        let _span = tracing::info_span!("frame", index = self.frame_index).entered();

        let mut reset: SmallVec<[ResetReason; 4]> = SmallVec::new();
        if !self.config.accumulate {
            reset.push(ResetReason::AccumulationOff);
        }

        if let Some(size) = self.pending_size.take() {
            match self.resize_targets(accumulation, display, size) {
                Ok(()) => reset.push(ResetReason::Resized),
                Err(e) => {
                    self.pending_size = Some(size);
                    self.report("resize failed", e);
                }
            }
        }

        let synced = self.sync_scene(&mut reset);

        if std::mem::take(&mut self.sampling_dirty) {
            reset.push(ResetReason::Sampling);
        }
        if std::mem::take(&mut self.pipeline_dirty) {
            reset.push(ResetReason::Pipeline);
        }

        let camera = self.camera.uniform(self.size);
        match self.last_camera {
            None => reset.push(ResetReason::Initial),
            Some(last) if last != camera => reset.push(ResetReason::CameraMoved),
            Some(_) => {}
        }
        self.last_camera = Some(camera);

        if !reset.is_empty() {
            tracing::debug!(reasons = ?reset, "reset accumulation");
            self.frame_index = 1;
            self.accumulated_frames = 0;
        }

        self.stats = FrameStats {
            frame_index: self.frame_index,
            accumulated_frames: self.accumulated_frames,
            reset,
            dispatched: false,
            samples: 0,
            dispatch_time: Duration::ZERO,
            size: self.size,
        };

        if !synced {
            tracing::debug!("scene upload failed, skipping dispatch");
            return Ok(&self.stats);
        }
        let Some(accel) = self.accel else {
            tracing::debug!("no acceleration structure, skipping dispatch");
            return Ok(&self.stats);
        };

        let spp = self.config.samples_per_pixel.max(1);
        let mut commands = CommandList::new();
        if self.frame_index == 1 {
            commands.push(Command::ClearImage { image: accumulation, value: [0.0; 4] });
        }
        commands
            .push(Command::TraceRays {
                pipeline,
                accel,
                accumulation,
                camera,
                frame_index: self.frame_index,
                samples_per_pixel: spp,
                width: self.size.x,
                height: self.size.y,
            })
            .push(Command::ToneMap {
                source: accumulation,
                target: display,
                exposure: self.config.exposure,
                frame_count: self.frame_index,
                post_processing: self.config.post_processing,
            });

        let start = Instant::now();
        let result = self.device.submit(commands).and_then(|s| self.device.wait(s));
        match result {
            Ok(()) => {
                self.accumulated_frames = self.frame_index;
                self.stats.accumulated_frames = self.accumulated_frames;
                self.stats.dispatched = true;
                self.stats.samples = self.size.x as u64 * self.size.y as u64 * spp as u64;
                self.stats.dispatch_time = start.elapsed();
                self.frame_index += 1;
            }
            Err(e) => {
                if matches!(e, Error::StaleAccel { .. }) {
                    self.accel = None;
                }
                // Part of the submission may have landed in the accumulation
                self.frame_index = 1;
                self.accumulated_frames = 0;
                self.report("frame dispatch failed", e);
            }
        }
        Ok(&self.stats)
    }

    fn resize_targets(&mut self, accumulation: ImageHandle, display: ImageHandle, size: UVec2) -> Result<()> {
        tracing::debug!(from = ?self.size, to = ?size, "resize render targets");
        self.device.resize_image(accumulation, size.x, size.y)?;
        self.device.resize_image(display, size.x, size.y)?;
        self.size = size;
        self.accumulated_frames = 0;
        Ok(())
    }

    /// Push material, light, geometry and environment edits to the device.
    ///
    /// Returns false if an upload failed. The failed edit stays pending and is
    /// retried on the next frame.
    fn sync_scene(&mut self, reset: &mut SmallVec<[ResetReason; 4]>) -> bool {
        let mut synced = true;

        if self.materials.take_dirty() {
            match self.device.write_materials(self.materials.as_slice()) {
                Ok(()) => reset.push(ResetReason::Materials),
                Err(e) => {
                    self.materials.mark_dirty();
                    self.report("material upload failed", e);
                    synced = false;
                }
            }
        }

        if std::mem::take(&mut self.lights_dirty) {
            match self.device.write_lights(&self.lights) {
                Ok(()) => reset.push(ResetReason::Lights),
                Err(e) => {
                    self.lights_dirty = true;
                    self.report("light upload failed", e);
                    synced = false;
                }
            }
        }

        let transforms_dirty = std::mem::take(&mut self.transforms_dirty);
        if std::mem::take(&mut self.geometry_dirty) || (transforms_dirty && self.accel.is_none()) {
            if let Some(old) = self.accel.take() {
                self.device.destroy_accel(old);
            }
            match self.device.build_accel(&self.meshes, &self.transforms) {
                Ok(handle) => self.accel = Some(handle),
                Err(e) => self.report("acceleration structure build failed", e),
            }
            reset.push(ResetReason::Geometry);
        } else if transforms_dirty {
            if let Some(handle) = self.accel.take() {
                match self.device.rebuild_accel(handle, &self.transforms) {
                    Ok(handle) => self.accel = Some(handle),
                    Err(e) => {
                        self.device.destroy_accel(handle);
                        self.report("acceleration structure rebuild failed", e);
                    }
                }
            }
            reset.push(ResetReason::Transforms);
        }

        if std::mem::take(&mut self.environment_dirty) {
            let command = match self.config.environment {
                EnvironmentKind::Sky => {
                    let (width, height) = self.config.sky_table_size();
                    Command::BakeSky { settings: self.config.sky, width, height }
                }
                EnvironmentKind::Uniform(color) => Command::UniformEnvironment(Vec3::from_array(color)),
            };
            let mut commands = CommandList::new();
            commands.push(command);
            match self.device.submit(commands).and_then(|s| self.device.wait(s)) {
                Ok(()) => reset.push(ResetReason::Environment),
                Err(e) => {
                    self.environment_dirty = true;
                    self.report("environment update failed", e);
                    synced = false;
                }
            }
        }

        synced
    }

    fn report(&mut self, what: &str, e: Error) {
        tracing::error!(error = %e, "{what}");
        self.last_error = Some(format!("{what}: {e}"));
    }

    fn create_initial_pipeline(&mut self) -> Result<PipelineHandle> {
        let desc = PipelineDesc { debug_name: "integrator".into(), settings: self.config.integrator };
        match self.device.create_pipeline(&desc) {
            Ok(pipeline) => Ok(pipeline),
            Err(e) => {
                self.report("configured pipeline failed, using defaults", e);
                self.config.integrator = IntegratorSettings::default();
                let desc = PipelineDesc { debug_name: "integrator".into(), settings: self.config.integrator };
                self.device.create_pipeline(&desc)
            }
        }
    }
}

impl<D: GpuDevice> Layer for Renderer<D> {
    fn on_init(&mut self) -> Result<()> {
        if self.accumulation.is_some() {
            return Ok(());
        }
        tracing::info!(device = self.device.name(), size = ?self.size, "init renderer");
        let accumulation =
            self.device.create_image(ImageSpec::new(self.size.x, self.size.y, ImageFormat::Rgba32Float, "accumulation"))?;
        let display =
            self.device.create_image(ImageSpec::new(self.size.x, self.size.y, ImageFormat::Rgba8Unorm, "display"))?;
        self.pipeline = Some(self.create_initial_pipeline()?);
        self.accumulation = Some(accumulation);
        self.display = Some(display);
        self.frame_index = 1;
        self.accumulated_frames = 0;
        Ok(())
    }

    fn on_update(&mut self, input: &FrameInput) {
        self.resize(input.viewport.x, input.viewport.y);
        self.camera.update(input.mouse_delta, input.looking, input.movement, input.dt);
    }

    fn on_render(&mut self) -> Result<()> {
        self.render_frame().map(|_| ())
    }

    fn on_shutdown(&mut self) {
        tracing::info!("shutdown renderer");
        if let Some(accel) = self.accel.take() {
            self.device.destroy_accel(accel);
        }
        if let Some(pipeline) = self.pipeline.take() {
            self.device.destroy_pipeline(pipeline);
        }
        for image in [self.accumulation.take(), self.display.take()].into_iter().flatten() {
            self.device.destroy_image(image);
        }
        self.accumulated_frames = 0;
        self.frame_index = 1;
    }
}

fn not_initialized() -> Error {
    Error::NotReady("renderer not initialized".into())
}

/// Positive size clamped to the device limit; `None` for empty viewports.
fn clamp_size(size: IVec2, max: u32) -> Option<UVec2> {
    if size.x <= 0 || size.y <= 0 {
        return None;
    }
    Some(size.as_uvec2().min(UVec2::splat(max.max(1))))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::gpu::SubmissionIndex;
    use crate::scene::Material;
    use crate::gpu::DeviceLimits;
    use crate::scene::{demo_scene, sphere_on_floor};

    fn small_config() -> RendererConfig {
        RendererConfig {
            width: 8,
            height: 6,
            environment: EnvironmentKind::Uniform([0.5, 0.5, 0.5]),
            ..Default::default()
        }
    }

    fn renderer() -> Renderer {
        let mut r = Renderer::new(CpuDevice::default(), small_config());
        r.load_demo(&sphere_on_floor());
        r.on_init().unwrap();
        r
    }

    fn idle(r: &Renderer) -> FrameInput {
        FrameInput::idle(r.size().x as i32, r.size().y as i32)
    }

    #[test]
    fn test_not_initialized() {
        let mut r = Renderer::new(CpuDevice::default(), small_config());
        assert!(matches!(r.render_frame(), Err(Error::NotReady(_))));
    }

    #[test]
    fn test_frame_index_starts_at_one() {
        let mut r = renderer();
        let input = idle(&r);

        let stats = r.frame(&input).unwrap().clone();
        assert!(stats.dispatched);
        assert_eq!(stats.frame_index, 1);
        assert_eq!(stats.accumulated_frames, 1);
        assert!(stats.reset.contains(&ResetReason::Initial));

        for expected in 2..=4 {
            let stats = r.frame(&input).unwrap();
            assert!(!stats.was_reset(), "{:?}", stats.reset);
            assert_eq!(stats.frame_index, expected);
        }
        assert_eq!(r.accumulated_frames(), 4);
        assert_eq!(r.frame_index(), 5);
    }

    #[test]
    fn test_accumulate_off_resets_every_frame() {
        let mut r = renderer();
        r.set_accumulate(false);
        let input = idle(&r);
        for _ in 0..3 {
            let stats = r.frame(&input).unwrap();
            assert_eq!(stats.frame_index, 1);
            assert!(stats.reset.contains(&ResetReason::AccumulationOff));
        }
        assert_eq!(r.accumulated_frames(), 1);
    }

    #[test]
    fn test_material_edit_resets() {
        let mut r = renderer();
        let input = idle(&r);
        r.frame(&input).unwrap();
        r.frame(&input).unwrap();

        assert!(r.materials_mut().edit(0, |m| m.roughness = 0.2));
        let stats = r.frame(&input).unwrap();
        assert_eq!(stats.reset.as_slice(), &[ResetReason::Materials]);
        assert_eq!(stats.frame_index, 1);

        // Identical write is not an edit
        let same = *r.materials().get(0).unwrap();
        assert!(!r.materials_mut().set(0, same));
        assert!(!r.frame(&input).unwrap().was_reset());
    }

    #[test]
    fn test_camera_move_resets() {
        let mut r = renderer();
        let input = idle(&r);
        r.frame(&input).unwrap();

        let moving = FrameInput { movement: Vec3::Z, dt: 0.1, ..input };
        let stats = r.frame(&moving).unwrap();
        assert_eq!(stats.reset.as_slice(), &[ResetReason::CameraMoved]);

        // Looking without the button held is not movement
        let hover = FrameInput { mouse_delta: glam::Vec2::new(5.0, 0.0), ..input };
        assert!(!r.frame(&hover).unwrap().was_reset());
    }

    #[test]
    fn test_display_settings_do_not_reset() {
        let mut r = renderer();
        let input = idle(&r);
        r.frame(&input).unwrap();
        r.set_exposure(2.0);
        r.set_post_processing(false);
        assert!(!r.frame(&input).unwrap().was_reset());

        r.set_samples_per_pixel(2);
        assert_eq!(r.frame(&input).unwrap().reset.as_slice(), &[ResetReason::Sampling]);
    }

    #[test]
    fn test_resize_and_zero_size() {
        let mut r = renderer();
        r.frame(&idle(&r)).unwrap();

        let stats = r.frame(&FrameInput::idle(4, 3)).unwrap();
        assert!(stats.reset.contains(&ResetReason::Resized));
        assert_eq!(r.size(), UVec2::new(4, 3));
        assert_eq!(r.display_pixels().unwrap().len(), 12);

        // Minimized: keep the last size and keep accumulating
        let stats = r.frame(&FrameInput::idle(0, -5)).unwrap().clone();
        assert!(!stats.was_reset());
        assert_eq!(stats.frame_index, 2);
        assert_eq!(r.size(), UVec2::new(4, 3));
    }

    #[test]
    fn test_zero_initial_size() {
        let config = RendererConfig { width: 0, height: 0, ..small_config() };
        let mut r = Renderer::new(CpuDevice::default(), config);
        assert_eq!(r.size(), UVec2::ONE);
        r.on_init().unwrap();
        assert!(r.render_frame().unwrap().dispatched);
    }

    #[test]
    fn test_pipeline_reload_fallback() {
        let mut r = renderer();
        let input = idle(&r);
        r.frame(&input).unwrap();

        let bad = IntegratorSettings { max_depth: 0, ..Default::default() };
        assert!(matches!(r.reload_pipeline(bad), Err(Error::PipelineBuild(_))));
        assert!(r.last_error().is_some());
        assert_eq!(r.config().integrator.max_depth, IntegratorSettings::default().max_depth);

        // Old pipeline keeps rendering, accumulation continues
        let stats = r.frame(&input).unwrap();
        assert!(stats.dispatched);
        assert!(!stats.was_reset());

        let good = IntegratorSettings { max_depth: 2, ..Default::default() };
        r.reload_pipeline(good).unwrap();
        assert_eq!(r.frame(&input).unwrap().reset.as_slice(), &[ResetReason::Pipeline]);
    }

    #[test]
    fn test_invalid_initial_pipeline_falls_back() {
        let config = RendererConfig {
            integrator: IntegratorSettings { max_depth: 1000, ..Default::default() },
            ..small_config()
        };
        let mut r = Renderer::new(CpuDevice::default(), config);
        r.on_init().unwrap();
        assert!(r.last_error().is_some());
        assert_eq!(r.config().integrator, IntegratorSettings::default());
    }

    #[test]
    fn test_accel_failure_skips_dispatch() {
        let device = CpuDevice::new(DeviceLimits { max_triangles: 4, ..Default::default() });
        let mut r = Renderer::new(device, small_config());
        r.on_init().unwrap();

        // Empty scene fits the budget
        let input = idle(&r);
        assert!(r.frame(&input).unwrap().dispatched);
        let before = r.display_pixels().unwrap();

        let demo = demo_scene("sphere").unwrap();
        r.load_demo(&demo);
        let stats = r.frame(&input).unwrap().clone();
        assert!(!stats.dispatched);
        assert!(!r.has_accel());
        assert!(r.last_error().unwrap().contains("acceleration structure"));
        assert_eq!(r.display_pixels().unwrap(), before);

        // Stays skipped until the scene changes
        assert!(!r.frame(&input).unwrap().dispatched);
        r.set_scene(SceneDesc::new("empty"));
        assert!(r.frame(&input).unwrap().dispatched);
    }

    #[test]
    fn test_transform_edit_rebuilds() {
        let mut r = renderer();
        let input = idle(&r);
        r.frame(&input).unwrap();

        assert!(r.set_transform(99, Mat4::IDENTITY).is_err());
        let t = r.transforms()[0];
        r.set_transform(0, t).unwrap();
        assert!(!r.frame(&input).unwrap().was_reset());

        r.set_transform(0, Mat4::from_translation(Vec3::Y) * t).unwrap();
        let stats = r.frame(&input).unwrap();
        assert_eq!(stats.reset.as_slice(), &[ResetReason::Transforms]);
        assert!(stats.dispatched);
    }

    #[test]
    fn test_sky_change_resets() {
        let config = RendererConfig { environment: EnvironmentKind::Sky, sky_resolution: 32, ..small_config() };
        let mut r = Renderer::new(CpuDevice::default(), config);
        r.on_init().unwrap();
        let input = idle(&r);
        r.frame(&input).unwrap();

        let mut sky = *r.sky();
        sky.turbidity = 50.0;
        r.set_sky(sky);
        assert_eq!(r.sky().turbidity, 10.0);
        assert!(r.frame(&input).unwrap().reset.contains(&ResetReason::Environment));

        r.set_sky(*r.sky());
        assert!(!r.frame(&input).unwrap().was_reset());
    }

    #[test]
    fn test_save_png() {
        let mut r = renderer();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        assert!(matches!(r.save_png(&path), Err(Error::NotReady(_))));
        r.frame(&idle(&r)).unwrap();
        r.save_png(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_shutdown() {
        let mut r = renderer();
        r.frame(&idle(&r)).unwrap();
        r.on_shutdown();
        assert!(r.render_frame().is_err());
    }

    #[test]
    fn test_scene_bounds_follow_transforms() {
        let mut r = renderer();
        let demo = sphere_on_floor();
        let (outer, inner) = (r.scene_bounds(), demo.scene.bounds());
        assert!(outer.min.cmple(inner.min + 1e-4).all());
        assert!(outer.max.cmpge(inner.max - 1e-4).all());

        let empty = Renderer::new(CpuDevice::default(), small_config());
        assert!(empty.scene_bounds().is_empty());

        let before = r.scene_bounds();
        let moved = Mat4::from_translation(Vec3::new(0.0, 100.0, 0.0)) * r.transforms()[0];
        r.set_transform(0, moved).unwrap();
        assert!(r.scene_bounds().max.y > before.max.y + 50.0);
    }

    #[test]
    fn test_light_edit_resets() {
        let mut r = renderer();
        r.frame(&idle(&r)).unwrap();
        r.frame(&idle(&r)).unwrap();

        let lights = r.lights().to_vec();
        r.set_lights(lights.clone());
        assert!(!r.frame(&idle(&r)).unwrap().was_reset());

        let mut brighter = lights;
        brighter.push(Light::directional(Vec3::new(0.0, -1.0, 0.0), Vec3::splat(2.0)));
        r.set_lights(brighter);
        let stats = r.frame(&idle(&r)).unwrap();
        assert_eq!(stats.frame_index, 1);
        assert_eq!(stats.reset.as_slice(), &[ResetReason::Lights]);
    }

    /// Delegates to the CPU device, failing selected operations on request.
    #[derive(Default)]
    struct FlakyDevice {
        inner: CpuDevice,
        fail_materials: Cell<bool>,
        fail_tone_map: Cell<bool>,
    }

    impl GpuDevice for FlakyDevice {
        fn name(&self) -> &str {
            "flaky"
        }
        fn limits(&self) -> DeviceLimits {
            self.inner.limits()
        }
        fn create_image(&self, spec: ImageSpec) -> Result<ImageHandle> {
            self.inner.create_image(spec)
        }
        fn resize_image(&self, image: ImageHandle, width: u32, height: u32) -> Result<()> {
            self.inner.resize_image(image, width, height)
        }
        fn image_spec(&self, image: ImageHandle) -> Result<ImageSpec> {
            self.inner.image_spec(image)
        }
        fn read_image(&self, image: ImageHandle) -> Result<ImageData> {
            self.inner.read_image(image)
        }
        fn destroy_image(&self, image: ImageHandle) {
            self.inner.destroy_image(image)
        }
        fn write_materials(&self, materials: &[Material]) -> Result<()> {
            if self.fail_materials.get() {
                return Err(Error::Other("material buffer lost".into()));
            }
            self.inner.write_materials(materials)
        }
        fn write_lights(&self, lights: &[Light]) -> Result<()> {
            self.inner.write_lights(lights)
        }
        fn build_accel(&self, meshes: &[Mesh], transforms: &[Mat4]) -> Result<AccelHandle> {
            self.inner.build_accel(meshes, transforms)
        }
        fn rebuild_accel(&self, handle: AccelHandle, transforms: &[Mat4]) -> Result<AccelHandle> {
            self.inner.rebuild_accel(handle, transforms)
        }
        fn destroy_accel(&self, handle: AccelHandle) {
            self.inner.destroy_accel(handle)
        }
        fn create_pipeline(&self, desc: &PipelineDesc) -> Result<PipelineHandle> {
            self.inner.create_pipeline(desc)
        }
        fn destroy_pipeline(&self, pipeline: PipelineHandle) {
            self.inner.destroy_pipeline(pipeline)
        }
        fn submit(&self, commands: CommandList) -> Result<SubmissionIndex> {
            if !self.fail_tone_map.get() {
                return self.inner.submit(commands);
            }
            // Everything before the tone map still executes
            let mut head = CommandList::new();
            for command in commands.commands() {
                if matches!(command, Command::ToneMap { .. }) {
                    break;
                }
                head.push(command.clone());
            }
            let submission = self.inner.submit(head)?;
            self.inner.wait(submission)?;
            Err(Error::Other("tone map failed".into()))
        }
        fn wait(&self, submission: SubmissionIndex) -> Result<()> {
            self.inner.wait(submission)
        }
    }

    fn flaky_renderer() -> Renderer<FlakyDevice> {
        let mut r = Renderer::new(FlakyDevice::default(), small_config());
        r.load_demo(&sphere_on_floor());
        r.on_init().unwrap();
        r
    }

    #[test]
    fn test_failed_material_upload_is_retried() {
        let mut r = flaky_renderer();
        let input = FrameInput::idle(8, 6);
        r.frame(&input).unwrap();
        r.frame(&input).unwrap();

        r.device().fail_materials.set(true);
        assert!(r.materials_mut().edit(0, |m| m.base_color = [0.9, 0.1, 0.1]));
        let stats = r.frame(&input).unwrap().clone();
        assert!(!stats.dispatched);
        assert!(!stats.reset.contains(&ResetReason::Materials));
        assert!(r.last_error().unwrap().contains("material upload failed"));
        assert!(r.materials().is_dirty());

        // Still failing: still pending, still skipped
        assert!(!r.frame(&input).unwrap().dispatched);

        r.device().fail_materials.set(false);
        r.clear_error();
        let stats = r.frame(&input).unwrap();
        assert!(stats.dispatched);
        assert_eq!(stats.frame_index, 1);
        assert_eq!(stats.reset.as_slice(), &[ResetReason::Materials]);
        assert!(!r.materials().is_dirty());
        assert!(r.last_error().is_none());
    }

    #[test]
    fn test_failed_submission_restarts_accumulation() {
        let mut r = flaky_renderer();
        let input = FrameInput::idle(8, 6);
        r.frame(&input).unwrap();

        // Trace lands in the accumulation, tone map does not
        r.device().fail_tone_map.set(true);
        assert!(!r.frame(&input).unwrap().dispatched);
        assert!(r.last_error().unwrap().contains("frame dispatch failed"));
        assert_eq!(r.frame_index(), 1);
        assert_eq!(r.accumulated_frames(), 0);

        r.device().fail_tone_map.set(false);
        let stats = r.frame(&input).unwrap().clone();
        assert!(stats.dispatched);
        assert_eq!(stats.frame_index, 1);
        assert_eq!(stats.accumulated_frames, 1);

        let mut fresh = flaky_renderer();
        fresh.frame(&input).unwrap();
        assert_eq!(r.read_accumulation().unwrap(), fresh.read_accumulation().unwrap());
    }
}
