//! GPU resource service.
//!
//! The renderer never touches pixels directly. It creates images, uploads
//! scene data, builds acceleration structures and submits command lists
//! through [`GpuDevice`]; each command describes a whole-image data-parallel
//! operation. [`CpuDevice`] executes them with rayon.

mod cpu;
pub mod tonemap;

pub use cpu::CpuDevice;

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::integrator::IntegratorSettings;
use crate::light::{Light, SkySettings};
use crate::scene::{CameraUniform, Material, Mesh};
use crate::util::Result;

/// Image handle (index into the device's image table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub(crate) u32);

/// Integrator pipeline handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub(crate) u32);

/// Acceleration structure handle. Only the newest generation is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccelHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl AccelHandle {
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Monotonic id returned by [`GpuDevice::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionIndex(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Linear radiance (accumulation).
    Rgba32Float,
    /// Display-ready sRGB bytes.
    Rgba8Unorm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub debug_name: String,
}

impl ImageSpec {
    pub fn new(width: u32, height: u32, format: ImageFormat, debug_name: impl Into<String>) -> Self {
        Self { width, height, format, debug_name: debug_name.into() }
    }

    #[inline]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Host copy of an image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    Rgba32Float(Vec<Vec4>),
    Rgba8Unorm(Vec<[u8; 4]>),
}

/// Integrator pipeline description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineDesc {
    pub debug_name: String,
    pub settings: IntegratorSettings,
}

/// Device capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLimits {
    /// Largest image side.
    pub max_image_dimension: u32,
    /// Triangle budget of one acceleration structure.
    pub max_triangles: usize,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_image_dimension: 16384,
            max_triangles: 1 << 24,
        }
    }
}

/// One logical GPU operation.
#[derive(Debug, Clone)]
pub enum Command {
    /// Fill every texel with `value`.
    ClearImage { image: ImageHandle, value: [f32; 4] },
    /// Run the integrator once per pixel and add the result to `accumulation`.
    TraceRays {
        pipeline: PipelineHandle,
        accel: AccelHandle,
        accumulation: ImageHandle,
        camera: CameraUniform,
        /// 1-based index of the frame since the last reset.
        frame_index: u32,
        samples_per_pixel: u32,
        width: u32,
        height: u32,
    },
    /// Resolve `source` (running sum over `frame_count` frames) into the display image `target`.
    ToneMap {
        source: ImageHandle,
        target: ImageHandle,
        exposure: f32,
        frame_count: u32,
        post_processing: bool,
    },
    /// Bake the Preetham sky into the device's environment.
    BakeSky { settings: SkySettings, width: u32, height: u32 },
    /// Replace the environment with a constant color.
    UniformEnvironment(Vec3),
}

/// Ordered commands executed as one submission.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl IntoIterator for CommandList {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// Services the frame orchestrator needs from a GPU.
///
/// Commands of one submission run in order, and each completes before the
/// next starts. Resources referenced by a submission must not be modified
/// until it has been waited on.
pub trait GpuDevice {
    fn name(&self) -> &str;
    fn limits(&self) -> DeviceLimits;

    fn create_image(&self, spec: ImageSpec) -> Result<ImageHandle>;
    /// Reallocate at a new size. Contents are discarded (zeroed).
    fn resize_image(&self, image: ImageHandle, width: u32, height: u32) -> Result<()>;
    fn image_spec(&self, image: ImageHandle) -> Result<ImageSpec>;
    fn read_image(&self, image: ImageHandle) -> Result<ImageData>;
    fn destroy_image(&self, image: ImageHandle);

    /// Replace the material buffer.
    fn write_materials(&self, materials: &[Material]) -> Result<()>;
    /// Replace the analytic light list.
    fn write_lights(&self, lights: &[Light]) -> Result<()>;

    fn build_accel(&self, meshes: &[Mesh], transforms: &[Mat4]) -> Result<AccelHandle>;
    /// Rebuild with new transforms. The returned handle supersedes `handle`.
    fn rebuild_accel(&self, handle: AccelHandle, transforms: &[Mat4]) -> Result<AccelHandle>;
    fn destroy_accel(&self, handle: AccelHandle);

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<PipelineHandle>;
    fn destroy_pipeline(&self, pipeline: PipelineHandle);

    fn submit(&self, commands: CommandList) -> Result<SubmissionIndex>;
    /// Block until `submission` and everything before it completed.
    fn wait(&self, submission: SubmissionIndex) -> Result<()>;
}
