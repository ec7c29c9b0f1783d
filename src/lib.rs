//! # pathtracer
//!
//! Interactive progressive path tracer with a Disney-style principled BSDF.
//!
//! Frames are traced one sample per pixel (or a few) at a time and summed
//! into a persistent accumulation image; the average converges while nothing
//! changes and restarts as soon as the camera, a material, the geometry, the
//! sky or the viewport does.
//!
//! ## Modules
//!
//! - [`util`] - Errors, rays and small math helpers
//! - [`sampling`] - PCG random source and sampling distributions
//! - [`accel`] - BVH acceleration structure
//! - [`scene`] - Meshes, materials, camera and demo scenes
//! - [`light`] - Point, directional, emissive and sky lights
//! - [`integrator`] - Per-pixel path tracing state machine
//! - [`gpu`] - GPU resource service and its rayon-backed CPU device
//! - [`renderer`] - Frame orchestrator (reset / accumulate / tone map)
//!
//! ## Example
//!
//! ```ignore
//! use pathtracer::prelude::*;
//!
//! let mut renderer = Renderer::new(CpuDevice::default(), RendererConfig::default());
//! renderer.load_demo(&demo_scene("cornell").unwrap());
//! renderer.on_init()?;
//! for _ in 0..64 {
//!     renderer.render_frame()?;
//! }
//! renderer.save_png("cornell.png")?;
//! ```

pub mod util;
pub mod sampling;
pub mod accel;
pub mod scene;
pub mod light;
pub mod integrator;
pub mod gpu;
pub mod renderer;

// Interactive viewer (optional, enabled with "viewer" feature)
#[cfg(feature = "viewer")]
pub mod viewer;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::gpu::{CpuDevice, GpuDevice};
    pub use crate::integrator::{IntegratorSettings, Kernel};
    pub use crate::light::{Light, SkySettings};
    pub use crate::renderer::{EnvironmentKind, FrameInput, FrameStats, Layer, Renderer, RendererConfig};
    pub use crate::scene::{demo_scene, Camera, Material, Mesh, SceneDesc, DEMO_SCENES};
}
