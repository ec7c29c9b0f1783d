//! Renderer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gpu::DeviceLimits;
use crate::integrator::IntegratorSettings;
use crate::light::SkySettings;
use crate::util::{Error, Result};

/// Background light source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentKind {
    /// Baked Preetham sky driven by [`RendererConfig::sky`].
    #[default]
    Sky,
    /// Constant linear color.
    Uniform([f32; 3]),
}

/// Everything the frame orchestrator needs besides the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Initial render target size.
    pub width: u32,
    pub height: u32,
    /// Keep summing frames while nothing changes.
    pub accumulate: bool,
    pub exposure: f32,
    /// ACES filmic curve; off = plain clamp.
    pub post_processing: bool,
    pub samples_per_pixel: u32,
    pub integrator: IntegratorSettings,
    pub environment: EnvironmentKind,
    pub sky: SkySettings,
    /// Baked sky table width; height is half of it.
    pub sky_resolution: u32,
    pub limits: DeviceLimits,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            accumulate: true,
            exposure: 0.8,
            post_processing: true,
            samples_per_pixel: 1,
            integrator: IntegratorSettings::default(),
            environment: EnvironmentKind::Sky,
            sky: SkySettings::default(),
            sky_resolution: 512,
            limits: DeviceLimits::default(),
        }
    }
}

impl RendererConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Sky table size `(width, height)`.
    pub fn sky_table_size(&self) -> (u32, u32) {
        let w = self.sky_resolution.clamp(16, self.limits.max_image_dimension.max(16));
        (w, (w / 2).max(1))
    }
}
