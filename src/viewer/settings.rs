//! Persistent application settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::renderer::RendererConfig;

/// Application settings that persist between sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Window
    pub window_width: f32,
    pub window_height: f32,
    pub window_x: Option<f32>,
    pub window_y: Option<f32>,

    // UI layout
    pub side_panel_width: f32,

    // Last demo scene
    pub scene: String,

    // Camera
    pub camera_speed: f32,
    pub look_sensitivity: f32,

    // Renderer (accumulation, exposure, integrator, sky)
    pub renderer: RendererConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_width: 1280.0,
            window_height: 720.0,
            window_x: None,
            window_y: None,
            side_panel_width: 280.0,
            scene: "cornell".into(),
            camera_speed: 3.0,
            look_sensitivity: 0.3,
            renderer: RendererConfig::default(),
        }
    }
}

impl Settings {
    /// Get settings file path
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("pathtracer");
            std::fs::create_dir_all(&p).ok();
            p.push("settings.json");
            p
        })
    }

    /// Load settings from file. Missing or corrupt files give defaults.
    pub fn load() -> Self {
        let mut settings: Self = Self::path()
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        if !settings.camera_speed.is_finite() || settings.camera_speed <= 0.0 {
            settings.camera_speed = Self::default().camera_speed;
        }
        settings.renderer.samples_per_pixel = settings.renderer.samples_per_pixel.clamp(1, 64);

        settings
    }

    /// Save settings to file
    pub fn save(&self) {
        if let Some(path) = Self::path() {
            match serde_json::to_string_pretty(self) {
                Ok(json) => {
                    if let Err(e) = std::fs::write(&path, json) {
                        tracing::warn!(path = %path.display(), error = %e, "failed to save settings");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize settings"),
            }
        }
    }
}
