//! Interactive viewer: egui shell around the progressive renderer

mod app;
mod settings;
mod viewport;

pub use settings::Settings;

use anyhow::Result;

use crate::gpu::CpuDevice;
use crate::renderer::{Renderer, RendererConfig};
use crate::scene::demo_scene;

/// Run the viewer.
///
/// `scene` overrides the last scene from the saved settings, `config` the
/// saved renderer configuration.
pub fn run(scene: Option<String>, config: Option<RendererConfig>) -> Result<()> {
    let mut settings = Settings::load();
    if let Some(scene) = scene {
        settings.scene = scene;
    }
    if let Some(config) = config {
        settings.renderer = config;
    }

    let demo = demo_scene(&settings.scene)
        .or_else(|| {
            tracing::warn!(scene = %settings.scene, "unknown scene, falling back to cornell");
            demo_scene("cornell")
        })
        .ok_or_else(|| anyhow::anyhow!("no demo scenes available"))?;

    let device = CpuDevice::new(settings.renderer.limits);
    let mut renderer = Renderer::new(device, settings.renderer.clone());
    renderer.load_demo(&demo);

    let options = eframe::NativeOptions {
        viewport: {
            let mut vp = egui::ViewportBuilder::default()
                .with_inner_size([settings.window_width, settings.window_height])
                .with_title("Path Tracer");
            if let (Some(x), Some(y)) = (settings.window_x, settings.window_y) {
                vp = vp.with_position([x, y]);
            }
            vp
        },
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    eframe::run_native(
        "Path Tracer",
        options,
        Box::new(move |cc| Ok(Box::new(app::ViewerApp::new(cc, settings, renderer)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run: {}", e))
}
