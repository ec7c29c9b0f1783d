//! Main application state and UI

use std::f32::consts::TAU;

use egui::{CentralPanel, Color32, RichText, SidePanel, TopBottomPanel};

use super::settings::Settings;
use super::viewport::Viewport;
use crate::gpu::GpuDevice;
use crate::integrator::{IntegratorSettings, Kernel, MAX_BOUNCES};
use crate::light::TURBIDITY_RANGE;
use crate::renderer::{EnvironmentKind, Layer, Renderer};
use crate::scene::{demo_scene, Material, DEMO_SCENES};

/// Viewer application
pub struct ViewerApp {
    renderer: Renderer,
    viewport: Viewport,
    settings: Settings,
    status_message: String,
    /// Integrator settings being edited; applied by "Reload pipeline"
    pending_integrator: IntegratorSettings,
    selected_material: usize,
}

impl ViewerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: Settings, mut renderer: Renderer) -> Self {
        let status_message = match renderer.on_init() {
            Ok(()) => format!("{} ready", renderer.device().name()),
            Err(e) => {
                tracing::error!(error = %e, "renderer init failed");
                format!("Init failed: {e}")
            }
        };
        renderer.camera_mut().move_speed = settings.camera_speed;
        renderer.camera_mut().look_sensitivity = settings.look_sensitivity;

        Self {
            pending_integrator: renderer.config().integrator,
            renderer,
            viewport: Viewport::new(),
            settings,
            status_message,
            selected_material: 0,
        }
    }

    fn load_scene(&mut self, name: &str) {
        match demo_scene(name) {
            Some(demo) => {
                self.renderer.load_demo(&demo);
                self.selected_material = 0;
                self.settings.scene = name.to_string();
                self.settings.save();
                self.status_message = format!(
                    "Loaded '{name}' ({} triangles)",
                    demo.scene.triangle_count()
                );
            }
            None => self.status_message = format!("Unknown scene '{name}'"),
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Save PNG...").clicked() {
                    self.save_png_dialog();
                    ui.close();
                }
                ui.separator();
                if ui.button("Exit").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });

            ui.menu_button("Scene", |ui| {
                for name in DEMO_SCENES {
                    if ui.selectable_label(self.settings.scene == *name, *name).clicked() {
                        self.load_scene(name);
                        ui.close();
                    }
                }
            });

            ui.menu_button("Help", |ui| {
                if ui.button("About").clicked() {
                    self.status_message = format!(
                        "pathtracer v{} (built {} {})",
                        env!("CARGO_PKG_VERSION"),
                        env!("PATHTRACER_BUILD_DATE"),
                        env!("PATHTRACER_BUILD_TIME"),
                    );
                    ui.close();
                }
            });
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            self.render_section(ui);
            ui.separator();
            self.integrator_section(ui);
            ui.separator();
            self.camera_section(ui);
            ui.separator();
            self.sky_section(ui);
            ui.separator();
            self.material_section(ui);
            ui.separator();
            self.stats_section(ui);
        });
    }

    fn render_section(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Render").strong());
        let config = &mut self.settings.renderer;

        if ui.checkbox(&mut config.accumulate, "Accumulate").changed() {
            self.renderer.set_accumulate(config.accumulate);
        }
        ui.horizontal(|ui| {
            ui.label("Samples/px:");
            if ui.add(egui::Slider::new(&mut config.samples_per_pixel, 1..=64)).changed() {
                self.renderer.set_samples_per_pixel(config.samples_per_pixel);
            }
        });
        ui.horizontal(|ui| {
            ui.label("Exposure:");
            if ui.add(egui::Slider::new(&mut config.exposure, 0.0..=8.0).step_by(0.05)).changed() {
                self.renderer.set_exposure(config.exposure);
            }
        });
        if ui.checkbox(&mut config.post_processing, "ACES tone mapping").changed() {
            self.renderer.set_post_processing(config.post_processing);
        }
    }

    fn integrator_section(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Integrator").strong());
        let s = &mut self.pending_integrator;

        egui::ComboBox::from_label("Kernel")
            .selected_text(s.kernel.label())
            .show_ui(ui, |ui| {
                for kernel in Kernel::ALL {
                    ui.selectable_value(&mut s.kernel, kernel, kernel.label());
                }
            });
        ui.horizontal(|ui| {
            ui.label("Max bounces:");
            ui.add(egui::DragValue::new(&mut s.max_depth).range(1..=MAX_BOUNCES));
        });
        ui.horizontal(|ui| {
            ui.label("Roulette from:");
            ui.add(egui::DragValue::new(&mut s.rr_depth).range(0..=MAX_BOUNCES));
        });
        ui.horizontal(|ui| {
            ui.label("Firefly clamp:");
            ui.add(egui::DragValue::new(&mut s.firefly_clamp).range(0.0..=1000.0).speed(0.1));
        });
        ui.checkbox(&mut s.sky_visible, "Sky visible");
        ui.checkbox(&mut s.jitter, "Anti-aliasing jitter");

        let dirty = *s != self.renderer.config().integrator;
        if ui.add_enabled(dirty, egui::Button::new("Reload pipeline")).clicked() {
            match self.renderer.reload_pipeline(self.pending_integrator) {
                Ok(()) => {
                    self.settings.renderer.integrator = self.pending_integrator;
                    self.status_message = "Pipeline reloaded".into();
                }
                Err(e) => self.status_message = format!("Pipeline reload failed: {e}"),
            }
        }
    }

    fn camera_section(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Camera").strong());
        let bounds = self.renderer.scene_bounds();
        let camera = self.renderer.camera_mut();
        let pos = camera.position();
        ui.horizontal(|ui| {
            ui.label(format!("Position: ({:.2}, {:.2}, {:.2})", pos.x, pos.y, pos.z));
            let (yaw, pitch) = camera.angles();
            ui.label(format!("Yaw {yaw:.0}\u{00b0} Pitch {pitch:.0}\u{00b0}"));
            if ui.add_enabled(!bounds.is_empty(), egui::Button::new("Frame scene")).clicked() {
                camera.focus(bounds.center(), bounds.radius());
            }
        });
        ui.horizontal(|ui| {
            ui.label("FOV:");
            ui.add(egui::Slider::new(&mut camera.fov, 10.0..=120.0).suffix("\u{00b0}"));
        });
        ui.horizontal(|ui| {
            ui.label("Aperture:");
            ui.add(egui::Slider::new(&mut camera.aperture, 0.0..=0.5).step_by(0.005));
        });
        ui.horizontal(|ui| {
            ui.label("Focus:");
            ui.add(egui::Slider::new(&mut camera.focus_distance, 0.1..=50.0).logarithmic(true));
        });
        ui.horizontal(|ui| {
            ui.label("Speed:");
            if ui.add(egui::Slider::new(&mut camera.move_speed, 0.1..=20.0).logarithmic(true)).changed() {
                self.settings.camera_speed = camera.move_speed;
            }
        });
    }

    fn sky_section(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Environment").strong());
        let config = &mut self.settings.renderer;

        let mut is_sky = matches!(config.environment, EnvironmentKind::Sky);
        ui.horizontal(|ui| {
            ui.radio_value(&mut is_sky, true, "Sky");
            ui.radio_value(&mut is_sky, false, "Uniform");
        });
        let mut color = match config.environment {
            EnvironmentKind::Uniform(c) => c,
            EnvironmentKind::Sky => [0.5, 0.5, 0.5],
        };
        if !is_sky {
            ui.horizontal(|ui| {
                ui.label("Color:");
                ui.color_edit_button_rgb(&mut color);
            });
        }
        let environment = if is_sky { EnvironmentKind::Sky } else { EnvironmentKind::Uniform(color) };
        if environment != config.environment {
            config.environment = environment;
            self.renderer.set_environment(environment);
        }

        if is_sky {
            let sky = &mut config.sky;
            let mut changed = false;
            ui.horizontal(|ui| {
                ui.label("Turbidity:");
                changed |= ui
                    .add(egui::DragValue::new(&mut sky.turbidity).range(TURBIDITY_RANGE.0..=TURBIDITY_RANGE.1).speed(0.05))
                    .changed();
            });
            ui.horizontal(|ui| {
                ui.label("Azimuth:");
                changed |= ui.add(egui::Slider::new(&mut sky.azimuth, 0.0..=TAU)).changed();
            });
            ui.horizontal(|ui| {
                ui.label("Inclination:");
                changed |= ui.add(egui::Slider::new(&mut sky.inclination, 0.0..=TAU)).changed();
            });
            ui.horizontal(|ui| {
                ui.label("Intensity:");
                changed |= ui.add(egui::Slider::new(&mut sky.intensity, 0.0..=10.0)).changed();
            });
            if changed {
                self.renderer.set_sky(*sky);
            }
        }
    }

    fn material_section(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Material").strong());
        let count = self.renderer.materials().len();
        if count == 0 {
            ui.label("No materials");
            return;
        }
        self.selected_material = self.selected_material.min(count - 1);
        ui.horizontal(|ui| {
            ui.label("Index:");
            ui.add(egui::DragValue::new(&mut self.selected_material).range(0..=count - 1));
        });

        let Some(mut m) = self.renderer.materials().get(self.selected_material).copied() else {
            return;
        };
        let before = m;
        material_editor(ui, &mut m);
        if m != before {
            self.renderer.materials_mut().set(self.selected_material, m);
        }
    }

    fn stats_section(&self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Statistics").strong());
        let stats = self.renderer.stats();
        ui.label(format!("Frames: {}", self.renderer.accumulated_frames()));
        ui.label(format!("Size: {}x{}", stats.size.x, stats.size.y));
        ui.label(format!("Samples: {}", stats.samples));
        ui.label(format!("Dispatch: {:.1} ms", stats.dispatch_time.as_secs_f32() * 1000.0));
        if stats.was_reset() {
            let reasons: Vec<&str> = stats.reset.iter().map(|r| r.label()).collect();
            ui.label(format!("Reset: {}", reasons.join(", ")));
        }
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if let Some(error) = self.renderer.last_error() {
                ui.label(RichText::new(error).color(Color32::LIGHT_RED));
                if ui.small_button("\u{2715}").clicked() {
                    self.renderer.clear_error();
                }
            } else {
                ui.label(&self.status_message);
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("FPS: {:.0}", ui.ctx().input(|i| 1.0 / i.stable_dt.max(1e-3))));
            });
        });
    }

    fn save_png_dialog(&mut self) {
        let default_name = format!("{}_{}spp.png", self.settings.scene, self.renderer.accumulated_frames());
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(&default_name)
            .save_file()
        {
            self.status_message = match self.renderer.save_png(&path) {
                Ok(()) => format!(
                    "Saved {}",
                    path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
                ),
                Err(e) => format!("Save failed: {e}"),
            };
        }
    }
}

/// Sliders for every principled parameter
fn material_editor(ui: &mut egui::Ui, m: &mut Material) {
    ui.horizontal(|ui| {
        ui.label("Base color:");
        ui.color_edit_button_rgb(&mut m.base_color);
    });
    let unit = |ui: &mut egui::Ui, label: &str, v: &mut f32| {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::Slider::new(v, 0.0..=1.0).step_by(0.01));
        });
    };
    unit(ui, "Metallic:", &mut m.metallic);
    unit(ui, "Roughness:", &mut m.roughness);
    unit(ui, "Anisotropic:", &mut m.anisotropic);
    unit(ui, "Subsurface:", &mut m.subsurface);
    unit(ui, "Spec. tint:", &mut m.specular_tint);
    unit(ui, "Sheen:", &mut m.sheen);
    unit(ui, "Sheen tint:", &mut m.sheen_tint);
    unit(ui, "Clearcoat:", &mut m.clearcoat);
    unit(ui, "Coat rough.:", &mut m.clearcoat_roughness);
    unit(ui, "Transmission:", &mut m.spec_trans);
    ui.horizontal(|ui| {
        ui.label("IOR:");
        ui.add(egui::Slider::new(&mut m.ior, 1.0..=3.0).step_by(0.01));
    });
    ui.horizontal(|ui| {
        ui.label("Emission:");
        ui.color_edit_button_rgb(&mut m.emission);
        ui.add(egui::DragValue::new(&mut m.emission_strength).range(0.0..=100.0).speed(0.1));
    });
}

impl eframe::App for ViewerApp {
    fn on_exit(&mut self) {
        self.renderer.on_shutdown();
        self.settings.save();
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let _span = tracing::info_span!("viewer_update").entered();

        // Escape - close app
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ctx, ui);
        });

        TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status_bar(ui);
        });

        let response = SidePanel::right("side_panel")
            .default_width(self.settings.side_panel_width)
            .min_width(200.0)
            .max_width(480.0)
            .resizable(true)
            .show(ctx, |ui| {
                self.side_panel(ui);
            });
        self.settings.side_panel_width = response.response.rect.width();

        CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.viewport.show(ui, &mut self.renderer);
            });

        // Track window size and position for saving on exit
        ctx.input(|i| {
            if let Some(rect) = i.viewport().inner_rect {
                self.settings.window_width = rect.width();
                self.settings.window_height = rect.height();
            }
            if let Some(pos) = i.viewport().outer_rect {
                self.settings.window_x = Some(pos.min.x);
                self.settings.window_y = Some(pos.min.y);
            }
        });

        // Progressive rendering: keep the frames coming
        ctx.request_repaint();
    }
}
