//! Viewport widget: feeds input to the renderer and shows its display image

use egui::{Color32, Key, PointerButton, Rect, Response, Sense, TextureOptions, Ui};
use glam::{IVec2, Vec3};

use crate::renderer::{FrameInput, Renderer};

/// Viewport state
pub struct Viewport {
    texture: Option<egui::TextureHandle>,
}

impl Viewport {
    pub fn new() -> Self {
        Self { texture: None }
    }

    /// Collect input over the viewport area
    fn collect_input(ui: &Ui, rect: Rect, response: &Response) -> FrameInput {
        let ppp = ui.ctx().pixels_per_point();
        let size = rect.size() * ppp;

        let looking = response.dragged_by(PointerButton::Secondary);
        let drag = if looking { response.drag_delta() } else { egui::Vec2::ZERO };

        // WASD + QE, only while the pointer is over the viewport
        let keys_active = (response.hovered() || looking) && !ui.ctx().wants_keyboard_input();
        let (movement, dt) = ui.input(|i| {
            let mut m = Vec3::ZERO;
            if keys_active {
                let axis = |pos: Key, neg: Key| i.key_down(pos) as i32 as f32 - i.key_down(neg) as i32 as f32;
                m.x = axis(Key::D, Key::A);
                m.y = axis(Key::E, Key::Q);
                m.z = axis(Key::W, Key::S);
            }
            (m, i.stable_dt)
        });

        FrameInput {
            viewport: IVec2::new(size.x.round() as i32, size.y.round() as i32),
            mouse_delta: glam::Vec2::new(drag.x, drag.y),
            looking,
            movement,
            dt,
        }
    }

    /// Render one frame and paint it
    pub fn show(&mut self, ui: &mut Ui, renderer: &mut Renderer) -> Response {
        let _span = tracing::info_span!("viewport_show").entered();
        let available = ui.available_size();
        let (rect, response) = ui.allocate_exact_size(available.max(egui::Vec2::splat(1.0)), Sense::click_and_drag());

        let input = Self::collect_input(ui, rect, &response);
        let dispatched = match renderer.frame(&input) {
            Ok(stats) => stats.dispatched,
            Err(e) => {
                tracing::warn!(error = %e, "frame failed");
                false
            }
        };

        if dispatched || self.texture.is_none() {
            self.upload(ui, renderer);
        }

        if let Some(texture) = &self.texture {
            let uv = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            ui.painter().image(texture.id(), rect, uv, Color32::WHITE);
        } else {
            ui.painter().rect_filled(rect, 0.0, Color32::BLACK);
        }

        response
    }

    fn upload(&mut self, ui: &Ui, renderer: &Renderer) {
        let pixels = match renderer.display_pixels() {
            Ok(pixels) => pixels,
            Err(e) => {
                tracing::debug!(error = %e, "no display image yet");
                return;
            }
        };
        let size = renderer.size();
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [size.x as usize, size.y as usize],
            bytemuck::cast_slice(&pixels),
        );
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => self.texture = Some(ui.ctx().load_texture("render", image, TextureOptions::LINEAR)),
        }
    }
}
