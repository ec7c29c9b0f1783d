//! Frame orchestration.
//!
//! - [`Layer`] - init / update / render / shutdown lifecycle
//! - [`FrameInput`] - what the UI reports once per frame
//! - [`Renderer`] - decides reset vs. continue and submits the frame's work
//! - [`RendererConfig`] - serde configuration

mod config;
mod export;
mod frame;

pub use config::{EnvironmentKind, RendererConfig};
pub use export::write_png;
pub use frame::{FrameStats, ResetReason, Renderer};

use glam::{IVec2, Vec2, Vec3};

use crate::util::Result;

/// Lifecycle of something driven by the application shell.
pub trait Layer {
    /// Allocate resources. Called once before the first update.
    fn on_init(&mut self) -> Result<()>;
    /// Consume this frame's input.
    fn on_update(&mut self, input: &FrameInput);
    /// Submit the frame's work and wait for it.
    fn on_render(&mut self) -> Result<()>;
    /// Release resources. In-flight work has completed when this returns.
    fn on_shutdown(&mut self);
}

/// Per-frame input from the UI service.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Viewport size as reported by the window; may be zero or negative
    /// while minimized.
    pub viewport: IVec2,
    /// Pointer travel in pixels since the last frame.
    pub mouse_delta: Vec2,
    /// Right button held (look mode).
    pub looking: bool,
    /// Camera-space movement request, each axis in `[-1, 1]`.
    pub movement: Vec3,
    /// Seconds since the last frame.
    pub dt: f32,
}

impl FrameInput {
    /// No interaction at the given viewport size.
    pub fn idle(width: i32, height: i32) -> Self {
        Self {
            viewport: IVec2::new(width, height),
            ..Default::default()
        }
    }
}
