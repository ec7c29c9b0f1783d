//! Display transform: average, expose, tone map, encode sRGB.

use glam::{Vec3, Vec4};

/// Narkowicz fit of the ACES filmic curve. Output in `[0, 1]`.
#[inline]
pub fn aces_film(x: Vec3) -> Vec3 {
    const A: f32 = 2.51;
    const B: f32 = 0.03;
    const C: f32 = 2.43;
    const D: f32 = 0.59;
    const E: f32 = 0.14;
    ((x * (A * x + B)) / (x * (C * x + D) + E)).clamp(Vec3::ZERO, Vec3::ONE)
}

/// sRGB opto-electronic transfer function for one channel in `[0, 1]`.
#[inline]
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Display color for one accumulation texel.
///
/// `sum` is the running radiance sum, `frame_count` the number of frames in
/// it (at least 1).
#[inline]
pub fn resolve_pixel(sum: Vec4, frame_count: u32, exposure: f32, post_processing: bool) -> [u8; 4] {
    let mean = sum.truncate() / frame_count.max(1) as f32;
    let exposed = mean * exposure;
    let mapped = if post_processing {
        aces_film(exposed)
    } else {
        exposed.clamp(Vec3::ZERO, Vec3::ONE)
    };
    // NaN survives clamp; map it to black
    let mapped = if mapped.is_finite() { mapped } else { Vec3::ZERO };
    let rgb = mapped.to_array().map(|c| (linear_to_srgb(c) * 255.0 + 0.5) as u8);
    [rgb[0], rgb[1], rgb[2], 255]
}
