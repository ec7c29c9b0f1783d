//! Piecewise-constant 2D distribution for equirectangular importance sampling.
//!
//! Rows are weighted by `sin(theta)` so that sampling is proportional to the
//! radiance an equirect texel contributes on the sphere. Marginal CDF over
//! rows, one conditional CDF per row.

use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Importance-sampling tables for a `width x height` equirect image.
#[derive(Debug, Clone)]
pub struct Distribution2D {
    width: usize,
    height: usize,
    /// Conditional CDFs (width x height), normalized per row.
    conditional_cdf: Vec<f32>,
    /// Marginal CDF (height entries), normalized.
    marginal_cdf: Vec<f32>,
    /// Unnormalized texel weights (luminance * sin theta).
    weights: Vec<f32>,
    /// Sum of all weights.
    total: f32,
}

impl Distribution2D {
    /// Build from per-texel luminance (row-major, `width * height` entries).
    pub fn from_equirect_luminance(width: u32, height: u32, luminance: &[f32]) -> Self {
        let w = width.max(1) as usize;
        let h = height.max(1) as usize;

        let mut weights = vec![0.0f32; w * h];
        let mut conditional_cdf = vec![0.0f32; w * h];
        let mut row_integrals = vec![0.0f32; h];

        for y in 0..h {
            let theta = PI * (y as f32 + 0.5) / h as f32;
            let sin_theta = theta.sin();

            let row_start = y * w;
            let mut row_sum = 0.0f32;
            for x in 0..w {
                let lum = luminance.get(row_start + x).copied().unwrap_or(0.0);
                let weight = if lum.is_finite() { lum.max(0.0) * sin_theta } else { 0.0 };
                weights[row_start + x] = weight;
                row_sum += weight;
                conditional_cdf[row_start + x] = row_sum;
            }

            if row_sum > 0.0 {
                for c in &mut conditional_cdf[row_start..row_start + w] {
                    *c /= row_sum;
                }
            }
            row_integrals[y] = row_sum;
        }

        let mut marginal_cdf = vec![0.0f32; h];
        let mut total = 0.0f32;
        for y in 0..h {
            total += row_integrals[y];
            marginal_cdf[y] = total;
        }
        if total > 0.0 {
            for c in &mut marginal_cdf {
                *c /= total;
            }
        }

        Self { width: w, height: h, conditional_cdf, marginal_cdf, weights, total }
    }

    /// True if every weight is zero (callers fall back to uniform sampling).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.total > 0.0)
    }

    /// Sample continuous image coordinates `uv in [0,1)^2`.
    /// Returns `(uv, pdf)` with the pdf measured in uv space.
    pub fn sample(&self, u: Vec2) -> (Vec2, f32) {
        if self.is_degenerate() {
            return (u, 1.0);
        }

        let y = find_interval(&self.marginal_cdf, u.y);
        let y_lo = if y == 0 { 0.0 } else { self.marginal_cdf[y - 1] };
        let y_span = (self.marginal_cdf[y] - y_lo).max(f32::MIN_POSITIVE);
        let dy = ((u.y - y_lo) / y_span).clamp(0.0, 1.0);

        let row = &self.conditional_cdf[y * self.width..(y + 1) * self.width];
        let x = find_interval(row, u.x);
        let x_lo = if x == 0 { 0.0 } else { row[x - 1] };
        let x_span = (row[x] - x_lo).max(f32::MIN_POSITIVE);
        let dx = ((u.x - x_lo) / x_span).clamp(0.0, 1.0);

        let uv = Vec2::new(
            ((x as f32 + dx) / self.width as f32).min(1.0 - f32::EPSILON),
            ((y as f32 + dy) / self.height as f32).min(1.0 - f32::EPSILON),
        );
        // Look the texel up again from uv so sample() and pdf() always agree
        (uv, self.pdf(uv))
    }

    /// Density in uv space at `uv`.
    pub fn pdf(&self, uv: Vec2) -> f32 {
        if self.is_degenerate() {
            return 1.0;
        }
        let x = ((uv.x * self.width as f32) as usize).min(self.width - 1);
        let y = ((uv.y * self.height as f32) as usize).min(self.height - 1);
        self.texel_pdf(x, y)
    }

    #[inline]
    fn texel_pdf(&self, x: usize, y: usize) -> f32 {
        self.weights[y * self.width + x] * (self.width * self.height) as f32 / self.total
    }
}

/// Index of the first CDF entry strictly greater than `u`.
fn find_interval(cdf: &[f32], u: f32) -> usize {
    cdf.partition_point(|&c| c <= u).min(cdf.len() - 1)
}

/// Direction for equirect coordinates (`v = 0` is +Y, `u` wraps around Y).
#[inline]
pub fn equirect_to_dir(uv: Vec2) -> Vec3 {
    let phi = uv.x * TAU - PI;
    let theta = uv.y * PI;
    let (sin_t, cos_t) = theta.sin_cos();
    Vec3::new(sin_t * phi.cos(), cos_t, sin_t * phi.sin())
}

/// Equirect coordinates for a unit direction.
#[inline]
pub fn dir_to_equirect(dir: Vec3) -> Vec2 {
    let u = (dir.z.atan2(dir.x) + PI) / TAU;
    let v = dir.y.clamp(-1.0, 1.0).acos() / PI;
    Vec2::new(u.rem_euclid(1.0), v)
}

/// Convert a uv-space pdf to solid angle for the direction at `uv`.
#[inline]
pub fn uv_pdf_to_solid_angle(pdf_uv: f32, uv: Vec2) -> f32 {
    let sin_theta = (uv.y * PI).sin();
    if sin_theta <= 0.0 {
        return 0.0;
    }
    pdf_uv / (2.0 * PI * PI * sin_theta)
}
