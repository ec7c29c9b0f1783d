//! Math type re-exports and rendering math utilities.
//!
//! This module re-exports the `glam` types used throughout the renderer and
//! adds the small set of types glam does not have (rays, bounds).

pub use glam::{Mat3, Mat4, Quat, UVec2, Vec2, Vec3, Vec3A, Vec4};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Rec. 709 luminance weights.
pub const LUMINANCE: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// Relative offset applied to secondary ray origins to escape the surface.
pub const RAY_EPSILON: f32 = 1.0e-4;

/// Half-open ray segment `origin + t * dir, t in [t_min, t_max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    pub t_min: f32,
    pub t_max: f32,
}

impl Ray {
    /// Unbounded ray.
    #[inline]
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir, t_min: 0.0, t_max: f32::INFINITY }
    }

    /// Ray limited to `t < t_max` (shadow rays).
    #[inline]
    pub fn segment(origin: Vec3, dir: Vec3, t_max: f32) -> Self {
        Self { origin, dir, t_min: 0.0, t_max }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Luminance of a linear RGB color.
#[inline]
pub fn luminance(c: Vec3) -> f32 {
    c.dot(LUMINANCE)
}

/// True if every component is finite and non-negative.
#[inline]
pub fn is_valid_radiance(c: Vec3) -> bool {
    c.is_finite() && c.min_element() >= 0.0
}

/// Move `p` off the surface with geometric normal `ng`, to the side `dir` leaves on.
#[inline]
pub fn offset_origin(p: Vec3, ng: Vec3, dir: Vec3) -> Vec3 {
    let scale = RAY_EPSILON * (1.0 + p.abs().max_element());
    if ng.dot(dir) >= 0.0 {
        p + ng * scale
    } else {
        p - ng * scale
    }
}

/// 3D bounding box with single precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Radius of the bounding sphere (0 for an empty box).
    #[inline]
    pub fn radius(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            self.size().length() * 0.5
        }
    }
}

impl Default for BBox3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3f({:?} - {:?})", self.min, self.max)
    }
}
