//! BVH node and primitive types.
//!
//! Flat array layout shared by the builder and the traversal kernel:
//! - 32-byte nodes (cache-line friendly)
//! - Triangles stored in leaf order so a leaf is one contiguous range

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow to include another AABB.
    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Surface area (for SAH cost). Zero for an empty box.
    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Flat BVH node (32 bytes).
///
/// Internal node: `left_or_first` = left child index (right = left + 1), `count` = 0.
/// Leaf node: `left_or_first` = first triangle index, `count` > 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left_or_first: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    /// Leaf covering `count` triangles starting at `first`.
    #[inline]
    pub fn leaf(bounds: &Aabb, first: u32, count: u32) -> Self {
        Self {
            aabb_min: bounds.min.to_array(),
            left_or_first: first,
            aabb_max: bounds.max.to_array(),
            count,
        }
    }

    /// Internal node whose children live at `left` and `left + 1`.
    #[inline]
    pub fn internal(bounds: &Aabb, left: u32) -> Self {
        Self {
            aabb_min: bounds.min.to_array(),
            left_or_first: left,
            aabb_max: bounds.max.to_array(),
            count: 0,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb {
            min: Vec3::from_array(self.aabb_min),
            max: Vec3::from_array(self.aabb_max),
        }
    }
}

/// World-space triangle with per-vertex shading normals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub n0: Vec3,
    pub n1: Vec3,
    pub n2: Vec3,
    pub material_id: u32,
    /// Index of the source mesh.
    pub mesh_id: u32,
}

impl Triangle {
    pub fn aabb(&self) -> Aabb {
        let mut b = Aabb::EMPTY;
        b.grow_point(self.v0);
        b.grow_point(self.v1);
        b.grow_point(self.v2);
        b
    }

    #[inline]
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Unnormalized geometric normal (length = 2 * area), counter-clockwise winding.
    #[inline]
    pub fn cross(&self) -> Vec3 {
        (self.v1 - self.v0).cross(self.v2 - self.v0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        0.5 * self.cross().length()
    }

    /// Point at barycentrics `(u, v)` (weights of `v1` and `v2`).
    #[inline]
    pub fn point(&self, u: f32, v: f32) -> Vec3 {
        self.v0 * (1.0 - u - v) + self.v1 * u + self.v2 * v
    }

    /// Interpolated shading normal at barycentrics `(u, v)`.
    #[inline]
    pub fn shading_normal(&self, u: f32, v: f32) -> Vec3 {
        (self.n0 * (1.0 - u - v) + self.n1 * u + self.n2 * v).normalize_or_zero()
    }

    /// Edge direction used as the anisotropy tangent.
    #[inline]
    pub fn tangent(&self) -> Vec3 {
        (self.v1 - self.v0).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_size() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 32);
    }

    #[test]
    fn test_aabb_area() {
        assert_eq!(Aabb::EMPTY.area(), 0.0);
        let mut b = Aabb::EMPTY;
        b.grow_point(Vec3::ZERO);
        b.grow_point(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.area(), 2.0 * (2.0 + 6.0 + 3.0));
    }

    #[test]
    fn test_triangle_geometry() {
        let t = Triangle {
            v0: Vec3::ZERO,
            v1: Vec3::X,
            v2: Vec3::Y,
            n0: Vec3::Z,
            n1: Vec3::Z,
            n2: Vec3::Z,
            material_id: 0,
            mesh_id: 0,
        };
        assert_eq!(t.area(), 0.5);
        assert_eq!(t.cross().normalize(), Vec3::Z);
        assert_eq!(t.point(0.5, 0.5), Vec3::new(0.5, 0.5, 0.0));
        assert_eq!(t.shading_normal(0.2, 0.3), Vec3::Z);
    }
}
