//! Local shading frame.
//!
//! Lobes are evaluated in a space where the shading normal is +Z, so
//! `cos theta = v.z` for any direction `v`.

use glam::Vec3;

/// Orthonormal basis around a shading normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
}

impl Frame {
    /// Arbitrary tangent orientation (branchless Duff et al. basis).
    pub fn from_normal(normal: Vec3) -> Self {
        let (tangent, bitangent) = normal.any_orthonormal_pair();
        Self { tangent, bitangent, normal }
    }

    /// Frame aligned with a preferred tangent direction, falling back to an
    /// arbitrary basis when the tangent is degenerate or parallel to `normal`.
    pub fn from_normal_tangent(normal: Vec3, tangent: Vec3) -> Self {
        let t = tangent - normal * normal.dot(tangent);
        let len2 = t.length_squared();
        if !len2.is_finite() || len2 < 1e-12 {
            return Self::from_normal(normal);
        }
        let tangent = t / len2.sqrt();
        let bitangent = normal.cross(tangent);
        Self { tangent, bitangent, normal }
    }

    #[inline]
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.tangent), v.dot(self.bitangent), v.dot(self.normal))
    }

    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
    }
}
