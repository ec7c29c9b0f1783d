//! Per-hit shading record.

use glam::Vec3;
use principled_bsdf::{relative_eta, Frame, Material};

use crate::accel::SurfaceHit;
use crate::util::Ray;

/// Everything shading needs about one ray-surface intersection.
///
/// Normals are flipped to face the incoming ray; `entering` records which
/// side was hit so `eta` can be derived.
#[derive(Debug, Clone, Copy)]
pub struct Payload {
    pub distance: f32,
    pub position: Vec3,
    /// Shading normal, on the viewer's side.
    pub normal: Vec3,
    /// Face normal, on the viewer's side.
    pub geometric_normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
    /// Unit vector towards the ray origin.
    pub view: Vec3,
    pub ray_direction: Vec3,
    pub material: Material,
    /// True if the ray hit the front (counter-clockwise) face.
    pub entering: bool,
    /// Relative index of refraction for this crossing.
    pub eta: f32,
}

impl Payload {
    pub fn new(hit: &SurfaceHit, ray: &Ray, material: Material) -> Self {
        let entering = ray.dir.dot(hit.geometric_normal) < 0.0;
        let side = if entering { 1.0 } else { -1.0 };
        let geometric_normal = hit.geometric_normal * side;
        let view = -ray.dir;

        // Interpolated normals can point away from the viewer near silhouettes
        let mut normal = hit.shading_normal * side;
        if normal.dot(view) <= 0.0 {
            normal = geometric_normal;
        }

        let frame = Frame::from_normal_tangent(normal, hit.tangent);
        Self {
            distance: hit.t,
            position: hit.position,
            normal,
            geometric_normal,
            tangent: frame.tangent,
            binormal: frame.bitangent,
            view,
            ray_direction: ray.dir,
            eta: relative_eta(material.ior, entering),
            material,
            entering,
        }
    }

    /// Shading frame around the viewer-facing normal.
    #[inline]
    pub fn frame(&self) -> Frame {
        Frame {
            tangent: self.tangent,
            bitangent: self.binormal,
            normal: self.normal,
        }
    }

    /// Emitted radiance towards the viewer. Emitters are one-sided.
    #[inline]
    pub fn emission(&self) -> Vec3 {
        if self.entering {
            self.material.emitted()
        } else {
            Vec3::ZERO
        }
    }
}
