//! Triangle mesh and scene description.
//!
//! This is what a scene loader hands to the renderer: flat triangle soups in
//! object space, one material slot per mesh, one world transform per mesh.

use glam::{Mat4, Vec3};
use principled_bsdf::Material;

use crate::light::Light;
use crate::util::{BBox3f, Error, Result};

/// Indexed triangle mesh in object space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Per-vertex normals. Empty means flat shading.
    pub normals: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
    /// Index into the material table.
    pub material: u32,
}

impl Mesh {
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self {
            name: name.into(),
            positions,
            normals: Vec::new(),
            indices,
            material: 0,
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_material(mut self, material: u32) -> Self {
        self.material = material;
        self
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn bounds(&self) -> BBox3f {
        let mut b = BBox3f::EMPTY;
        for &p in &self.positions {
            b.expand_by_point(p);
        }
        b
    }

    /// Check indices, normal count and vertex finiteness.
    pub fn validate(&self) -> Result<()> {
        let n = self.positions.len();
        if self.has_normals() && self.normals.len() != n {
            return Err(Error::AccelBuild(format!(
                "mesh '{}': {} normals for {} positions",
                self.name,
                self.normals.len(),
                n
            )));
        }
        if let Some(tri) = self.indices.iter().find(|t| t.iter().any(|&i| i as usize >= n)) {
            return Err(Error::AccelBuild(format!(
                "mesh '{}': index {:?} out of range ({} vertices)",
                self.name, tri, n
            )));
        }
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err(Error::AccelBuild(format!("mesh '{}': non-finite vertex", self.name)));
        }
        Ok(())
    }
}

/// Scene as produced by a loader.
#[derive(Debug, Clone, Default)]
pub struct SceneDesc {
    pub name: String,
    pub meshes: Vec<Mesh>,
    /// One world transform per mesh.
    pub transforms: Vec<Mat4>,
    pub materials: Vec<Material>,
    /// Analytic lights (point, directional). Emissive meshes are found from materials.
    pub lights: Vec<Light>,
}

impl SceneDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Add a material, returning its slot.
    pub fn add_material(&mut self, material: Material) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }

    /// Add a mesh placed by `transform`.
    pub fn add_mesh(&mut self, mesh: Mesh, transform: Mat4) {
        self.meshes.push(mesh);
        self.transforms.push(transform);
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }

    /// World-space bounds of all meshes.
    pub fn bounds(&self) -> BBox3f {
        let mut b = BBox3f::EMPTY;
        for (mesh, xform) in self.meshes.iter().zip(&self.transforms) {
            for &p in &mesh.positions {
                b.expand_by_point(xform.transform_point3(p));
            }
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Mesh {
        Mesh::new("tri", vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]])
    }

    #[test]
    fn test_validate() {
        assert!(tri().validate().is_ok());

        let mut bad = tri();
        bad.indices.push([0, 1, 3]);
        assert!(matches!(bad.validate(), Err(Error::AccelBuild(_))));

        let bad = tri().with_normals(vec![Vec3::Z]);
        assert!(bad.validate().is_err());

        let mut bad = tri();
        bad.positions[1].x = f32::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_scene_bounds() {
        let mut scene = SceneDesc::new("test");
        assert!(scene.is_empty());
        scene.add_mesh(tri(), Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)));
        assert_eq!(scene.triangle_count(), 1);
        let b = scene.bounds();
        assert_eq!(b.min.z, 5.0);
        assert_eq!(b.max.x, 1.0);
    }
}
