//! Acceleration structure over a scene's triangle meshes.
//!
//! Meshes are flattened to world space, indexed by a SAH BVH and stored in
//! leaf order. A transform-only rebuild refits the existing tree and falls
//! back to a full SAH build once the refitted tree has degraded. Every build
//! or rebuild produces a new generation; callers holding an older generation
//! number must re-acquire before querying.

use glam::{Mat3, Mat4, Vec3};

use super::build::{build_bvh, refit_bvh, tree_cost, Bvh};
use super::bvh::{Aabb, BvhNode, Triangle};
use super::traverse;
use crate::scene::Mesh;
use crate::util::{Error, Ray, Result};

/// A refit whose SAH cost exceeds the last full build's by this factor is
/// replaced by a full build.
const REFIT_COST_LIMIT: f32 = 2.0;

/// Surface interaction returned by [`AccelerationStructure::intersect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub t: f32,
    pub position: Vec3,
    /// Unit face normal following counter-clockwise winding.
    pub geometric_normal: Vec3,
    /// Interpolated vertex normal (equals the face normal for flat meshes).
    pub shading_normal: Vec3,
    pub tangent: Vec3,
    pub material_id: u32,
    pub mesh_id: u32,
    /// Triangle slot in [`AccelerationStructure::triangles`].
    pub prim: u32,
}

/// Flattened, indexed scene geometry.
#[derive(Debug, Clone)]
pub struct AccelerationStructure {
    meshes: Vec<Mesh>,
    transforms: Vec<Mat4>,
    max_triangles: usize,
    nodes: Vec<BvhNode>,
    /// World-space triangles in BVH leaf order.
    triangles: Vec<Triangle>,
    /// Leaf slot to flattened triangle index.
    order: Vec<u32>,
    /// Tree cost right after the last full build.
    build_cost: f32,
    bounds: Aabb,
    depth: u32,
    generation: u32,
}

impl AccelerationStructure {
    /// Build from object-space meshes and one world transform per mesh.
    ///
    /// Fails if the geometry is invalid or exceeds `max_triangles`. A scene
    /// without triangles is valid and never reports a hit.
    #[tracing::instrument(skip_all, fields(meshes = meshes.len()))]
    pub fn build(meshes: &[Mesh], transforms: &[Mat4], max_triangles: usize) -> Result<Self> {
        let mut accel = Self {
            meshes: meshes.to_vec(),
            transforms: Vec::new(),
            max_triangles,
            nodes: Vec::new(),
            triangles: Vec::new(),
            order: Vec::new(),
            build_cost: 0.0,
            bounds: Aabb::EMPTY,
            depth: 0,
            generation: 0,
        };
        let world = accel.flatten(transforms)?;
        accel.build_tree(world);
        accel.finish(transforms, "built");
        Ok(accel)
    }

    /// Rebuild with new transforms. Mesh topology is unchanged, so the tree
    /// keeps its shape and only node bounds are recomputed, unless that
    /// leaves the tree much worse than a fresh build. The generation advances.
    ///
    /// On error the previous state stays intact.
    pub fn rebuild(&mut self, transforms: &[Mat4]) -> Result<()> {
        let world = self.flatten(transforms)?;
        // Degenerate triangles are dropped, so a transform can change the count
        let same_slots = world.len() == self.order.len()
            && self.order.iter().zip(&self.triangles).all(|(&i, old)| world[i as usize].mesh_id == old.mesh_id);
        if world.is_empty() || !same_slots {
            self.build_tree(world);
            self.finish(transforms, "built");
            return Ok(());
        }

        let triangles: Vec<Triangle> = self.order.iter().map(|&i| world[i as usize]).collect();
        let mut nodes = self.nodes.clone();
        refit_bvh(&mut nodes, &triangles);
        let cost = tree_cost(&nodes);
        if cost > REFIT_COST_LIMIT * self.build_cost {
            tracing::debug!(cost, build_cost = self.build_cost, "refit degraded, rebuilding");
            self.build_tree(world);
            self.finish(transforms, "built");
            return Ok(());
        }

        self.bounds = nodes.first().map(BvhNode::bounds).unwrap_or(Aabb::EMPTY);
        self.nodes = nodes;
        self.triangles = triangles;
        self.finish(transforms, "refitted");
        Ok(())
    }

    /// Validate and flatten all meshes to world space.
    fn flatten(&self, transforms: &[Mat4]) -> Result<Vec<Triangle>> {
        if transforms.len() != self.meshes.len() {
            return Err(Error::AccelBuild(format!(
                "{} transforms for {} meshes",
                transforms.len(),
                self.meshes.len()
            )));
        }
        let total: usize = self.meshes.iter().map(Mesh::triangle_count).sum();
        if total > self.max_triangles {
            return Err(Error::AccelBuild(format!(
                "{total} triangles exceed the device budget of {}",
                self.max_triangles
            )));
        }
        if let Some(bad) = transforms.iter().position(|m| !m.is_finite()) {
            return Err(Error::AccelBuild(format!("non-finite transform for mesh {bad}")));
        }

        let mut world = Vec::with_capacity(total);
        for (mesh_id, (mesh, xform)) in self.meshes.iter().zip(transforms).enumerate() {
            mesh.validate()?;
            flatten_mesh(mesh, xform, mesh_id as u32, &mut world);
        }
        Ok(world)
    }

    fn build_tree(&mut self, world: Vec<Triangle>) {
        let Bvh { nodes, tri_indices, depth } = build_bvh(&world);
        self.triangles = tri_indices.iter().map(|&i| world[i as usize]).collect();
        self.bounds = nodes.first().map(BvhNode::bounds).unwrap_or(Aabb::EMPTY);
        self.build_cost = tree_cost(&nodes);
        self.nodes = nodes;
        self.order = tri_indices;
        self.depth = depth;
    }

    fn finish(&mut self, transforms: &[Mat4], how: &str) {
        self.transforms = transforms.to_vec();
        self.generation = self.generation.wrapping_add(1);
        tracing::debug!(
            triangles = self.triangles.len(),
            nodes = self.nodes.len(),
            depth = self.depth,
            generation = self.generation,
            "acceleration structure {how}"
        );
    }

    /// Starts at 1 and increases with every successful (re)build.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    #[inline]
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    #[inline]
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    #[inline]
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Nearest hit along `ray`, if any.
    pub fn intersect(&self, ray: &Ray) -> Option<SurfaceHit> {
        let hit = traverse::intersect(&self.nodes, &self.triangles, ray)?;
        let tri = &self.triangles[hit.prim as usize];

        let geometric_normal = tri.cross().normalize_or_zero();
        let mut shading_normal = tri.shading_normal(hit.u, hit.v);
        if shading_normal == Vec3::ZERO {
            shading_normal = geometric_normal;
        }

        Some(SurfaceHit {
            t: hit.t,
            position: ray.at(hit.t),
            geometric_normal,
            shading_normal,
            tangent: tri.tangent(),
            material_id: tri.material_id,
            mesh_id: tri.mesh_id,
            prim: hit.prim,
        })
    }

    /// True if anything blocks `ray` within its range.
    #[inline]
    pub fn occluded(&self, ray: &Ray) -> bool {
        traverse::occluded(&self.nodes, &self.triangles, ray)
    }
}

/// Append the world-space triangles of one mesh. Zero-area triangles are dropped.
fn flatten_mesh(mesh: &Mesh, xform: &Mat4, mesh_id: u32, out: &mut Vec<Triangle>) {
    // Normal matrix = transpose(inverse(upper 3x3))
    let normal_mat = Mat3::from_mat4(*xform).inverse().transpose();

    for &[i0, i1, i2] in &mesh.indices {
        let (i0, i1, i2) = (i0 as usize, i1 as usize, i2 as usize);
        let v0 = xform.transform_point3(mesh.positions[i0]);
        let v1 = xform.transform_point3(mesh.positions[i1]);
        let v2 = xform.transform_point3(mesh.positions[i2]);

        let face = (v1 - v0).cross(v2 - v0);
        if !(face.length_squared() > 0.0) {
            continue;
        }
        let face = face.normalize();

        let (n0, n1, n2) = if mesh.has_normals() {
            let n = |i: usize| {
                let n = (normal_mat * mesh.normals[i]).normalize_or_zero();
                if n == Vec3::ZERO { face } else { n }
            };
            (n(i0), n(i1), n(i2))
        } else {
            (face, face, face)
        };

        out.push(Triangle { v0, v1, v2, n0, n1, n2, material_id: mesh.material, mesh_id });
    }
}
