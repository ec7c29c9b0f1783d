//! Stack-based BVH traversal.
//!
//! Closest-hit and any-hit queries over the flat node array. Children are
//! visited near-first; a slab test culls nodes beyond the current closest hit.

use glam::Vec3;
use smallvec::SmallVec;

use super::bvh::{BvhNode, Triangle};
use crate::util::Ray;

/// Inline stack depth; deeper trees spill to the heap.
const STACK_SIZE: usize = 64;

/// Raw triangle hit: distance, triangle slot (leaf order) and barycentrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub prim: u32,
    pub u: f32,
    pub v: f32,
}

/// Reciprocal direction with infinities for zero components.
#[inline]
fn inv_dir(dir: Vec3) -> Vec3 {
    Vec3::ONE / dir
}

/// Slab test. Returns the entry distance if the box overlaps `[t_min, t_max)`.
#[inline]
fn hit_aabb(node: &BvhNode, origin: Vec3, inv: Vec3, t_min: f32, t_max: f32) -> Option<f32> {
    let t0 = (Vec3::from_array(node.aabb_min) - origin) * inv;
    let t1 = (Vec3::from_array(node.aabb_max) - origin) * inv;
    // NaN from 0 * inf is discarded by min/max ordering below
    let near = t0.min(t1);
    let far = t0.max(t1);
    let enter = near.max_element().max(t_min);
    let exit = far.min_element().min(t_max);
    (enter <= exit).then_some(enter)
}

/// Möller-Trumbore ray/triangle test. Double-sided.
#[inline]
pub fn hit_triangle(tri: &Triangle, ray: &Ray, t_max: f32) -> Option<(f32, f32, f32)> {
    const EPS: f32 = 1.0e-9;

    let e1 = tri.v1 - tri.v0;
    let e2 = tri.v2 - tri.v0;
    let p = ray.dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;

    let s = ray.origin - tri.v0;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = ray.dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t > ray.t_min && t < t_max).then_some((t, u, v))
}

/// Closest intersection along `ray`.
pub fn intersect(nodes: &[BvhNode], triangles: &[Triangle], ray: &Ray) -> Option<Hit> {
    if triangles.is_empty() || nodes.is_empty() {
        return None;
    }
    let inv = inv_dir(ray.dir);
    let mut closest: Option<Hit> = None;
    let mut t_max = ray.t_max;

    let mut stack: SmallVec<[u32; STACK_SIZE]> = SmallVec::new();
    stack.push(0);

    while let Some(idx) = stack.pop() {
        let node = &nodes[idx as usize];
        if hit_aabb(node, ray.origin, inv, ray.t_min, t_max).is_none() {
            continue;
        }

        if node.is_leaf() {
            let first = node.left_or_first as usize;
            for (i, tri) in triangles[first..first + node.count as usize].iter().enumerate() {
                if let Some((t, u, v)) = hit_triangle(tri, ray, t_max) {
                    t_max = t;
                    closest = Some(Hit { t, prim: (first + i) as u32, u, v });
                }
            }
            continue;
        }

        let left = node.left_or_first;
        let right = left + 1;
        let dl = hit_aabb(&nodes[left as usize], ray.origin, inv, ray.t_min, t_max);
        let dr = hit_aabb(&nodes[right as usize], ray.origin, inv, ray.t_min, t_max);
        match (dl, dr) {
            (Some(a), Some(b)) => {
                // Push far child first so the near one pops next
                if a <= b {
                    stack.push(right);
                    stack.push(left);
                } else {
                    stack.push(left);
                    stack.push(right);
                }
            }
            (Some(_), None) => stack.push(left),
            (None, Some(_)) => stack.push(right),
            (None, None) => {}
        }
    }

    closest
}

/// Any intersection along `ray` (shadow rays). Stops at the first hit.
pub fn occluded(nodes: &[BvhNode], triangles: &[Triangle], ray: &Ray) -> bool {
    if triangles.is_empty() || nodes.is_empty() {
        return false;
    }
    let inv = inv_dir(ray.dir);

    let mut stack: SmallVec<[u32; STACK_SIZE]> = SmallVec::new();
    stack.push(0);

    while let Some(idx) = stack.pop() {
        let node = &nodes[idx as usize];
        if hit_aabb(node, ray.origin, inv, ray.t_min, ray.t_max).is_none() {
            continue;
        }
        if node.is_leaf() {
            let first = node.left_or_first as usize;
            let leaf = &triangles[first..first + node.count as usize];
            if leaf.iter().any(|tri| hit_triangle(tri, ray, ray.t_max).is_some()) {
                return true;
            }
        } else {
            stack.push(node.left_or_first + 1);
            stack.push(node.left_or_first);
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::build::build_bvh;

    fn quad_tri(z: f32, material_id: u32) -> [Triangle; 2] {
        let a = Vec3::new(-1.0, -1.0, z);
        let b = Vec3::new(1.0, -1.0, z);
        let c = Vec3::new(1.0, 1.0, z);
        let d = Vec3::new(-1.0, 1.0, z);
        let t = |v0, v1, v2| Triangle {
            v0,
            v1,
            v2,
            n0: Vec3::Z,
            n1: Vec3::Z,
            n2: Vec3::Z,
            material_id,
            mesh_id: 0,
        };
        [t(a, b, c), t(a, c, d)]
    }

    fn leaf_order(tris: &[Triangle]) -> (Vec<BvhNode>, Vec<Triangle>) {
        let bvh = build_bvh(tris);
        let ordered = bvh.tri_indices.iter().map(|&i| tris[i as usize]).collect();
        (bvh.nodes, ordered)
    }

    #[test]
    fn test_triangle_hit() {
        let [tri, _] = quad_tri(0.0, 0);
        let ray = Ray::new(Vec3::new(0.5, -0.5, 1.0), -Vec3::Z);
        let (t, u, v) = hit_triangle(&tri, &ray, f32::INFINITY).unwrap();
        assert!((t - 1.0).abs() < 1e-6);
        assert!(u >= 0.0 && v >= 0.0 && u + v <= 1.0);
        assert!((tri.point(u, v) - Vec3::new(0.5, -0.5, 0.0)).length() < 1e-5);

        // Parallel and behind
        assert!(hit_triangle(&tri, &Ray::new(Vec3::Z, Vec3::X), f32::INFINITY).is_none());
        assert!(hit_triangle(&tri, &Ray::new(Vec3::Z, Vec3::Z), f32::INFINITY).is_none());
    }

    #[test]
    fn test_closest_hit_wins() {
        let mut tris: Vec<Triangle> = Vec::new();
        for (i, z) in [-3.0, 0.0, -1.0, -6.0].into_iter().enumerate() {
            tris.extend(quad_tri(z, i as u32));
        }
        let (nodes, ordered) = leaf_order(&tris);
        let ray = Ray::new(Vec3::new(0.1, 0.2, 5.0), -Vec3::Z);
        let hit = intersect(&nodes, &ordered, &ray).unwrap();
        assert!((hit.t - 5.0).abs() < 1e-5);
        assert_eq!(ordered[hit.prim as usize].material_id, 1);
    }

    #[test]
    fn test_t_range_respected() {
        let tris = quad_tri(0.0, 0);
        let (nodes, ordered) = leaf_order(&tris);
        let ray = Ray::segment(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z, 4.0);
        assert!(intersect(&nodes, &ordered, &ray).is_none());
        assert!(!occluded(&nodes, &ordered, &ray));

        let ray = Ray::segment(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z, 6.0);
        assert!(occluded(&nodes, &ordered, &ray));
    }

    #[test]
    fn test_axis_aligned_ray_through_flat_bounds() {
        // Zero-thickness boxes and zero direction components must not break the slab test
        let tris = quad_tri(2.0, 0);
        let (nodes, ordered) = leaf_order(&tris);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let hit = intersect(&nodes, &ordered, &ray).unwrap();
        assert!((hit.t - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_never_hits() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let bvh = build_bvh(&[]);
        assert!(intersect(&bvh.nodes, &[], &ray).is_none());
        assert!(!occluded(&bvh.nodes, &[], &ray));
    }

    #[test]
    fn test_matches_brute_force() {
        let mut tris = Vec::new();
        for i in 0..40 {
            let o = Vec3::new((i % 5) as f32 * 1.3, (i / 5) as f32 * 0.7, (i % 3) as f32 - 4.0);
            tris.push(Triangle {
                v0: o,
                v1: o + Vec3::new(1.0, 0.1, 0.2),
                v2: o + Vec3::new(0.2, 1.0, -0.1),
                n0: Vec3::Z,
                n1: Vec3::Z,
                n2: Vec3::Z,
                material_id: i,
                mesh_id: 0,
            });
        }
        let (nodes, ordered) = leaf_order(&tris);
        for k in 0..200 {
            let x = (k % 20) as f32 * 0.35;
            let y = (k / 20) as f32 * 0.6;
            let ray = Ray::new(Vec3::new(x, y, 5.0), Vec3::new(0.05, -0.02, -1.0).normalize());
            let brute = tris
                .iter()
                .filter_map(|t| hit_triangle(t, &ray, f32::INFINITY).map(|h| h.0))
                .fold(f32::INFINITY, f32::min);
            match intersect(&nodes, &ordered, &ray) {
                Some(hit) => assert!((hit.t - brute).abs() < 1e-5),
                None => assert!(brute.is_infinite()),
            }
        }
    }
}
