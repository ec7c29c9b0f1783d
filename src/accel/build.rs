//! SAH-based BVH builder.
//!
//! Binned Surface Area Heuristic over triangle centroids, built with an
//! explicit work stack into a flat node array. Node 0 is the root.

use rayon::prelude::*;

use super::bvh::{Aabb, BvhNode, Triangle};

/// Number of SAH bins for split evaluation.
const NUM_BINS: usize = 12;

/// Cost ratio: traversal vs intersection.
const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Ranges this small always become leaves.
const MAX_LEAF_SIZE: usize = 4;

/// Below this many triangles the per-triangle precompute runs serially.
const PARALLEL_THRESHOLD: usize = 4096;

/// Built BVH.
#[derive(Debug, Clone)]
pub struct Bvh {
    /// Flat node array (index 0 = root).
    pub nodes: Vec<BvhNode>,
    /// Triangle order; leaves reference ranges of this list.
    pub tri_indices: Vec<u32>,
    /// Deepest leaf (root = 1).
    pub depth: u32,
}

impl Bvh {
    /// Root-only tree over no triangles: every ray misses.
    pub fn empty() -> Self {
        Self {
            nodes: vec![BvhNode::leaf(&Aabb::EMPTY, 0, 0)],
            tri_indices: Vec::new(),
            depth: 1,
        }
    }
}

#[derive(Clone, Copy)]
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Bin {
    const EMPTY: Self = Self { bounds: Aabb::EMPTY, count: 0 };
}

struct Task {
    node: usize,
    start: usize,
    end: usize, // exclusive
    depth: u32,
}

/// Candidate split: axis, centroid position and SAH cost.
struct Split {
    axis: usize,
    pos: f32,
    cost: f32,
}

/// Build a BVH over `triangles` using binned SAH.
///
/// Triangles are not modified; `Bvh::tri_indices` maps leaf slots back into the slice.
#[tracing::instrument(skip_all, fields(tri_count = triangles.len()))]
pub fn build_bvh(triangles: &[Triangle]) -> Bvh {
    let n = triangles.len();
    if n == 0 {
        return Bvh::empty();
    }

    let (centroids, aabbs): (Vec<_>, Vec<_>) = if n >= PARALLEL_THRESHOLD {
        triangles.par_iter().map(|t| (t.centroid(), t.aabb())).unzip()
    } else {
        triangles.iter().map(|t| (t.centroid(), t.aabb())).unzip()
    };

    let mut indices: Vec<u32> = (0..n as u32).collect();
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n);
    nodes.push(BvhNode::leaf(&Aabb::EMPTY, 0, 0));

    let mut max_depth = 1;
    let mut stack = vec![Task { node: 0, start: 0, end: n, depth: 1 }];

    while let Some(task) = stack.pop() {
        let Task { node, start, end, depth } = task;
        let count = end - start;
        max_depth = max_depth.max(depth);

        let mut bounds = Aabb::EMPTY;
        let mut centroid_bounds = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            bounds.grow(&aabbs[idx as usize]);
            centroid_bounds.grow_point(centroids[idx as usize]);
        }

        if count <= MAX_LEAF_SIZE {
            nodes[node] = BvhNode::leaf(&bounds, start as u32, count as u32);
            continue;
        }

        // Leaf cost is scaled by parent area like the split costs
        let leaf_cost = count as f32 * INTERSECT_COST * bounds.area();
        let split = find_best_split(&indices[start..end], &aabbs, &centroids, &centroid_bounds);

        let Some(split) = split.filter(|s| s.cost < leaf_cost) else {
            nodes[node] = BvhNode::leaf(&bounds, start as u32, count as u32);
            continue;
        };

        let mid = start
            + partition(&mut indices[start..end], |&idx| {
                centroids[idx as usize][split.axis] < split.pos
            });
        // Degenerate partition: split the range in half
        let mid = if mid == start || mid == end { (start + end) / 2 } else { mid };

        let left = nodes.len();
        nodes.push(BvhNode::leaf(&Aabb::EMPTY, 0, 0));
        nodes.push(BvhNode::leaf(&Aabb::EMPTY, 0, 0));
        nodes[node] = BvhNode::internal(&bounds, left as u32);

        // Right first so the left subtree is laid out first (depth-first order)
        stack.push(Task { node: left + 1, start: mid, end, depth: depth + 1 });
        stack.push(Task { node: left, start, end: mid, depth: depth + 1 });
    }

    tracing::debug!(nodes = nodes.len(), depth = max_depth, "bvh built");

    Bvh { nodes, tri_indices: indices, depth: max_depth }
}

/// Recompute node bounds over an existing topology after the triangles moved.
///
/// `triangles` must be in the leaf order the tree was built with. Children
/// always sit after their parent, so one reverse sweep is bottom-up.
pub fn refit_bvh(nodes: &mut [BvhNode], triangles: &[Triangle]) {
    for i in (0..nodes.len()).rev() {
        let node = nodes[i];
        let first = node.left_or_first as usize;
        let mut bounds = Aabb::EMPTY;
        if node.is_leaf() {
            for tri in &triangles[first..first + node.count as usize] {
                bounds.grow(&tri.aabb());
            }
            nodes[i] = BvhNode::leaf(&bounds, node.left_or_first, node.count);
        } else if first != 0 {
            bounds.grow(&nodes[first].bounds());
            bounds.grow(&nodes[first + 1].bounds());
            nodes[i] = BvhNode::internal(&bounds, node.left_or_first);
        }
    }
}

/// SAH cost of a tree relative to its root area.
pub fn tree_cost(nodes: &[BvhNode]) -> f32 {
    let root = nodes.first().map_or(0.0, |n| n.bounds().area());
    if root <= 0.0 {
        return 0.0;
    }
    let cost: f32 = nodes
        .iter()
        .map(|n| {
            let area = n.bounds().area();
            if n.is_leaf() {
                n.count as f32 * INTERSECT_COST * area
            } else {
                TRAVERSAL_COST * area
            }
        })
        .sum();
    cost / root
}

/// Binned SAH split search across all 3 axes. `None` if every axis is degenerate.
fn find_best_split(
    indices: &[u32],
    aabbs: &[Aabb],
    centroids: &[glam::Vec3],
    centroid_bounds: &Aabb,
) -> Option<Split> {
    let mut best: Option<Split> = None;

    for axis in 0..3 {
        let lo = centroid_bounds.min[axis];
        let extent = centroid_bounds.max[axis] - lo;
        if !(extent > 1e-8) {
            continue;
        }

        let mut bins = [Bin::EMPTY; NUM_BINS];
        let scale = NUM_BINS as f32 / extent;
        for &idx in indices {
            let b = (((centroids[idx as usize][axis] - lo) * scale) as usize).min(NUM_BINS - 1);
            bins[b].bounds.grow(&aabbs[idx as usize]);
            bins[b].count += 1;
        }

        // Prefix sweep from the left
        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut acc = Bin::EMPTY;
        for i in 0..NUM_BINS - 1 {
            acc.bounds.grow(&bins[i].bounds);
            acc.count += bins[i].count;
            left_area[i] = acc.bounds.area();
            left_count[i] = acc.count;
        }

        // Suffix sweep from the right, evaluating the plane between bins i-1 and i
        let mut acc = Bin::EMPTY;
        for i in (1..NUM_BINS).rev() {
            acc.bounds.grow(&bins[i].bounds);
            acc.count += bins[i].count;
            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (left_count[i - 1] as f32 * left_area[i - 1] + acc.count as f32 * acc.bounds.area());

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(Split {
                    axis,
                    pos: lo + extent * (i as f32 / NUM_BINS as f32),
                    cost,
                });
            }
        }
    }

    best
}

/// Partition slice in-place. Returns count of elements where predicate is true.
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}
